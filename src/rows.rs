//! Decoded rows returned by a find.
//!
//! A [`RowSet`] is the hand-off point between the protocol layer and the caller:
//! an ordered list of rows, each an ordered list of raw byte values, plus the value
//! column names of the index the find ran against. Values are raw bytes; text
//! accessors decode them with the set's [`Encoding`] (UTF-8 unless the pool is
//! configured otherwise).
use std::{borrow::Cow, str::FromStr, sync::Arc};

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("column '{0}' is not in result set")]
    UnknownColumn(String),

    #[error("value of column {column} is not valid {encoding}")]
    Encoding {
        column: usize,
        encoding: &'static str,
    },

    #[error("failed to parse value '{value}' of column {column}")]
    Parse { column: usize, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSet {
    columns: Arc<[String]>,
    rows: Vec<Vec<Vec<u8>>>,
    encoding: &'static Encoding,
}

impl RowSet {
    pub fn new(columns: Arc<[String]>, rows: Vec<Vec<Vec<u8>>>) -> Self {
        Self {
            columns,
            rows,
            encoding: UTF_8,
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Zero-based position of `name` among the value columns, ignoring ASCII case.
    pub fn column_index(&self, name: &str) -> Result<usize, RowError> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| RowError::UnknownColumn(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row { set: self, values })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row { set: self, values })
    }

    pub fn raw(&self) -> &[Vec<Vec<u8>>] {
        &self.rows
    }

    pub fn into_raw(self) -> Vec<Vec<Vec<u8>>> {
        self.rows
    }
}

/// Borrowed view over a single row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    set: &'a RowSet,
    values: &'a [Vec<u8>],
}

impl<'a> Row<'a> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: usize) -> Option<&'a [u8]> {
        self.values.get(column).map(Vec::as_slice)
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<&'a [u8]>, RowError> {
        Ok(self.get(self.set.column_index(name)?))
    }

    /// Decode the value of `column` as text. Borrowed when no conversion is
    /// needed; malformed input is an error, never replaced.
    pub fn get_str(&self, column: usize) -> Result<Option<Cow<'a, str>>, RowError> {
        let encoding = self.set.encoding;
        self.get(column)
            .map(|bytes| {
                encoding
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .ok_or(RowError::Encoding {
                        column,
                        encoding: encoding.name(),
                    })
            })
            .transpose()
    }

    pub fn str_by_name(&self, name: &str) -> Result<Option<Cow<'a, str>>, RowError> {
        self.get_str(self.set.column_index(name)?)
    }

    /// Parse the value of `column`; missing columns yield `None`.
    pub fn parse<T: FromStr>(&self, column: usize) -> Result<Option<T>, RowError> {
        let Some(s) = self.get_str(column)? else {
            return Ok(None);
        };
        s.parse().map(Some).map_err(|_| RowError::Parse {
            column,
            value: s.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RowSet {
        RowSet::new(
            vec!["account".to_string(), "Score".to_string()].into(),
            vec![
                vec![b"a1".to_vec(), b"42".to_vec()],
                vec![b"a2".to_vec(), vec![0xff]],
            ],
        )
    }

    #[test]
    fn column_lookup_ignores_case() {
        let set = sample();
        assert_eq!(set.column_index("score"), Ok(1));
        assert_eq!(set.column_index("ACCOUNT"), Ok(0));
        assert_eq!(
            set.column_index("email"),
            Err(RowError::UnknownColumn("email".into()))
        );
    }

    #[test]
    fn typed_access() {
        let set = sample();
        let row = set.row(0).unwrap();
        assert_eq!(row.str_by_name("account").unwrap().as_deref(), Some("a1"));
        assert_eq!(row.parse::<i64>(1).unwrap(), Some(42));
        assert_eq!(row.parse::<i64>(5).unwrap(), None);
        assert!(row.parse::<i64>(0).is_err());
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let set = sample();
        let row = set.row(1).unwrap();
        assert_eq!(row.get(1), Some(&[0xff][..]));
        assert!(matches!(row.get_str(1), Err(RowError::Encoding { column: 1, .. })));
    }

    #[test]
    fn text_uses_the_set_encoding() {
        let set = RowSet::new(
            vec!["name".to_string()].into(),
            vec![vec![vec![0xc4, 0xe3, 0xba, 0xc3]], vec![b"plain".to_vec()]],
        )
        .with_encoding(encoding_rs::GBK);

        assert_eq!(set.encoding(), encoding_rs::GBK);
        let first = set.row(0).unwrap();
        assert_eq!(first.get_str(0).unwrap().as_deref(), Some("\u{4f60}\u{597d}"));
        // ascii needs no conversion
        let second = set.row(1).unwrap();
        assert!(matches!(second.get_str(0), Ok(Some(Cow::Borrowed("plain")))));

        // same bytes are not utf-8
        let utf8 = RowSet::new(set.columns().to_vec().into(), set.raw().to_vec());
        assert_eq!(
            utf8.row(0).unwrap().get_str(0),
            Err(RowError::Encoding {
                column: 0,
                encoding: "UTF-8"
            })
        );
    }

    #[test]
    fn iterates_in_order() {
        let set = sample();
        let accounts: Vec<_> = set
            .iter()
            .map(|r| r.get_str(0).unwrap().unwrap().to_string())
            .collect();
        assert_eq!(accounts, vec!["a1", "a2"]);
    }
}
