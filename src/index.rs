//! Client-side identity of an open index.
//!
//! An [`IndexDescriptor`] names a `(db, table, index)` triple together with the
//! value columns a find returns and the filter columns usable in `F`/`W` clauses.
//! Index ids are per connection on the server, so the pool opens every descriptor
//! once on each of its connections under the same id.
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

static NEXT_INDEX_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    id: u64,
    db: String,
    table: String,
    index: String,
    columns: Arc<[String]>,
    filter_columns: Vec<String>,
    index_columns: Vec<String>,
}

fn owned<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names.iter().map(|s| s.as_ref().to_string()).collect()
}

impl IndexDescriptor {
    /// Describe an index with a freshly generated, process-unique id.
    pub fn new<S: AsRef<str>>(db: &str, table: &str, index: &str, columns: &[S]) -> Self {
        Self::with_id(
            NEXT_INDEX_ID.fetch_add(1, Ordering::Relaxed),
            db,
            table,
            index,
            columns,
        )
    }

    pub fn with_id<S: AsRef<str>>(
        id: u64,
        db: &str,
        table: &str,
        index: &str,
        columns: &[S],
    ) -> Self {
        Self {
            id,
            db: db.to_string(),
            table: table.to_string(),
            index: index.to_string(),
            columns: owned(columns).into(),
            filter_columns: Vec::new(),
            index_columns: Vec::new(),
        }
    }

    pub fn with_filter_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.filter_columns = owned(columns);
        self
    }

    /// Columns making up the index key, used to validate `IN` positions.
    pub fn with_index_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.index_columns = owned(columns);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn shared_columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    pub fn filter_columns(&self) -> &[String] {
        &self.filter_columns
    }

    pub fn index_columns(&self) -> &[String] {
        &self.index_columns
    }

    pub fn has_filter_columns(&self) -> bool {
        !self.filter_columns.is_empty()
    }

    /// Position of `name` among the filter columns.
    pub fn filter_column_position(&self, name: &str) -> Option<usize> {
        self.filter_columns.iter().position(|c| c == name)
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "indexId:{},db:{},table:{},index:{}",
            self.id, self.db, self.table, self.index
        )?;
        for (name, list) in [
            ("value columns", &self.columns[..]),
            ("index columns", &self.index_columns[..]),
            ("filter columns", &self.filter_columns[..]),
        ] {
            if !list.is_empty() {
                write!(f, ",{name}:[{}]", list.join(","))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = IndexDescriptor::new("db", "t", "PRIMARY", &["id"]);
        let b = IndexDescriptor::new("db", "t", "PRIMARY", &["id"]);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn filter_positions() {
        let desc = IndexDescriptor::with_id(3, "db", "t", "PRIMARY", &["id", "name"])
            .with_filter_columns(&["age", "score"]);
        assert_eq!(desc.filter_column_position("score"), Some(1));
        assert_eq!(desc.filter_column_position("name"), None);
        assert!(desc.has_filter_columns());
    }

    #[test]
    fn display_lists_non_empty_columns() {
        let desc = IndexDescriptor::with_id(7, "waf", "t_user", "PRIMARY", &["email", "password"])
            .with_filter_columns(&["age"]);
        assert_eq!(
            desc.to_string(),
            concat!(
                "indexId:7,db:waf,table:t_user,index:PRIMARY,",
                "value columns:[email,password],filter columns:[age]"
            )
        );
    }
}
