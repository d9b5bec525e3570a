//! Requests understood by a HandlerSocket server.
//!
//! This module defines [`Command`], the closed set of operations the client can
//! send, together with their wire encoding and the decoding of their responses.
//! A command is immutable: encoding is a pure function of the command and the
//! [`IndexDescriptor`] it is bound to, and decoding produces a separate
//! [`Response`] instead of mutating the command.
//!
//! # Overview
//!
//! - `Auth`: `A\t1\t<secret>\n`
//! - `OpenIndex`: `P\t<id>\t<db>\t<table>\t<index>\t<columns>[\t<filter columns>]\n`
//! - `Insert`: `<id>\t+\t<n>\t<v1>...\t<vn>\n`
//! - `Find`: `<id>\t<op>\t<n>\t<k1>...\t<limit>\t<offset>[\t@...][\tF|W...]\n`
//! - `Modify`: a find followed by `\tU`, `\tD`, `\t+` or `\t-` and the new values.
//!
//! # Example
//! ```rust
//! use hsclient::{IndexDescriptor, command::{Command, CompareOperator, Find}};
//! use hsclient::protocol::RequestBuffer;
//!
//! let index = IndexDescriptor::with_id(1, "db", "user", "PRIMARY", &["email"]);
//! let command: Command = Find::new(CompareOperator::Eq, &["a1"]).update(&["n@x.com"]).into();
//!
//! let mut out = RequestBuffer::new();
//! command.encode(Some(&index), &mut out).unwrap();
//! assert_eq!(out.as_bytes(), b"1\t=\t1\ta1\t1\t0\tU\tn@x.com\n");
//! ```
mod find;
mod modify;

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

use crate::{
    index::IndexDescriptor,
    protocol::{
        AUTH_TYPE, BodyKind, LIST_DELIMITER, OPERATOR_AUTH, OPERATOR_INSERT, OPERATOR_OPEN_INDEX,
        RequestBuffer, Response, ResponseParser, TOKEN_DELIMITER,
    },
};

pub use find::{Filter, FilterKind, Find, InClause};
pub use modify::{Modification, Modify};

/// Misuse of a command, reported before anything is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("'{0}' requires an index descriptor")]
    MissingIndex(&'static str),

    #[error("conditions can't be empty")]
    EmptyConditions,

    #[error("limit must be one or greater")]
    ZeroLimit,

    #[error("invalid filter, column '{column}' is not a filter column of {index}")]
    UnknownFilterColumn { column: String, index: String },

    #[error("IN position {position} is outside the {key_parts} key part(s) of the index")]
    InPosition { position: usize, key_parts: usize },

    #[error("can't attach values to a {0} command")]
    ValuesNotSupported(&'static str),
}

/// Comparison applied to the index key (or to a filter column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOperator {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            CompareOperator::Eq => b"=",
            CompareOperator::Gt => b">",
            CompareOperator::Ge => b">=",
            CompareOperator::Lt => b"<",
            CompareOperator::Le => b"<=",
        }
    }
}

pub(crate) fn values<V: AsRef<[u8]>>(values: &[V]) -> Vec<Vec<u8>> {
    values.iter().map(|v| v.as_ref().to_vec()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Auth { secret: Vec<u8> },
    OpenIndex,
    Insert { values: Vec<Vec<u8>> },
    Find(Find),
    Modify(Modify),
}

impl From<Find> for Command {
    fn from(value: Find) -> Self {
        Command::Find(value)
    }
}

impl From<Modify> for Command {
    fn from(value: Modify) -> Self {
        Command::Modify(value)
    }
}

impl Command {
    pub fn auth(secret: impl AsRef<[u8]>) -> Self {
        Command::Auth {
            secret: secret.as_ref().to_vec(),
        }
    }

    pub fn open_index() -> Self {
        Command::OpenIndex
    }

    pub fn insert<V: AsRef<[u8]>>(row: &[V]) -> Self {
        Command::Insert {
            values: values(row),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Auth { .. } => "auth",
            Command::OpenIndex => "open_index",
            Command::Insert { .. } => "insert",
            Command::Find(_) => "find",
            Command::Modify(m) => match m.modification() {
                Modification::Update(_) => "update",
                Modification::Delete => "delete",
                Modification::Increment(_) => "increment",
                Modification::Decrement(_) => "decrement",
            },
        }
    }

    fn require<'a>(
        &self,
        index: Option<&'a IndexDescriptor>,
    ) -> Result<&'a IndexDescriptor, CommandError> {
        index.ok_or(CommandError::MissingIndex(self.name()))
    }

    /// Check the command against `index` without writing anything.
    pub fn validate(&self, index: Option<&IndexDescriptor>) -> Result<(), CommandError> {
        match self {
            Command::Auth { .. } => Ok(()),
            Command::OpenIndex | Command::Insert { .. } => self.require(index).map(|_| ()),
            Command::Find(find) => find.validate(self.require(index)?),
            Command::Modify(modify) => modify.validate(self.require(index)?),
        }
    }

    /// Append one complete request (including its packet delimiter) to `out`.
    ///
    /// Nothing is written when validation fails.
    pub fn encode(
        &self,
        index: Option<&IndexDescriptor>,
        out: &mut RequestBuffer,
    ) -> Result<(), CommandError> {
        self.validate(index)?;

        match self {
            Command::Auth { secret } => {
                out.put_byte(OPERATOR_AUTH)
                    .token()
                    .put_byte(AUTH_TYPE)
                    .token()
                    .put_escaped(secret);
            }
            Command::OpenIndex => {
                let index = self.require(index)?;
                out.put_byte(OPERATOR_OPEN_INDEX)
                    .token()
                    .put_number(index.id())
                    .token()
                    .put_escaped(index.db().as_bytes())
                    .token()
                    .put_escaped(index.table().as_bytes())
                    .token()
                    .put_escaped(index.index().as_bytes())
                    .token()
                    .put_list(index.columns(), LIST_DELIMITER);
                if index.has_filter_columns() {
                    out.token().put_list(index.filter_columns(), LIST_DELIMITER);
                }
            }
            Command::Insert { values } => {
                let index = self.require(index)?;
                out.put_number(index.id())
                    .token()
                    .put_byte(OPERATOR_INSERT)
                    .token()
                    .put_number(values.len())
                    .token()
                    .put_list(values, TOKEN_DELIMITER);
            }
            Command::Find(find) => find.encode_predicate(self.require(index)?, out),
            Command::Modify(modify) => modify.encode(self.require(index)?, out),
        }

        out.end_packet();
        Ok(())
    }

    pub fn body_kind(&self, index: Option<&IndexDescriptor>) -> BodyKind {
        match self {
            Command::Find(_) => BodyKind::Rows {
                columns: index
                    .map(IndexDescriptor::shared_columns)
                    .unwrap_or_else(|| Vec::<String>::new().into()),
            },
            Command::Modify(_) => BodyKind::Affected,
            _ => BodyKind::Empty,
        }
    }

    /// Decode one response packet produced by this command, rows as UTF-8.
    pub fn decode(&self, index: Option<&IndexDescriptor>, packet: &[u8]) -> Response {
        self.decode_with_encoding(index, packet, UTF_8)
    }

    pub fn decode_with_encoding(
        &self,
        index: Option<&IndexDescriptor>,
        packet: &[u8],
        encoding: &'static Encoding,
    ) -> Response {
        let mut parser = ResponseParser::new(self.body_kind(index)).with_encoding(encoding);
        parser.parse(packet);
        parser.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_index() -> IndexDescriptor {
        IndexDescriptor::with_id(
            3,
            "waf",
            "t_user",
            "PRIMARY",
            &["account", "email", "password", "createTime"],
        )
    }

    fn encode(command: &Command, index: Option<&IndexDescriptor>) -> Vec<u8> {
        let mut out = RequestBuffer::new();
        command.encode(index, &mut out).unwrap();
        out.into_inner()
    }

    #[test]
    fn auth_request() {
        let command = Command::auth("123456");
        assert_eq!(encode(&command, None), b"A\t1\t123456\n".to_vec());
    }

    #[test]
    fn auth_secret_is_escaped() {
        let command = Command::auth("a\tb");
        assert_eq!(encode(&command, None), b"A\t1\ta\x01\x49b\n".to_vec());
    }

    #[test]
    fn open_index_request() {
        let index = user_index();
        assert_eq!(
            encode(&Command::open_index(), Some(&index)),
            b"P\t3\twaf\tt_user\tPRIMARY\taccount,email,password,createTime\n".to_vec()
        );

        let index = IndexDescriptor::with_id(4, "db", "t", "idx", &["a", "b"])
            .with_filter_columns(&["c", "d"]);
        assert_eq!(
            encode(&Command::open_index(), Some(&index)),
            b"P\t4\tdb\tt\tidx\ta,b\tc,d\n".to_vec()
        );
    }

    #[test]
    fn insert_request() {
        let index = user_index();
        let command = Command::insert(&["a1", "a1@x.com", "a1", "2014-01-01"]);
        assert_eq!(
            encode(&command, Some(&index)),
            b"3\t+\t4\ta1\ta1@x.com\ta1\t2014-01-01\n".to_vec()
        );
    }

    #[test]
    fn insert_response_has_no_body() {
        let index = user_index();
        let command = Command::insert(&["a1"]);
        let resp = command.decode(Some(&index), b"0\t0\n");
        assert!(resp.is_ok());
        assert_eq!(resp.body(), &crate::protocol::Body::Empty);
    }

    #[test]
    fn find_request_and_response() {
        let index = IndexDescriptor::with_id(
            3,
            "waf",
            "t_user",
            "PRIMARY",
            &["account", "email", "createTime"],
        );
        let command: Command = Find::new(CompareOperator::Eq, &["a1"]).limit(10).into();
        assert_eq!(
            encode(&command, Some(&index)),
            b"3\t=\t1\ta1\t10\t0\n".to_vec()
        );

        let resp = command.decode(Some(&index), b"0\t3\ta1\tm@x.com\t2014-01-01\n");
        let rows = resp.rows().unwrap();
        assert_eq!(rows.len(), 1);
        let row = rows.row(0).unwrap();
        assert_eq!(row.str_by_name("email").unwrap().as_deref(), Some("m@x.com"));
        assert_eq!(
            rows.raw()[0],
            vec![b"a1".to_vec(), b"m@x.com".to_vec(), b"2014-01-01".to_vec()]
        );
    }

    #[test]
    fn update_response_counts_rows() {
        let index = user_index();
        let command: Command = Find::new(CompareOperator::Eq, &["a1"]).update(&["x"]).into();
        assert_eq!(command.name(), "update");
        assert_eq!(command.decode(Some(&index), b"0\t1\t2\n").affected_rows(), Some(2));
    }

    #[test]
    fn unopened_index_response() {
        let index = user_index();
        let command: Command = Find::new(CompareOperator::Eq, &["a1"]).delete().into();
        let resp = command.decode(Some(&index), b"1\t0\tindex not found\n");
        assert_eq!(resp.status(), 1);
        assert_eq!(resp.reason(), "index not found");
        assert_eq!(resp.affected_rows(), None);
    }

    #[test]
    fn data_commands_require_an_index() {
        let mut out = RequestBuffer::new();
        assert_eq!(
            Command::insert(&["a"]).encode(None, &mut out),
            Err(CommandError::MissingIndex("insert"))
        );
        assert_eq!(
            Command::open_index().encode(None, &mut out),
            Err(CommandError::MissingIndex("open_index"))
        );
        assert!(out.is_empty());
    }

    #[test]
    fn failed_validation_writes_nothing() {
        let index = user_index();
        let mut out = RequestBuffer::new();
        let command: Command = Find::new(CompareOperator::Eq, &["a1"])
            .filter("missing", CompareOperator::Eq, "1")
            .into();
        assert!(command.encode(Some(&index), &mut out).is_err());
        assert!(out.is_empty());
    }
}
