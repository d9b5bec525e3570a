//! HandlerSocket wire protocol.
//!
//! This module defines the byte-level framing shared by every request and response
//! exchanged with a HandlerSocket server. It covers the escaping rules that keep
//! payload bytes apart from framing bytes, the request writer used to build a batch
//! frame, and the resumable parser that turns a response packet back into a
//! [`Response`].
//!
//! # Binary Format
//!
//! The protocol is line oriented:
//!
//! - Tokens are separated by a TAB (`0x09`).
//! - Every request and every response ends with a LF (`0x0A`).
//! - Any payload byte below `0x10` is written as the marker `0x01` followed by the
//!   byte XORed with `0x40`, so a raw TAB or LF is always a real delimiter.
//!
//! A response packet reads `<status>\t<columns>[\t<body or reason>]\n`.
//!
//! # Key Components
//!
//! - [`escape`]: escaping and unescaping of payload bytes.
//! - [`RequestBuffer`]: growable writer for one batch frame.
//! - [`ResponseParser`]: incremental decoder for a single response packet.
//!
//! # See Also
//!
//! - [`command`](crate::command): per-operation encoding on top of [`RequestBuffer`].
//! - [`client`](crate::client): the connection layer that frames the byte stream.
pub mod escape;
mod request;
mod response;

pub use request::RequestBuffer;
pub use response::{Body, BodyKind, Progress, Response, ResponseParser};

/// Status code reported by the server for a successful request.
pub const STATUS_OK: u8 = 0;

pub const PACKET_DELIMITER: u8 = b'\n';
pub const TOKEN_DELIMITER: u8 = b'\t';
pub const LIST_DELIMITER: u8 = b',';

pub const UNSAFE_BYTE_MARKER: u8 = 0x01;
pub const UNSAFE_BYTE_MASK: u8 = 0x40;
/// Bytes strictly below this value are escaped.
pub const UNSAFE_BYTE_LIMIT: u8 = 0x10;

pub const OPERATOR_AUTH: u8 = b'A';
pub const OPERATOR_OPEN_INDEX: u8 = b'P';
pub const OPERATOR_INSERT: u8 = b'+';
pub const OPERATOR_UPDATE: u8 = b'U';
pub const OPERATOR_DELETE: u8 = b'D';
pub const OPERATOR_INCREMENT: u8 = b'+';
pub const OPERATOR_DECREMENT: u8 = b'-';
pub const OPERATOR_IN: u8 = b'@';
pub const OPERATOR_FILTER: u8 = b'F';
pub const OPERATOR_WHILE: u8 = b'W';

/// Authentication type understood by the server (plain shared secret).
pub const AUTH_TYPE: u8 = b'1';
