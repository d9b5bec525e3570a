use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8};

use crate::rows::RowSet;

use super::{PACKET_DELIMITER, STATUS_OK, TOKEN_DELIMITER, escape::unescape};

/// Shape of the body a command expects after a successful status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyKind {
    /// Nothing beyond the envelope (auth, open index, insert).
    Empty,
    /// Escaped values grouped into rows of the given value columns (find).
    Rows { columns: Arc<[String]> },
    /// A decimal affected-row count (update, delete, increment, decrement).
    Affected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Rows(RowSet),
    Affected(u64),
}

impl Body {
    fn with_encoding(self, encoding: &'static Encoding) -> Self {
        match self {
            Body::Rows(rows) => Body::Rows(rows.with_encoding(encoding)),
            body => body,
        }
    }
}

/// Decoded server response for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u8,
    columns: u64,
    body: Body,
    reason: Option<String>,
}

impl Response {
    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Column count reported by the server.
    pub fn columns(&self) -> u64 {
        self.columns
    }

    /// `"OK"` on success, the server-provided failure text otherwise.
    pub fn reason(&self) -> &str {
        match (&self.reason, self.is_ok()) {
            (_, true) => "OK",
            (Some(reason), false) => reason,
            (None, false) => "",
        }
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn rows(&self) -> Option<&RowSet> {
        match &self.body {
            Body::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn affected_rows(&self) -> Option<u64> {
        match self.body {
            Body::Affected(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Status,
    NumColumns,
    Body,
    Reason,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More input is required; everything parsed so far is kept.
    NeedMore,
    Complete,
}

/// Incremental decoder for one response packet.
///
/// [`parse`](Self::parse) is called with the bytes received so far, every call
/// passing the previous input with new bytes appended. The parser remembers its
/// state, position and partial accumulators between calls, so a packet can be
/// delivered in chunks of any size.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    kind: BodyKind,
    state: State,
    pos: usize,
    status: u8,
    columns: u64,
    reason: Vec<u8>,
    body: Body,
    encoding: &'static Encoding,
}

impl ResponseParser {
    pub fn new(kind: BodyKind) -> Self {
        Self {
            kind,
            state: State::Status,
            pos: 0,
            status: 0,
            columns: 0,
            reason: Vec::new(),
            body: Body::Empty,
            encoding: UTF_8,
        }
    }

    /// Text encoding attached to decoded rows.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Number of input bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::Done
    }

    pub fn parse(&mut self, input: &[u8]) -> Progress {
        loop {
            match self.state {
                State::Status => {
                    // status digit plus the delimiter that follows it
                    if input.len() < self.pos + 2 {
                        return Progress::NeedMore;
                    }
                    self.status = input[self.pos].wrapping_sub(b'0');
                    self.pos += 2;
                    self.state = State::NumColumns;
                }
                State::NumColumns => loop {
                    let Some(&b) = input.get(self.pos) else {
                        return Progress::NeedMore;
                    };
                    self.pos += 1;
                    match b {
                        PACKET_DELIMITER => {
                            self.state = State::Done;
                            return Progress::Complete;
                        }
                        TOKEN_DELIMITER => {
                            self.state = if self.status == STATUS_OK {
                                State::Body
                            } else {
                                State::Reason
                            };
                            break;
                        }
                        digit => self.columns = accumulate(self.columns, digit),
                    }
                },
                State::Body => {
                    let rest = &input[self.pos..];
                    let Some(end) = rest.iter().position(|&b| b == PACKET_DELIMITER) else {
                        return Progress::NeedMore;
                    };
                    self.body = decode_body(&self.kind, self.columns, &rest[..=end])
                        .with_encoding(self.encoding);
                    self.pos += end + 1;
                    self.state = State::Done;
                    return Progress::Complete;
                }
                State::Reason => {
                    while let Some(&b) = input.get(self.pos) {
                        self.pos += 1;
                        if b == PACKET_DELIMITER || b == TOKEN_DELIMITER {
                            self.state = State::Done;
                            return Progress::Complete;
                        }
                        self.reason.push(b);
                    }
                    return Progress::NeedMore;
                }
                State::Done => return Progress::Complete,
            }
        }
    }

    /// Build the response from whatever has been parsed.
    pub fn finish(self) -> Response {
        let ok = self.status == STATUS_OK;
        let body = match (self.body, &self.kind) {
            // a successful find without body bytes still yields an (empty) row set
            (Body::Empty, BodyKind::Rows { columns }) if ok => {
                let rows = RowSet::new(Arc::clone(columns), Vec::new());
                Body::Rows(rows.with_encoding(self.encoding))
            }
            (body, _) => body,
        };
        let reason = (!ok).then(|| String::from_utf8_lossy(&self.reason).into_owned());

        Response {
            status: self.status,
            columns: self.columns,
            body,
            reason,
        }
    }
}

#[inline]
fn accumulate(acc: u64, digit: u8) -> u64 {
    acc.saturating_mul(10)
        .saturating_add(u64::from(digit.wrapping_sub(b'0')))
}

fn is_delimiter(b: u8) -> bool {
    b == TOKEN_DELIMITER || b == PACKET_DELIMITER
}

fn decode_body(kind: &BodyKind, reported: u64, body: &[u8]) -> Body {
    match kind {
        BodyKind::Empty => Body::Empty,
        // nothing to read when the server reports no columns
        BodyKind::Rows { columns } if reported == 0 => {
            Body::Rows(RowSet::new(Arc::clone(columns), Vec::new()))
        }
        BodyKind::Rows { columns } => {
            let width = match columns.len() {
                0 => usize::try_from(reported).unwrap_or(usize::MAX),
                n => n,
            };
            Body::Rows(RowSet::new(Arc::clone(columns), decode_rows(body, width)))
        }
        BodyKind::Affected => Body::Affected(
            body.iter()
                .take_while(|&&b| !is_delimiter(b))
                .fold(0, |acc, &b| accumulate(acc, b)),
        ),
    }
}

fn decode_rows(body: &[u8], width: usize) -> Vec<Vec<Vec<u8>>> {
    let mut rows = Vec::new();
    let mut row = Vec::with_capacity(width);
    let mut start = 0;

    for (i, &b) in body.iter().enumerate() {
        if !is_delimiter(b) {
            continue;
        }
        row.push(unescape(&body[start..i]));
        start = i + 1;
        if row.len() == width {
            rows.push(std::mem::replace(&mut row, Vec::with_capacity(width)));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }

    rows
}
