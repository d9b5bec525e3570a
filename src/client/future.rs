use std::{
    fmt,
    sync::{
        Arc, OnceLock,
        mpsc::{Receiver, RecvTimeoutError},
    },
    time::{Duration, Instant},
};

use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    command::Command,
    index::IndexDescriptor,
    protocol::Response,
    rows::RowSet,
};

use super::dispatcher::Delivery;

/// Why an entry has no response. Local to the client, never a server status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCause {
    /// Nothing arrived before the wait elapsed.
    Timeout(Duration),
    /// The connection stopped before the response arrived.
    Disconnected,
}

impl fmt::Display for ResultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCause::Timeout(after) => write!(f, "request reset by timeout after {after:?}"),
            ResultCause::Disconnected => write!(f, "connection closed before response"),
        }
    }
}

/// A command paired with its raw response packet.
///
/// The packet is decoded on first access and the decoded [`Response`] is cached,
/// so repeated reads never parse twice.
#[derive(Debug)]
pub struct QueryResult {
    command: Command,
    index: Option<Arc<IndexDescriptor>>,
    packet: Option<Vec<u8>>,
    cause: Option<ResultCause>,
    encoding: &'static Encoding,
    response: OnceLock<Response>,
}

impl QueryResult {
    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn index(&self) -> Option<&Arc<IndexDescriptor>> {
        self.index.as_ref()
    }

    pub fn cause(&self) -> Option<ResultCause> {
        self.cause
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, Some(ResultCause::Timeout(_)))
    }

    /// Undecoded packet, delimiter included.
    pub fn raw(&self) -> Option<&[u8]> {
        self.packet.as_deref()
    }

    pub fn is_decoded(&self) -> bool {
        self.response.get().is_some()
    }

    /// `None` when no packet arrived, see [`cause`](Self::cause).
    pub fn response(&self) -> Option<&Response> {
        let packet = self.packet.as_deref()?;
        Some(
            self.response
                .get_or_init(|| self.decode(packet)),
        )
    }

    fn decode(&self, packet: &[u8]) -> Response {
        self.command
            .decode_with_encoding(self.index.as_deref(), packet, self.encoding)
    }

    pub fn status(&self) -> Option<u8> {
        self.response().map(Response::status)
    }

    pub fn is_ok(&self) -> bool {
        self.response().is_some_and(Response::is_ok)
    }

    pub fn reason(&self) -> &str {
        match (self.response(), self.cause) {
            (Some(response), _) => response.reason(),
            (None, Some(ResultCause::Disconnected)) => "DISCONNECTED",
            (None, _) => "TIMEOUT",
        }
    }

    pub fn rows(&self) -> Option<&RowSet> {
        self.response().and_then(Response::rows)
    }

    pub fn affected_rows(&self) -> Option<u64> {
        self.response().and_then(Response::affected_rows)
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.command.name(), self.reason())?;
        if let Some(index) = &self.index {
            write!(f, " on {index}")?;
        }
        Ok(())
    }
}

/// Pending results of one submitted batch.
///
/// Waiting consumes the future: once [`wait`](Self::wait) returns, responses that
/// arrive late are drained by the connection and discarded, never written into
/// results a caller already holds.
#[derive(Debug)]
#[must_use = "a batch is only observable through its future"]
pub struct ResultFuture {
    commands: Vec<Command>,
    index: Option<Arc<IndexDescriptor>>,
    receiver: Receiver<Delivery>,
    timeout: Duration,
    encoding: &'static Encoding,
}

impl ResultFuture {
    pub(crate) fn new(
        commands: Vec<Command>,
        index: Option<Arc<IndexDescriptor>>,
        receiver: Receiver<Delivery>,
        timeout: Duration,
    ) -> Self {
        Self {
            commands,
            index,
            receiver,
            timeout,
            encoding: UTF_8,
        }
    }

    pub(crate) fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Block for the pool's request timeout.
    pub fn wait(self) -> Vec<QueryResult> {
        let timeout = self.timeout;
        self.wait_timeout(timeout)
    }

    /// Block until every entry has a response or `timeout` elapses. Entries still
    /// missing are marked with a [`ResultCause`].
    ///
    /// A timeout too large to be represented as a deadline waits without one.
    pub fn wait_timeout(self, timeout: Duration) -> Vec<QueryResult> {
        let size = self.commands.len();
        let mut packets: Vec<Option<Vec<u8>>> = vec![None; size];
        let mut received = 0;
        let mut cause = None;
        let deadline = Instant::now().checked_add(timeout);

        while received < size {
            let next = match deadline {
                Some(deadline) => self
                    .receiver
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => self
                    .receiver
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match next {
                Ok(Delivery { slot, packet }) => {
                    if let Some(entry) = packets.get_mut(slot) {
                        received += usize::from(entry.is_none());
                        *entry = Some(packet);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!("result future timed out ({timeout:?}), {received}/{size} received");
                    cause = Some(ResultCause::Timeout(timeout));
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("connection dropped batch, {received}/{size} received");
                    cause = Some(ResultCause::Disconnected);
                    break;
                }
            }
        }

        let index = self.index;
        let encoding = self.encoding;
        self.commands
            .into_iter()
            .zip(packets)
            .map(|(command, packet)| QueryResult {
                command,
                index: index.clone(),
                cause: if packet.is_none() { cause } else { None },
                packet,
                encoding,
                response: OnceLock::new(),
            })
            .collect()
    }
}
