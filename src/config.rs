//! Pool configuration.
//!
//! [`PoolConfig`] carries every tunable of a [`Pool`](crate::client::Pool) and is
//! passed to it explicitly; there is no process-wide default.
use std::{thread, time::Duration};

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

pub const READ_WRITE_PORT: u16 = 9999;
pub const READ_ONLY_PORT: u16 = 9998;
pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WRITE_QUEUE: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host is invalid")]
    Host,
    #[error("{0} must be greater than 0")]
    Zero(&'static str),
    #[error("port {0} is reserved, ports must be greater than 1024")]
    Port(u16),
}

/// Which listener of the server the pool talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub host: String,
    pub secret: String,
    pub mode: ConnectionMode,
    pub read_write_port: u16,
    pub read_only_port: u16,
    pub pool_size: usize,
    /// Threads of the I/O runtime shared by all connections.
    pub worker_threads: usize,
    pub connect_timeout: Duration,
    /// Used by [`ResultFuture::wait`](crate::client::ResultFuture::wait).
    pub request_timeout: Duration,
    /// Encoded batches a connection buffers before `execute` blocks.
    pub write_queue: usize,
    /// Text encoding of row values.
    pub encoding: &'static Encoding,
}

impl PoolConfig {
    pub fn new(host: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            secret: secret.into(),
            mode: ConnectionMode::default(),
            read_write_port: READ_WRITE_PORT,
            read_only_port: READ_ONLY_PORT,
            pool_size: DEFAULT_POOL_SIZE,
            worker_threads: thread::available_parallelism().map_or(1, |n| n.get()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            write_queue: DEFAULT_WRITE_QUEUE,
            encoding: UTF_8,
        }
    }

    pub fn mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn ports(mut self, read_write: u16, read_only: u16) -> Self {
        self.read_write_port = read_write;
        self.read_only_port = read_only;
        self
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn write_queue(mut self, depth: usize) -> Self {
        self.write_queue = depth;
        self
    }

    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn port(&self) -> u16 {
        match self.mode {
            ConnectionMode::ReadOnly => self.read_only_port,
            ConnectionMode::ReadWrite => self.read_write_port,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }

    /// Reject settings a pool can't be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Host);
        }
        if self.pool_size == 0 {
            return Err(ConfigError::Zero("pool size"));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::Zero("worker threads"));
        }
        if self.write_queue == 0 {
            return Err(ConfigError::Zero("write queue"));
        }
        if let Some(port) = [self.read_write_port, self.read_only_port]
            .into_iter()
            .find(|&port| port <= 1024)
        {
            return Err(ConfigError::Port(port));
        }
        Ok(())
    }
}
