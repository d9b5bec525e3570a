//! Pooled, pipelined access to a HandlerSocket server.
//!
//! A [`Pool`] keeps a fixed number of authenticated connections. Each call to
//! [`Pool::execute`] picks the next connection round robin, writes the whole batch
//! as one frame and returns a [`ResultFuture`] immediately. Many batches can be in
//! flight on the same connection: the server answers them strictly in arrival
//! order, and the connection's reader routes every response packet to the oldest
//! batch still waiting.
//!
//! # Key Components
//!
//! - [`Pool`]: connection lifecycle, index setup and dispatch.
//! - [`ResultFuture`]: blocking wait with timeout for one batch.
//! - [`QueryResult`]: one command with its lazily decoded response.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use hsclient::{IndexDescriptor, PoolConfig, client::Pool, command::{CompareOperator, Find}};
//!
//! let pool = Pool::connect(PoolConfig::new("127.0.0.1", "secret")).unwrap();
//! let users = Arc::new(IndexDescriptor::new("app", "user", "PRIMARY", &["account", "email"]));
//! pool.open_index(&users).unwrap();
//!
//! let future = pool
//!     .execute(&users, vec![Find::new(CompareOperator::Eq, &["a1"]).into()])
//!     .unwrap();
//! for result in future.wait() {
//!     println!("{result}: {:?}", result.rows());
//! }
//! pool.close();
//! ```
mod dispatcher;
mod future;
mod pool;
mod transport;

use std::{io, time::Duration};

use thiserror::Error;

use crate::{command::CommandError, config::ConfigError};

pub use future::{QueryResult, ResultCause, ResultFuture};
pub use pool::Pool;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start I/O runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("timeout to connect {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("failed to connect {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to authenticate with {addr}, reason: {reason}")]
    Auth { addr: String, reason: String },

    #[error("failed to open index on connection {connection}, reason: {reason}")]
    OpenIndex { connection: usize, reason: String },

    #[error("connection to {0} is closed")]
    Closed(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}
