use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use log::{debug, info};
use tokio::runtime::{Builder, Runtime};

use crate::{command::Command, config::PoolConfig, index::IndexDescriptor};

use super::{PoolError, QueryResult, ResultFuture, transport::Connection};

/// Reason of the first entry that did not succeed.
fn first_failure(results: &[QueryResult]) -> Option<String> {
    match results.iter().find(|r| !r.is_ok()) {
        Some(result) => Some(result.reason().to_string()),
        None if results.is_empty() => Some("no response".to_string()),
        None => None,
    }
}

/// Fixed-size set of authenticated connections sharing one I/O runtime.
#[derive(Debug)]
pub struct Pool {
    // dropped before the runtime that drives them
    connections: Vec<Connection>,
    cursor: AtomicUsize,
    config: PoolConfig,
    runtime: Runtime,
}

impl Pool {
    /// Open and authenticate `config.pool_size` connections.
    ///
    /// Any connection that can't be opened or authenticated aborts construction.
    pub fn connect(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("hs-io")
            .enable_io()
            .enable_time()
            .build()
            .map_err(PoolError::Runtime)?;

        let addr = config.address();
        let mut connections = Vec::with_capacity(config.pool_size);
        for id in 0..config.pool_size {
            let connection = Connection::open(&runtime, id, &config)?;
            let results = connection
                .submit(None, vec![Command::auth(&config.secret)], config.request_timeout)?
                .wait();
            if let Some(reason) = first_failure(&results) {
                return Err(PoolError::Auth {
                    addr: addr.clone(),
                    reason,
                });
            }
            debug!("connection {id}: authenticated with {}", connection.addr());
            connections.push(connection);
        }

        info!(
            "connected to {addr} with {} connection(s), {} I/O thread(s)",
            connections.len(),
            config.worker_threads
        );
        Ok(Self {
            connections,
            cursor: AtomicUsize::new(0),
            config,
            runtime,
        })
    }

    pub fn size(&self) -> usize {
        self.connections.len()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Open `index` on every connection, in connection order.
    ///
    /// Stops at the first connection that fails; the error carries its 1-based
    /// ordinal and no later connection is contacted. Server-side index ids are per
    /// connection, so an index must be opened here before it is used in
    /// [`execute`](Self::execute).
    pub fn open_index(&self, index: &Arc<IndexDescriptor>) -> Result<(), PoolError> {
        for connection in &self.connections {
            let ordinal = connection.id() + 1;
            let failure = match connection.submit(
                Some(index),
                vec![Command::open_index()],
                self.config.request_timeout,
            ) {
                Ok(future) => first_failure(&future.wait()),
                Err(e) => Some(e.to_string()),
            };
            if let Some(reason) = failure {
                info!("failed to open index {index} on connection {ordinal}, reason: {reason}");
                return Err(PoolError::OpenIndex {
                    connection: ordinal,
                    reason,
                });
            }
        }
        debug!("opened index {index} on {} connection(s)", self.size());
        Ok(())
    }

    /// Send `commands` as one batch on the next connection.
    ///
    /// Commands are validated and encoded before anything is queued, so a misuse
    /// error leaves the connection untouched.
    pub fn execute(
        &self,
        index: &Arc<IndexDescriptor>,
        commands: Vec<Command>,
    ) -> Result<ResultFuture, PoolError> {
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections[slot].submit(Some(index), commands, self.config.request_timeout)
    }

    pub fn execute_one(
        &self,
        index: &Arc<IndexDescriptor>,
        command: impl Into<Command>,
    ) -> Result<ResultFuture, PoolError> {
        self.execute(index, vec![command.into()])
    }

    /// Close every connection. Batches still in flight resolve as disconnected.
    pub fn close(self) {
        let Pool {
            connections,
            runtime,
            ..
        } = self;
        for connection in &connections {
            connection.close();
        }
        let closed = connections.len();
        drop(connections);
        runtime.shutdown_background();
        info!("connection pool closed, all {closed} connection(s) in it closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_fails_before_connecting() {
        let err = Pool::connect(PoolConfig::new("", "secret")).unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));

        let err = Pool::connect(PoolConfig::new("127.0.0.1", "s").pool_size(0)).unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn no_result_counts_as_failure() {
        assert_eq!(first_failure(&[]), Some("no response".to_string()));
    }
}
