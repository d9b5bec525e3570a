use std::{
    sync::{Arc, mpsc},
    time::Duration,
};

use encoding_rs::Encoding;
use log::{debug, info, trace, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    runtime::{Handle, Runtime},
    sync::mpsc::{Receiver, Sender, channel},
    task::JoinHandle,
};

use crate::{
    command::Command, config::PoolConfig, index::IndexDescriptor, protocol::RequestBuffer,
};

use super::{
    PoolError,
    dispatcher::{Dispatcher, PendingBatch, SharedQueue},
    future::ResultFuture,
};

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// One pooled socket.
///
/// Reads are driven by a task on the pool's runtime that feeds a [`Dispatcher`];
/// writes go through a second task fed by a bounded channel. A caller only blocks
/// when that channel is full, i.e. when the socket stopped draining.
#[derive(Debug)]
pub(crate) struct Connection {
    id: usize,
    addr: String,
    encoding: &'static Encoding,
    handle: Handle,
    pending: SharedQueue,
    writer: Sender<Vec<u8>>,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl Connection {
    pub fn open(runtime: &Runtime, id: usize, config: &PoolConfig) -> Result<Self, PoolError> {
        let address = config.address();
        let addr = address.as_str();
        let connect_timeout = config.connect_timeout;
        debug!("connection {id}: connecting to {addr}");
        let stream = runtime
            .block_on(async {
                tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await
            })
            .map_err(|_| PoolError::ConnectTimeout {
                addr: addr.to_string(),
                timeout: connect_timeout,
            })?
            .map_err(|source| PoolError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true).map_err(|source| PoolError::Connect {
            addr: addr.to_string(),
            source,
        })?;

        let (reader, writer) = stream.into_split();
        let pending = SharedQueue::default();
        let (tx, rx) = channel(config.write_queue);

        let read_task = runtime.spawn(read_loop(
            id,
            reader,
            Dispatcher::new(Arc::clone(&pending)),
        ));
        let write_task = runtime.spawn(write_loop(id, writer, rx, Arc::clone(&pending)));

        Ok(Self {
            id,
            addr: addr.to_string(),
            encoding: config.encoding,
            handle: runtime.handle().clone(),
            pending,
            writer: tx,
            read_task,
            write_task,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Encode `commands` into one frame, queue the batch and hand the frame to the
    /// writer. Queueing and handing over happen under the same lock, so the order
    /// of the pending queue is the order of the bytes on the wire.
    ///
    /// Room in the writer channel is reserved before the lock is taken, so a full
    /// channel blocks this caller without stalling the reader.
    ///
    /// Must not be called from inside the pool's runtime.
    pub fn submit(
        &self,
        index: Option<&Arc<IndexDescriptor>>,
        commands: Vec<Command>,
        timeout: Duration,
    ) -> Result<ResultFuture, PoolError> {
        let mut frame = RequestBuffer::with_capacity(commands.len() << 9);
        for command in &commands {
            command.encode(index.map(Arc::as_ref), &mut frame)?;
        }

        let (tx, rx) = mpsc::channel();
        if !commands.is_empty() {
            let permit = self
                .handle
                .block_on(self.writer.reserve())
                .map_err(|_| PoolError::Closed(self.addr.clone()))?;

            let mut pending = self.pending.lock();
            if pending.is_closed() {
                return Err(PoolError::Closed(self.addr.clone()));
            }
            permit.send(frame.into_inner());
            pending.push(PendingBatch::new(commands.len(), tx));
            trace!(
                "connection {}: queued batch of {} ({} pending)",
                self.id,
                commands.len(),
                pending.len()
            );
        }

        let future = ResultFuture::new(commands, index.cloned(), rx, timeout);
        Ok(future.with_encoding(self.encoding))
    }

    pub fn close(&self) {
        self.read_task.abort();
        self.write_task.abort();
        let dropped = self.pending.lock().close();
        debug!(
            "connection {}: closed {} ({dropped} batch(es) abandoned)",
            self.id, self.addr
        );
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

async fn read_loop(id: usize, mut reader: OwnedReadHalf, mut dispatcher: Dispatcher) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                info!("connection {id}: closed by server");
                break;
            }
            Ok(n) => dispatcher.dispatch(&buf[..n]),
            Err(e) => {
                warn!("connection {id}: read failed: {e}");
                break;
            }
        }
    }
    if dispatcher.buffered() > 0 {
        warn!(
            "connection {id}: discarding {} byte(s) of incomplete response",
            dispatcher.buffered()
        );
    }
    dispatcher.close();
}

async fn write_loop(
    id: usize,
    mut writer: OwnedWriteHalf,
    mut frames: Receiver<Vec<u8>>,
    pending: SharedQueue,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            warn!("connection {id}: write failed: {e}");
            pending.lock().close();
            return;
        }
    }
    let _ = writer.shutdown().await;
}
