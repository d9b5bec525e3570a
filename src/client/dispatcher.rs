use std::{
    collections::VecDeque,
    sync::{Arc, mpsc::Sender},
};

use log::{trace, warn};
use parking_lot::Mutex;

use crate::protocol::PACKET_DELIMITER;

/// One complete response packet for entry `slot` of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub slot: usize,
    pub packet: Vec<u8>,
}

/// Dispatcher-side record of a submitted batch.
///
/// It owns nothing but the sending half of the batch's result channel. Once the
/// caller stops waiting, sends fail and later packets are dropped here.
#[derive(Debug)]
pub(crate) struct PendingBatch {
    size: usize,
    next: usize,
    sink: Sender<Delivery>,
}

impl PendingBatch {
    pub fn new(size: usize, sink: Sender<Delivery>) -> Self {
        Self {
            size,
            next: 0,
            sink,
        }
    }

    /// Attribute `packet` to the next entry; `true` once every entry has one.
    fn deliver(&mut self, packet: Vec<u8>) -> bool {
        let slot = self.next;
        if self.sink.send(Delivery { slot, packet }).is_err() {
            trace!("discarding late response for entry {slot}");
        }
        self.next += 1;
        self.next >= self.size
    }
}

/// Outstanding batches of one connection, oldest first.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    batches: VecDeque<PendingBatch>,
    closed: bool,
}

pub(crate) type SharedQueue = Arc<Mutex<PendingQueue>>;

impl PendingQueue {
    pub fn push(&mut self, batch: PendingBatch) {
        self.batches.push_back(batch);
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Refuse further batches and drop the outstanding ones, which disconnects
    /// their futures. Returns how many were dropped.
    pub fn close(&mut self) -> usize {
        self.closed = true;
        let dropped = self.batches.len();
        self.batches.clear();
        dropped
    }

    /// Route one packet to the oldest batch, popping it once complete.
    fn deliver(&mut self, packet: Vec<u8>) -> bool {
        let Some(batch) = self.batches.front_mut() else {
            return false;
        };
        if batch.deliver(packet) {
            self.batches.pop_front();
        }
        true
    }
}

/// Splits a connection's byte stream into packets and hands them out in
/// submission order.
///
/// Bytes are stored verbatim (escapes included, delimiter kept) and decoded later
/// by the command that produced them.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    pending: SharedQueue,
    packet: Vec<u8>,
}

impl Dispatcher {
    pub fn new(pending: SharedQueue) -> Self {
        Self {
            pending,
            packet: Vec::new(),
        }
    }

    pub fn dispatch(&mut self, mut bytes: &[u8]) {
        while let Some(end) = bytes.iter().position(|&b| b == PACKET_DELIMITER) {
            self.packet.extend_from_slice(&bytes[..=end]);
            self.complete_packet();
            bytes = &bytes[end + 1..];
        }
        self.packet.extend_from_slice(bytes);
    }

    /// Bytes of the packet currently being received.
    pub fn buffered(&self) -> usize {
        self.packet.len()
    }

    fn complete_packet(&mut self) {
        let packet = std::mem::take(&mut self.packet);
        let len = packet.len();
        if !self.pending.lock().deliver(packet) {
            warn!("dropping {len} byte response with no pending request");
        }
    }

    /// Stop accepting batches and disconnect every waiting future.
    pub fn close(&mut self) {
        let dropped = self.pending.lock().close();
        if dropped > 0 {
            warn!("connection closed with {dropped} batch(es) outstanding");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver, TryRecvError};

    use super::*;

    fn submit(queue: &SharedQueue, size: usize) -> Receiver<Delivery> {
        let (tx, rx) = mpsc::channel();
        queue.lock().push(PendingBatch::new(size, tx));
        rx
    }

    fn drain(rx: &Receiver<Delivery>) -> Vec<Delivery> {
        rx.try_iter().collect()
    }

    const STREAM: &[u8] = b"0\t1\t1\n0\t0\n1\t0\tindex not found\n\
        0\t3\ta\tb\x01\x4ac\n0\t1\t2\n0\t0\n";

    fn packets() -> Vec<Vec<u8>> {
        STREAM
            .split_inclusive(|&b| b == PACKET_DELIMITER)
            .map(<[u8]>::to_vec)
            .collect()
    }

    #[test]
    fn batches_resolve_in_submission_order_for_any_chunking() {
        let expected = packets();

        for chunk in 1..=STREAM.len() {
            let queue = SharedQueue::default();
            let b1 = submit(&queue, 2);
            let b2 = submit(&queue, 1);
            let b3 = submit(&queue, 3);
            let mut dispatcher = Dispatcher::new(Arc::clone(&queue));

            for piece in STREAM.chunks(chunk) {
                dispatcher.dispatch(piece);
            }

            let got: Vec<_> = [drain(&b1), drain(&b2), drain(&b3)]
                .into_iter()
                .flatten()
                .map(|d| d.packet)
                .collect();
            assert_eq!(got, expected, "chunk size {chunk}");
            assert_eq!(queue.lock().len(), 0);
            assert_eq!(dispatcher.buffered(), 0);
        }
    }

    #[test]
    fn earlier_batch_completes_first() {
        let queue = SharedQueue::default();
        let b1 = submit(&queue, 2);
        let b2 = submit(&queue, 1);
        let mut dispatcher = Dispatcher::new(Arc::clone(&queue));

        dispatcher.dispatch(b"0\t1\t1\n0\t0");
        assert_eq!(drain(&b1).len(), 1);
        assert_eq!(queue.lock().len(), 2);

        dispatcher.dispatch(b"\n1\t0");
        let second = drain(&b1);
        assert_eq!(second, vec![Delivery { slot: 1, packet: b"0\t0\n".to_vec() }]);
        assert_eq!(queue.lock().len(), 1);
        assert!(drain(&b2).is_empty());

        dispatcher.dispatch(b"\n");
        assert_eq!(drain(&b2).len(), 1);
        assert_eq!(queue.lock().len(), 0);
    }

    #[test]
    fn abandoned_batch_still_consumes_its_packets() {
        let queue = SharedQueue::default();
        drop(submit(&queue, 2));
        let live = submit(&queue, 1);
        let mut dispatcher = Dispatcher::new(Arc::clone(&queue));

        dispatcher.dispatch(b"0\t0\n0\t0\n0\t1\t7\n");
        assert_eq!(
            drain(&live),
            vec![Delivery { slot: 0, packet: b"0\t1\t7\n".to_vec() }]
        );
    }

    #[test]
    fn stray_packet_is_dropped() {
        let queue = SharedQueue::default();
        let mut dispatcher = Dispatcher::new(Arc::clone(&queue));
        dispatcher.dispatch(b"0\t0\n");

        let rx = submit(&queue, 1);
        dispatcher.dispatch(b"0\t1\t3\n");
        assert_eq!(drain(&rx)[0].packet, b"0\t1\t3\n".to_vec());
    }

    #[test]
    fn close_disconnects_waiting_batches() {
        let queue = SharedQueue::default();
        let rx = submit(&queue, 1);
        let mut dispatcher = Dispatcher::new(Arc::clone(&queue));

        dispatcher.close();
        assert!(queue.lock().is_closed());
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }
}
