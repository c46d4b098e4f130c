//! Bounded hand-off queue between the stream producer and the uploader.
//!
//! A thin wrapper over a bounded crossbeam channel that keeps both ends
//! together so the pipeline shares one `Arc<ChunkQueue>`. FIFO ordering is
//! load-bearing: sequence numbers and object keys are assigned in dequeue
//! order and must match capture order.

use crate::pipeline::types::RawChunk;
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct ChunkQueue {
    tx: Sender<RawChunk>,
    rx: Receiver<RawChunk>,
    closed: AtomicBool,
}

impl ChunkQueue {
    /// Creates a queue holding at most `capacity` chunks.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            closed: AtomicBool::new(false),
        }
    }

    /// Marks the queue closed: the producer is done and no further chunks
    /// will arrive. Chunks already queued stay poppable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pushes a chunk, waiting up to `timeout` for space.
    ///
    /// On timeout the chunk is handed back so the caller can re-check the
    /// stop signal and retry without cloning the payload.
    pub fn push(&self, chunk: RawChunk, timeout: Duration) -> Result<(), RawChunk> {
        match self.tx.send_timeout(chunk, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(chunk)) | Err(SendTimeoutError::Disconnected(chunk)) => {
                Err(chunk)
            }
        }
    }

    /// Pops the oldest chunk, waiting up to `timeout` for one to arrive.
    pub fn pop(&self, timeout: Duration) -> Option<RawChunk> {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => Some(chunk),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
