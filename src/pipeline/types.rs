//! Data types flowing through the ingestion pipeline.

use std::time::SystemTime;

/// One time-boxed slice of the live stream.
///
/// Created by the producer when the boundary detector closes a window,
/// handed to the uploader through the queue, and dropped after its one
/// upload attempt. Never re-queued.
#[derive(Debug)]
pub struct RawChunk {
    /// Captured wire-format bytes.
    pub data: Vec<u8>,
    /// Wall-clock time at which slicing of this chunk began.
    pub captured_at: SystemTime,
}

impl RawChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Terminal result of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Succeeded,
    Failed { reason: String },
}

/// Record of one processed chunk, success or failure.
///
/// Every chunk the uploader dequeues produces exactly one of these; the
/// session report is their concatenation in sequence order.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    /// Sequence number assigned in dequeue order, starting at 1.
    pub sequence: u64,
    /// Object key the chunk was (or would have been) stored under.
    pub key: String,
    /// Size of the captured wire-format payload.
    pub raw_bytes: usize,
    /// Size of the encoded WAV payload; zero when transcoding failed.
    pub encoded_bytes: usize,
    pub outcome: UploadOutcome,
    pub completed_at: SystemTime,
}

impl UploadRecord {
    pub fn succeeded(&self) -> bool {
        self.outcome == UploadOutcome::Succeeded
    }
}
