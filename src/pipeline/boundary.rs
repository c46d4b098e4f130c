//! Chunk boundary detection for the continuous byte stream.
//!
//! Accumulates incoming bytes and closes a chunk when the configured time
//! window has elapsed, provided enough data arrived to be worth keeping.
//! A window that elapses with too few bytes (stream stall) is discarded and
//! the timer resets, so memory stays bounded during outages.

use crate::clock::Clock;
use crate::defaults;
use crate::pipeline::types::RawChunk;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Configuration for the boundary detector.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryConfig {
    /// Target duration of one chunk.
    pub chunk_duration: Duration,
    /// Minimum accumulated size for an elapsed window to emit a chunk.
    pub min_chunk_bytes: usize,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_secs(defaults::CHUNK_DURATION_SECS),
            min_chunk_bytes: defaults::MIN_CHUNK_BYTES,
        }
    }
}

/// Slices a continuous byte stream into time-boxed chunks.
///
/// No byte is ever duplicated across chunks and no chunk is ever split:
/// `feed` either keeps everything buffered or hands the whole buffer out.
pub struct ChunkBoundaryDetector {
    config: BoundaryConfig,
    clock: Arc<dyn Clock>,
    buffer: Vec<u8>,
    /// Monotonic instant at which the buffer was last emptied.
    window_start: std::time::Instant,
    /// Wall-clock time slicing of the current chunk began.
    window_wall_start: SystemTime,
}

impl ChunkBoundaryDetector {
    pub fn new(config: BoundaryConfig, clock: Arc<dyn Clock>) -> Self {
        let window_start = clock.now();
        Self {
            config,
            clock,
            buffer: Vec::new(),
            window_start,
            window_wall_start: SystemTime::now(),
        }
    }

    /// Appends incoming bytes and returns a completed chunk if the current
    /// window just closed.
    pub fn feed(&mut self, bytes: &[u8]) -> Option<RawChunk> {
        self.buffer.extend_from_slice(bytes);

        let elapsed = self.clock.now().duration_since(self.window_start);
        if elapsed < self.config.chunk_duration {
            return None;
        }

        if self.buffer.len() <= self.config.min_chunk_bytes {
            // Undersized window: drop it and start fresh. Deliberate policy,
            // not an error; see module docs.
            self.buffer.clear();
            self.reset_window();
            return None;
        }

        let chunk = RawChunk {
            data: std::mem::take(&mut self.buffer),
            captured_at: self.window_wall_start,
        };
        self.reset_window();
        Some(chunk)
    }

    /// Discards whatever is buffered, returning the dropped byte count.
    ///
    /// Called at shutdown: a partial window below the chunk-ready condition
    /// is never flushed.
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.reset_window();
        dropped
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn reset_window(&mut self) {
        self.window_start = self.clock.now();
        self.window_wall_start = SystemTime::now();
    }
}
