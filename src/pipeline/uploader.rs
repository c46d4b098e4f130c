//! Chunk uploader: drains the queue, normalizes audio, stores objects.

use crate::config::SessionConfig;
use crate::defaults;
use crate::pipeline::queue::ChunkQueue;
use crate::pipeline::types::{RawChunk, UploadOutcome, UploadRecord};
use crate::storage::StorageSink;
use crate::transcode::AudioTranscoder;
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Builds the deterministic object key for a chunk.
///
/// Same sequence number and same second-resolution timestamp always yield
/// the same key; the zero-padded sequence number keeps two chunks processed
/// within one second from colliding.
pub fn object_key(prefix: &str, sequence: u64, timestamp: DateTime<Utc>) -> String {
    format!(
        "{prefix}live_stream_chunk_{sequence:03}_{}.wav",
        timestamp.format("%Y%m%d_%H%M%S")
    )
}

/// Consumer side of the pipeline.
///
/// Loops until the queue is closed and empty, so nothing the producer
/// handed off is ever abandoned: a chunk pushed in the producer's final
/// moments is still drained. Each chunk gets exactly one upload attempt;
/// failures are recorded and the loop moves on.
pub struct ChunkUploader {
    queue: Arc<ChunkQueue>,
    transcoder: Arc<dyn AudioTranscoder>,
    sink: Arc<dyn StorageSink>,
    session: SessionConfig,
    records_tx: Sender<UploadRecord>,
    pop_timeout: Duration,
    next_sequence: u64,
    quiet: bool,
}

impl ChunkUploader {
    pub fn new(
        queue: Arc<ChunkQueue>,
        transcoder: Arc<dyn AudioTranscoder>,
        sink: Arc<dyn StorageSink>,
        session: SessionConfig,
        records_tx: Sender<UploadRecord>,
    ) -> Self {
        Self {
            queue,
            transcoder,
            sink,
            session,
            records_tx,
            pop_timeout: Duration::from_millis(defaults::POP_TIMEOUT_MS),
            next_sequence: 1,
            quiet: false,
        }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Drain loop. The pop timeout bounds how stale the close check can be.
    pub fn run(mut self) {
        while !(self.queue.is_closed() && self.queue.is_empty()) {
            let Some(chunk) = self.queue.pop(self.pop_timeout) else {
                continue;
            };

            let sequence = self.next_sequence;
            self.next_sequence += 1;

            let record = self.process(chunk, sequence);
            if !self.quiet {
                match &record.outcome {
                    UploadOutcome::Succeeded => {
                        let mb = record.encoded_bytes as f64 / (1024.0 * 1024.0);
                        println!("Uploaded {} ({mb:.2} MB)", record.key);
                    }
                    UploadOutcome::Failed { reason } => {
                        eprintln!("aircap: chunk {sequence} failed: {reason}");
                    }
                }
            }
            // The receiver outlives the uploader; a send failure only means
            // the session report was abandoned, which is not ours to handle.
            let _ = self.records_tx.send(record);
        }
    }

    /// One upload attempt: key, transcode, put. Never propagates; the
    /// outcome lands in the record either way.
    fn process(&self, chunk: RawChunk, sequence: u64) -> UploadRecord {
        let timestamp = Utc::now();
        let key = object_key(&self.session.key_prefix, sequence, timestamp);
        let raw_bytes = chunk.len();

        let fail = |reason: String, encoded_bytes: usize| UploadRecord {
            sequence,
            key: key.clone(),
            raw_bytes,
            encoded_bytes,
            outcome: UploadOutcome::Failed { reason },
            completed_at: SystemTime::now(),
        };

        let encoded = match self.transcoder.transcode(&chunk.data) {
            Ok(encoded) => encoded,
            Err(e) => return fail(e.to_string(), 0),
        };

        let metadata = self.metadata(sequence, &timestamp);
        if let Err(e) = self.sink.put(
            &key,
            &encoded,
            defaults::CONTENT_TYPE_WAV,
            &metadata,
        ) {
            return fail(e.to_string(), encoded.len());
        }

        UploadRecord {
            sequence,
            key,
            raw_bytes,
            encoded_bytes: encoded.len(),
            outcome: UploadOutcome::Succeeded,
            completed_at: SystemTime::now(),
        }
    }

    fn metadata(&self, sequence: u64, timestamp: &DateTime<Utc>) -> HashMap<String, String> {
        HashMap::from([
            ("source".to_string(), defaults::SOURCE_NAME.to_string()),
            ("stream_url".to_string(), self.session.stream_url.clone()),
            ("chunk_number".to_string(), sequence.to_string()),
            (
                "chunk_duration_sec".to_string(),
                self.session.chunk_duration.as_secs().to_string(),
            ),
            (
                "ingest_ts_utc".to_string(),
                timestamp.format("%Y%m%d_%H%M%S").to_string(),
            ),
        ])
    }
}
