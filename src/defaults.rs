//! Default configuration constants for aircap.
//!
//! Shared across the config surface and the pipeline so tuning values live
//! in one place.

/// Default live stream URL (LiveATC, NY Center Sector 9).
pub const STREAM_URL: &str = "http://d.liveatc.net/zbw_ron4";

/// Default target chunk duration in seconds.
///
/// 30 seconds gives segments long enough for downstream speech processing
/// while keeping the per-chunk upload payload small.
pub const CHUNK_DURATION_SECS: u64 = 30;

/// Minimum accumulated bytes for a chunk to be worth keeping.
///
/// A time window that elapses with fewer bytes than this (stream stall,
/// reconnect gap) is discarded rather than uploaded as a near-empty object.
pub const MIN_CHUNK_BYTES: usize = 1000;

/// Read increment for the stream producer, in bytes.
pub const READ_BUFFER_BYTES: usize = 8192;

/// Capacity of the producer/uploader hand-off queue, in chunks.
///
/// Bounds peak memory to a small multiple of the chunk size. When the queue
/// is full the producer blocks (backpressure) instead of dropping data.
pub const QUEUE_CAPACITY: usize = 8;

/// How long a single queue push waits before re-checking the stop signal.
pub const PUSH_WAIT_MS: u64 = 250;

/// How long the uploader waits on an empty queue before re-checking the
/// stop condition.
pub const POP_TIMEOUT_MS: u64 = 1000;

/// Bounded wait for each pipeline thread to finish at shutdown, in seconds.
///
/// After the window the controller proceeds to `Stopped` and reports the
/// straggler instead of hanging.
pub const JOIN_WINDOW_SECS: u64 = 5;

/// HTTP connect timeout for the stream source, in seconds. Also the TCP
/// keepalive interval once connected.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default destination bucket.
pub const BUCKET: &str = "raw.atc.audio";

/// Default object key prefix (normalized to end with one separator).
pub const KEY_PREFIX: &str = "uploads/rawaudio";

/// Metadata value identifying the capture source.
pub const SOURCE_NAME: &str = "liveatc";

/// Sample rate of normalized storage audio, in Hz.
///
/// 16kHz mono 16-bit PCM is the standard input format for speech pipelines.
pub const WAV_SAMPLE_RATE: u32 = 16000;

/// Content type of stored objects.
pub const CONTENT_TYPE_WAV: &str = "audio/wav";

/// Wire codec of the live stream.
pub const SOURCE_FORMAT: &str = "mp3";
