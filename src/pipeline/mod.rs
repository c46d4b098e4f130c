//! Capture pipeline for live stream ingestion.
//!
//! A producer thread reads the stream and slices it into time-bounded
//! chunks; a bounded crossbeam channel hands them to an uploader thread
//! that transcodes and stores each one. Backpressure propagates from the
//! uploader to the producer through the channel capacity.

pub mod boundary;
pub mod producer;
pub mod queue;
pub mod types;
pub mod uploader;

pub use boundary::{BoundaryConfig, ChunkBoundaryDetector};
pub use producer::StreamProducer;
pub use queue::ChunkQueue;
pub use types::{RawChunk, UploadOutcome, UploadRecord};
pub use uploader::{ChunkUploader, object_key};
