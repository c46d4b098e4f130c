//! aircap - live audio stream capture into chunked WAV objects
//!
//! Connects to a broadcast HTTP stream, slices it into fixed-duration
//! chunks, normalizes each chunk to mono 16 kHz PCM WAV, and uploads it
//! to an object store with sequence and timing metadata.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod app;
pub mod cli;
pub mod clock;
pub mod config;
pub mod controller;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod transcode;

// Core seams (source → transcode → sink)
pub use source::{ByteSource, HttpByteSource};
pub use storage::{LocalFsStorageSink, MemoryStorageSink, StorageError, StorageSink};
pub use transcode::{AudioTranscoder, SymphoniaTranscoder, TranscodeError};

// Session lifecycle
pub use controller::{
    RecordingController, RecordingHandle, RecordingState, SessionReport, StateView,
};

// Error handling
pub use error::{AircapError, Result};

// Config
pub use config::{Config, SessionConfig};
