//! Application entry point.
//!
//! Wires configuration, the HTTP source, the transcoder, and the storage
//! sink into a recording session, then waits for Ctrl-C or the session
//! timer before driving the drain-and-stop sequence.

use crate::config::{Config, SessionConfig};
use crate::controller::RecordingController;
use crate::defaults;
use crate::error::Result;
use crate::source::HttpByteSource;
use crate::storage::{LocalFsStorageSink, StorageSink};
use crate::transcode::SymphoniaTranscoder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// CLI overrides applied on top of the loaded configuration.
#[derive(Debug, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub chunk_duration_secs: Option<u64>,
    pub duration: Option<Duration>,
}

/// Resolve the session settings from config plus CLI overrides.
pub fn resolve_session(config: &Config, overrides: &Overrides) -> Result<SessionConfig> {
    let chunk_secs = overrides
        .chunk_duration_secs
        .unwrap_or(config.stream.chunk_duration_secs);

    SessionConfig::resolve(
        overrides
            .url
            .clone()
            .unwrap_or_else(|| config.stream.url.clone()),
        Duration::from_secs(chunk_secs),
        overrides
            .bucket
            .clone()
            .unwrap_or_else(|| config.storage.bucket.clone()),
        overrides
            .prefix
            .as_deref()
            .unwrap_or(config.storage.prefix.as_str()),
        overrides.duration,
    )
}

fn storage_root(config: &Config) -> Result<PathBuf> {
    match &config.storage.root {
        Some(root) => Ok(root.clone()),
        None => dirs::data_dir()
            .map(|dir| dir.join("aircap"))
            .ok_or_else(|| {
                crate::error::AircapError::Other("could not determine data directory".to_string())
            }),
    }
}

/// Run the record command: connect → chunk → transcode → store, until
/// Ctrl-C or the session duration elapses.
pub async fn run_record_command(
    config: Config,
    overrides: Overrides,
    quiet: bool,
    verbosity: u8,
) -> Result<()> {
    let session = resolve_session(&config, &overrides)?;

    let root = storage_root(&config)?;
    // The local sink mirrors a remote store's "bucket must exist" check;
    // for a filesystem destination we create it up front instead.
    std::fs::create_dir_all(root.join(&session.bucket))?;
    let sink: Arc<dyn StorageSink> = Arc::new(LocalFsStorageSink::new(root, &session.bucket));

    if !quiet {
        print_banner(&session, sink.as_ref(), verbosity);
    }

    let source = Box::new(HttpByteSource::new(session.stream_url.clone()));
    let transcoder = Arc::new(SymphoniaTranscoder::new(defaults::SOURCE_FORMAT));

    let total_duration = session.total_duration;
    let handle = RecordingController::new(session)
        .quiet(quiet)
        .start(source, transcoder, sink)?;

    wait_for_stop_signal(total_duration, quiet).await;

    if !quiet {
        println!("Stopping; draining queued chunks...");
    }
    let report = handle.stop();

    if !quiet {
        print_summary(&report);
    }
    Ok(())
}

/// Run the check command: validate configuration and the storage
/// destination without capturing anything.
pub fn run_check_command(config: Config, overrides: Overrides) -> Result<()> {
    let session = resolve_session(&config, &overrides)?;
    let root = storage_root(&config)?;
    let sink = LocalFsStorageSink::new(root, &session.bucket);

    println!("Stream URL:     {}", session.stream_url);
    println!("Chunk duration: {}s", session.chunk_duration.as_secs());
    println!("Destination:    {}", sink.describe());

    match sink.validate() {
        Ok(()) => {
            println!("Storage check:  ok");
            Ok(())
        }
        Err(e) => {
            println!("Storage check:  {e}");
            Err(e.into())
        }
    }
}

async fn wait_for_stop_signal(total_duration: Option<Duration>, quiet: bool) {
    let timer = async {
        match total_duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            if !quiet {
                println!();
            }
        }
        _ = timer => {
            if !quiet {
                println!("Session duration reached.");
            }
        }
    }
}

fn print_banner(session: &SessionConfig, sink: &dyn StorageSink, verbosity: u8) {
    println!("Capturing {}", session.stream_url);
    println!(
        "Chunks: {}s -> {}",
        session.chunk_duration.as_secs(),
        sink.describe()
    );
    if verbosity >= 1 {
        println!("Key prefix: {:?}", session.key_prefix);
        match session.total_duration {
            Some(d) => println!("Session length: {}s", d.as_secs()),
            None => println!("Session length: until Ctrl-C"),
        }
    }
    println!("Press Ctrl-C to stop.");
}

fn print_summary(report: &crate::controller::SessionReport) {
    let elapsed = report
        .stopped_at
        .duration_since(report.started_at)
        .unwrap_or_default();
    println!(
        "Session over after {}s: {} uploaded, {} failed",
        elapsed.as_secs(),
        report.uploaded(),
        report.failed()
    );
    for record in report.records.iter().filter(|r| !r.succeeded()) {
        if let crate::pipeline::types::UploadOutcome::Failed { reason } = &record.outcome {
            println!("  chunk {} ({}): {reason}", record.sequence, record.key);
        }
    }
    if !report.clean_shutdown {
        println!("Warning: a pipeline thread missed its shutdown window.");
    }
}
