//! Command-line interface for aircap
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Live audio stream capture and object-storage ingestion
#[derive(Parser, Debug)]
#[command(name = "aircap", version, about = "Capture a live audio stream into chunked WAV objects")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: per-chunk detail, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Stream URL to capture
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Destination bucket name
    #[arg(long, value_name = "BUCKET")]
    pub bucket: Option<String>,

    /// Object key prefix (e.g., uploads/rawaudio)
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Chunk duration in seconds
    #[arg(long, short = 'c', value_name = "SECONDS")]
    pub chunk_duration: Option<u64>,

    /// Stop after this long (default: record until Ctrl-C). Examples: 90s, 5m, 1h30m
    #[arg(long, short = 'd', value_name = "DURATION", value_parser = parse_session_duration)]
    pub duration: Option<Duration>,
}

/// Parse a session duration string.
///
/// Supports any format accepted by `humantime`: single-unit (`90s`, `5m`,
/// `2h`) and compound (`1h30m`). A bare number is minutes.
fn parse_session_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(minutes) = s.parse::<u64>() {
        return Ok(Duration::from_secs(minutes * 60));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and storage destination, then exit
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_number_duration_is_minutes() {
        assert_eq!(
            parse_session_duration("5").unwrap(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn humantime_durations_parse() {
        assert_eq!(
            parse_session_duration("90s").unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(
            parse_session_duration("1h30m").unwrap(),
            Duration::from_secs(5400)
        );
        assert!(parse_session_duration("soon").is_err());
    }

    #[test]
    fn overrides_parse_from_argv() {
        let cli = Cli::parse_from([
            "aircap",
            "--url",
            "http://radio.example/feed",
            "--bucket",
            "archive",
            "--chunk-duration",
            "15",
            "--duration",
            "2m",
        ]);
        assert_eq!(cli.url.as_deref(), Some("http://radio.example/feed"));
        assert_eq!(cli.bucket.as_deref(), Some("archive"));
        assert_eq!(cli.chunk_duration, Some(15));
        assert_eq!(cli.duration, Some(Duration::from_secs(120)));
        assert!(cli.command.is_none());
    }
}
