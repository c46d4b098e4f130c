//! Configuration: TOML file, environment overrides, and the resolved
//! per-session settings the pipeline actually runs with.

use crate::defaults;
use crate::error::{AircapError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub storage: StorageConfig,
}

/// Stream capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    pub url: String,
    pub chunk_duration_secs: u64,
}

/// Storage destination configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Local root directory for the filesystem sink. `None` means the
    /// platform data directory.
    pub root: Option<PathBuf>,
    pub bucket: String,
    pub prefix: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: defaults::STREAM_URL.to_string(),
            chunk_duration_secs: defaults::CHUNK_DURATION_SECS,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            bucket: defaults::BUCKET.to_string(),
            prefix: defaults::KEY_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields use default values; invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AircapError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                AircapError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from a file, falling back to defaults only when the file does
    /// not exist. Invalid TOML still fails.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(AircapError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - AIRCAP_STREAM_URL → stream.url
    /// - S3_BUCKET_NAME → storage.bucket
    /// - AIRCAP_PREFIX → storage.prefix
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("AIRCAP_STREAM_URL")
            && !url.is_empty()
        {
            self.stream.url = url;
        }

        if let Ok(bucket) = std::env::var("S3_BUCKET_NAME")
            && !bucket.is_empty()
        {
            self.storage.bucket = bucket;
        }

        if let Ok(prefix) = std::env::var("AIRCAP_PREFIX")
            && !prefix.is_empty()
        {
            self.storage.prefix = prefix;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/aircap/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("aircap").join("config.toml"))
            .ok_or_else(|| AircapError::Other("could not determine config directory".to_string()))
    }
}

/// Settings for one recording session, resolved from config plus CLI
/// overrides and validated once up front.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub stream_url: String,
    pub chunk_duration: Duration,
    pub bucket: String,
    /// Normalized: empty, or ends in exactly one `/` with no leading `/`.
    pub key_prefix: String,
    /// Overall session length; `None` records until interrupted.
    pub total_duration: Option<Duration>,
}

impl SessionConfig {
    /// Builds a validated session config. Rejects an empty URL or bucket
    /// and a zero chunk duration; normalizes the key prefix.
    pub fn resolve(
        stream_url: String,
        chunk_duration: Duration,
        bucket: String,
        prefix: &str,
        total_duration: Option<Duration>,
    ) -> Result<Self> {
        if stream_url.is_empty() {
            return Err(AircapError::ConfigInvalidValue {
                key: "stream.url".to_string(),
                message: "stream URL must not be empty".to_string(),
            });
        }
        if chunk_duration.is_zero() {
            return Err(AircapError::ConfigInvalidValue {
                key: "stream.chunk_duration_secs".to_string(),
                message: "chunk duration must be positive".to_string(),
            });
        }
        if bucket.is_empty() {
            return Err(AircapError::ConfigInvalidValue {
                key: "storage.bucket".to_string(),
                message: "bucket must not be empty".to_string(),
            });
        }
        if let Some(total) = total_duration
            && total.is_zero()
        {
            return Err(AircapError::ConfigInvalidValue {
                key: "duration".to_string(),
                message: "session duration must be positive".to_string(),
            });
        }

        Ok(Self {
            stream_url,
            chunk_duration,
            bucket,
            key_prefix: normalize_prefix(prefix),
            total_duration,
        })
    }
}

/// Empty stays empty; anything else loses leading slashes and gains
/// exactly one trailing slash.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}
