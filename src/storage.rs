//! Object-storage sink interface and reference implementations.
//!
//! The pipeline only ever talks to the `StorageSink` trait: validate the
//! destination at startup, then `put` one named blob per chunk. Backend
//! failures are classified into a typed taxonomy so callers can branch on
//! kind instead of matching message text.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Errors reported by a storage backend.
///
/// Startup validation distinguishes the misconfiguration cases so the
/// operator gets an actionable cause. `UploadFailed` is the only variant a
/// healthy session should ever see, and it is isolated to a single chunk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage credentials not found; configure credentials for the storage backend")]
    CredentialsMissing,

    #[error("Bucket '{bucket}' does not exist")]
    BucketNotFound { bucket: String },

    #[error("Access denied to bucket '{bucket}'")]
    AccessDenied { bucket: String },

    #[error("Wrong region for bucket '{bucket}': bucket lives in '{actual}'")]
    RegionMismatch { bucket: String, actual: String },

    #[error("Upload of '{key}' failed: {message}")]
    UploadFailed { key: String, message: String },
}

/// Destination for encoded chunks.
///
/// Implementations must be safe to call from the uploader thread while the
/// rest of the session keeps running.
pub trait StorageSink: Send + Sync {
    /// Checks that the destination is reachable and writable.
    ///
    /// Called once before the session starts; any error here aborts the
    /// session before a single byte is captured.
    fn validate(&self) -> Result<(), StorageError>;

    /// Stores one blob under `key` with its content type and metadata.
    fn put(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError>;

    /// Human-readable destination for banners and logs.
    fn describe(&self) -> String;
}

/// One object captured by [`MemoryStorageSink`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// In-memory sink for tests and dry runs.
///
/// Can be told to fail specific puts (1-based, in call order) to exercise
/// per-chunk failure isolation.
#[derive(Default)]
pub struct MemoryStorageSink {
    objects: Mutex<Vec<StoredObject>>,
    failing_puts: Vec<u64>,
    puts_seen: Mutex<u64>,
}

impl MemoryStorageSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the nth call to `put` (1-based) fail with `UploadFailed`.
    pub fn with_failing_put(mut self, nth: u64) -> Self {
        self.failing_puts.push(nth);
        self
    }

    /// Returns a snapshot of everything stored so far, in put order.
    pub fn objects(&self) -> Vec<StoredObject> {
        match self.objects.lock() {
            Ok(objects) => objects.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns the keys stored so far, in put order.
    pub fn keys(&self) -> Vec<String> {
        self.objects().into_iter().map(|o| o.key).collect()
    }
}

impl StorageSink for MemoryStorageSink {
    fn validate(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn put(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError> {
        let nth = {
            let mut seen = match self.puts_seen.lock() {
                Ok(seen) => seen,
                Err(poisoned) => poisoned.into_inner(),
            };
            *seen += 1;
            *seen
        };

        if self.failing_puts.contains(&nth) {
            return Err(StorageError::UploadFailed {
                key: key.to_string(),
                message: format!("injected failure on put #{nth}"),
            });
        }

        let object = StoredObject {
            key: key.to_string(),
            body: body.to_vec(),
            content_type: content_type.to_string(),
            metadata: metadata.clone(),
        };
        match self.objects.lock() {
            Ok(mut objects) => objects.push(object),
            Err(poisoned) => poisoned.into_inner().push(object),
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

/// Filesystem-backed sink.
///
/// Stands in for a remote object store: a bucket is a directory under the
/// root, a key is a relative path, metadata goes to a TOML sidecar next to
/// the object. The bucket directory must already exist, mirroring the
/// existence check a remote backend performs at startup.
pub struct LocalFsStorageSink {
    root: PathBuf,
    bucket: String,
}

impl LocalFsStorageSink {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.bucket_dir().join(key)
    }
}

impl StorageSink for LocalFsStorageSink {
    fn validate(&self) -> Result<(), StorageError> {
        let dir = self.bucket_dir();
        if !dir.is_dir() {
            return Err(StorageError::BucketNotFound {
                bucket: self.bucket.clone(),
            });
        }

        // Probe writability so a permissions problem surfaces at startup,
        // not on the first chunk.
        let probe = dir.join(".aircap-write-probe");
        match fs::write(&probe, b"") {
            Ok(()) => {
                let _ = fs::remove_file(&probe);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(StorageError::AccessDenied {
                    bucket: self.bucket.clone(),
                })
            }
            Err(e) => Err(StorageError::UploadFailed {
                key: probe.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn put(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key);
        let upload_err = |message: String| StorageError::UploadFailed {
            key: key.to_string(),
            message,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| upload_err(e.to_string()))?;
        }
        fs::write(&path, body).map_err(|e| upload_err(e.to_string()))?;

        let mut sidecar = metadata.clone();
        sidecar.insert("content_type".to_string(), content_type.to_string());
        let rendered = toml::to_string(&sidecar).map_err(|e| upload_err(e.to_string()))?;
        let meta_path = path.with_extension("meta.toml");
        fs::write(&meta_path, rendered).map_err(|e| upload_err(e.to_string()))?;

        Ok(())
    }

    fn describe(&self) -> String {
        format!("file://{}/{}", self.root.display(), self.bucket)
    }
}
