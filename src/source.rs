//! Byte sources for the stream producer.
//!
//! The producer reads from the `ByteSource` trait so tests can script
//! synthetic streams; `HttpByteSource` is the real thing, a blocking
//! streaming GET against the configured broadcast URL.

use crate::defaults;
use crate::error::{AircapError, Result};
use std::io::Read;
use std::time::Duration;

/// A connectable, continuously readable byte stream.
pub trait ByteSource: Send {
    /// Opens the stream. Must be called before `read_bytes`.
    fn connect(&mut self) -> Result<()>;

    /// Reads available bytes into `buf`, blocking until some arrive.
    ///
    /// Returns the number of bytes read; 0 means the stream ended.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Source location for banners and error messages.
    fn describe(&self) -> String;
}

/// Live HTTP stream source.
///
/// Keep-alive, a bounded connect timeout, and a permissive accept header:
/// broadcast relays rarely negotiate content types.
pub struct HttpByteSource {
    url: String,
    response: Option<reqwest::blocking::Response>,
}

impl HttpByteSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            response: None,
        }
    }
}

impl ByteSource for HttpByteSource {
    fn connect(&mut self) -> Result<()> {
        let connect_err = |message: String| AircapError::StreamConnect {
            url: self.url.clone(),
            message,
        };

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(defaults::CONNECT_TIMEOUT_SECS))
            // The default total-request timeout would cut a live stream off.
            // Liveness comes from TCP keepalive; a dead connection surfaces
            // as a read error and ends the capture.
            .timeout(None)
            .tcp_keepalive(Duration::from_secs(defaults::CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| connect_err(e.to_string()))?;

        let response = client
            .get(&self.url)
            .header("User-Agent", "Mozilla/5.0")
            .header("Accept", "audio/*;q=0.9,*/*;q=0.5")
            .header("Connection", "keep-alive")
            .send()
            .map_err(|e| connect_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| connect_err(e.to_string()))?;

        self.response = Some(response);
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let response = self
            .response
            .as_mut()
            .ok_or_else(|| AircapError::StreamRead {
                message: "read before connect".to_string(),
            })?;
        response.read(buf).map_err(|e| AircapError::StreamRead {
            message: e.to_string(),
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
