//! HTTP fetcher with gzip auto-detection
//! Downloads playlist/EPG payloads, inflates gzip when the magic bytes match,
//! and optionally persists the decoded text as a mirror artifact.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use log::{info, warn};
use url::Url;

use crate::config::DownloadConfig;
use crate::error::{Error, Result};

/// Gzip stream magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub struct Fetcher {
    agent: ureq::Agent,
    config: DownloadConfig,
}

impl Fetcher {
    pub fn new(config: DownloadConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.read_timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(config.connect_timeout_secs)))
            .http_status_as_error(false)
            .max_idle_connections(4)
            .max_idle_connections_per_host(2)
            .build()
            .new_agent();

        Self { agent, config }
    }

    /// Fetch a URL and return the decoded UTF-8 text.
    /// Gzip payloads are detected by magic bytes and inflated transparently.
    pub fn fetch(&self, url: &str) -> Result<String> {
        validate_url(url)?;

        let response = self
            .agent
            .get(url)
            .header("User-Agent", &self.config.user_agent)
            .call()
            .map_err(|e| Error::Request {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FetchFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut payload = Vec::new();
        response
            .into_body()
            .into_reader()
            .read_to_end(&mut payload)?;

        decode_payload(&payload)
    }

    /// Fetch a URL and persist the decoded text to `path`.
    pub fn fetch_to_file(&self, url: &str, path: &Path) -> Result<String> {
        let text = self.fetch(url)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &text)?;
        info!("Saved {}", path.display());
        Ok(text)
    }

    /// Fetch with retry: each failed attempt is logged and the next one
    /// tried after a delay. The last error is returned once attempts are
    /// exhausted; callers in the batch path record it instead of aborting
    /// sibling downloads.
    pub fn fetch_to_file_with_retry(&self, url: &str, path: &Path) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_to_file(url, path) {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, self.config.max_retries, url, e
                    );
                    if attempt >= self.config.max_retries {
                        return Err(e);
                    }
                    std::thread::sleep(Duration::from_millis(self.config.retry_delay_ms));
                }
            }
        }
    }
}

/// Reject URLs without an http/https scheme or a host.
fn validate_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
    let scheme_ok = matches!(parsed.scheme(), "http" | "https");
    if scheme_ok && parsed.has_host() {
        Ok(())
    } else {
        Err(Error::InvalidUrl(url.to_string()))
    }
}

/// Decode a raw payload: inflate when it starts with the gzip magic bytes,
/// otherwise treat it as plain UTF-8.
fn decode_payload(payload: &[u8]) -> Result<String> {
    if payload.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(payload)
            .read_to_end(&mut inflated)
            .map_err(Error::Decompress)?;
        Ok(String::from_utf8(inflated)?)
    } else {
        Ok(String::from_utf8(payload.to_vec())?)
    }
}
