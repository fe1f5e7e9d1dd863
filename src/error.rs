//! Error types shared across the sync pipeline.

use std::io;
use thiserror::Error;

/// Result type for epg-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// URL is missing a scheme or host, or is not http/https.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Transport-level failure before a status line was received.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: Box<ureq::Error>,
    },

    /// Server answered with a non-success status.
    #[error("fetching {url} returned HTTP {status}")]
    FetchFailed { url: String, status: u16 },

    /// Payload carried the gzip magic bytes but did not inflate.
    #[error("gzip decompression failed: {0}")]
    Decompress(io::Error),

    /// Payload is not valid UTF-8.
    #[error("response is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// Malformed XML in an EPG source.
    #[error("XML parse error at byte {position}: {source}")]
    Parse {
        position: u64,
        source: quick_xml::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A git subcommand exited non-zero.
    #[error("git {command} failed: {detail}")]
    Git { command: String, detail: String },
}
