//! Structured error types for discovery, download, and storage operations.
//!
//! A 404 from the archive endpoint is deliberately *not* an error — it is the
//! end-of-data signal for a month walk and is modeled as
//! [`crate::archive::DownloadOutcome::NotFound`].

use thiserror::Error;

/// Errors produced by the fetch pipeline.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("unexpected HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("response format changed: {0}")]
    ResponseFormat(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
