//! Error types for Driftwatch Core.

use thiserror::Error;

/// Fatal errors of a drift run.
///
/// Anything that reaches the caller as a `DriftError` ends the run as
/// failed. Per-target fetch problems never surface here; they are logged
/// and the target is skipped.
#[derive(Debug, Error)]
pub enum DriftError {
    /// The configuration file is missing, unreadable or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Loading, writing or staging the baseline failed.
    #[error("Baseline error: {0}")]
    Baseline(#[from] driftwatch_schema::SchemaError),

    /// A collaborator could not be constructed.
    #[error("Fetch setup error: {0}")]
    Fetch(#[from] FetchError),

    /// Report delivery setup failed (webhook client, alert cache).
    #[error("Notify error: {0}")]
    Notify(#[from] driftwatch_notify::NotifyError),

    /// Filesystem error outside the baseline store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single target could not be observed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout or protocol failure before a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The response body is not JSON.
    #[error("invalid response body: {0}")]
    InvalidBody(String),

    /// The request could not be built (bad method, header or URL).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Summarization failures. Always recovered by the local fallback.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// The summarization endpoint could not be reached.
    #[error("summarizer unavailable: {0}")]
    Unavailable(String),

    /// The endpoint answered with a non-success status.
    #[error("summarizer answered with status {0}")]
    Status(u16),

    /// The endpoint answered with something that is not a summary.
    #[error("invalid summary: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for SummaryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Unavailable(e.to_string())
        }
    }
}
