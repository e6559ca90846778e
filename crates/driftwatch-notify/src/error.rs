//! Error types for report delivery and the alert cache.

use thiserror::Error;

/// Result type alias for notify operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors that can occur while delivering a report.
///
/// Delivery errors are never fatal to a drift run; callers log them and
/// move on to the next sink.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The HTTP request to a sink failed before a response arrived.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A sink answered with a non-success status.
    #[error("sink {sink} answered with status {status}")]
    Status {
        /// Name of the sink
        sink: String,
        /// HTTP status code returned
        status: u16,
    },

    /// The alert cache database failed.
    #[error("alert cache error: {0}")]
    Cache(#[from] sled::Error),

    /// A cache entry did not hold a timestamp.
    #[error("corrupt alert cache entry for key {0}")]
    CorruptEntry(String),
}
