//! Directory error types.

use std::time::Duration;

/// Errors from directory lookups.
///
/// Every variant means the directory could not answer; callers treat them
/// alike and fail the current acquisition attempt.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The directory refused or could not serve the query.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The query did not finish in time.
    #[error("directory query timed out after {0:?}")]
    Timeout(Duration),

    /// The directory answered with a JSON-RPC error object.
    #[error("directory rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Transport-level HTTP failure.
    #[error("directory http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response could not be decoded.
    #[error("invalid directory response: {0}")]
    InvalidResponse(String),
}
