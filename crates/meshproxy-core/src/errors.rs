//! Error type constants for metrics and logging.
//!
//! These constants provide consistent error classification across all crates.

/// Directory query failed or timed out.
pub const ERROR_DIRECTORY: &str = "directory";
/// Dialing a relay candidate failed.
pub const ERROR_DIAL: &str = "dial";
/// Wrapping a connection into a multiplexed session failed.
pub const ERROR_SESSION: &str = "session";
/// Opening a logical stream on the session failed.
pub const ERROR_STREAM_OPEN: &str = "stream_open";
/// Splice I/O error.
pub const ERROR_SPLICE: &str = "splice";
/// Accepting a local connection failed.
pub const ERROR_ACCEPT: &str = "accept";
