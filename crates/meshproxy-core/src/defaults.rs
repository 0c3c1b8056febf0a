//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Directory Defaults
// ============================================================================

/// Topic under which relay peers advertise themselves.
pub const DEFAULT_TOPIC: &str = "proxyhttp";
/// Directory JSON-RPC endpoint.
pub const DEFAULT_DIRECTORY_RPC: &str = "http://mainnet-seed-0001.nkn.org:30003";
/// Upper bound for a single directory query in seconds.
pub const DEFAULT_DIRECTORY_TIMEOUT_SECS: u64 = 10;
/// Pause before drawing a new bucket after one was exhausted (ms).
pub const DEFAULT_BUCKET_RETRY_DELAY_MS: u64 = 250;

// ============================================================================
// Session Defaults
// ============================================================================

/// Upper bound for opening one logical stream in seconds.
pub const DEFAULT_STREAM_OPEN_TIMEOUT_SECS: u64 = 10;
/// Default splice buffer size (32 KiB).
pub const DEFAULT_SPLICE_BUFFER_SIZE: usize = 32768;
/// Smallest accepted splice buffer size.
pub const MIN_SPLICE_BUFFER_SIZE: usize = 1024;
/// Largest accepted splice buffer size (1 MiB).
pub const MAX_SPLICE_BUFFER_SIZE: usize = 1024 * 1024;
/// Concurrent logical streams one session carries before refusing opens.
pub const DEFAULT_MAX_STREAMS: usize = 4096;
/// Largest accepted per-session stream limit.
pub const MAX_MAX_STREAMS: usize = 1 << 20;

// ============================================================================
// TCP Socket Defaults
// ============================================================================

/// Default TCP_NODELAY (disable Nagle's algorithm for lower latency).
pub const DEFAULT_TCP_NO_DELAY: bool = true;
/// Default TCP Keep-Alive interval in seconds (0 = disabled).
pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 300;

// ============================================================================
// Process Defaults
// ============================================================================

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
