//! Configuration type definitions.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};

use crate::defaults::*;

/// Top-level configuration.
///
/// `Listener`, `NodeDialTimeout` and `PrivateKey` are required; all other
/// sections are optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Local listen address, e.g. "127.0.0.1:8080".
    pub listener: String,
    /// Timeout for dialing one relay candidate, in seconds. 0 disables it.
    pub node_dial_timeout: u16,
    /// Identity credential for the directory client.
    pub private_key: PrivateKey,
    /// Directory topic relay peers subscribe to.
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// TCP socket options for relay connections.
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Dial timeout for a single relay candidate, `None` when unbounded.
    pub fn dial_timeout(&self) -> Option<Duration> {
        match self.node_dial_timeout {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }
}

/// Private key string. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key material.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// SHA-224 hex digest of the key, safe to log.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha224::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Directory client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectoryConfig {
    /// JSON-RPC endpoint of a directory node.
    #[serde(default = "default_directory_rpc")]
    pub rpc: String,
    /// Upper bound for a single directory query in seconds.
    #[serde(default = "default_directory_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause before drawing a new bucket after one was exhausted.
    #[serde(default = "default_bucket_retry_delay_ms")]
    pub bucket_retry_delay_ms: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            rpc: default_directory_rpc(),
            timeout_secs: default_directory_timeout_secs(),
            bucket_retry_delay_ms: default_bucket_retry_delay_ms(),
        }
    }
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn bucket_retry_delay(&self) -> Duration {
        Duration::from_millis(self.bucket_retry_delay_ms)
    }
}

/// Multiplexed session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionConfig {
    /// Upper bound for opening one logical stream in seconds.
    #[serde(default = "default_stream_open_timeout_secs")]
    pub stream_open_timeout_secs: u64,
    /// Copy buffer size for each splice direction.
    #[serde(default = "default_splice_buffer_size")]
    pub buffer_size: usize,
    /// Concurrent streams per session. Opens past it fail on their own
    /// without disturbing the session.
    #[serde(default = "default_max_streams")]
    pub max_streams: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stream_open_timeout_secs: default_stream_open_timeout_secs(),
            buffer_size: default_splice_buffer_size(),
            max_streams: default_max_streams(),
        }
    }
}

impl SessionConfig {
    pub fn stream_open_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_open_timeout_secs)
    }
}

/// TCP socket configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TcpConfig {
    /// Disable Nagle's algorithm (TCP_NODELAY) for lower latency.
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
    /// TCP Keep-Alive interval in seconds (0 = disabled).
    #[serde(default = "default_tcp_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
            keepalive_secs: default_tcp_keepalive_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"meshproxy_client": "debug", "yamux": "warn"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct MetricsConfig {
    /// Prometheus exporter listen address. Disabled when absent.
    pub listen: Option<String>,
}
