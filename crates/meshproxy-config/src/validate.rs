//! Configuration validation logic.

use std::net::SocketAddr;

use crate::Config;
use crate::defaults::{max_max_streams, max_splice_buffer_size, min_splice_buffer_size};
use crate::loader::ConfigError;

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.listener.trim().is_empty() {
        return Err(ConfigError::Validation("Listener is empty".into()));
    }
    if !config.listener.contains(':') {
        return Err(ConfigError::Validation(format!(
            "Listener must be host:port, got {:?}",
            config.listener
        )));
    }
    if config.private_key.is_empty() {
        return Err(ConfigError::Validation("PrivateKey is empty".into()));
    }
    if config.topic.trim().is_empty() {
        return Err(ConfigError::Validation("Topic is empty".into()));
    }
    let rpc = config.directory.rpc.as_str();
    if !(rpc.starts_with("http://") || rpc.starts_with("https://")) {
        return Err(ConfigError::Validation(
            "Directory.Rpc must be an http:// or https:// URL".into(),
        ));
    }
    if config.directory.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "Directory.TimeoutSecs must be > 0".into(),
        ));
    }
    if config.session.stream_open_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "Session.StreamOpenTimeoutSecs must be > 0".into(),
        ));
    }
    if config.session.buffer_size < min_splice_buffer_size() {
        return Err(ConfigError::Validation(format!(
            "Session.BufferSize must be >= {}",
            min_splice_buffer_size()
        )));
    }
    if config.session.buffer_size > max_splice_buffer_size() {
        return Err(ConfigError::Validation(format!(
            "Session.BufferSize must be <= {}",
            max_splice_buffer_size()
        )));
    }
    if config.session.max_streams == 0 || config.session.max_streams > max_max_streams() {
        return Err(ConfigError::Validation(format!(
            "Session.MaxStreams must be between 1 and {}",
            max_max_streams()
        )));
    }
    if let Some(listen) = &config.metrics.listen
        && listen.parse::<SocketAddr>().is_err()
    {
        return Err(ConfigError::Validation(format!(
            "Metrics.Listen must be an ip:port socket address, got {listen:?}"
        )));
    }
    if let Some(format) = config.logging.format.as_deref()
        && !matches!(format, "json" | "pretty" | "compact")
    {
        return Err(ConfigError::Validation(
            "Logging.Format must be one of: json, pretty, compact".into(),
        ));
    }
    Ok(())
}
