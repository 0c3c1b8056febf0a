//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;
use crate::types::PrivateKey;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override local listen address, e.g. 127.0.0.1:8080
    #[arg(short, long)]
    pub listen: Option<String>,
    /// Override node dial timeout (seconds)
    #[arg(long)]
    pub node_dial_timeout: Option<u16>,
    /// Override private key
    #[arg(long)]
    pub private_key: Option<String>,
    /// Override directory topic
    #[arg(long)]
    pub topic: Option<String>,
    /// Override directory JSON-RPC endpoint
    #[arg(long)]
    pub directory: Option<String>,
    /// Override metrics listen address
    #[arg(long)]
    pub metrics_listen: Option<String>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.listener = v.clone();
    }
    if let Some(v) = overrides.node_dial_timeout {
        config.node_dial_timeout = v;
    }
    if let Some(v) = &overrides.private_key {
        config.private_key = PrivateKey::new(v.clone());
    }
    if let Some(v) = &overrides.topic {
        config.topic = v.clone();
    }
    if let Some(v) = &overrides.directory {
        config.directory.rpc = v.clone();
    }
    if let Some(v) = &overrides.metrics_listen {
        config.metrics.listen = Some(v.clone());
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}
