//! # meshproxy
//!
//! A local TCP proxy that forwards clients to a randomly chosen relay peer
//! over one multiplexed session.
//!
//! ## Crates
//!
//! - [`meshproxy_core`] - Defaults, error labels and the byte splicer
//! - [`meshproxy_config`] - Configuration loading and validation
//! - [`meshproxy_directory`] - Directory lookups and random peer selection
//! - [`meshproxy_metrics`] - Prometheus-compatible metrics
//! - [`meshproxy_client`] - Session management and the accept loop

pub use meshproxy_client as client;
pub use meshproxy_config as config;
pub use meshproxy_core as core;
pub use meshproxy_directory as directory;
pub use meshproxy_metrics as metrics;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use meshproxy_client::{ClientError, SessionManager, run, run_with_directory};
    pub use meshproxy_config::{Config, load_config, validate_config};
    pub use meshproxy_directory::{Directory, MemoryDirectory, PeerSelector, RpcDirectory};
    pub use tokio_util::sync::CancellationToken;
}
