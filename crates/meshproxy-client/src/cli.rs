//! CLI module for meshproxy-client.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use meshproxy_config::{CliOverrides, LoggingConfig, apply_overrides, load_config, validate_config};
use meshproxy_core::DEFAULT_CONFIG_PATH;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// meshproxy client CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "meshproxy", version, about = "Local TCP proxy over multiplexed relay sessions")]
pub struct ClientArgs {
    /// Config file path. JSON unless it ends in .yaml/.yml or .toml.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Run the client with the given CLI arguments.
pub async fn run(args: ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)
        .map_err(|e| format!("failed to load {}: {e}", args.config.display()))?;
    apply_overrides(&mut config, &args.overrides);
    validate_config(&config)?;

    init_tracing(&config.logging);

    if let Some(listen) = &config.metrics.listen {
        match meshproxy_metrics::init_prometheus(listen) {
            Ok(()) => info!("metrics exporter listening on {}", listen),
            Err(e) => warn!("failed to start metrics exporter: {}", e),
        }
    }

    // Graceful shutdown
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    crate::run(config, shutdown).await?;
    Ok(())
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Build the `EnvFilter` directive string from the logging section.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.level.as_deref().unwrap_or("info").to_string();
    let mut filters: Vec<_> = config.filters.iter().collect();
    filters.sort();
    for (module, level) in filters {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_new(filter_directives(config)).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or("pretty");
    let to_stdout = config.output.as_deref() == Some("stdout");

    let registry = tracing_subscriber::registry().with(filter);
    match (format, to_stdout) {
        ("json", true) => registry.with(fmt::layer().json().with_writer(io::stdout)).init(),
        ("json", false) => registry.with(fmt::layer().json().with_writer(io::stderr)).init(),
        ("compact", true) => registry.with(fmt::layer().compact().with_writer(io::stdout)).init(),
        ("compact", false) => registry.with(fmt::layer().compact().with_writer(io::stderr)).init(),
        (_, true) => registry.with(fmt::layer().with_writer(io::stdout)).init(),
        (_, false) => registry.with(fmt::layer().with_writer(io::stderr)).init(),
    }
}
