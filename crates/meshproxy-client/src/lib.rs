//! meshproxy client.
//!
//! Accepts local TCP clients and tunnels each one through its own logical
//! stream over a single multiplexed session to a relay peer picked at
//! random from a bucketed directory topic.

pub mod cli;
pub mod connector;
mod error;
pub mod handler;
pub mod mux;
pub mod session;
pub mod transport;

pub use cli::ClientArgs;
pub use connector::Connector;
pub use error::ClientError;
pub use mux::{TunnelStream, YamuxMultiplexer, YamuxSession};
pub use session::SessionManager;
pub use transport::{Dialer, Multiplexer, MuxSession, TcpDialer};

use std::sync::Arc;

use meshproxy_config::Config;
use meshproxy_directory::{Directory, PeerSelector, RpcDirectory};
use meshproxy_metrics::{ERROR_ACCEPT, MetricsObserver, record_connection_accepted, record_error};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run the client against the directory configured in `config`.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), ClientError> {
    let directory = Arc::new(RpcDirectory::new(
        config.directory.rpc.clone(),
        config.directory.timeout(),
    )?);
    run_with_directory(config, directory, shutdown).await
}

/// Run the client with a caller-provided directory.
///
/// Fails only if the listener cannot be bound.
pub async fn run_with_directory(
    config: Config,
    directory: Arc<dyn Directory>,
    shutdown: CancellationToken,
) -> Result<(), ClientError> {
    let manager = Arc::new(build_session_manager(
        &config,
        directory,
        TcpDialer::new(config.tcp.clone()),
        YamuxMultiplexer::new(config.session.max_streams),
    ));

    let listener = TcpListener::bind(&config.listener)
        .await
        .map_err(|source| ClientError::Bind {
            addr: config.listener.clone(),
            source,
        })?;

    let fingerprint = config.private_key.fingerprint();
    info!(
        listen = %config.listener,
        topic = %config.topic,
        key = %&fingerprint[..16],
        "meshproxy client started"
    );

    serve(listener, manager, config.session.buffer_size, shutdown).await;
    Ok(())
}

/// Assemble the session manager for `config`.
pub fn build_session_manager<D, M>(
    config: &Config,
    directory: Arc<dyn Directory>,
    dialer: D,
    mux: M,
) -> SessionManager<D, M>
where
    D: Dialer,
    M: Multiplexer<D::Conn>,
{
    let selector = PeerSelector::new(directory, config.directory.timeout());
    let connector = Connector::new(
        selector,
        dialer,
        config.topic.clone(),
        config.dial_timeout(),
        config.directory.bucket_retry_delay(),
    );
    SessionManager::new(connector, mux, config.session.stream_open_timeout())
}

/// Accept clients on `listener` until `shutdown` fires.
///
/// Each client is handled on its own task; accept errors are logged and the
/// loop keeps going.
pub async fn serve<D, M>(
    listener: TcpListener,
    manager: Arc<SessionManager<D, M>>,
    buffer_size: usize,
    shutdown: CancellationToken,
) where
    D: Dialer,
    M: Multiplexer<D::Conn>,
{
    let observer = Arc::new(MetricsObserver);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        record_connection_accepted();
                        tokio::spawn(handler::handle_conn(
                            stream,
                            peer,
                            manager.clone(),
                            buffer_size,
                            observer.clone(),
                        ));
                    }
                    Err(e) => {
                        record_error(ERROR_ACCEPT);
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!("shutting down client");
                break;
            }
        }
    }
}
