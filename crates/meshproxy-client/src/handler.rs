//! Per-client connection handling.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use meshproxy_core::io::{Direction, SpliceObserver, splice};
use meshproxy_metrics::{
    record_connection_closed, record_connection_dropped, record_connection_piped, record_error,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::session::SessionManager;
use crate::transport::{Dialer, Multiplexer};

/// Tunnel one local client through a new logical stream.
///
/// If no stream can be opened the client is dropped, which closes it.
/// Otherwise both directions are spliced as separate tasks sharing one
/// teardown token, and this returns once both have finished.
pub async fn handle_conn<C, P, D, M, O>(
    client: C,
    peer: P,
    manager: Arc<SessionManager<D, M>>,
    buffer_size: usize,
    observer: Arc<O>,
) where
    C: AsyncRead + AsyncWrite + Send + 'static,
    P: Display + Send + 'static,
    D: Dialer,
    M: Multiplexer<D::Conn>,
    O: SpliceObserver + 'static,
{
    let tunnel = match manager.open_stream(false).await {
        Ok(stream) => stream,
        Err(e) => {
            record_error(e.error_type());
            record_connection_dropped();
            warn!(peer = %peer, error = %e, "no tunnel stream, dropping client");
            return;
        }
    };

    record_connection_piped();
    let start = Instant::now();
    let teardown = CancellationToken::new();

    let (client_r, client_w) = tokio::io::split(client);
    let (tunnel_r, tunnel_w) = tokio::io::split(tunnel);

    let upstream = tokio::spawn({
        let teardown = teardown.clone();
        let observer = observer.clone();
        async move {
            splice(
                tunnel_w,
                client_r,
                Direction::Upstream,
                &teardown,
                buffer_size,
                &*observer,
            )
            .await
        }
    });
    let downstream = tokio::spawn({
        let teardown = teardown.clone();
        async move {
            splice(
                client_w,
                tunnel_r,
                Direction::Downstream,
                &teardown,
                buffer_size,
                &*observer,
            )
            .await
        }
    });

    let (up, down) = tokio::join!(upstream, downstream);
    record_connection_closed(start.elapsed().as_secs_f64());
    debug!(
        peer = %peer,
        up = up.unwrap_or_default(),
        down = down.unwrap_or_default(),
        "connection closed"
    );
}
