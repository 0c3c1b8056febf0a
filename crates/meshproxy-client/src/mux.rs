//! yamux-backed multiplexed sessions.
//!
//! A `yamux::Connection` only makes progress while it is polled, so each
//! session gets one driver task that owns the connection. The handle talks
//! to the driver over a channel: stream opens are requests answered through
//! a oneshot.
//!
//! Every [`TunnelStream`] holds a lease on its session. Retiring or dropping
//! the handle stops new opens, but the driver keeps the connection running
//! until the last lease is gone. Only [`MuxSession::close`] tears it down
//! while streams are still open.

use std::collections::VecDeque;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use meshproxy_core::DEFAULT_MAX_STREAMS;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::{Notify, mpsc, oneshot};
use tokio_util::compat::{Compat, FuturesAsyncReadCompatExt, TokioAsyncReadCompatExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::ClientError;
use crate::transport::{Multiplexer, MuxSession};

/// Pending open requests buffered per session.
const COMMAND_QUEUE: usize = 64;

/// Receive window yamux grants each stream.
const STREAM_WINDOW: usize = 256 * 1024;

type OpenReply = oneshot::Sender<io::Result<TunnelStream>>;

/// Wraps connections into yamux client sessions.
#[derive(Debug, Clone)]
pub struct YamuxMultiplexer {
    config: yamux::Config,
    max_streams: usize,
}

impl Default for YamuxMultiplexer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STREAMS)
    }
}

impl YamuxMultiplexer {
    /// Sessions carrying at most `max_streams` concurrent streams.
    ///
    /// yamux drops the whole connection when its own stream limit is hit.
    /// Its limit is therefore set to twice ours, leaving room for streams
    /// that were dropped but not yet reaped, and the session refuses opens
    /// past `max_streams` itself.
    pub fn new(max_streams: usize) -> Self {
        let max_streams = max_streams.max(1);
        let yamux_limit = max_streams.saturating_mul(2);

        let mut config = yamux::Config::default();
        // The window must cover every stream whenever either value is set.
        config.set_max_connection_receive_window(None);
        config.set_max_num_streams(yamux_limit);
        config.set_max_connection_receive_window(Some(yamux_limit.saturating_mul(STREAM_WINDOW)));

        Self {
            config,
            max_streams,
        }
    }
}

#[async_trait]
impl<C> Multiplexer<C> for YamuxMultiplexer
where
    C: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Session = YamuxSession;

    async fn wrap(&self, conn: C) -> Result<YamuxSession, ClientError> {
        let connection = yamux::Connection::new(
            TokioAsyncReadCompatExt::compat(conn),
            self.config.clone(),
            yamux::Mode::Client,
        );
        Ok(YamuxSession::spawn(connection, self.max_streams))
    }
}

/// State shared by a session handle, its driver and its streams.
#[derive(Debug, Default)]
struct Shared {
    /// The driver has stopped.
    closed: AtomicBool,
    /// No new opens. The driver exits once `live` drops to zero.
    retired: AtomicBool,
    live: AtomicUsize,
    /// Wakes the driver on retirement and when the last stream goes.
    wake: Notify,
}

impl Shared {
    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    fn drained(&self) -> bool {
        self.retired.load(Ordering::Acquire) && self.live.load(Ordering::Acquire) == 0
    }
}

/// Keeps a session's connection alive while held.
#[derive(Debug)]
struct Lease(Arc<Shared>);

impl Lease {
    fn new(shared: Arc<Shared>) -> Self {
        shared.live.fetch_add(1, Ordering::AcqRel);
        Self(shared)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.0.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.wake.notify_one();
        }
    }
}

/// A logical stream on a [`YamuxSession`].
#[derive(Debug)]
pub struct TunnelStream {
    inner: Compat<yamux::Stream>,
    _lease: Lease,
}

impl AsyncRead for TunnelStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TunnelStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Handle to a yamux session driven by a background task.
///
/// Dropping the handle retires the session.
#[derive(Debug)]
pub struct YamuxSession {
    commands: mpsc::Sender<OpenReply>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl YamuxSession {
    fn spawn<C>(connection: yamux::Connection<Compat<C>>, max_streams: usize) -> Self
    where
        C: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
        let shared = Arc::new(Shared::default());
        let cancel = CancellationToken::new();

        tokio::spawn(drive(
            connection,
            rx,
            cancel.clone(),
            shared.clone(),
            max_streams,
        ));

        Self {
            commands,
            shared,
            cancel,
        }
    }

    /// Streams handed out and not yet dropped.
    pub fn live_streams(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MuxSession for YamuxSession {
    type Stream = TunnelStream;

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
            || self.shared.retired.load(Ordering::Acquire)
            || self.commands.is_closed()
    }

    async fn open_stream(&self) -> Result<TunnelStream, ClientError> {
        if self.is_closed() {
            return Err(ClientError::StreamOpen("session closed".into()));
        }
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(tx)
            .await
            .map_err(|_| ClientError::StreamOpen("session closed".into()))?;
        rx.await
            .map_err(|_| ClientError::StreamOpen("session closed".into()))?
            .map_err(|e| ClientError::StreamOpen(e.to_string()))
    }

    fn retire(&self) {
        debug!(live = self.live_streams(), "retiring session");
        self.shared.retire();
    }

    async fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.cancel.cancel();
    }
}

impl Drop for YamuxSession {
    fn drop(&mut self) {
        self.shared.retire();
    }
}

/// Why the driver stopped polling the connection.
enum Exit {
    /// The handle closed the session.
    Shutdown,
    /// Retired and the last stream is gone.
    Drained,
    /// The remote closed the connection.
    Remote,
    Error(yamux::ConnectionError),
}

async fn drive<C>(
    mut connection: yamux::Connection<Compat<C>>,
    mut commands: mpsc::Receiver<OpenReply>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
    max_streams: usize,
) where
    C: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let mut waiting: VecDeque<OpenReply> = VecDeque::new();
    let mut accepting = true;

    let exit = loop {
        if shared.drained() {
            break Exit::Drained;
        }

        let poll = poll_fn(|cx| {
            while accepting {
                match commands.poll_recv(cx) {
                    Poll::Ready(Some(reply)) => waiting.push_back(reply),
                    Poll::Ready(None) => {
                        accepting = false;
                        shared.retire();
                    }
                    Poll::Pending => break,
                }
            }

            while let Some(reply) = waiting.pop_front() {
                if reply.is_closed() {
                    continue;
                }
                if shared.retired.load(Ordering::Acquire) {
                    let _ = reply.send(Err(io::Error::other("session retired")));
                    continue;
                }
                // Past this point yamux would fail the open by dropping the
                // connection, so refuse here and keep the session.
                if shared.live.load(Ordering::Acquire) >= max_streams {
                    let _ = reply.send(Err(io::Error::other(format!(
                        "session stream limit of {max_streams} reached"
                    ))));
                    continue;
                }
                match connection.poll_new_outbound(cx) {
                    Poll::Ready(Ok(stream)) => {
                        let stream = TunnelStream {
                            inner: FuturesAsyncReadCompatExt::compat(stream),
                            _lease: Lease::new(shared.clone()),
                        };
                        let _ = reply.send(Ok(stream));
                    }
                    Poll::Ready(Err(e)) => {
                        let _ = reply.send(Err(io::Error::other(e.to_string())));
                        return Poll::Ready(Exit::Error(e));
                    }
                    Poll::Pending => {
                        waiting.push_front(reply);
                        break;
                    }
                }
            }

            // Polling inbound drives all I/O of the connection.
            loop {
                match connection.poll_next_inbound(cx) {
                    Poll::Ready(Some(Ok(stream))) => {
                        trace!("refusing inbound stream");
                        drop(stream);
                    }
                    Poll::Ready(Some(Err(e))) => return Poll::Ready(Exit::Error(e)),
                    Poll::Ready(None) => return Poll::Ready(Exit::Remote),
                    Poll::Pending => return Poll::Pending,
                }
            }
        });

        tokio::select! {
            exit = poll => break exit,
            _ = shared.wake.notified() => {}
            _ = cancel.cancelled() => break Exit::Shutdown,
        }
    };

    shared.closed.store(true, Ordering::Release);
    commands.close();
    drop(waiting);

    match exit {
        Exit::Shutdown => {
            debug!("closing session");
            close_connection(&mut connection).await;
        }
        Exit::Drained => {
            debug!("retired session drained, closing");
            close_connection(&mut connection).await;
        }
        Exit::Remote => debug!("session closed by peer"),
        Exit::Error(e) => warn!(error = %e, "session failed"),
    }
}

async fn close_connection<C>(connection: &mut yamux::Connection<Compat<C>>)
where
    C: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    if let Err(e) = poll_fn(|cx| connection.poll_close(cx)).await {
        debug!(error = %e, "session close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    /// Serve a yamux server on `io` that echoes every inbound stream.
    ///
    /// The task ends when the client closes the connection.
    fn spawn_echo_server(io: DuplexStream, config: yamux::Config) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut conn = yamux::Connection::new(
                TokioAsyncReadCompatExt::compat(io),
                config,
                yamux::Mode::Server,
            );
            while let Some(Ok(stream)) = poll_fn(|cx| conn.poll_next_inbound(cx)).await {
                tokio::spawn(async move {
                    let mut stream = FuturesAsyncReadCompatExt::compat(stream);
                    let mut buf = [0u8; 1024];
                    loop {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                if stream.write_all(&buf[..n]).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    let _ = stream.shutdown().await;
                });
            }
        })
    }

    async fn echo_session(mux: &YamuxMultiplexer) -> (YamuxSession, tokio::task::JoinHandle<()>) {
        let (client_io, server_io) = duplex(256 * 1024);
        let server = spawn_echo_server(server_io, mux.config.clone());
        (mux.wrap(client_io).await.unwrap(), server)
    }

    async fn assert_echoes(stream: &mut TunnelStream, msg: &[u8]) {
        stream.write_all(msg).await.unwrap();
        let mut buf = vec![0u8; msg.len()];
        tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut buf))
            .await
            .expect("echo timed out")
            .unwrap();
        assert_eq!(buf, msg);
    }

    #[tokio::test]
    async fn test_streams_share_one_connection() {
        let (session, _server) = echo_session(&YamuxMultiplexer::default()).await;
        assert!(!session.is_closed());

        let mut a = session.open_stream().await.unwrap();
        let mut b = session.open_stream().await.unwrap();
        assert_eq!(session.live_streams(), 2);

        a.write_all(b"first").await.unwrap();
        b.write_all(b"second").await.unwrap();

        let mut buf = [0u8; 6];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"second");
        let mut buf = [0u8; 5];
        a.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"first");

        drop(a);
        assert_eq!(session.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_close_rejects_new_streams() {
        let (session, _server) = echo_session(&YamuxMultiplexer::default()).await;
        session.close().await;
        assert!(session.is_closed());

        let result = tokio::time::timeout(Duration::from_secs(1), session.open_stream())
            .await
            .unwrap();
        assert!(matches!(result, Err(ClientError::StreamOpen(_))));
    }

    #[tokio::test]
    async fn test_remote_close_marks_session_closed() {
        let (client_io, server_io) = duplex(64 * 1024);
        let session = YamuxMultiplexer::default().wrap(client_io).await.unwrap();
        drop(server_io);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !session.is_closed() {
            assert!(tokio::time::Instant::now() < deadline, "session never closed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(session.open_stream().await.is_err());
    }

    #[tokio::test]
    async fn test_stream_limit_refuses_open_and_keeps_session() {
        let mux = YamuxMultiplexer::new(4);
        let (session, _server) = echo_session(&mux).await;

        let mut streams = Vec::new();
        for i in 0..4u8 {
            let mut stream = session.open_stream().await.unwrap();
            assert_echoes(&mut stream, &[i; 8]).await;
            streams.push(stream);
        }

        let refused = session.open_stream().await;
        assert!(matches!(refused, Err(ClientError::StreamOpen(ref m)) if m.contains("limit")));
        assert!(!session.is_closed());

        // Streams opened before the refusal still carry data.
        assert_echoes(&mut streams[0], b"still alive").await;

        // Freeing a slot lets the next open through.
        streams.pop();
        let mut next = session.open_stream().await.unwrap();
        assert_echoes(&mut next, b"next").await;
    }

    #[tokio::test]
    async fn test_default_session_exceeds_yamux_default_stream_count() {
        let mux = YamuxMultiplexer::default();
        let (session, _server) = echo_session(&mux).await;

        let mut streams = Vec::new();
        for _ in 0..600 {
            let mut stream = session.open_stream().await.unwrap();
            assert_echoes(&mut stream, b"x").await;
            streams.push(stream);
        }

        assert!(!session.is_closed());
        assert_echoes(&mut streams[0], b"first stream").await;
    }

    #[tokio::test]
    async fn test_retired_session_keeps_live_streams() {
        let (session, server) = echo_session(&YamuxMultiplexer::default()).await;
        let mut stream = session.open_stream().await.unwrap();

        session.retire();
        assert!(session.is_closed());
        assert!(session.open_stream().await.is_err());

        assert_echoes(&mut stream, b"after retire").await;
        assert!(!server.is_finished());

        // The connection ends with its last stream.
        drop(stream);
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("connection outlived its last stream")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_handle_keeps_live_streams() {
        let (session, server) = echo_session(&YamuxMultiplexer::default()).await;
        let mut stream = session.open_stream().await.unwrap();
        drop(session);

        assert_echoes(&mut stream, b"orphaned but alive").await;

        drop(stream);
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("connection outlived its last stream")
            .unwrap();
    }

    #[tokio::test]
    async fn test_retired_idle_session_closes_connection() {
        let (session, server) = echo_session(&YamuxMultiplexer::default()).await;
        session.retire();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("idle retired session kept its connection")
            .unwrap();
    }
}
