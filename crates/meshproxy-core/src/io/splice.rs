//! One-directional byte splice with paired teardown.
//!
//! A proxied connection runs two splices, one per direction, as independent
//! tasks. They share a teardown token: whichever finishes first fires it and
//! the other releases its endpoints without waiting for its own peer.
//!
//! Copy errors never reach the caller. They are reported to a
//! [`SpliceObserver`] so they stay visible to metrics and tests.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Which way bytes flow through a splice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Local client towards the relay.
    Upstream,
    /// Relay towards the local client.
    Downstream,
}

impl Direction {
    /// Label used for metrics and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Downstream => "downstream",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observability hook for splices.
///
/// The client records to Prometheus; tests use counting implementations.
pub trait SpliceObserver: Send + Sync {
    /// Record bytes written and flushed to the destination.
    fn record_bytes(&self, direction: Direction, bytes: u64);
    /// Record a copy error. The splice still closes both endpoints.
    fn record_error(&self, direction: Direction, error: &io::Error);
}

/// No-op observer for cases where nothing needs to be recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl SpliceObserver for NoOpObserver {
    #[inline]
    fn record_bytes(&self, _direction: Direction, _bytes: u64) {}
    #[inline]
    fn record_error(&self, _direction: Direction, _error: &io::Error) {}
}

/// State machine for one-directional copy with flush.
enum CopyState {
    Reading,
    Writing(usize, usize), // (pos, len)
    Flushing(usize),       // bytes flushing
}

/// Result of polling the copy.
enum CopyPoll {
    /// Data was flushed; carries the byte count.
    Flushed(usize),
    /// Source reached end-of-stream.
    Eof,
}

/// Poll-driven one-directional copy: read → write → flush.
fn poll_copy<R, W>(
    cx: &mut Context<'_>,
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
    state: &mut CopyState,
) -> Poll<io::Result<CopyPoll>>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    loop {
        match state {
            CopyState::Reading => {
                let mut read_buf = ReadBuf::new(buf);
                match Pin::new(&mut *reader).poll_read(cx, &mut read_buf) {
                    Poll::Ready(Ok(())) => {
                        let n = read_buf.filled().len();
                        if n == 0 {
                            return Poll::Ready(Ok(CopyPoll::Eof));
                        }
                        *state = CopyState::Writing(0, n);
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
            CopyState::Writing(pos, len) => {
                match Pin::new(&mut *writer).poll_write(cx, &buf[*pos..*len]) {
                    Poll::Ready(Ok(0)) => {
                        return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                    }
                    Poll::Ready(Ok(n)) => {
                        *pos += n;
                        if *pos >= *len {
                            *state = CopyState::Flushing(*len);
                        }
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
            CopyState::Flushing(bytes) => {
                let bytes = *bytes;
                match Pin::new(&mut *writer).poll_flush(cx) {
                    Poll::Ready(Ok(())) => {
                        *state = CopyState::Reading;
                        return Poll::Ready(Ok(CopyPoll::Flushed(bytes)));
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
        }
    }
}

/// Copy `src` into `dst` until `src` ends, an I/O error occurs, or
/// `teardown` fires.
///
/// On every exit path `dst` is shut down, both endpoints are dropped and
/// `teardown` is cancelled so the opposite direction stops as well. Returns
/// the number of bytes delivered to `dst`.
///
/// # Arguments
///
/// * `dst` - Destination writer (closed afterwards)
/// * `src` - Source reader (closed afterwards)
/// * `direction` - Label passed to the observer
/// * `teardown` - Token shared with the opposite direction
/// * `buffer_size` - Size of the copy buffer
/// * `observer` - Receives byte counts and the terminal error, if any
pub async fn splice<W, R, O>(
    mut dst: W,
    mut src: R,
    direction: Direction,
    teardown: &CancellationToken,
    buffer_size: usize,
    observer: &O,
) -> u64
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    O: SpliceObserver + ?Sized,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut state = CopyState::Reading;
    let mut copied = 0u64;

    let outcome = {
        let copy = std::future::poll_fn(|cx| {
            loop {
                match poll_copy(cx, &mut src, &mut dst, &mut buf, &mut state) {
                    Poll::Ready(Ok(CopyPoll::Flushed(n))) => {
                        copied += n as u64;
                        observer.record_bytes(direction, n as u64);
                    }
                    Poll::Ready(Ok(CopyPoll::Eof)) => return Poll::Ready(Ok(())),
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
        });

        tokio::select! {
            biased;
            result = copy => result,
            _ = teardown.cancelled() => Ok(()),
        }
    };

    if let Err(e) = &outcome {
        debug!(%direction, error = %e, "splice ended with error");
        observer.record_error(direction, e);
    }

    let _ = dst.shutdown().await;
    drop(dst);
    drop(src);
    teardown.cancel();

    copied
}
