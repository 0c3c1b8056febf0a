//! Transport seams: dialing relay peers and multiplexing their connections.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use meshproxy_config::TcpConfig;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::ClientError;

/// Opens byte-stream connections to relay peers.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Conn: Send + 'static;

    /// Connect to `address`, giving up after `timeout` if one is set.
    async fn dial(&self, address: &str, timeout: Option<Duration>) -> io::Result<Self::Conn>;
}

/// Turns one connection into a multiplexed session.
#[async_trait]
pub trait Multiplexer<C: Send + 'static>: Send + Sync + 'static {
    type Session: MuxSession;

    /// Wrap `conn`. The session owns the connection from here on.
    async fn wrap(&self, conn: C) -> Result<Self::Session, ClientError>;
}

/// A multiplexed session carrying many logical streams over one connection.
#[async_trait]
pub trait MuxSession: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Whether the session can no longer open streams.
    fn is_closed(&self) -> bool;

    /// Open a new logical stream to the peer.
    async fn open_stream(&self) -> Result<Self::Stream, ClientError>;

    /// Stop opening streams on this session. Streams already open keep
    /// running, and the connection ends once the last of them closes.
    fn retire(&self);

    /// Close the session and its connection. Open streams fail afterwards.
    async fn close(&self);
}

/// Plain TCP dialer applying the configured socket options.
#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    tcp: TcpConfig,
}

impl TcpDialer {
    pub fn new(tcp: TcpConfig) -> Self {
        Self { tcp }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Conn = TcpStream;

    async fn dial(&self, address: &str, timeout: Option<Duration>) -> io::Result<TcpStream> {
        let connect = TcpStream::connect(address);
        let stream = match timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "dial timed out"))??,
            None => connect.await?,
        };
        apply_tcp_options(&stream, &self.tcp)?;
        Ok(stream)
    }
}

fn apply_tcp_options(stream: &TcpStream, config: &TcpConfig) -> io::Result<()> {
    stream.set_nodelay(config.no_delay)?;

    if config.keepalive_secs > 0 {
        let sock = socket2::SockRef::from(stream);
        let keepalive =
            socket2::TcpKeepalive::new().with_time(Duration::from_secs(config.keepalive_secs));
        sock.set_tcp_keepalive(&keepalive)?;
    }

    Ok(())
}
