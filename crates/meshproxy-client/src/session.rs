//! Single shared multiplexed session.
//!
//! [`SessionManager`] owns at most one live session. It is created lazily on
//! the first stream request, reused while healthy, and replaced when it
//! reports closed or when opening a stream on it fails.
//!
//! A replaced session that still works is retired rather than closed: it
//! takes no new streams, and the tunnels already running on it finish
//! undisturbed.
//!
//! All transitions happen under one async mutex. Stream opens run outside
//! the lock so a healthy session serves callers concurrently.

use std::sync::Arc;
use std::time::Duration;

use meshproxy_metrics::{
    ERROR_SESSION, ERROR_STREAM_OPEN, record_error, record_session_created, record_stream_opened,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::connector::Connector;
use crate::error::ClientError;
use crate::transport::{Dialer, Multiplexer, MuxSession};

struct State<S> {
    session: Option<Arc<S>>,
    /// Bumped every time a session is installed.
    generation: u64,
}

/// Outcome of one acquire-and-open pass.
enum Attempt<T> {
    Opened(T),
    /// Opening failed on the session installed as `generation`.
    OpenFailed { error: ClientError, generation: u64 },
}

/// Holder of the process-wide relay session.
pub struct SessionManager<D, M>
where
    D: Dialer,
    M: Multiplexer<D::Conn>,
{
    connector: Connector<D>,
    mux: M,
    stream_open_timeout: Duration,
    state: Mutex<State<M::Session>>,
}

impl<D, M> std::fmt::Debug for SessionManager<D, M>
where
    D: Dialer,
    M: Multiplexer<D::Conn>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("stream_open_timeout", &self.stream_open_timeout)
            .finish_non_exhaustive()
    }
}

impl<D, M> SessionManager<D, M>
where
    D: Dialer,
    M: Multiplexer<D::Conn>,
{
    pub fn new(connector: Connector<D>, mux: M, stream_open_timeout: Duration) -> Self {
        Self {
            connector,
            mux,
            stream_open_timeout,
            state: Mutex::new(State {
                session: None,
                generation: 0,
            }),
        }
    }

    /// Dial a relay for a new session.
    ///
    /// A wrapped connection belongs to its session, so every new session
    /// needs a fresh connection. `force` marks a reconnect after a failure.
    pub async fn acquire_connection(&self, force: bool) -> Result<D::Conn, ClientError> {
        if force {
            info!("forcing relay reconnect");
        }
        let (conn, _peer) = self.connector.connect().await?;
        Ok(conn)
    }

    /// Return the current session, creating one if there is none, it is
    /// closed, or `force` is set.
    pub async fn acquire_session(&self, force: bool) -> Result<Arc<M::Session>, ClientError> {
        let mut state = self.state.lock().await;
        let (session, _) = self.acquire_locked(&mut state, force, None).await?;
        Ok(session)
    }

    /// Open a logical stream over the shared session.
    ///
    /// If opening fails and `force` was false, the session is replaced and
    /// the open is tried once more. Failing to acquire a session at all is
    /// returned without retrying.
    pub async fn open_stream(&self, force: bool) -> Result<<M::Session as MuxSession>::Stream, ClientError> {
        match self.try_once(force).await? {
            Attempt::Opened(stream) => Ok(stream),
            Attempt::OpenFailed { error, .. } if force => Err(error),
            Attempt::OpenFailed { error, generation } => {
                warn!(error = %error, "stream open failed, reconnecting");
                self.try_with_force(generation).await
            }
        }
    }

    /// Generation of the installed session (0 before the first one).
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    async fn try_once(
        &self,
        force: bool,
    ) -> Result<Attempt<<M::Session as MuxSession>::Stream>, ClientError> {
        let (session, generation) = {
            let mut state = self.state.lock().await;
            self.acquire_locked(&mut state, force, None).await?
        };
        Ok(match self.open_on(&session).await {
            Ok(stream) => Attempt::Opened(stream),
            Err(error) => Attempt::OpenFailed { error, generation },
        })
    }

    async fn try_with_force(
        &self,
        failed: u64,
    ) -> Result<<M::Session as MuxSession>::Stream, ClientError> {
        let (session, _) = {
            let mut state = self.state.lock().await;
            self.acquire_locked(&mut state, true, Some(failed)).await?
        };
        self.open_on(&session).await
    }

    /// Make sure a usable session is installed and return it.
    ///
    /// A forced replacement carrying `observed` only replaces that
    /// generation; if another caller already replaced it, the newer session
    /// is reused.
    async fn acquire_locked(
        &self,
        state: &mut State<M::Session>,
        force: bool,
        observed: Option<u64>,
    ) -> Result<(Arc<M::Session>, u64), ClientError> {
        if let Some(session) = &state.session
            && !session.is_closed()
        {
            let already_replaced = observed.is_some_and(|g| g != state.generation);
            if !force || already_replaced {
                return Ok((session.clone(), state.generation));
            }
        }

        let mut forced = force;
        loop {
            let conn = self.acquire_connection(forced).await?;
            match self.mux.wrap(conn).await {
                Ok(session) => {
                    let session = Arc::new(session);
                    let previous = state.session.replace(session.clone());
                    state.generation += 1;
                    record_session_created(forced);
                    debug!(generation = state.generation, forced, "session established");
                    if let Some(previous) = previous {
                        if previous.is_closed() {
                            previous.close().await;
                        } else {
                            previous.retire();
                        }
                    }
                    return Ok((session, state.generation));
                }
                Err(e) if !forced => {
                    record_error(ERROR_SESSION);
                    warn!(error = %e, "session setup failed, reconnecting");
                    forced = true;
                }
                Err(e) => {
                    record_error(ERROR_SESSION);
                    return Err(e);
                }
            }
        }
    }

    async fn open_on(
        &self,
        session: &M::Session,
    ) -> Result<<M::Session as MuxSession>::Stream, ClientError> {
        let result = match tokio::time::timeout(self.stream_open_timeout, session.open_stream()).await
        {
            Ok(result) => result,
            Err(_) => Err(ClientError::StreamOpen(format!(
                "timed out after {:?}",
                self.stream_open_timeout
            ))),
        };
        match &result {
            Ok(_) => record_stream_opened(),
            Err(_) => record_error(ERROR_STREAM_OPEN),
        }
        result
    }
}
