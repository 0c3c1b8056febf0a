//! Relay connection establishment.

use std::time::Duration;

use meshproxy_directory::{Candidate, PeerSelector};
use meshproxy_metrics::{ERROR_DIAL, record_dial, record_error};
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::transport::Dialer;

/// Dials relay peers picked by a [`PeerSelector`].
#[derive(Debug)]
pub struct Connector<D> {
    selector: PeerSelector,
    dialer: D,
    topic: String,
    dial_timeout: Option<Duration>,
    retry_delay: Duration,
}

impl<D: Dialer> Connector<D> {
    /// # Arguments
    ///
    /// * `selector` - Source of relay candidates
    /// * `dialer` - Opens the transport connection
    /// * `topic` - Directory topic relays subscribe to
    /// * `dial_timeout` - Bound for one dial attempt, `None` to wait on the OS
    /// * `retry_delay` - Pause before drawing a new bucket
    pub fn new(
        selector: PeerSelector,
        dialer: D,
        topic: impl Into<String>,
        dial_timeout: Option<Duration>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            selector,
            dialer,
            topic: topic.into(),
            dial_timeout,
            retry_delay,
        }
    }

    /// Connect to the first reachable relay.
    ///
    /// Walks the candidates of a random bucket and, once they are exhausted,
    /// draws a new bucket. Only a directory failure ends the search.
    pub async fn connect(&self) -> Result<(D::Conn, Candidate), ClientError> {
        loop {
            let candidates = self.selector.select_candidates(&self.topic).await?;
            let bucket = candidates.bucket();

            for candidate in candidates {
                match self
                    .dialer
                    .dial(&candidate.address, self.dial_timeout)
                    .await
                {
                    Ok(conn) => {
                        record_dial(true);
                        info!(
                            identity = %candidate.identity,
                            address = %candidate.address,
                            "connected to relay"
                        );
                        return Ok((conn, candidate));
                    }
                    Err(e) => {
                        record_dial(false);
                        record_error(ERROR_DIAL);
                        warn!(
                            identity = %candidate.identity,
                            address = %candidate.address,
                            error = %e,
                            "relay dial failed"
                        );
                    }
                }
            }

            debug!(bucket, "no reachable relay in bucket");
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}
