//! JSON-RPC directory backend.
//!
//! Queries a directory node over HTTP:
//!
//! - `gettopicbucketscount {"topic"}` → bucket count
//! - `getsubscribers {"topic", "bucket"}` → `{identity: address}`
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use meshproxy_directory::RpcDirectory;
//!
//! let dir = RpcDirectory::new("http://127.0.0.1:30003", Duration::from_secs(10))?;
//! # Ok::<(), meshproxy_directory::DirectoryError>(())
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::trace;

use crate::error::DirectoryError;
use crate::traits::{Directory, Subscribers};

const METHOD_BUCKETS_COUNT: &str = "gettopicbucketscount";
const METHOD_SUBSCRIBERS: &str = "getsubscribers";

/// Directory backend that talks JSON-RPC to a directory node.
#[derive(Debug)]
pub struct RpcDirectory {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcDirectory {
    /// Create a new JSON-RPC directory client.
    ///
    /// `timeout` bounds each HTTP request. Fails if the HTTP client cannot
    /// be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    /// Create with a custom reqwest [`Client`] (for proxies, TLS roots, etc.).
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send one JSON-RPC call and decode its `result`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, DirectoryError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = wire::Request {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        trace!(url = %self.url, method, id, "directory rpc call");

        let resp = self.client.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "HTTP {}",
                resp.status().as_u16()
            )));
        }

        let resp: wire::Response<T> = resp
            .json()
            .await
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;

        if let Some(err) = resp.error {
            return Err(DirectoryError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        // A null or absent result is only valid for nullable result types.
        match resp.result {
            Some(result) => Ok(result),
            None => serde_json::from_value(serde_json::Value::Null)
                .map_err(|_| DirectoryError::InvalidResponse(format!("{method}: missing result"))),
        }
    }
}

#[async_trait]
impl Directory for RpcDirectory {
    async fn bucket_count(&self, topic: &str) -> Result<u32, DirectoryError> {
        self.call(METHOD_BUCKETS_COUNT, json!({ "topic": topic }))
            .await
    }

    async fn subscribers(&self, topic: &str, bucket: u32) -> Result<Subscribers, DirectoryError> {
        let subscribers: Option<Subscribers> = self
            .call(METHOD_SUBSCRIBERS, json!({ "topic": topic, "bucket": bucket }))
            .await?;
        Ok(subscribers.unwrap_or_default())
    }
}

// ── Wire types ────────────────────────────────────────────────────

#[allow(missing_debug_implementations)]
mod wire {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    pub struct Request<'a> {
        pub jsonrpc: &'static str,
        pub id: u64,
        pub method: &'a str,
        pub params: serde_json::Value,
    }

    #[derive(Deserialize)]
    pub struct Response<T> {
        #[serde(default = "Option::default")]
        pub result: Option<T>,
        #[serde(default)]
        pub error: Option<RpcError>,
    }

    #[derive(Deserialize)]
    pub struct RpcError {
        pub code: i64,
        pub message: String,
    }
}
