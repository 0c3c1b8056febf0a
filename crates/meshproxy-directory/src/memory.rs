//! In-memory directory backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::DirectoryError;
use crate::traits::{Directory, Subscribers};

/// Directory serving a fixed table of topics and buckets.
///
/// The reported bucket count of a topic is its highest bucket index, so a
/// topic stored in a single bucket reports `0`. Unknown topics report `0`
/// and an empty bucket. Lookups can be switched off with
/// [`set_unavailable`](Self::set_unavailable) to simulate an outage.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    topics: RwLock<HashMap<String, Vec<Subscribers>>>,
    unavailable: AtomicBool,
    queries: AtomicUsize,
}

impl MemoryDirectory {
    /// Create a new empty directory.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory with all `peers` in bucket 0 of `topic`.
    ///
    /// # Example
    /// ```
    /// use meshproxy_directory::MemoryDirectory;
    ///
    /// let dir = MemoryDirectory::from_peers("proxyhttp", [("relay-a", "10.0.0.1:9000")]);
    /// ```
    pub fn from_peers<I, K, V>(topic: &str, peers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let dir = Self::new();
        for (identity, address) in peers {
            dir.insert(topic, 0, identity, address);
        }
        dir
    }

    /// Register a subscriber in `bucket` of `topic`, growing the bucket list as needed.
    pub fn insert(
        &self,
        topic: &str,
        bucket: u32,
        identity: impl Into<String>,
        address: impl Into<String>,
    ) {
        let mut topics = self.topics.write();
        let buckets = topics.entry(topic.to_string()).or_default();
        let idx = bucket as usize;
        if buckets.len() <= idx {
            buckets.resize_with(idx + 1, HashMap::new);
        }
        buckets[idx].insert(identity.into(), address.into());
    }

    /// Remove a subscriber from every bucket of `topic`.
    pub fn remove(&self, topic: &str, identity: &str) -> bool {
        let mut topics = self.topics.write();
        let Some(buckets) = topics.get_mut(topic) else {
            return false;
        };
        let mut removed = false;
        for bucket in buckets.iter_mut() {
            removed |= bucket.remove(identity).is_some();
        }
        removed
    }

    /// Make every subsequent query fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Number of queries served or refused so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn check_available(&self) -> Result<(), DirectoryError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(DirectoryError::Unavailable("memory directory offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn bucket_count(&self, topic: &str) -> Result<u32, DirectoryError> {
        self.check_available()?;
        let topics = self.topics.read();
        let buckets = topics.get(topic).map_or(0, Vec::len);
        Ok(buckets.saturating_sub(1) as u32)
    }

    async fn subscribers(&self, topic: &str, bucket: u32) -> Result<Subscribers, DirectoryError> {
        self.check_available()?;
        let topics = self.topics.read();
        Ok(topics
            .get(topic)
            .and_then(|buckets| buckets.get(bucket as usize))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_bucket_reports_zero() {
        let dir = MemoryDirectory::from_peers("t", [("a", "127.0.0.1:1"), ("b", "127.0.0.1:2")]);
        assert_eq!(dir.bucket_count("t").await.unwrap(), 0);
        let subs = dir.subscribers("t", 0).await.unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs.get("a").map(String::as_str), Some("127.0.0.1:1"));
    }

    #[tokio::test]
    async fn test_buckets_and_unknown_topic() {
        let dir = MemoryDirectory::new();
        dir.insert("t", 2, "c", "127.0.0.1:3");
        assert_eq!(dir.bucket_count("t").await.unwrap(), 2);
        assert!(dir.subscribers("t", 0).await.unwrap().is_empty());
        assert_eq!(dir.subscribers("t", 2).await.unwrap().len(), 1);
        assert!(dir.subscribers("t", 3).await.unwrap().is_empty());

        assert_eq!(dir.bucket_count("other").await.unwrap(), 0);
        assert!(dir.subscribers("other", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = MemoryDirectory::from_peers("t", [("a", "127.0.0.1:1")]);
        assert!(dir.remove("t", "a"));
        assert!(!dir.remove("t", "a"));
        assert!(!dir.remove("missing", "a"));
        assert!(dir.subscribers("t", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let dir = MemoryDirectory::from_peers("t", [("a", "127.0.0.1:1")]);
        dir.set_unavailable(true);
        assert!(matches!(
            dir.bucket_count("t").await,
            Err(DirectoryError::Unavailable(_))
        ));
        assert!(dir.subscribers("t", 0).await.is_err());
        assert_eq!(dir.query_count(), 2);

        dir.set_unavailable(false);
        assert!(dir.bucket_count("t").await.is_ok());
    }
}
