//! Random relay peer selection.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::DirectoryError;
use crate::traits::Directory;

/// One relay peer eligible for dialing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    /// Subscriber identity in the directory.
    pub identity: String,
    /// Network address to dial.
    pub address: String,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identity, self.address)
    }
}

/// Subscribers of one bucket in random order.
///
/// Each candidate is yielded once. When the iterator is exhausted the caller
/// asks the selector again, which draws a fresh bucket.
#[derive(Debug)]
pub struct Candidates {
    bucket: u32,
    inner: std::vec::IntoIter<Candidate>,
}

impl Candidates {
    /// Bucket these candidates were drawn from.
    pub fn bucket(&self) -> u32 {
        self.bucket
    }
}

impl Iterator for Candidates {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Candidates {}

/// Draw a bucket index uniformly from `0..=count`.
///
/// The reported count is used as the highest index, so `count + 1` values
/// are possible.
#[inline]
pub fn draw_bucket<R: Rng>(rng: &mut R, count: u32) -> u32 {
    rng.gen_range(0..=count)
}

/// Picks relay candidates from a random bucket of a topic.
///
/// Every call re-queries the directory; nothing is cached. Each query is
/// bounded by the selector's query timeout.
pub struct PeerSelector {
    directory: Arc<dyn Directory>,
    query_timeout: Duration,
    rng: Mutex<StdRng>,
}

impl fmt::Debug for PeerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSelector")
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

impl PeerSelector {
    pub fn new(directory: Arc<dyn Directory>, query_timeout: Duration) -> Self {
        Self::with_rng(directory, query_timeout, StdRng::from_entropy())
    }

    /// Create a selector with a caller-provided RNG (seeded in tests).
    pub fn with_rng(directory: Arc<dyn Directory>, query_timeout: Duration, rng: StdRng) -> Self {
        Self {
            directory,
            query_timeout,
            rng: Mutex::new(rng),
        }
    }

    /// Draw a bucket of `topic` and return its subscribers shuffled.
    ///
    /// Fails if either directory query fails or times out. An empty bucket
    /// is not an error; the returned iterator is simply empty.
    pub async fn select_candidates(&self, topic: &str) -> Result<Candidates, DirectoryError> {
        let count = self.bounded(self.directory.bucket_count(topic)).await?;
        let bucket = draw_bucket(&mut *self.rng.lock(), count);

        let subscribers = self
            .bounded(self.directory.subscribers(topic, bucket))
            .await?;

        let mut candidates: Vec<Candidate> = subscribers
            .into_iter()
            .map(|(identity, address)| Candidate { identity, address })
            .collect();
        // HashMap order is arbitrary; sort first so a seeded RNG is reproducible.
        candidates.sort_unstable_by(|a, b| a.identity.cmp(&b.identity));
        candidates.shuffle(&mut *self.rng.lock());

        debug!(topic, bucket, count, peers = candidates.len(), "selected bucket");

        Ok(Candidates {
            bucket,
            inner: candidates.into_iter(),
        })
    }

    async fn bounded<T>(
        &self,
        query: impl Future<Output = Result<T, DirectoryError>>,
    ) -> Result<T, DirectoryError> {
        tokio::time::timeout(self.query_timeout, query)
            .await
            .map_err(|_| DirectoryError::Timeout(self.query_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryDirectory, Subscribers};
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashSet};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn five_peers() -> Arc<MemoryDirectory> {
        Arc::new(MemoryDirectory::from_peers(
            "t",
            (0..5).map(|i| (format!("peer-{i}"), format!("127.0.0.1:{}", 9000 + i))),
        ))
    }

    /// Reports a fixed count and records which buckets were asked for.
    struct RecordingDirectory {
        count: u32,
        asked: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl Directory for RecordingDirectory {
        async fn bucket_count(&self, _topic: &str) -> Result<u32, DirectoryError> {
            Ok(self.count)
        }

        async fn subscribers(
            &self,
            _topic: &str,
            bucket: u32,
        ) -> Result<Subscribers, DirectoryError> {
            self.asked.lock().push(bucket);
            Ok(Subscribers::new())
        }
    }

    /// Never answers.
    struct StalledDirectory;

    #[async_trait]
    impl Directory for StalledDirectory {
        async fn bucket_count(&self, _topic: &str) -> Result<u32, DirectoryError> {
            std::future::pending().await
        }

        async fn subscribers(
            &self,
            _topic: &str,
            _bucket: u32,
        ) -> Result<Subscribers, DirectoryError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_is_eventually_first() {
        let selector = PeerSelector::new(five_peers(), TIMEOUT);
        let mut firsts = HashSet::new();
        for _ in 0..200 {
            let mut candidates = selector.select_candidates("t").await.unwrap();
            assert_eq!(candidates.len(), 5);
            firsts.insert(candidates.next().unwrap().identity);
        }
        assert_eq!(firsts.len(), 5);
    }

    #[tokio::test]
    async fn test_orderings_differ_between_calls() {
        let selector = PeerSelector::new(five_peers(), TIMEOUT);
        let mut orderings = HashSet::new();
        for _ in 0..20 {
            let order: Vec<String> = selector
                .select_candidates("t")
                .await
                .unwrap()
                .map(|c| c.identity)
                .collect();
            assert_eq!(order.iter().collect::<BTreeSet<_>>().len(), 5);
            orderings.insert(order);
        }
        assert!(orderings.len() > 1);
    }

    #[tokio::test]
    async fn test_same_seed_same_order() {
        let dir = five_peers();
        let a = PeerSelector::with_rng(dir.clone(), TIMEOUT, StdRng::seed_from_u64(7));
        let b = PeerSelector::with_rng(dir, TIMEOUT, StdRng::seed_from_u64(7));
        let order_a: Vec<_> = a.select_candidates("t").await.unwrap().collect();
        let order_b: Vec<_> = b.select_candidates("t").await.unwrap().collect();
        assert_eq!(order_a, order_b);
    }

    #[tokio::test]
    async fn test_bucket_draw_includes_reported_count() {
        let dir = Arc::new(RecordingDirectory {
            count: 2,
            asked: Mutex::new(Vec::new()),
        });
        let selector = PeerSelector::with_rng(dir.clone(), TIMEOUT, StdRng::seed_from_u64(1));
        for _ in 0..300 {
            let candidates = selector.select_candidates("t").await.unwrap();
            assert!(candidates.bucket() <= 2);
        }
        let asked: BTreeSet<u32> = dir.asked.lock().iter().copied().collect();
        assert_eq!(asked, BTreeSet::from([0, 1, 2]));
    }

    #[test]
    fn test_draw_bucket_zero_count() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(draw_bucket(&mut rng, 0), 0);
        }
    }

    #[tokio::test]
    async fn test_count_failure_skips_subscriber_query() {
        let dir = five_peers();
        dir.set_unavailable(true);
        let selector = PeerSelector::new(dir.clone(), TIMEOUT);
        assert!(matches!(
            selector.select_candidates("t").await,
            Err(DirectoryError::Unavailable(_))
        ));
        assert_eq!(dir.query_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_timeout() {
        let selector = PeerSelector::new(Arc::new(StalledDirectory), Duration::from_secs(3));
        match selector.select_candidates("t").await {
            Err(DirectoryError::Timeout(d)) => assert_eq!(d, Duration::from_secs(3)),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_bucket_yields_nothing() {
        let selector = PeerSelector::new(Arc::new(MemoryDirectory::new()), TIMEOUT);
        let mut candidates = selector.select_candidates("nobody").await.unwrap();
        assert_eq!(candidates.bucket(), 0);
        assert_eq!(candidates.len(), 0);
        assert!(candidates.next().is_none());
    }
}
