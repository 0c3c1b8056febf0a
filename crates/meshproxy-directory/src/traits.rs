//! Directory lookup trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DirectoryError;

/// Subscriber identity → network address for one bucket.
pub type Subscribers = HashMap<String, String>;

/// Lookup capability of a bucketed publish/subscribe directory.
///
/// Implementations must be thread-safe (`Send + Sync`) as they may be
/// queried concurrently.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Bucket count reported for `topic`.
    ///
    /// Callers draw a bucket index from `0..=count`, so the value is used
    /// as the highest bucket index.
    async fn bucket_count(&self, topic: &str) -> Result<u32, DirectoryError>;

    /// Subscribers registered in one bucket of `topic`.
    async fn subscribers(&self, topic: &str, bucket: u32) -> Result<Subscribers, DirectoryError>;
}

/// Blanket implementation for `Arc<D>` where `D: Directory`.
#[async_trait]
impl<D: Directory + ?Sized> Directory for Arc<D> {
    #[inline]
    async fn bucket_count(&self, topic: &str) -> Result<u32, DirectoryError> {
        (**self).bucket_count(topic).await
    }

    #[inline]
    async fn subscribers(&self, topic: &str, bucket: u32) -> Result<Subscribers, DirectoryError> {
        (**self).subscribers(topic, bucket).await
    }
}

/// Blanket implementation for `Box<D>` where `D: Directory`.
#[async_trait]
impl<D: Directory + ?Sized> Directory for Box<D> {
    #[inline]
    async fn bucket_count(&self, topic: &str) -> Result<u32, DirectoryError> {
        (**self).bucket_count(topic).await
    }

    #[inline]
    async fn subscribers(&self, topic: &str, bucket: u32) -> Result<Subscribers, DirectoryError> {
        (**self).subscribers(topic, bucket).await
    }
}
