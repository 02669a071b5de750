use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::{ClaimedBatch, Tags};

/// The one seam between the pool core and whatever key-value store backs it.
///
/// Every method here corresponds exactly to one atomic script operation.
/// Implementations MUST run each method as a single atomic operation against
/// the store (a Lua `EVAL` for Redis, a single transaction for anything
/// else) - the pool's invariants are only guaranteed by that atomicity, not
/// by anything this trait can check.
///
/// Object-safe by construction (`async_trait`) so [`crate::claim::Claim`] and
/// [`crate::pool::ObjectPool`] can hold a `Weak<dyn PoolStore>` or an
/// `Arc<dyn PoolStore>` rather than being generic over the backend.
#[async_trait]
pub trait PoolStore: Send + Sync {
    /// `queueTagged`. `tags` may be empty; `delay_seconds == 0`
    /// means "queue immediately".
    async fn queue_tagged(
        &self,
        pool: &str,
        tags: Tags,
        objects: Vec<String>,
        delay_seconds: u64,
    ) -> Result<Vec<String>>;

    /// `claim`. `tag` selects the tagged path when `Some` and
    /// `max_count >= 2`; otherwise the untagged path runs even if `tag` is
    /// `Some` (a batch of one cannot be "tagged").
    async fn claim(
        &self,
        pool: &str,
        max_count: u32,
        expiration_seconds: u64,
        tag: Option<&str>,
    ) -> Result<ClaimedBatch>;

    /// `extend`.
    async fn extend(
        &self,
        pool: &str,
        objects: &[String],
        session: &str,
        expiration_seconds: u64,
    ) -> Result<bool>;

    /// `release`.
    async fn release(&self, pool: &str, objects: &[String], session: &str) -> Result<bool>;

    /// `requeue`.
    async fn requeue(
        &self,
        pool: &str,
        objects: &[String],
        session: &str,
        delay_seconds: u64,
    ) -> Result<bool>;

    /// `cleanExpired`.
    async fn clean_expired(&self, pool: &str) -> Result<Vec<String>>;

    /// `cleanDelayed`.
    async fn clean_delayed(&self, pool: &str) -> Result<Vec<String>>;

    /// Subscribes to the `P:queued` notification channel. The returned
    /// stream yields one item per best-effort notification; it never
    /// terminates on its own (a dropped connection reconnects internally).
    /// Dropping the stream tears the subscription down once it is the
    /// last one.
    async fn has_queued(&self, pool: &str) -> Result<BoxStream<'static, ()>>;
}
