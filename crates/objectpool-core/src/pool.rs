use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info};
use uuid::Uuid;

use crate::claim::{Claim, DEFAULT_CLAIM_TTL_SECONDS};
use crate::config::PoolConfig;
use crate::dispatch::{dispatch_loop, DispatchConfig, TaggedDispatchConfig};
use crate::error::Result;
use crate::store::PoolStore;
use crate::types::{ObjectBatch, Tags};

/// High-level operations over one named pool. Cheap to clone: all
/// state is behind the shared `store` handle.
pub struct ObjectPool {
    name: String,
    store: Arc<dyn PoolStore>,
    config: PoolConfig,
}

impl ObjectPool {
    pub fn new(name: impl Into<String>, store: Arc<dyn PoolStore>, config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            store,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `queue(objects...)`: untagged, undelayed enqueue.
    pub async fn queue(&self, objects: Vec<String>) -> Result<Vec<String>> {
        self.queue_tagged(Tags::default(), objects, 0).await
    }

    /// `queueTagged(tags, objects, delay?)`.
    pub async fn queue_tagged(
        &self,
        tags: Tags,
        objects: Vec<String>,
        delay_seconds: u64,
    ) -> Result<Vec<String>> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        let new_objects = self
            .store
            .queue_tagged(&self.name, tags, objects, delay_seconds)
            .await?;
        if !new_objects.is_empty() {
            debug!(pool = %self.name, count = new_objects.len(), delay_seconds, "queued objects");
        }
        Ok(new_objects)
    }

    /// `claim(maxCount)`: one object per `Claim`, each its own lease.
    pub async fn claim(self: &Arc<Self>, max_count: u32) -> Result<Vec<Arc<Claim>>> {
        let batch = self
            .store
            .claim(&self.name, max_count, self.config.claim_ttl_seconds, None)
            .await?;
        Ok(self.split_into_claims(batch.session, batch.objects))
    }

    /// `claimTagged(tag, maxCount)`: the whole batch becomes one
    /// `Claim`, or `None` if nothing was available.
    pub async fn claim_tagged(
        self: &Arc<Self>,
        tag: &str,
        max_count: u32,
    ) -> Result<Option<Arc<Claim>>> {
        let batch = self
            .store
            .claim(&self.name, max_count, self.config.claim_ttl_seconds, Some(tag))
            .await?;
        if batch.objects.is_empty() {
            return Ok(None);
        }
        let objects: ObjectBatch = batch.objects.into_iter().collect();
        Ok(Some(Claim::new(
            self.name.clone(),
            Arc::downgrade(&self.store),
            objects,
            batch.session,
            self.config.claim_ttl_seconds,
        )))
    }

    fn split_into_claims(self: &Arc<Self>, session: String, objects: Vec<String>) -> Vec<Arc<Claim>> {
        objects
            .into_iter()
            .map(|object| {
                Claim::new(
                    self.name.clone(),
                    Arc::downgrade(&self.store),
                    ObjectBatch::from_elem(object, 1),
                    session.clone(),
                    self.config.claim_ttl_seconds,
                )
            })
            .collect()
    }

    /// `clean()`: `cleanExpired` then `cleanDelayed`, union of both.
    pub async fn clean(&self) -> Result<Vec<String>> {
        let mut moved = self.store.clean_expired(&self.name).await?;
        let promoted = self.store.clean_delayed(&self.name).await?;
        if !moved.is_empty() || !promoted.is_empty() {
            info!(pool = %self.name, reclaimed = moved.len(), promoted = promoted.len(), "janitor cleaned pool");
        }
        moved.extend(promoted);
        Ok(moved)
    }

    /// `$clean`: calls `clean()` roughly every `ttl/3`; overlapping
    /// ticks are dropped while a clean is in flight.
    pub fn clean_stream(self: &Arc<Self>) -> BoxStream<'static, Vec<String>> {
        let pool = Arc::clone(self);
        let interval_secs = (pool.config.claim_ttl_seconds / 3).max(1);
        let (tx, rx) = futures::channel::mpsc::unbounded();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            let in_flight = Arc::new(tokio::sync::Mutex::new(()));
            loop {
                ticker.tick().await;
                let Ok(_permit) = Arc::clone(&in_flight).try_lock_owned() else {
                    continue;
                };
                match pool.clean().await {
                    Ok(moved) if !moved.is_empty() => {
                        if tx.unbounded_send(moved).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(pool = %pool.name, error = %err, "janitor clean failed");
                    }
                }
            }
        });

        rx.boxed()
    }

    /// `$claim({maxClaimedCount, queue})`: untagged dispatch.
    pub fn dispatch_claims(self: &Arc<Self>, config: DispatchConfig) -> BoxStream<'static, Arc<Claim>> {
        let pool = Arc::clone(self);
        dispatch_loop(
            self.name.clone(),
            Arc::clone(&self.store),
            config.max_claimed_count,
            config.queue,
            move |available| {
                let pool = Arc::clone(&pool);
                async move { pool.claim(available).await }
            },
        )
    }

    /// `$claimTagged({tag, maxObjectPerClaim, maxClaimedCount, queue})`:
    /// tagged dispatch, one batch `Claim` per attempt.
    pub fn dispatch_tagged_claims(
        self: &Arc<Self>,
        config: TaggedDispatchConfig,
    ) -> BoxStream<'static, Arc<Claim>> {
        let pool = Arc::clone(self);
        let tag = config.tag.clone();
        let max_object_per_claim = config.max_object_per_claim;
        dispatch_loop(
            self.name.clone(),
            Arc::clone(&self.store),
            config.max_claimed_count,
            config.queue,
            move |_available| {
                let pool = Arc::clone(&pool);
                let tag = tag.clone();
                async move {
                    Ok(pool
                        .claim_tagged(&tag, max_object_per_claim)
                        .await?
                        .into_iter()
                        .collect())
                }
            },
        )
    }

    pub fn default_ttl_seconds() -> u64 {
        DEFAULT_CLAIM_TTL_SECONDS
    }
}

/// A fresh opaque session identifier, chosen by the caller and stored
/// verbatim by the backing store.
pub fn new_session() -> String {
    Uuid::new_v4().to_string()
}
