use async_trait::async_trait;
use futures::stream::BoxStream;
use objectpool_core::{ClaimedBatch, PoolStore, Result, Tags};
use redis::aio::ConnectionManager;
use redis::Script;
use serde::Deserialize;
use tracing::debug;

use crate::error::{malformed, redis_err};
use crate::pubsub::PubSubHub;
use crate::scripts;

#[derive(Deserialize)]
struct ClaimResponse {
    objects: Vec<String>,
}

/// A [`PoolStore`] backed by Redis. Every method is one `EVALSHA`/`EVAL` of
/// a script from [`scripts`] against a cloned [`ConnectionManager`] - cloning
/// is cheap, `ConnectionManager` multiplexes internally and reconnects on
/// its own for the command path; the pub/sub path has its own reconnect
/// loop in [`crate::pubsub`].
///
/// Keys are built inside each script from a `pool` name argument rather
/// than passed through `KEYS[]`. That keeps the call sites simple - one
/// `ARGV` list per invocation, no per-object key vector to construct
/// client-side - at the cost of Redis Cluster compatibility (a clustered
/// deployment would need every key sharing a hash tag). Accepted for a
/// single-node deployment; see `DESIGN.md`.
pub struct RedisPoolStore {
    command: ConnectionManager,
    pubsub: PubSubHub,
    queue_tagged: Script,
    claim: Script,
    extend: Script,
    release: Script,
    requeue: Script,
    clean_expired: Script,
    clean_delayed: Script,
}

impl RedisPoolStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let command = ConnectionManager::new(client.clone()).await?;
        Ok(Self {
            command,
            pubsub: PubSubHub::new(client),
            queue_tagged: scripts::queue_tagged(),
            claim: scripts::claim(),
            extend: scripts::extend(),
            release: scripts::release(),
            requeue: scripts::requeue(),
            clean_expired: scripts::clean_expired(),
            clean_delayed: scripts::clean_delayed(),
        })
    }
}

#[async_trait]
impl PoolStore for RedisPoolStore {
    async fn queue_tagged(
        &self,
        pool: &str,
        tags: Tags,
        objects: Vec<String>,
        delay_seconds: u64,
    ) -> Result<Vec<String>> {
        let tags_json = serde_json::to_string(&tags).map_err(malformed)?;
        let objects_json = serde_json::to_string(&objects).map_err(malformed)?;
        let mut conn = self.command.clone();
        let raw: String = self
            .queue_tagged
            .arg(pool)
            .arg(tags_json)
            .arg(objects_json)
            .arg(delay_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        let new_objects: Vec<String> = serde_json::from_str(&raw).map_err(malformed)?;
        debug!(pool, count = new_objects.len(), delay_seconds, "queued objects via redis");
        Ok(new_objects)
    }

    async fn claim(
        &self,
        pool: &str,
        max_count: u32,
        expiration_seconds: u64,
        tag: Option<&str>,
    ) -> Result<ClaimedBatch> {
        let session = objectpool_core::new_session();
        let mut conn = self.command.clone();
        let raw: String = self
            .claim
            .arg(pool)
            .arg(max_count)
            .arg(expiration_seconds)
            .arg(&session)
            .arg(tag.unwrap_or(""))
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        let response: ClaimResponse = serde_json::from_str(&raw).map_err(malformed)?;
        Ok(ClaimedBatch {
            session,
            objects: response.objects,
        })
    }

    async fn extend(
        &self,
        pool: &str,
        objects: &[String],
        session: &str,
        expiration_seconds: u64,
    ) -> Result<bool> {
        let objects_json = serde_json::to_string(objects).map_err(malformed)?;
        let mut conn = self.command.clone();
        let result: i64 = self
            .extend
            .arg(pool)
            .arg(objects_json)
            .arg(session)
            .arg(expiration_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(result == 1)
    }

    async fn release(&self, pool: &str, objects: &[String], session: &str) -> Result<bool> {
        let objects_json = serde_json::to_string(objects).map_err(malformed)?;
        let mut conn = self.command.clone();
        let result: i64 = self
            .release
            .arg(pool)
            .arg(objects_json)
            .arg(session)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(result == 1)
    }

    async fn requeue(
        &self,
        pool: &str,
        objects: &[String],
        session: &str,
        delay_seconds: u64,
    ) -> Result<bool> {
        let objects_json = serde_json::to_string(objects).map_err(malformed)?;
        let mut conn = self.command.clone();
        let result: i64 = self
            .requeue
            .arg(pool)
            .arg(objects_json)
            .arg(session)
            .arg(delay_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(result == 1)
    }

    async fn clean_expired(&self, pool: &str) -> Result<Vec<String>> {
        let mut conn = self.command.clone();
        let raw: String = self
            .clean_expired
            .arg(pool)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        serde_json::from_str(&raw).map_err(malformed)
    }

    async fn clean_delayed(&self, pool: &str) -> Result<Vec<String>> {
        let mut conn = self.command.clone();
        let raw: String = self
            .clean_delayed
            .arg(pool)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        serde_json::from_str(&raw).map_err(malformed)
    }

    async fn has_queued(&self, pool: &str) -> Result<BoxStream<'static, ()>> {
        self.pubsub.subscribe(pool)
    }
}
