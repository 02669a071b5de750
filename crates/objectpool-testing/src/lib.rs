//! An in-memory [`objectpool_core::PoolStore`] for fast, deterministic
//! tests, kept as its own crate rather than a `#[cfg(test)]` module so
//! both `objectpool-core` and downstream consumers can write tests
//! without a real Redis instance.
//!
//! This is a reference re-implementation of the atomic store operations,
//! not a mock: every method here enforces the same invariants a Redis Lua
//! script would, just against plain Rust collections guarded by one mutex
//! per pool name. Tests that exercise `objectpool-core` against this store
//! are exercising real pool semantics, not a stand-in.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use objectpool_core::{ClaimedBatch, PoolError, PoolStore, Result, Tags};
use tokio::sync::{broadcast, Mutex};

struct LeasedEntry {
    session: String,
    expires_at: Instant,
}

struct DelayEntry {
    expires_at: Instant,
}

#[derive(Default)]
struct PoolState {
    all: HashSet<String>,
    queue: VecDeque<String>,
    queued: HashSet<String>,
    claimed: VecDeque<String>,
    delayed_queue: VecDeque<String>,
    sessions: HashMap<String, LeasedEntry>,
    delays: HashMap<String, DelayEntry>,
    tags: HashMap<String, Tags>,
    tagged_queue: HashMap<(String, String), VecDeque<String>>,
    notify: Option<broadcast::Sender<()>>,
}

impl PoolState {
    fn notify_channel(&mut self) -> broadcast::Sender<()> {
        self.notify
            .get_or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    fn publish(&mut self) {
        if let Some(tx) = &self.notify {
            let _ = tx.send(());
        }
    }

    /// Session is "live" iff present and not past its TTL - mirrors Redis
    /// key expiry, which is what `cleanExpired`'s liveness probe relies on.
    fn session_live(&self, object: &str) -> Option<&str> {
        self.sessions.get(object).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.session.as_str())
            } else {
                None
            }
        })
    }

    fn delay_live(&self, object: &str) -> bool {
        self.delays
            .get(object)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    fn repopulate_tagged_queues(&mut self, object: &str) {
        if let Some(tags) = self.tags.get(object).cloned() {
            for (tag, value) in tags {
                self.tagged_queue
                    .entry((tag, value))
                    .or_default()
                    .push_back(object.to_string());
            }
        }
    }

    fn remove_from_tagged_queues(&mut self, object: &str) {
        if let Some(tags) = self.tags.get(object).cloned() {
            for (tag, value) in tags {
                let key = (tag, value);
                if let Some(q) = self.tagged_queue.get_mut(&key) {
                    q.retain(|o| o != object);
                    if q.is_empty() {
                        self.tagged_queue.remove(&key);
                    }
                }
            }
        }
    }

    fn finalize_claim(&mut self, object: &str, session: &str, expiration_seconds: u64) {
        self.queued.remove(object);
        self.sessions.insert(
            object.to_string(),
            LeasedEntry {
                session: session.to_string(),
                expires_at: Instant::now() + Duration::from_secs(expiration_seconds),
            },
        );
        self.remove_from_tagged_queues(object);
        self.claimed.push_back(object.to_string());
    }
}

/// An in-memory, single-process stand-in for a Redis-backed object pool.
/// Holds one [`PoolState`] per pool name behind its own mutex so unrelated
/// pools never contend with each other.
#[derive(Default)]
pub struct MemoryPoolStore {
    pools: Mutex<HashMap<String, Arc<Mutex<PoolState>>>>,
}

impl MemoryPoolStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn pool(&self, name: &str) -> Arc<Mutex<PoolState>> {
        let mut pools = self.pools.lock().await;
        Arc::clone(
            pools
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(PoolState::default()))),
        )
    }

    /// Simulates a crashed consumer: deletes the lease for `object` without
    /// going through `release`/`requeue`, so the next `clean_expired` call
    /// reclaims it.
    pub async fn force_expire_session(&self, pool_name: &str, object: &str) {
        let pool = self.pool(pool_name).await;
        let mut state = pool.lock().await;
        state.sessions.remove(object);
    }

    /// Same idea for a delayed object: lets a test mature a delay without
    /// sleeping.
    pub async fn force_mature_delay(&self, pool_name: &str, object: &str) {
        let pool = self.pool(pool_name).await;
        let mut state = pool.lock().await;
        state.delays.remove(object);
    }
}

#[async_trait]
impl PoolStore for MemoryPoolStore {
    async fn queue_tagged(
        &self,
        pool: &str,
        tags: Tags,
        objects: Vec<String>,
        delay_seconds: u64,
    ) -> Result<Vec<String>> {
        let pool_handle = self.pool(pool).await;
        let mut state = pool_handle.lock().await;

        let mut new_objects = Vec::new();
        for object in objects {
            if !state.all.contains(&object) && !new_objects.contains(&object) {
                new_objects.push(object);
            }
        }
        if new_objects.is_empty() {
            return Ok(new_objects);
        }

        for object in &new_objects {
            state.all.insert(object.clone());
            if !tags.is_empty() {
                state.tags.insert(object.clone(), tags.clone());
            }
        }

        if delay_seconds > 0 {
            for object in &new_objects {
                state.delayed_queue.push_back(object.clone());
                state.delays.insert(
                    object.clone(),
                    DelayEntry {
                        expires_at: Instant::now() + Duration::from_secs(delay_seconds),
                    },
                );
            }
        } else {
            for object in &new_objects {
                state.queued.insert(object.clone());
                state.queue.push_back(object.clone());
                if !tags.is_empty() {
                    state.repopulate_tagged_queues(object);
                }
            }
            state.publish();
        }

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
        let pool_handle = self.pool(pool).await;
        let mut state = pool_handle.lock().await;
        let mut popped = Vec::new();

        if max_count == 0 {
            return Ok(ClaimedBatch {
                session,
                objects: popped,
            });
        }

        match tag {
            Some(tag) if max_count >= 2 => {
                let Some(head) = state.queue.pop_front() else {
                    return Ok(ClaimedBatch {
                        session,
                        objects: popped,
                    });
                };
                let value = state
                    .tags
                    .get(&head)
                    .and_then(|t| t.get(tag))
                    .cloned();
                state.finalize_claim(&head, &session, expiration_seconds);
                popped.push(head);

                if let Some(value) = value {
                    let key = (tag.to_string(), value);
                    let remaining = (max_count - 1) as usize;
                    for _ in 0..remaining {
                        let Some(obj) = state
                            .tagged_queue
                            .get_mut(&key)
                            .and_then(|q| q.pop_front())
                        else {
                            break;
                        };
                        state.queue.retain(|o| o != &obj);
                        state.finalize_claim(&obj, &session, expiration_seconds);
                        popped.push(obj);
                    }
                }
            }
            _ => {
                for _ in 0..max_count {
                    let Some(obj) = state.queue.pop_front() else {
                        break;
                    };
                    state.finalize_claim(&obj, &session, expiration_seconds);
                    popped.push(obj);
                }
            }
        }

        Ok(ClaimedBatch {
            session,
            objects: popped,
        })
    }

    async fn extend(
        &self,
        pool: &str,
        objects: &[String],
        session: &str,
        expiration_seconds: u64,
    ) -> Result<bool> {
        let pool_handle = self.pool(pool).await;
        let mut state = pool_handle.lock().await;

        for object in objects {
            if state.session_live(object) != Some(session) {
                return Ok(false);
            }
        }

        for object in objects {
            state.sessions.insert(
                object.clone(),
                LeasedEntry {
                    session: session.to_string(),
                    expires_at: Instant::now() + Duration::from_secs(expiration_seconds),
                },
            );
            state.claimed.retain(|o| o != object);
            state.claimed.push_back(object.clone());
        }

        Ok(true)
    }

    async fn release(&self, pool: &str, objects: &[String], session: &str) -> Result<bool> {
        let pool_handle = self.pool(pool).await;
        let mut state = pool_handle.lock().await;

        for object in objects {
            if state.session_live(object) != Some(session) {
                return Ok(false);
            }
        }

        for object in objects {
            state.sessions.remove(object);
            state.tags.remove(object);
            state.all.remove(object);
            state.claimed.retain(|o| o != object);
        }

        Ok(true)
    }

    async fn requeue(
        &self,
        pool: &str,
        objects: &[String],
        session: &str,
        delay_seconds: u64,
    ) -> Result<bool> {
        let pool_handle = self.pool(pool).await;
        let mut state = pool_handle.lock().await;

        for object in objects {
            if state.session_live(object) != Some(session) {
                return Ok(false);
            }
        }

        for object in objects {
            state.sessions.remove(object);
            state.claimed.retain(|o| o != object);
        }

        if delay_seconds > 0 {
            for object in objects {
                state.delayed_queue.push_back(object.clone());
                state.delays.insert(
                    object.clone(),
                    DelayEntry {
                        expires_at: Instant::now() + Duration::from_secs(delay_seconds),
                    },
                );
            }
        } else {
            for object in objects {
                state.queued.insert(object.clone());
                state.queue.push_back(object.clone());
                state.repopulate_tagged_queues(object);
            }
            state.publish();
        }

        Ok(true)
    }

    async fn clean_expired(&self, pool: &str) -> Result<Vec<String>> {
        let pool_handle = self.pool(pool).await;
        let mut state = pool_handle.lock().await;
        let mut requeued = Vec::new();

        while let Some(head) = state.claimed.front().cloned() {
            if state.session_live(&head).is_some() {
                break;
            }
            state.claimed.pop_front();
            state.queued.insert(head.clone());
            state.queue.push_back(head.clone());
            state.repopulate_tagged_queues(&head);
            requeued.push(head);
        }

        if !requeued.is_empty() {
            state.publish();
        }

        Ok(requeued)
    }

    async fn clean_delayed(&self, pool: &str) -> Result<Vec<String>> {
        let pool_handle = self.pool(pool).await;
        let mut state = pool_handle.lock().await;
        let mut promoted = Vec::new();

        while let Some(head) = state.delayed_queue.front().cloned() {
            if state.delay_live(&head) {
                break;
            }
            state.delayed_queue.pop_front();
            state.queued.insert(head.clone());
            state.queue.push_back(head.clone());
            state.repopulate_tagged_queues(&head);
            promoted.push(head);
        }

        if !promoted.is_empty() {
            state.publish();
        }

        Ok(promoted)
    }

    async fn has_queued(&self, pool: &str) -> Result<BoxStream<'static, ()>> {
        let pool_handle = self.pool(pool).await;
        let tx = {
            let mut state = pool_handle.lock().await;
            state.notify_channel()
        };
        let rx = tx.subscribe();

        Ok(stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(()) => return Some(((), rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed())
    }
}

/// Convenience for call sites that want a concrete type error instead of
/// threading `Result<_, PoolError>` everywhere in test code.
pub fn unexpected_error(message: impl Into<String>) -> PoolError {
    PoolError::MalformedResponse(message.into())
}
