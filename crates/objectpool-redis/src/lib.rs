//! Redis implementation of the `objectpool-core` `PoolStore` trait.
//!
//! Every operation is one atomic Lua script (`EVAL`/`EVALSHA`) against a
//! pooled connection, plus a shared pub/sub subscription for the
//! `hasQueued` signal. See [`RedisPoolStore`] for the single-node/cluster
//! tradeoff this makes.
//!
//! # Keyspace
//!
//! For a pool named `P`:
//!
//! ```text
//! P:all                        Set    every tracked object (queued, claimed, or delayed)
//! P:queue                      List   objects available for claim, FIFO
//! P:queued                     Set    membership index mirroring P:queue
//! P:claimed                    List   claimed objects, ordered by lease-expiry
//! P:delayed-queue              List   delay-matured candidates, FIFO
//! P:session:<object>           String+TTL   claim session id; TTL is the lease
//! P:delay:<object>             String+TTL   existence marks an object still delayed
//! P:tags:<object>              Hash   tag -> value assignments
//! P:tagged-queue:<tag>:<value> List   subsequence of P:queue for that tag/value
//! P:queued (channel)           pub/sub   "work may be available" notification
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use objectpool_core::{ObjectPool, PoolConfig};
//! use objectpool_redis::RedisPoolStore;
//! use std::sync::Arc;
//!
//! let store = RedisPoolStore::connect("redis://localhost").await?;
//! let pool = ObjectPool::new("emails", Arc::new(store), PoolConfig::default());
//! pool.queue(vec!["msg-1".to_string()]).await?;
//! ```

mod error;
mod pubsub;
mod scripts;
mod store;

pub use store::RedisPoolStore;
