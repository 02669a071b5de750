//! # objectpool-core
//!
//! A distributed, at-least-once work queue - an **object pool** - backed by
//! a key-value store that supports atomic server-side scripting and
//! pub/sub. Producers enqueue opaque string objects; consumers claim one or
//! more of them for exclusive processing, then release, requeue, or extend
//! their lease.
//!
//! ## Core concepts
//!
//! - [`store::PoolStore`] is the seam between this crate and the backing
//!   store: every method is one atomic script (queue, claim, extend,
//!   release, requeue, clean-expired, clean-delayed). `objectpool-redis`
//!   implements it against Redis; `objectpool-testing` implements it
//!   in-memory for tests.
//! - [`claim::Claim`] is a leased batch's state machine: `Claimed` is the
//!   only state that admits a new action, auto-extension keeps the lease
//!   alive at `ttl/2`, and transitions are serialized per claim.
//! - [`pool::ObjectPool`] is the high-level façade: `queue`, `claim`,
//!   `claim_tagged`, `clean`, and the two dispatch streams
//!   (`dispatch_claims` / `dispatch_tagged_claims`) that turn store
//!   notifications into a bounded flow of claims.
//! - [`registry::Registry`] tracks every pool an application has wired up
//!   and merges their `clean_stream`s into the process-wide janitor.
//!
//! ## What this is not
//!
//! Not exactly-once delivery, not a priority queue, not cross-pool atomic,
//! not fair across consumers, and not a payload store - objects are opaque
//! identifiers; payloads live elsewhere, keyed by the identifier.

mod claim;
mod config;
mod dispatch;
mod error;
mod pool;
mod registry;
mod retry;
mod store;
mod types;

pub use claim::{Claim, ClaimState, DEFAULT_CLAIM_TTL_SECONDS};
pub use config::PoolConfig;
pub use dispatch::{DispatchConfig, TaggedDispatchConfig, RESIGNAL_INTERVAL};
pub use error::{Categorizable, ErrorCategory, PoolError, Result};
pub use pool::{new_session, ObjectPool};
pub use registry::Registry;
pub use retry::{retry_forever, RETRY_BACKOFF};
pub use store::PoolStore;
pub use types::{ClaimedBatch, ObjectBatch, QueueSeed, Tags};

pub use async_trait::async_trait;
