use std::sync::{Arc, Weak};

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Categorizable;
use crate::retry::retry_forever;
use crate::store::PoolStore;
use crate::types::ObjectBatch;

/// Default lease duration. Extension requests the same value;
/// auto-extension fires at half of it.
pub const DEFAULT_CLAIM_TTL_SECONDS: u64 = 30;

/// The claim state machine. `Claimed` is the only state that admits
/// a new action; `Released`/`Requeued`/`Expired` are terminal and end the
/// state stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    Claimed,
    Extending,
    Releasing,
    Requeuing,
    Released,
    Requeued,
    Expired,
}

impl ClaimState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ClaimState::Released | ClaimState::Requeued | ClaimState::Expired
        )
    }
}

/// One leased batch of objects and the machinery that keeps its lease alive
/// and serializes its terminal transitions.
///
/// `pool` is intentionally a `Weak` reference: a `Claim` must never be the
/// reason an `ObjectPool` (and the store connection it owns) stays alive.
pub struct Claim {
    pub objects: ObjectBatch,
    pub session: String,
    pool_name: String,
    store: Weak<dyn PoolStore>,
    ttl_seconds: u64,
    state_tx: watch::Sender<ClaimState>,
    state_rx: watch::Receiver<ClaimState>,
    transition_lock: Mutex<()>,
    auto_extend: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Claim {
    /// Constructs a claim already in the `Claimed` state and arms its
    /// auto-extend timer. Returned wrapped in `Arc` because the auto-extend
    /// task and every caller need to share ownership.
    pub fn new(
        pool_name: impl Into<String>,
        store: Weak<dyn PoolStore>,
        objects: ObjectBatch,
        session: String,
        ttl_seconds: u64,
    ) -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(ClaimState::Claimed);
        let claim = Arc::new(Self {
            objects,
            session,
            pool_name: pool_name.into(),
            store,
            ttl_seconds,
            state_tx,
            state_rx,
            transition_lock: Mutex::new(()),
            auto_extend: std::sync::Mutex::new(None),
        });
        claim.arm_auto_extend();
        claim
    }

    pub fn state(&self) -> ClaimState {
        *self.state_rx.borrow()
    }

    /// Observes state transitions; completes (no further values) once the
    /// claim reaches a terminal state.
    pub fn state_stream(&self) -> watch::Receiver<ClaimState> {
        self.state_rx.clone()
    }

    fn arm_auto_extend(self: &Arc<Self>) {
        let half_ttl = std::time::Duration::from_secs(self.ttl_seconds.max(2) / 2);
        let weak_self = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(half_ttl).await;
            if let Some(claim) = weak_self.upgrade() {
                debug!(pool = %claim.pool_name, session = %claim.session, "auto-extending claim");
                claim.extend().await;
            }
        });
        *self.auto_extend.lock().unwrap() = Some(handle);
    }

    fn cancel_auto_extend(&self) {
        if let Some(handle) = self.auto_extend.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// `extend()`. Returns `false` without side effect if the claim
    /// is not currently `Claimed`.
    pub async fn extend(self: &Arc<Self>) -> bool {
        let _guard = self.transition_lock.lock().await;
        if self.state() != ClaimState::Claimed {
            return false;
        }
        let _ = self.state_tx.send(ClaimState::Extending);

        let Some(store) = self.store.upgrade() else {
            warn!(pool = %self.pool_name, session = %self.session, "pool gone, expiring claim");
            let _ = self.state_tx.send(ClaimState::Expired);
            self.cancel_auto_extend();
            return false;
        };

        let objects: Vec<String> = self.objects.iter().cloned().collect();
        let result = retry_forever("extend", || {
            store.extend(&self.pool_name, &objects, &self.session, self.ttl_seconds)
        })
        .await;

        match result {
            Ok(true) => {
                let _ = self.state_tx.send(ClaimState::Claimed);
                self.arm_auto_extend();
                true
            }
            Ok(false) => {
                let _ = self.state_tx.send(ClaimState::Expired);
                self.cancel_auto_extend();
                false
            }
            Err(err) => {
                warn!(pool = %self.pool_name, session = %self.session, error = %err, category = ?err.category(), "extend failed definitively");
                let _ = self.state_tx.send(ClaimState::Expired);
                self.cancel_auto_extend();
                false
            }
        }
    }

    /// `release()`: permanent removal. Returns `false` without side
    /// effect if the claim is not currently `Claimed`.
    pub async fn release(self: &Arc<Self>) -> bool {
        let _guard = self.transition_lock.lock().await;
        if self.state() != ClaimState::Claimed {
            return false;
        }
        let _ = self.state_tx.send(ClaimState::Releasing);
        self.cancel_auto_extend();

        let Some(store) = self.store.upgrade() else {
            let _ = self.state_tx.send(ClaimState::Expired);
            return false;
        };

        let objects: Vec<String> = self.objects.iter().cloned().collect();
        let result = retry_forever("release", || {
            store.release(&self.pool_name, &objects, &self.session)
        })
        .await;

        match result {
            Ok(true) => {
                let _ = self.state_tx.send(ClaimState::Released);
                true
            }
            _ => {
                let _ = self.state_tx.send(ClaimState::Expired);
                false
            }
        }
    }

    /// `requeue()`: returns the batch for future reclaim, optionally
    /// after `delay_seconds`. Returns `false` without side effect if the
    /// claim is not currently `Claimed`.
    pub async fn requeue(self: &Arc<Self>, delay_seconds: u64) -> bool {
        let _guard = self.transition_lock.lock().await;
        if self.state() != ClaimState::Claimed {
            return false;
        }
        let _ = self.state_tx.send(ClaimState::Requeuing);
        self.cancel_auto_extend();

        let Some(store) = self.store.upgrade() else {
            let _ = self.state_tx.send(ClaimState::Expired);
            return false;
        };

        let objects: Vec<String> = self.objects.iter().cloned().collect();
        let result = retry_forever("requeue", || {
            store.requeue(&self.pool_name, &objects, &self.session, delay_seconds)
        })
        .await;

        match result {
            Ok(true) => {
                let _ = self.state_tx.send(ClaimState::Requeued);
                true
            }
            _ => {
                let _ = self.state_tx.send(ClaimState::Expired);
                false
            }
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.cancel_auto_extend();
    }
}
