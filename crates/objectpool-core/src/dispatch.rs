use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, warn};

use crate::claim::Claim;
use crate::error::Result;
use crate::store::PoolStore;
use crate::types::QueueSeed;

/// Periodic resignal interval after a real has-queued notification: bounds
/// worst-case dispatch latency when a `PUBLISH` is missed.
pub const RESIGNAL_INTERVAL: Duration = Duration::from_secs(10);

pub struct DispatchConfig {
    pub max_claimed_count: u32,
    pub queue: Option<QueueSeed>,
}

pub struct TaggedDispatchConfig {
    pub tag: String,
    pub max_object_per_claim: u32,
    pub max_claimed_count: u32,
    pub queue: Option<QueueSeed>,
}

/// Drives the three-signal dispatch engine: a bootstrap tick, the
/// has-queued notification (with its 10s periodic resignal), and a
/// feedback edge fired when outstanding claims drop back to zero. Each tick
/// is gated by a single in-flight permit and, if `queue_seed` is set,
/// re-queues those objects before every claim attempt (the "seed & claim"
/// idiom).
///
/// `try_claim` is called with the number of currently available slots
/// (`max_claimed_count - outstanding`) and returns whatever `Claim`s that
/// attempt produced (zero, one, or - for the untagged path - many).
pub fn dispatch_loop<F, Fut>(
    pool_name: String,
    store: Arc<dyn PoolStore>,
    max_claimed_count: u32,
    queue_seed: Option<QueueSeed>,
    mut try_claim: F,
) -> BoxStream<'static, Arc<Claim>>
where
    F: FnMut(u32) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<Arc<Claim>>>> + Send + 'static,
{
    let (out_tx, out_rx) = futures::channel::mpsc::unbounded::<Arc<Claim>>();

    tokio::spawn(async move {
        let (tick_tx, mut tick_rx) = tokio::sync::mpsc::unbounded_channel::<()>();

        // Bootstrap tick (signal 1).
        let _ = tick_tx.send(());

        // Has-queued signal with periodic resignal (signal 2).
        match store.has_queued(&pool_name).await {
            Ok(has_queued) => {
                let tick_tx = tick_tx.clone();
                tokio::spawn(resignal_task(has_queued, tick_tx));
            }
            Err(err) => {
                warn!(pool = %pool_name, error = %err, "failed to subscribe to has-queued channel; falling back to bootstrap/feedback ticks only");
            }
        }

        let outstanding = Arc::new(AtomicU32::new(0));
        let in_flight = Arc::new(tokio::sync::Mutex::new(()));

        while tick_rx.recv().await.is_some() {
            let available = max_claimed_count.saturating_sub(outstanding.load(Ordering::SeqCst));
            if available == 0 {
                continue;
            }

            let Ok(_permit) = Arc::clone(&in_flight).try_lock_owned() else {
                // A claim RPC is already in flight: drop this tick.
                continue;
            };

            if let Some(seed) = &queue_seed {
                if let Err(err) = store
                    .queue_tagged(&pool_name, seed.tags.clone(), seed.objects.clone(), 0)
                    .await
                {
                    warn!(pool = %pool_name, error = %err, "seed re-queue failed");
                }
            }

            let claimed = match try_claim(available).await {
                Ok(claims) => claims,
                Err(err) => {
                    warn!(pool = %pool_name, error = %err, "claim attempt failed");
                    Vec::new()
                }
            };

            for claim in claimed {
                outstanding.fetch_add(1, Ordering::SeqCst);
                if out_tx.unbounded_send(Arc::clone(&claim)).is_err() {
                    // Receiver dropped: stop tracking further completions, but
                    // still let in-flight processors observe terminal state.
                }

                let outstanding = Arc::clone(&outstanding);
                let tick_tx = tick_tx.clone();
                let pool_name = pool_name.clone();
                tokio::spawn(async move {
                    let mut state_stream = claim.state_stream();
                    loop {
                        if state_stream.borrow().is_terminal() {
                            break;
                        }
                        if state_stream.changed().await.is_err() {
                            break;
                        }
                    }
                    let previous = outstanding.fetch_sub(1, Ordering::SeqCst);
                    if previous == 1 {
                        debug!(pool = %pool_name, "last outstanding claim finished, resignaling dispatch");
                        let _ = tick_tx.send(());
                    }
                });
            }
        }
    });

    out_rx.boxed()
}

/// Forwards every has-queued notification as a tick, then keeps resignaling
/// every [`RESIGNAL_INTERVAL`] until the next real notification arrives.
async fn resignal_task(
    mut has_queued: BoxStream<'static, ()>,
    tick_tx: tokio::sync::mpsc::UnboundedSender<()>,
) {
    loop {
        tokio::select! {
            notified = has_queued.next() => {
                match notified {
                    Some(()) => {
                        if tick_tx.send(()).is_err() {
                            return;
                        }
                    }
                    None => return,
                }
            }
            _ = tokio::time::sleep(RESIGNAL_INTERVAL) => {
                if tick_tx.send(()).is_err() {
                    return;
                }
            }
        }
    }
}
