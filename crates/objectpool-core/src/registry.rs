use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;
use tracing::info;

use crate::pool::ObjectPool;

/// The one process-wide piece of module-level state: a registry of
/// every `ObjectPool` the application has wired up. Constructed once at
/// bootstrap and passed around as `Arc<Registry>` - never a language-level
/// global.
pub struct Registry {
    pools: DashMap<String, Arc<ObjectPool>>,
    added_tx: mpsc::UnboundedSender<Arc<ObjectPool>>,
    added_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<Arc<ObjectPool>>>>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        let (added_tx, added_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            pools: DashMap::new(),
            added_tx,
            added_rx: std::sync::Mutex::new(Some(added_rx)),
        })
    }

    /// `add(pool...)`: idempotent - re-registering the same name
    /// replaces the handle but does not duplicate janitor coverage.
    pub fn add(&self, pool: Arc<ObjectPool>) {
        info!(pool = %pool.name(), "registered pool");
        self.pools.insert(pool.name().to_string(), Arc::clone(&pool));
        // A send error only means nobody ever subscribed to `clean()`; the
        // pool is still reachable via `get`.
        let _ = self.added_tx.send(pool);
    }

    /// `get(name)`: lookup by pool name.
    pub fn get(&self, name: &str) -> Option<Arc<ObjectPool>> {
        self.pools.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// The janitor entry point: merges the `$clean` stream of
    /// every pool registered at call time *and* every pool registered
    /// afterward. Subscribing once starts the janitor for the whole
    /// registry; call this exactly once per process (typically from
    /// application bootstrap).
    pub fn clean_stream(self: &Arc<Self>) -> BoxStream<'static, (String, Vec<String>)> {
        let snapshot: Vec<Arc<ObjectPool>> = self
            .pools
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let future_pools = self
            .added_rx
            .lock()
            .unwrap()
            .take()
            .expect("clean_stream must only be subscribed once per registry");

        let snapshot_stream = stream::iter(snapshot);
        let future_stream = tokio_stream_from_receiver(future_pools);

        snapshot_stream
            .chain(future_stream)
            .flat_map(|pool| {
                let name = pool.name().to_string();
                pool.clean_stream().map(move |moved| (name.clone(), moved))
            })
            .boxed()
    }
}

/// Adapts an `mpsc::UnboundedReceiver` into a `Stream` that yields items
/// until the sender side is dropped.
fn tokio_stream_from_receiver<T: Send + 'static>(
    mut rx: mpsc::UnboundedReceiver<T>,
) -> BoxStream<'static, T> {
    stream::unfold(rx, |mut rx| async move {
        let item = rx.recv().await?;
        Some((item, rx))
    })
    .boxed()
}
