//! Shared `hasQueued` subscription: one Redis pub/sub connection per
//! pool, fanned out to every interested dispatcher via
//! `tokio::sync::broadcast`. A second subscriber to the same pool reuses the
//! existing connection; when the last subscriber drops its stream, the
//! background task notices on its next poll and tears the connection down.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use objectpool_core::{Result, RETRY_BACKOFF};
use redis::Client;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::redis_err;

const CHANNEL_CAPACITY: usize = 64;

pub struct PubSubHub {
    client: Client,
    channels: DashMap<String, broadcast::Sender<()>>,
}

impl PubSubHub {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            channels: DashMap::new(),
        }
    }

    /// Subscribes to `<pool>:queued`, spawning the background reader the
    /// first time a pool is asked for (or after the previous reader gave up
    /// because nobody was listening anymore).
    pub fn subscribe(&self, pool: &str) -> Result<BoxStream<'static, ()>> {
        let rx = match self.channels.entry(pool.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().receiver_count() == 0 {
                    let (tx, rx) = spawn_reader(self.client.clone(), pool.to_string());
                    entry.insert(tx);
                    rx
                } else {
                    entry.get().subscribe()
                }
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = spawn_reader(self.client.clone(), pool.to_string());
                entry.insert(tx);
                rx
            }
        };

        Ok(broadcast_stream(rx))
    }
}

/// Creates the channel and subscribes once before handing the reader task
/// its sender, so the reader never observes a zero receiver count before
/// the caller has had a chance to subscribe.
fn spawn_reader(client: Client, pool: String) -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
    let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
    let reader_tx = tx.clone();
    tokio::spawn(async move {
        run_reader(client, pool, reader_tx).await;
    });
    (tx, rx)
}

async fn run_reader(client: Client, pool: String, tx: broadcast::Sender<()>) {
    let channel = format!("{pool}:queued");

    loop {
        if tx.receiver_count() == 0 {
            debug!(pool = %pool, "no subscribers left, releasing has-queued connection");
            return;
        }

        let mut pubsub = match client.get_async_pubsub().await {
            Ok(pubsub) => pubsub,
            Err(err) => {
                warn!(pool = %pool, error = %redis_err(err), "has-queued connection failed, retrying");
                tokio::time::sleep(RETRY_BACKOFF).await;
                continue;
            }
        };

        if let Err(err) = pubsub.subscribe(&channel).await {
            warn!(pool = %pool, error = %redis_err(err), "has-queued subscribe failed, retrying");
            tokio::time::sleep(RETRY_BACKOFF).await;
            continue;
        }
        debug!(pool = %pool, channel = %channel, "subscribed to has-queued channel");

        let mut messages = pubsub.on_message();
        loop {
            if tx.receiver_count() == 0 {
                return;
            }
            match messages.next().await {
                Some(_) => {
                    let _ = tx.send(());
                }
                None => break,
            }
        }
        drop(messages);

        warn!(pool = %pool, "has-queued connection closed, reconnecting");
        tokio::time::sleep(RETRY_BACKOFF).await;
    }
}

fn broadcast_stream(rx: broadcast::Receiver<()>) -> BoxStream<'static, ()> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(()) => return Some(((), rx)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
