//! Shows the "seed & claim" idiom for a self-priming processor: a single
//! sentinel object is re-queued before every claim attempt, so the
//! dispatcher effectively polls on its own schedule even though nothing
//! ever calls `pool.queue()` from outside.
//!
//! Run with `RUST_LOG=debug cargo run -p seed-and-claim`.

use futures::StreamExt;
use objectpool_core::{DispatchConfig, ObjectPool, PoolConfig, QueueSeed};
use objectpool_testing::MemoryPoolStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = MemoryPoolStore::new();
    let pool = ObjectPool::new("poll-inbox", store, PoolConfig::new().with_claim_ttl_seconds(5));

    let config = DispatchConfig {
        max_claimed_count: 2,
        queue: Some(QueueSeed::new(vec!["poll-tick".to_string()])),
    };

    let mut claims = pool.dispatch_claims(config);
    let mut handled = 0;

    while let Some(claim) = claims.next().await {
        handled += 1;
        println!("claimed {:?} (session {})", claim.objects, claim.session);
        claim.release().await;

        if handled >= 5 {
            break;
        }
    }

    // `poll-tick` was requeued every attempt, so a sixth tick is already
    // waiting in the pool for whoever claims next.
    let remaining = pool.claim(1).await?;
    println!("pool still has {} object(s) queued", remaining.len());
    for claim in remaining {
        claim.release().await;
    }

    Ok(())
}
