//! Shows tagged dispatch: a producer enqueues objects tagged by customer,
//! and a consumer batches every object for the same customer into one
//! claim instead of processing them one at a time.
//!
//! Run with `RUST_LOG=debug cargo run -p tagged-worker`.

use std::collections::HashMap;

use futures::StreamExt;
use objectpool_core::{ObjectPool, PoolConfig, TaggedDispatchConfig};
use objectpool_testing::MemoryPoolStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = MemoryPoolStore::new();
    let pool = ObjectPool::new("invoices", store, PoolConfig::default());

    for (customer, invoice) in [
        ("acme", "invoice-1"),
        ("acme", "invoice-2"),
        ("acme", "invoice-3"),
        ("globex", "invoice-4"),
    ] {
        let mut tags = HashMap::new();
        tags.insert("customer".to_string(), customer.to_string());
        pool.queue_tagged(tags, vec![invoice.to_string()], 0).await?;
    }

    let config = TaggedDispatchConfig {
        tag: "customer".to_string(),
        max_object_per_claim: 10,
        max_claimed_count: 4,
        queue: None,
    };

    let mut claims = pool.dispatch_tagged_claims(config);
    let mut batches_seen = 0;

    while let Some(claim) = claims.next().await {
        println!("claimed batch for one customer: {:?}", claim.objects);
        batches_seen += 1;
        claim.release().await;

        if batches_seen >= 2 {
            break;
        }
    }

    Ok(())
}
