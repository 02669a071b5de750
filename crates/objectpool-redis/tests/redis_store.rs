//! Integration tests against a real Redis instance. Skipped unless
//! `REDIS_URL` is set, the usual convention for gating a test on a live
//! database rather than mocking it.
//!
//! Run with: `REDIS_URL=redis://localhost cargo test -p objectpool-redis -- --ignored`

use std::collections::HashMap;

use objectpool_core::PoolStore;
use objectpool_redis::RedisPoolStore;
use uuid::Uuid;

async fn connect() -> Option<RedisPoolStore> {
    let url = std::env::var("REDIS_URL").ok()?;
    Some(RedisPoolStore::connect(&url).await.expect("failed to connect to Redis"))
}

fn unique_pool() -> String {
    format!("objectpool-test-{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore]
async fn queue_then_claim_then_release_round_trips() {
    let Some(store) = connect().await else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let pool = unique_pool();

    let queued = store
        .queue_tagged(&pool, HashMap::new(), vec!["o1".to_string()], 0)
        .await
        .unwrap();
    assert_eq!(queued, vec!["o1".to_string()]);

    let batch = store.claim(&pool, 5, 30, None).await.unwrap();
    assert_eq!(batch.objects, vec!["o1".to_string()]);

    let released = store
        .release(&pool, &batch.objects, &batch.session)
        .await
        .unwrap();
    assert!(released);

    // Released objects are gone entirely, so the same id can be re-queued.
    let requeued = store
        .queue_tagged(&pool, HashMap::new(), vec!["o1".to_string()], 0)
        .await
        .unwrap();
    assert_eq!(requeued, vec!["o1".to_string()]);
}

#[tokio::test]
#[ignore]
async fn extend_fails_once_the_session_no_longer_matches() {
    let Some(store) = connect().await else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let pool = unique_pool();

    store
        .queue_tagged(&pool, HashMap::new(), vec!["o2".to_string()], 0)
        .await
        .unwrap();
    let batch = store.claim(&pool, 1, 30, None).await.unwrap();

    let ok = store
        .extend(&pool, &batch.objects, &batch.session, 30)
        .await
        .unwrap();
    assert!(ok);

    let stale = store
        .extend(&pool, &batch.objects, "not-the-session", 30)
        .await
        .unwrap();
    assert!(!stale);
}

#[tokio::test]
#[ignore]
async fn tagged_claim_batches_same_tag_value() {
    let Some(store) = connect().await else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let pool = unique_pool();

    let mut tags = HashMap::new();
    tags.insert("customer".to_string(), "acme".to_string());
    store
        .queue_tagged(
            &pool,
            tags,
            vec!["inv-1".to_string(), "inv-2".to_string()],
            0,
        )
        .await
        .unwrap();

    let batch = store.claim(&pool, 10, 30, Some("customer")).await.unwrap();
    let mut objects = batch.objects.clone();
    objects.sort();
    assert_eq!(objects, vec!["inv-1".to_string(), "inv-2".to_string()]);
}

#[tokio::test]
#[ignore]
async fn clean_expired_reclaims_a_lease_that_vanished() {
    let Some(store) = connect().await else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let pool = unique_pool();

    store
        .queue_tagged(&pool, HashMap::new(), vec!["o3".to_string()], 0)
        .await
        .unwrap();
    let batch = store.claim(&pool, 1, 1, None).await.unwrap();
    assert_eq!(batch.objects, vec!["o3".to_string()]);

    // Lease TTL was 1s; wait it out rather than deleting the key directly,
    // since this test talks to real Redis.
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

    let reclaimed = store.clean_expired(&pool).await.unwrap();
    assert_eq!(reclaimed, vec!["o3".to_string()]);
}
