use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use objectpool_core::{ClaimState, DispatchConfig, ObjectPool, PoolConfig, TaggedDispatchConfig};
use objectpool_testing::MemoryPoolStore;

fn pool(ttl_seconds: u64) -> std::sync::Arc<ObjectPool> {
    let store = MemoryPoolStore::new();
    ObjectPool::new("orders", store, PoolConfig::new().with_claim_ttl_seconds(ttl_seconds))
}

#[tokio::test]
async fn queue_then_claim_then_release_empties_the_pool() {
    let pool = pool(30);

    let queued = pool.queue(vec!["order-1".to_string()]).await.unwrap();
    assert_eq!(queued, vec!["order-1".to_string()]);

    // Re-queuing the same object is a no-op (invariant 1: P:all enforces uniqueness).
    let requeued = pool.queue(vec!["order-1".to_string()]).await.unwrap();
    assert!(requeued.is_empty());

    let mut claims = pool.claim(5).await.unwrap();
    assert_eq!(claims.len(), 1);
    let claim = claims.pop().unwrap();
    assert_eq!(claim.state(), ClaimState::Claimed);
    assert_eq!(claim.objects.as_slice(), ["order-1".to_string()]);

    assert!(claim.release().await);
    assert_eq!(claim.state(), ClaimState::Released);

    // Released objects leave the pool entirely and can be queued again.
    let requeued_after_release = pool.queue(vec!["order-1".to_string()]).await.unwrap();
    assert_eq!(requeued_after_release, vec!["order-1".to_string()]);
}

#[tokio::test]
async fn claim_with_nothing_queued_returns_empty() {
    let pool = pool(30);
    let claims = pool.claim(3).await.unwrap();
    assert!(claims.is_empty());
}

#[tokio::test]
async fn requeue_with_delay_parks_object_until_it_matures() {
    let pool = pool(30);
    pool.queue(vec!["order-2".to_string()]).await.unwrap();

    let claim = pool.claim(1).await.unwrap().pop().unwrap();
    assert!(claim.requeue(60).await);
    assert_eq!(claim.state(), ClaimState::Requeued);

    // Still delayed: clean() should not surface it yet.
    let cleaned = pool.clean().await.unwrap();
    assert!(cleaned.is_empty());

    // Nothing claimable while delayed.
    assert!(pool.claim(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn crashed_consumer_session_is_reclaimed_by_the_janitor() {
    let store = MemoryPoolStore::new();
    let pool = ObjectPool::new("orders", store.clone(), PoolConfig::new().with_claim_ttl_seconds(30));

    pool.queue(vec!["order-3".to_string()]).await.unwrap();
    let claim = pool.claim(1).await.unwrap().pop().unwrap();

    // Simulate a crashed worker: the lease disappears without release/requeue.
    store.force_expire_session("orders", "order-3").await;

    let reclaimed = pool.clean().await.unwrap();
    assert_eq!(reclaimed, vec!["order-3".to_string()]);

    // The object is claimable again.
    let claims = pool.claim(1).await.unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].objects.as_slice(), ["order-3".to_string()]);
}

#[tokio::test]
async fn tagged_claim_pulls_the_whole_batch_for_one_tag_value() {
    let pool = pool(30);

    let mut acme = HashMap::new();
    acme.insert("customer".to_string(), "acme".to_string());
    pool.queue_tagged(
        acme,
        vec!["inv-1".to_string(), "inv-2".to_string(), "inv-3".to_string()],
        0,
    )
    .await
    .unwrap();

    let mut globex = HashMap::new();
    globex.insert("customer".to_string(), "globex".to_string());
    pool.queue_tagged(globex, vec!["inv-4".to_string()], 0)
        .await
        .unwrap();

    let claim = pool
        .claim_tagged("customer", 10)
        .await
        .unwrap()
        .expect("acme's batch should be claimable");

    let mut objects: Vec<String> = claim.objects.iter().cloned().collect();
    objects.sort();
    assert_eq!(objects, vec!["inv-1".to_string(), "inv-2".to_string(), "inv-3".to_string()]);
}

#[tokio::test]
async fn tagged_claim_of_one_is_untagged_and_does_not_pull_siblings() {
    let pool = pool(30);

    let mut tags = HashMap::new();
    tags.insert("customer".to_string(), "acme".to_string());
    pool.queue_tagged(tags, vec!["inv-1".to_string(), "inv-2".to_string()], 0)
        .await
        .unwrap();

    // maxCount == 1: the untagged path runs even though a tag is given.
    let claim = pool.claim_tagged("customer", 1).await.unwrap().unwrap();
    assert_eq!(claim.objects.len(), 1);
    assert_eq!(claim.objects[0], "inv-1");
}

#[tokio::test]
async fn auto_extend_keeps_a_claim_alive_past_its_original_ttl() {
    // ttl/2 is floored at ttl.max(2), so a ttl of 2 auto-extends at ~1s.
    let pool = pool(2);
    pool.queue(vec!["order-4".to_string()]).await.unwrap();

    let claim = pool.claim(1).await.unwrap().pop().unwrap();
    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert_eq!(claim.state(), ClaimState::Claimed);

    assert!(claim.release().await);
}

#[tokio::test]
async fn dispatch_claims_respects_the_max_claimed_count_cap() {
    let pool = pool(30);
    pool.queue(vec![
        "a".to_string(),
        "b".to_string(),
        "c".to_string(),
        "d".to_string(),
    ])
    .await
    .unwrap();

    let config = DispatchConfig {
        max_claimed_count: 2,
        queue: None,
    };
    let mut claims = pool.dispatch_claims(config);

    let first = claims.next().await.unwrap();
    let second = claims.next().await.unwrap();

    // Both slots are full: the dispatcher won't attempt another claim until
    // outstanding drops back to zero (the feedback edge, not a per-release signal).
    let blocked = tokio::time::timeout(Duration::from_millis(200), claims.next()).await;
    assert!(blocked.is_err(), "dispatcher issued a claim while both slots were full");

    assert!(first.release().await);
    let still_blocked = tokio::time::timeout(Duration::from_millis(200), claims.next()).await;
    assert!(
        still_blocked.is_err(),
        "dispatcher resignaled before outstanding count reached zero"
    );

    assert!(second.release().await);
    // Outstanding just dropped to zero: the feedback edge fires and both
    // remaining objects become claimable together.
    let third = tokio::time::timeout(Duration::from_secs(1), claims.next())
        .await
        .expect("feedback signal should unblock dispatch")
        .unwrap();
    let fourth = tokio::time::timeout(Duration::from_secs(1), claims.next())
        .await
        .expect("both remaining objects should be claimed together")
        .unwrap();

    let mut objects = vec![third.objects[0].clone(), fourth.objects[0].clone()];
    objects.sort();
    assert_eq!(objects, vec!["c".to_string(), "d".to_string()]);

    assert!(third.release().await);
    assert!(fourth.release().await);
}

#[tokio::test]
async fn dispatch_tagged_claims_batches_by_tag_value() {
    let pool = pool(30);

    let mut tags = HashMap::new();
    tags.insert("customer".to_string(), "acme".to_string());
    pool.queue_tagged(tags, vec!["inv-1".to_string(), "inv-2".to_string()], 0)
        .await
        .unwrap();

    let config = TaggedDispatchConfig {
        tag: "customer".to_string(),
        max_object_per_claim: 10,
        max_claimed_count: 5,
        queue: None,
    };
    let mut claims = pool.dispatch_tagged_claims(config);

    let claim = tokio::time::timeout(Duration::from_secs(1), claims.next())
        .await
        .expect("tagged batch should dispatch")
        .unwrap();
    assert_eq!(claim.objects.len(), 2);
    assert!(claim.release().await);
}
