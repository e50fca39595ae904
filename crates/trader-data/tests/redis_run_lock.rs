//! 실제 Redis에 대한 실행 잠금 테스트.
//!
//! `REDIS_URL`(기본 redis://localhost:6379/0)의 Redis가 필요합니다:
//! `cargo test -p trader-data -- --ignored`

use std::time::Duration;
use trader_core::{ExpiringStore, RedisConfig, RunLock, RunLockProvider};
use trader_data::{RedisCache, RedisRunLockProvider};
use uuid::Uuid;

const LONG: Duration = Duration::from_secs(60);

async fn cache() -> RedisCache {
    let config = RedisConfig {
        url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".to_string()),
        key_prefix: format!("collector-test-{}", Uuid::new_v4()),
    };
    RedisCache::connect(&config).await.unwrap()
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_second_holder_is_rejected_until_release() {
    let cache = cache().await;
    let a = RedisRunLockProvider::new(cache.clone(), "node-a");
    let b = RedisRunLockProvider::new(cache, "node-b");

    let lock = a.try_acquire("job", LONG, Duration::ZERO).await.unwrap().unwrap();
    assert!(b.try_acquire("job", LONG, Duration::ZERO).await.unwrap().is_none());

    a.release(lock).await.unwrap();
    assert!(b.try_acquire("job", LONG, Duration::ZERO).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_release_keeps_remaining_at_least_hold() {
    let cache = cache().await;
    let provider = RedisRunLockProvider::new(cache, "node-a");

    let lock = provider
        .try_acquire("job", LONG, Duration::from_millis(400))
        .await
        .unwrap()
        .unwrap();
    provider.release(lock).await.unwrap();

    // 만료가 at_most(60초)가 아니라 남은 at_least로 줄어듦
    assert!(provider.try_acquire("job", LONG, Duration::ZERO).await.unwrap().is_none());
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(provider.try_acquire("job", LONG, Duration::ZERO).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_release_by_other_holder_is_ignored() {
    let cache = cache().await;
    let provider = RedisRunLockProvider::new(cache, "node-a");

    let lock = provider.try_acquire("job", LONG, Duration::ZERO).await.unwrap().unwrap();
    let forged = RunLock {
        token: "node-b:forged".to_string(),
        ..lock.clone()
    };
    provider.release(forged).await.unwrap();

    assert!(provider.try_acquire("job", LONG, Duration::ZERO).await.unwrap().is_none());
    provider.release(lock).await.unwrap();
    assert!(provider.try_acquire("job", LONG, Duration::ZERO).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_sub_second_ttl_expires() {
    let cache = cache().await;
    let key = format!("collector-test:{}", Uuid::new_v4());

    cache
        .set_with_ttl(&key, "value", Duration::from_millis(200))
        .await
        .unwrap();
    assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("value"));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(cache.get(&key).await.unwrap(), None);
}
