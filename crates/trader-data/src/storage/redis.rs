//! Redis 기반 TTL 캐시와 분산 실행 잠금.
//!
//! - [`RedisCache`]: 접근 토큰 등 만료 시간이 있는 값 저장 ([`ExpiringStore`])
//! - [`RedisRunLockProvider`]: 작업 이름 단위 분산 잠금 ([`RunLockProvider`])

use crate::error::{DataError, Result};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, Script};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use trader_core::{ExpiringStore, RedisConfig, RunLock, RunLockProvider, StorageResult};
use uuid::Uuid;

/// 해제 스크립트.
///
/// 보유자가 일치할 때만 동작합니다. 최소 유지 시간이 남아 있으면 그만큼으로
/// 만료를 줄이고, 아니면 키를 삭제합니다.
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    local hold = tonumber(ARGV[2])
    if hold > 0 then
        return redis.call('PEXPIRE', KEYS[1], hold)
    end
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// 만료 시간을 밀리초로 변환합니다. 0이 되지 않도록 최소 1ms.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis 연결 래퍼.
#[derive(Clone)]
pub struct RedisCache {
    connection: Arc<RwLock<MultiplexedConnection>>,
    key_prefix: String,
}

impl RedisCache {
    /// 새로운 Redis 연결을 생성합니다.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        info!("Connecting to Redis...");

        let client =
            Client::open(config.url.as_str()).map_err(|e| DataError::CacheError(e.to_string()))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("Redis connection established");

        Ok(Self {
            connection: Arc::new(RwLock::new(connection)),
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// 문자열 값을 가져옵니다.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.write().await;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// TTL과 함께 문자열 값을 저장합니다 (PSETEX, 밀리초 단위).
    pub async fn set_raw_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.write().await;
        let _: () = conn.pset_ex(key, value, ttl_millis(ttl)).await?;
        Ok(())
    }

    /// 분산 잠금용 키.
    fn lock_key(prefix: &str, lock_name: &str) -> String {
        format!("{}:lock:{}", prefix, lock_name)
    }

    /// 분산 잠금 획득 (SET NX PX).
    #[instrument(skip(self, token))]
    pub async fn acquire_lock(&self, lock_name: &str, token: &str, ttl: Duration) -> Result<bool> {
        let key = Self::lock_key(&self.key_prefix, lock_name);
        let mut conn = self.connection.write().await;

        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut *conn)
            .await?;

        Ok(result.is_some())
    }

    /// 분산 잠금 해제. `hold`가 남아 있으면 그만큼 만료만 줄입니다.
    #[instrument(skip(self, token))]
    pub async fn release_lock(&self, lock_name: &str, token: &str, hold: Duration) -> Result<bool> {
        let key = Self::lock_key(&self.key_prefix, lock_name);
        let mut conn = self.connection.write().await;

        let result: i64 = Script::new(RELEASE_SCRIPT)
            .key(&key)
            .arg(token)
            .arg(hold.as_millis() as u64)
            .invoke_async(&mut *conn)
            .await?;

        Ok(result > 0)
    }
}

#[async_trait]
impl ExpiringStore for RedisCache {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.get_raw(key).await?)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        Ok(self.set_raw_with_ttl(key, value, ttl).await?)
    }
}

/// Redis 기반 분산 실행 잠금.
#[derive(Clone)]
pub struct RedisRunLockProvider {
    cache: RedisCache,
    holder_id: String,
}

impl RedisRunLockProvider {
    /// 보유자 ID는 잠금 값의 접두사로 쓰입니다 (예: 호스트명, 프로세스 ID).
    pub fn new(cache: RedisCache, holder_id: impl Into<String>) -> Self {
        Self {
            cache,
            holder_id: holder_id.into(),
        }
    }

    fn new_token(&self) -> String {
        format!("{}:{}", self.holder_id, Uuid::new_v4())
    }
}

#[async_trait]
impl RunLockProvider for RedisRunLockProvider {
    async fn try_acquire(
        &self,
        name: &str,
        at_most: Duration,
        at_least: Duration,
    ) -> StorageResult<Option<RunLock>> {
        let token = self.new_token();
        let acquired_at = Instant::now();

        if !self.cache.acquire_lock(name, &token, at_most).await? {
            return Ok(None);
        }

        debug!(lock = name, "Run lock acquired");
        Ok(Some(RunLock {
            name: name.to_string(),
            token,
            acquired_at,
            at_least,
            at_most,
        }))
    }

    async fn release(&self, lock: RunLock) -> StorageResult<()> {
        let hold = lock.remaining_hold().unwrap_or(Duration::ZERO);
        let released = self.cache.release_lock(&lock.name, &lock.token, hold).await?;

        if released {
            debug!(lock = %lock.name, hold_ms = hold.as_millis() as u64, "Run lock released");
        } else {
            debug!(lock = %lock.name, "Run lock already expired or taken over");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key() {
        assert_eq!(
            RedisCache::lock_key("collector", "collectDailyPrices"),
            "collector:lock:collectDailyPrices"
        );
    }

    #[test]
    fn test_ttl_keeps_sub_second_precision() {
        assert_eq!(ttl_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(ttl_millis(Duration::from_millis(250)), 250);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_secs(u64::MAX)), u64::MAX);
    }
}
