//! 계좌별 접근 토큰 캐시.
//!
//! - 빠른 경로: 캐시 저장소에서 암호화된 토큰을 읽어 복호화
//! - 느린 경로: 계좌별 잠금을 잡고 캐시를 다시 확인한 뒤, 그래도 없으면 발급
//!
//! 같은 계좌에 대한 동시 요청은 잠금에서 대기하다가 먼저 들어간 요청이
//! 저장한 토큰을 재사용하므로, 캐시 미스 한 번당 발급 호출은 한 번입니다.
//!
//! 캐시 키와 잠금 키에는 계좌번호 원문 대신 HMAC 해시를 사용합니다.
//!
//! 저장소에 접근할 수 없는 동안에는 마지막으로 발급한 토큰을 프로세스
//! 메모리에서 재사용합니다. 저장소 장애가 발급 폭주로 이어지지 않습니다.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use trader_core::{mask_account_number, AccountKeyHasher, ExpiringStore, TokenEncryptor};

use super::auth::TokenIssuer;
use super::config::{KisAccount, KisConfig};
use crate::ExchangeError;

/// 캐시 키 접두사.
pub const TOKEN_CACHE_PREFIX: &str = "kis:token:";

/// 만료 직전 거부를 피하기 위한 여유 시간 (분).
pub const TOKEN_EXPIRY_BUFFER_MINUTES: i64 = 5;

/// 시세 클라이언트가 사용하는 토큰 공급자.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// 기본 계좌의 접근 토큰.
    async fn access_token(&self) -> Result<String, ExchangeError>;
}

/// 계좌별 잠금을 보유하는 가드. drop되면 잠금이 풀립니다.
pub struct AccountLockGuard {
    _inner: Box<dyn Send>,
}

impl AccountLockGuard {
    /// 임의의 가드 값을 감쌉니다.
    pub fn new(inner: impl Send + 'static) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

/// 계좌 해시 단위의 배타 잠금 제공자.
#[async_trait]
pub trait AccountLockProvider: Send + Sync {
    /// 잠금을 획득할 때까지 대기합니다 (스핀 없음).
    async fn lock(&self, account_hash: &str) -> AccountLockGuard;
}

/// 프로세스 내 계좌별 잠금.
///
/// 계좌 수만큼 항목이 남고 제거되지 않습니다. 계좌가 고정된 경우를 위한
/// 구현이며, 계좌가 런타임에 추가/삭제된다면 시간 기반으로 항목을
/// 제거하는 구현으로 교체해야 합니다.
#[derive(Default)]
pub struct InMemoryAccountLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InMemoryAccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 잠금 테이블 크기.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

#[async_trait]
impl AccountLockProvider for InMemoryAccountLocks {
    async fn lock(&self, account_hash: &str) -> AccountLockGuard {
        let entry = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(account_hash.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        AccountLockGuard::new(entry.lock_owned().await)
    }
}

/// 저장소 조회 결과.
enum CachedToken {
    Hit(String),
    Miss,
    /// 저장소 장애
    Unavailable,
}

/// 계좌별 접근 토큰 캐시.
pub struct TokenCache {
    config: Arc<KisConfig>,
    issuer: Arc<dyn TokenIssuer>,
    store: Arc<dyn ExpiringStore>,
    encryptor: TokenEncryptor,
    hasher: AccountKeyHasher,
    locks: Arc<dyn AccountLockProvider>,
    /// 계좌 해시 → (토큰, 캐시 유효 시각). 저장소 장애 시에만 사용
    local: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl TokenCache {
    /// 새 토큰 캐시 생성 (프로세스 내 계좌 잠금 사용).
    pub fn new(
        config: Arc<KisConfig>,
        issuer: Arc<dyn TokenIssuer>,
        store: Arc<dyn ExpiringStore>,
        encryptor: TokenEncryptor,
        hasher: AccountKeyHasher,
    ) -> Self {
        Self {
            config,
            issuer,
            store,
            encryptor,
            hasher,
            locks: Arc::new(InMemoryAccountLocks::new()),
            local: Mutex::new(HashMap::new()),
        }
    }

    /// 계좌 잠금 제공자 교체.
    pub fn with_lock_provider(mut self, locks: Arc<dyn AccountLockProvider>) -> Self {
        self.locks = locks;
        self
    }

    /// 계좌(이름 또는 계좌번호)의 접근 토큰을 반환합니다.
    ///
    /// # Errors
    /// - `ExchangeError::AccountNotFound`: 일치하는 계좌 없음
    /// - `ExchangeError::Unauthorized`: 발급 응답이 없거나 토큰이 비어 있음
    /// - 발급 호출 자체의 에러는 그대로 전달
    pub async fn get_access_token(&self, account_ref: &str) -> Result<String, ExchangeError> {
        let account = self.config.find_account(account_ref).ok_or_else(|| {
            ExchangeError::AccountNotFound(format!(
                "설정된 계좌 중 '{}'와 일치하는 계좌가 없습니다",
                mask_account_number(account_ref)
            ))
        })?;

        self.token_for(account).await
    }

    async fn token_for(&self, account: &KisAccount) -> Result<String, ExchangeError> {
        let account_hash = self
            .hasher
            .hash(&account.account_number)
            .map_err(|e| ExchangeError::InvalidRequest(e.to_string()))?;
        let cache_key = format!("{}{}", TOKEN_CACHE_PREFIX, account_hash);

        if let Some(token) = self.lookup(&account_hash, &cache_key).await {
            return Ok(token);
        }

        let _guard = self.locks.lock(&account_hash).await;

        // 대기하는 동안 다른 요청이 발급했을 수 있음
        if let Some(token) = self.lookup(&account_hash, &cache_key).await {
            debug!(account = %account_hash, "Token refreshed by another caller");
            return Ok(token);
        }

        self.refresh(account, &account_hash, &cache_key).await
    }

    /// 저장소를 먼저 보고, 저장소 장애일 때만 프로세스 내 토큰을 봅니다.
    async fn lookup(&self, account_hash: &str, cache_key: &str) -> Option<String> {
        match self.read_cached(cache_key).await {
            CachedToken::Hit(token) => Some(token),
            CachedToken::Miss => None,
            CachedToken::Unavailable => {
                let local = self.local.lock().await;
                local
                    .get(account_hash)
                    .filter(|(_, valid_until)| *valid_until > Utc::now())
                    .map(|(token, _)| token.clone())
            }
        }
    }

    async fn refresh(
        &self,
        account: &KisAccount,
        account_hash: &str,
        cache_key: &str,
    ) -> Result<String, ExchangeError> {
        let issued_at = Utc::now();
        let response = self
            .issuer
            .issue(account)
            .await?
            .ok_or_else(|| ExchangeError::Unauthorized("토큰 발급 응답이 비어 있습니다".to_string()))?;

        let token = response
            .token()
            .ok_or_else(|| {
                ExchangeError::Unauthorized("토큰 발급 응답에 access_token이 없습니다".to_string())
            })?
            .to_string();

        let valid_until = response
            .expires_at(issued_at)
            .and_then(|expires_at| {
                expires_at.checked_sub_signed(ChronoDuration::minutes(TOKEN_EXPIRY_BUFFER_MINUTES))
            });
        let ttl = valid_until.and_then(|valid_until| {
            (valid_until - Utc::now())
                .to_std()
                .ok()
                .filter(|ttl| !ttl.is_zero())
        });

        match (ttl, valid_until) {
            (Some(ttl), Some(valid_until)) => {
                self.local
                    .lock()
                    .await
                    .insert(account_hash.to_string(), (token.clone(), valid_until));
                self.write_cached(cache_key, &token, ttl).await;
            }
            _ => warn!(
                account = %mask_account_number(&account.account_number),
                expires = ?response.access_token_token_expired,
                "Token expires too soon to cache, returning without caching"
            ),
        }

        Ok(token)
    }

    /// 캐시 조회. 복호화 실패는 캐시 미스로 취급합니다.
    async fn read_cached(&self, cache_key: &str) -> CachedToken {
        let encrypted = match self.store.get(cache_key).await {
            Ok(Some(value)) => value,
            Ok(None) => return CachedToken::Miss,
            Err(e) => {
                warn!(error = %e, "Token cache read failed, using in-process token");
                return CachedToken::Unavailable;
            }
        };

        match self.encryptor.decrypt(&encrypted) {
            Ok(token) => CachedToken::Hit(token),
            Err(e) => {
                warn!(error = %e, "Cached token could not be decrypted, ignoring entry");
                CachedToken::Miss
            }
        }
    }

    async fn write_cached(&self, cache_key: &str, token: &str, ttl: std::time::Duration) {
        let encrypted = match self.encryptor.encrypt(token) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Token encryption failed, not caching");
                return;
            }
        };

        match self.store.set_with_ttl(cache_key, &encrypted, ttl).await {
            Ok(()) => info!(ttl_secs = ttl.as_secs(), "Access token cached"),
            Err(e) => warn!(error = %e, "Token cache write failed"),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for TokenCache {
    async fn access_token(&self) -> Result<String, ExchangeError> {
        let account = self.config.default_account().ok_or_else(|| {
            ExchangeError::AccountNotFound("기본 계좌가 설정되지 않았습니다".to_string())
        })?;
        self.token_for(account).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::kis::auth::TokenResponse;
    use crate::connector::kis::config::KisEnvironment;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use trader_core::{crypto::generate_master_key, StorageError, StorageResult};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    /// TTL을 기록하는 메모리 저장소.
    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<HashMap<String, (String, Duration)>>,
        fail: bool,
    }

    #[async_trait]
    impl ExpiringStore for MemoryStore {
        async fn get(&self, key: &str) -> StorageResult<Option<String>> {
            if self.fail {
                return Err(StorageError::Connection("redis down".to_string()));
            }
            Ok(self.values.lock().await.get(key).map(|(v, _)| v.clone()))
        }

        async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
            if self.fail {
                return Err(StorageError::Connection("redis down".to_string()));
            }
            self.values
                .lock()
                .await
                .insert(key.to_string(), (value.to_string(), ttl));
            Ok(())
        }
    }

    /// 호출 횟수를 세는 발급기.
    struct CountingIssuer {
        calls: AtomicUsize,
        response: Option<TokenResponse>,
        delay: Duration,
    }

    impl CountingIssuer {
        fn new(response: Option<TokenResponse>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response,
                delay: Duration::ZERO,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenIssuer for CountingIssuer {
        async fn issue(&self, _account: &KisAccount) -> Result<Option<TokenResponse>, ExchangeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(self.response.clone().map(|mut r| {
                r.access_token = r.access_token.map(|t| format!("{}-{}", t, n));
                r
            }))
        }
    }

    fn valid_response() -> TokenResponse {
        TokenResponse {
            access_token: Some("token".to_string()),
            access_token_token_expired: Some("2099-12-31 23:59:59".to_string()),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(86400),
        }
    }

    fn config() -> Arc<KisConfig> {
        Arc::new(KisConfig::new(
            KisEnvironment::Paper,
            vec![
                KisAccount::new("main", "12345678-01", "PSmain", "secret"),
                KisAccount::new("isa", "87654321-01", "PSisa", "secret"),
            ],
        ))
    }

    fn cache(issuer: Arc<CountingIssuer>, store: Arc<MemoryStore>) -> TokenCache {
        TokenCache::new(
            config(),
            issuer,
            store,
            TokenEncryptor::new(&generate_master_key()).unwrap(),
            AccountKeyHasher::new(SECRET).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let issuer = Arc::new(CountingIssuer::new(Some(valid_response())));
        let store = Arc::new(MemoryStore::default());
        let cache = cache(issuer.clone(), store.clone());

        let first = cache.get_access_token("main").await.unwrap();
        let second = cache.get_access_token("12345678-01").await.unwrap();

        assert_eq!(first, "token-1");
        assert_eq!(second, "token-1");
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_value_is_encrypted_under_hashed_key() {
        let issuer = Arc::new(CountingIssuer::new(Some(valid_response())));
        let store = Arc::new(MemoryStore::default());
        let cache = cache(issuer, store.clone());

        cache.get_access_token("main").await.unwrap();

        let values = store.values.lock().await;
        let (key, (value, ttl)) = values.iter().next().unwrap();
        assert!(key.starts_with(TOKEN_CACHE_PREFIX));
        assert_eq!(key.len(), TOKEN_CACHE_PREFIX.len() + 16);
        assert!(!key.contains("12345678"));
        assert!(!value.contains("token"));
        assert!(*ttl > Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_single_flight_under_contention() {
        let issuer = Arc::new(CountingIssuer {
            delay: Duration::from_millis(50),
            ..CountingIssuer::new(Some(valid_response()))
        });
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(cache(issuer.clone(), store));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_access_token("main").await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-1");
        }
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn test_accounts_refresh_independently() {
        let issuer = Arc::new(CountingIssuer::new(Some(valid_response())));
        let store = Arc::new(MemoryStore::default());
        let cache = cache(issuer.clone(), store);

        cache.get_access_token("main").await.unwrap();
        cache.get_access_token("isa").await.unwrap();

        assert_eq!(issuer.calls(), 2);
    }

    #[tokio::test]
    async fn test_negative_ttl_returns_token_without_caching() {
        let expired = TokenResponse {
            access_token_token_expired: Some("2000-01-01 00:00:00".to_string()),
            ..valid_response()
        };
        let issuer = Arc::new(CountingIssuer::new(Some(expired)));
        let store = Arc::new(MemoryStore::default());
        let cache = cache(issuer.clone(), store.clone());

        assert_eq!(cache.get_access_token("main").await.unwrap(), "token-1");
        assert!(store.values.lock().await.is_empty());

        assert_eq!(cache.get_access_token("main").await.unwrap(), "token-2");
        assert_eq!(issuer.calls(), 2);
    }

    #[tokio::test]
    async fn test_expiry_within_buffer_is_not_cached() {
        let expires_in_three_minutes = TokenResponse {
            access_token_token_expired: None,
            expires_in: Some(180),
            ..valid_response()
        };
        let issuer = Arc::new(CountingIssuer::new(Some(expires_in_three_minutes)));
        let store = Arc::new(MemoryStore::default());
        let cache = cache(issuer, store.clone());

        cache.get_access_token("main").await.unwrap();
        assert!(store.values.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let issuer = Arc::new(CountingIssuer::new(Some(valid_response())));
        let cache = cache(issuer.clone(), Arc::new(MemoryStore::default()));

        let result = cache.get_access_token("nobody").await;
        assert!(matches!(result, Err(ExchangeError::AccountNotFound(_))));
        assert_eq!(issuer.calls(), 0);
    }

    #[tokio::test]
    async fn test_null_response_is_unauthorized() {
        let issuer = Arc::new(CountingIssuer::new(None));
        let cache = cache(issuer, Arc::new(MemoryStore::default()));

        let result = cache.get_access_token("main").await;
        assert!(matches!(result, Err(ExchangeError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_tokenless_response_is_unauthorized() {
        let tokenless = TokenResponse {
            access_token: None,
            ..valid_response()
        };
        let issuer = Arc::new(CountingIssuer::new(Some(tokenless)));
        let cache = cache(issuer, Arc::new(MemoryStore::default()));

        let result = cache.get_access_token("main").await;
        assert!(matches!(result, Err(ExchangeError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_store_failure_falls_back_to_issuer() {
        let issuer = Arc::new(CountingIssuer::new(Some(valid_response())));
        let store = Arc::new(MemoryStore {
            fail: true,
            ..Default::default()
        });
        let cache = cache(issuer.clone(), store);

        assert_eq!(cache.get_access_token("main").await.unwrap(), "token-1");
        assert_eq!(cache.get_access_token("main").await.unwrap(), "token-1");
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn test_single_flight_while_store_is_down() {
        let issuer = Arc::new(CountingIssuer {
            delay: Duration::from_millis(50),
            ..CountingIssuer::new(Some(valid_response()))
        });
        let store = Arc::new(MemoryStore {
            fail: true,
            ..Default::default()
        });
        let cache = Arc::new(cache(issuer.clone(), store));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_access_token("main").await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-1");
        }
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn test_short_lived_token_is_not_kept_in_process_while_store_is_down() {
        let expires_in_three_minutes = TokenResponse {
            access_token_token_expired: None,
            expires_in: Some(180),
            ..valid_response()
        };
        let issuer = Arc::new(CountingIssuer::new(Some(expires_in_three_minutes)));
        let store = Arc::new(MemoryStore {
            fail: true,
            ..Default::default()
        });
        let cache = cache(issuer.clone(), store);

        assert_eq!(cache.get_access_token("main").await.unwrap(), "token-1");
        assert_eq!(cache.get_access_token("main").await.unwrap(), "token-2");
        assert_eq!(issuer.calls(), 2);
    }

    #[tokio::test]
    async fn test_default_account_provider() {
        let issuer = Arc::new(CountingIssuer::new(Some(valid_response())));
        let cache = cache(issuer, Arc::new(MemoryStore::default()));

        assert_eq!(cache.access_token().await.unwrap(), "token-1");
    }

    #[tokio::test]
    async fn test_lock_table_keyed_by_hash() {
        let locks = InMemoryAccountLocks::new();
        {
            let _a = locks.lock("hash-a").await;
            let _b = locks.lock("hash-b").await;
        }
        let _again = locks.lock("hash-a").await;
        assert_eq!(locks.len().await, 2);
    }
}
