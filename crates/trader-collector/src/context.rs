//! 설정으로부터 실행 구성요소를 조립합니다.

use std::sync::Arc;
use tracing::info;
use trader_core::{AccountKeyHasher, AppConfig, TokenEncryptor};
use trader_data::{Database, PgInstrumentRepository, PgPriceStore, RedisCache, RedisRunLockProvider};
use trader_exchange::{KisConfig, KisPriceClient, KisTokenIssuer, TokenCache};

use crate::config::CollectorConfig;
use crate::lock::LockedJobs;
use crate::runner::BatchRunner;
use crate::strategy::StrategyRegistry;
use crate::{CollectorError, Result};

/// 조립된 실행 구성요소.
pub struct CollectorContext {
    pub config: CollectorConfig,
    pub database: Database,
    pub runner: Arc<BatchRunner>,
    pub jobs: LockedJobs,
}

impl CollectorContext {
    /// DB/Redis에 연결하고 토큰 캐시, 증권사 클라이언트, 전략, 실행기를 만듭니다.
    pub async fn build(app: &AppConfig) -> Result<Self> {
        let config = CollectorConfig::from_app(app);

        let database = Database::connect(&app.database).await?;
        let cache = RedisCache::connect(&app.redis).await?;

        let kis = Arc::new(
            KisConfig::from_settings(&app.kis).map_err(|e| CollectorError::Config(e.to_string()))?,
        );
        let encryptor = TokenEncryptor::new(&app.secrets.token_key)
            .map_err(|e| CollectorError::Config(e.to_string()))?;
        let hasher = AccountKeyHasher::new(&app.secrets.key_hash_secret)
            .map_err(|e| CollectorError::Config(e.to_string()))?;

        let issuer = Arc::new(KisTokenIssuer::new(kis.clone())?);
        let tokens = Arc::new(TokenCache::new(
            kis.clone(),
            issuer,
            Arc::new(cache.clone()),
            encryptor,
            hasher,
        ));
        let api = Arc::new(KisPriceClient::new(kis.clone(), tokens)?);

        let strategies = StrategyRegistry::kis(api, config.batch.price_page_size);
        let runner = Arc::new(BatchRunner::new(
            Arc::new(PgInstrumentRepository::new(&database)),
            Arc::new(PgPriceStore::new(&database)),
            strategies,
            config.batch.clone(),
        ));

        let holder = format!("collector-{}", std::process::id());
        let locks = Arc::new(RedisRunLockProvider::new(cache, holder));
        let jobs = LockedJobs::new(runner.clone(), locks, config.lock);

        info!(
            accounts = kis.accounts().len(),
            base_url = kis.rest_base_url(),
            "Collector context ready"
        );

        Ok(Self {
            config,
            database,
            runner,
            jobs,
        })
    }
}
