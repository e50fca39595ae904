//! 설정 관리.
//!
//! 설정 파일(TOML, 선택)과 환경 변수(`COLLECTOR__SECTION__KEY`)를 합쳐
//! [`AppConfig`]를 만듭니다. `.env` 파일이 있으면 먼저 읽습니다.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::crypto::{AccountKeyHasher, TokenEncryptor};
use crate::error::{TraderError, TraderResult};
use crate::logging::{mask_account_number, mask_app_key};

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/collector.toml";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// Redis 설정
    #[serde(default)]
    pub redis: RedisConfig,
    /// KIS API 설정
    #[serde(default)]
    pub kis: KisSettings,
    /// 토큰 암호화/해시 비밀값
    pub secrets: SecretsConfig,
    /// 배치 작업 설정
    #[serde(default)]
    pub jobs: JobsConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// 연결 URL (postgres://...)
    pub url: String,
    /// 최대 연결 수
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_connection_timeout() -> u64 {
    30
}

/// Redis 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// 연결 URL (redis://host:port/db)
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// 잠금 키 접두사
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}
fn default_key_prefix() -> String {
    "collector".to_string()
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// KIS API 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KisSettings {
    /// 환경 ("real" 또는 "paper")
    #[serde(default = "default_environment")]
    pub environment: String,
    /// REST 기본 URL 직접 지정 (환경 기본값 대신 사용)
    #[serde(default)]
    pub base_url: Option<String>,
    /// 기본 계좌 이름 (없으면 첫 번째 계좌)
    #[serde(default)]
    pub default_account: Option<String>,
    /// HTS 사용자 ID
    #[serde(default)]
    pub user_id: Option<String>,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// 초당 최대 요청 수
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// 계좌 목록
    #[serde(default)]
    pub accounts: Vec<AccountSettings>,
}

fn default_environment() -> String {
    "real".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_requests_per_second() -> u32 {
    20
}

impl Default for KisSettings {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            base_url: None,
            default_account: None,
            user_id: None,
            timeout_secs: default_timeout(),
            requests_per_second: default_requests_per_second(),
            accounts: Vec::new(),
        }
    }
}

impl KisSettings {
    /// 요청 타임아웃을 Duration으로 반환
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// KIS 계좌 설정.
#[derive(Clone, Deserialize, Serialize)]
pub struct AccountSettings {
    /// 계좌 이름 (예: "main")
    pub name: String,
    /// 계좌번호 (예: "12345678-01")
    pub account_number: String,
    /// 앱키
    pub app_key: String,
    /// 앱시크릿
    pub app_secret: String,
}

impl std::fmt::Debug for AccountSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSettings")
            .field("name", &self.name)
            .field("account_number", &mask_account_number(&self.account_number))
            .field("app_key", &mask_app_key(&self.app_key))
            .finish_non_exhaustive()
    }
}

impl AccountSettings {
    /// 환경 변수에서 단일 계좌를 읽습니다.
    ///
    /// # 환경 변수
    /// - `KIS_APP_KEY`, `KIS_APP_SECRET`, `KIS_ACCOUNT_NUMBER` (필수)
    /// - `KIS_ACCOUNT_NAME` (선택, 기본 "default")
    pub fn from_env() -> Option<Self> {
        let app_key = std::env::var("KIS_APP_KEY").ok()?;
        let app_secret = std::env::var("KIS_APP_SECRET").ok()?;
        let account_number = std::env::var("KIS_ACCOUNT_NUMBER").ok()?;
        let name = std::env::var("KIS_ACCOUNT_NAME").unwrap_or_else(|_| "default".to_string());

        Some(Self {
            name,
            account_number,
            app_key,
            app_secret,
        })
    }
}

/// 비밀값 설정.
#[derive(Clone, Deserialize, Serialize)]
pub struct SecretsConfig {
    /// Base64 인코딩된 32바이트 AES-256 키
    pub token_key: String,
    /// 계좌 해시용 HMAC 비밀키 (32자 이상)
    pub key_hash_secret: String,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretsConfig { .. }")
    }
}

/// 배치 작업 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// 관심종목 조회 페이지 크기
    #[serde(default = "default_instrument_page_size")]
    pub instrument_page_size: usize,
    /// 백필 시작일
    #[serde(default = "default_backfill_start")]
    pub backfill_start_date: NaiveDate,
    /// 분산 잠금 최대 유지 시간 (초)
    #[serde(default = "default_lock_at_most")]
    pub lock_at_most_secs: u64,
    /// 분산 잠금 최소 유지 시간 (초)
    #[serde(default = "default_lock_at_least")]
    pub lock_at_least_secs: u64,
    /// 백필 실행 시각 (Asia/Seoul)
    #[serde(default = "default_backfill_time")]
    pub backfill_time: NaiveTime,
    /// 일일 수집 실행 시각 (Asia/Seoul)
    #[serde(default = "default_collection_time")]
    pub collection_time: NaiveTime,
}

fn default_instrument_page_size() -> usize {
    100
}
fn default_backfill_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
}
fn default_lock_at_most() -> u64 {
    30 * 60
}
fn default_lock_at_least() -> u64 {
    5 * 60
}
fn default_backfill_time() -> NaiveTime {
    NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default()
}
fn default_collection_time() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 30, 0).unwrap_or_default()
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            instrument_page_size: default_instrument_page_size(),
            backfill_start_date: default_backfill_start(),
            lock_at_most_secs: default_lock_at_most(),
            lock_at_least_secs: default_lock_at_least(),
            backfill_time: default_backfill_time(),
            collection_time: default_collection_time(),
        }
    }
}

impl JobsConfig {
    /// 분산 잠금 최대 유지 시간
    pub fn lock_at_most(&self) -> Duration {
        Duration::from_secs(self.lock_at_most_secs)
    }

    /// 분산 잠금 최소 유지 시간
    pub fn lock_at_least(&self) -> Duration {
        Duration::from_secs(self.lock_at_least_secs)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 환경 변수만 사용합니다. `DATABASE_URL`, `REDIS_URL`은
    /// 접두사 없이도 인식합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> TraderResult<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("COLLECTOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?;

        let mut config: AppConfig = builder.build()?.try_deserialize()?;

        if config.kis.accounts.is_empty() {
            if let Some(account) = AccountSettings::from_env() {
                config.kis.accounts.push(account);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> TraderResult<Self> {
        Self::load(DEFAULT_CONFIG_PATH)
    }

    /// 기동 전 설정 검증.
    pub fn validate(&self) -> TraderResult<()> {
        if self.kis.accounts.is_empty() {
            return Err(TraderError::Config(
                "KIS 계좌가 하나도 설정되지 않았습니다 (kis.accounts 또는 KIS_APP_KEY 등)"
                    .to_string(),
            ));
        }

        if let Some(ref name) = self.kis.default_account {
            if !self.kis.accounts.iter().any(|a| &a.name == name) {
                return Err(TraderError::Config(format!(
                    "기본 계좌 '{}'가 계좌 목록에 없습니다",
                    name
                )));
            }
        }

        if self.kis.requests_per_second == 0 {
            return Err(TraderError::Config(
                "kis.requests_per_second는 0보다 커야 합니다".to_string(),
            ));
        }

        if self.jobs.instrument_page_size == 0 {
            return Err(TraderError::Config(
                "jobs.instrument_page_size는 0보다 커야 합니다".to_string(),
            ));
        }

        if self.jobs.lock_at_least_secs > self.jobs.lock_at_most_secs {
            return Err(TraderError::Config(
                "jobs.lock_at_least_secs가 lock_at_most_secs보다 큽니다".to_string(),
            ));
        }

        TokenEncryptor::new(&self.secrets.token_key)?;
        AccountKeyHasher::new(&self.secrets.key_hash_secret)?;

        Ok(())
    }
}
