//! 한국투자증권 (KIS) 시세 연동 모듈.
//!
//! 이 모듈은 한국투자증권 Open API의 일봉 시세 조회를 제공합니다.
//!
//! # 기능
//!
//! - OAuth 2.0 접근 토큰 발급
//! - 계좌별 토큰 캐시 (암호화 저장, 단일 발급)
//! - 국내 주식/지수, 해외 주식/지수 일봉 조회
//! - 초당 요청 수 제한
//! - 모의투자 지원
//!
//! # API 문서
//!
//! 공식 API 문서: <https://apiportal.koreainvestment.com/>
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use trader_exchange::connector::kis::{
//!     DailyPriceApi, DailyPriceEndpoint, KisConfig, KisPriceClient, KisTokenIssuer, TokenCache,
//! };
//!
//! let config = Arc::new(KisConfig::from_settings(&settings.kis)?);
//! let issuer = Arc::new(KisTokenIssuer::new(config.clone())?);
//! let tokens = Arc::new(TokenCache::new(config.clone(), issuer, store, encryptor, hasher));
//! let client = KisPriceClient::new(config, tokens)?;
//!
//! let bars = client
//!     .fetch_daily_prices(DailyPriceEndpoint::DomesticStock, &key, start, end)
//!     .await?;
//! ```

pub mod auth;
pub mod config;
pub mod daily_price;
pub mod rate_limit;
pub mod token_cache;

pub use auth::{build_headers, KisTokenIssuer, TokenIssuer, TokenResponse};
pub use config::{KisAccount, KisConfig, KisEnvironment};
pub use daily_price::{
    DailyPriceApi, DailyPriceEndpoint, DailyRow, DomesticIndexDailyRow, DomesticStockDailyRow,
    KisEnvelope, KisPriceClient, OverseasIndexDailyRow, OverseasStockDailyRow,
};
pub use rate_limit::RequestRateLimiter;
pub use token_cache::{
    AccessTokenProvider, AccountLockGuard, AccountLockProvider, InMemoryAccountLocks, TokenCache,
};

/// KIS 거래 ID (tr_id) 상수 모음.
///
/// 시세 조회 TR은 실전/모의 환경에서 동일합니다.
pub mod tr_id {
    /// 국내 주식 기간별 시세 (일/주/월/년)
    pub const KR_DAILY_CHART: &str = "FHKST03010100";

    /// 국내 업종 일자별 지수
    pub const KR_INDEX_DAILY: &str = "FHPUP02120000";

    /// 해외 주식 기간별 시세
    pub const US_DAILY_PRICE: &str = "HHDFS76240000";

    /// 해외 지수 기간별 시세 (일/주/월/년)
    pub const OVERSEAS_INDEX_DAILY: &str = "FHKST03030100";
}
