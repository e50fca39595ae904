//! 증권사 연결 및 일봉 시세 조회.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - KIS 접근 토큰 발급 및 계좌별 토큰 캐시
//! - 자산 유형별 일봉 시세 조회 (`DailyPriceApi`)
//! - 요청 간격 제한 및 에러 처리

pub mod connector;
pub mod error;

pub use connector::kis::{
    AccessTokenProvider, AccountLockProvider, DailyPriceApi, DailyPriceEndpoint,
    InMemoryAccountLocks, KisAccount, KisConfig, KisEnvironment, KisPriceClient, KisTokenIssuer,
    TokenCache, TokenIssuer, TokenResponse,
};
pub use error::*;
