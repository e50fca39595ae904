//! 증권사 커넥터.

pub mod kis;

pub use kis::{
    AccessTokenProvider, DailyPriceApi, DailyPriceEndpoint, KisConfig, KisEnvironment,
    KisPriceClient, KisTokenIssuer, TokenCache,
};
