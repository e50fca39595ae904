//! 저장소 구현.
//!
//! - PostgreSQL: 관심종목, 일봉 시세
//! - Redis: 토큰 캐시, 분산 실행 잠금

pub mod daily_price;
pub mod database;
pub mod instrument;
pub mod redis;

pub use daily_price::{PgPriceStore, PgPriceTransaction};
pub use database::Database;
pub use instrument::{InstrumentRecord, PgInstrumentRepository};
pub use self::redis::{RedisCache, RedisRunLockProvider};
