//! 시세 수집기 저장소.
//!
//! 이 crate는 `trader-core`의 저장소 trait 구현을 제공합니다:
//! - PostgreSQL 일봉 시세 저장소 (종목 단위 트랜잭션)
//! - PostgreSQL 관심종목 repository (키셋 페이지 조회)
//! - Redis TTL 캐시 (토큰 캐시)
//! - Redis 분산 실행 잠금

pub mod error;
pub mod storage;

pub use error::{DataError, Result};
pub use storage::{
    Database, InstrumentRecord, PgInstrumentRepository, PgPriceStore, PgPriceTransaction,
    RedisCache, RedisRunLockProvider,
};
