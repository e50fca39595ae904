//! 저장소 추상화.
//!
//! 수집 엔진이 의존하는 외부 저장소를 trait로 분리합니다:
//! - [`PriceStore`] / [`PriceTransaction`]: 종목 단위 트랜잭션 안에서 기존 날짜 조회, 일괄 저장
//! - [`InstrumentRepository`]: 관심종목 페이지 조회
//! - [`ExpiringStore`]: TTL 기반 키-값 저장소 (토큰 캐시)
//! - [`RunLockProvider`]: 이름 기반 분산 실행 잠금

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::{DailyBar, Instrument, InstrumentKey};

// =============================================================================
// 에러 타입
// =============================================================================

/// 저장소 에러.
///
/// 어떤 변형이든 영속 저장소가 정상이 아님을 뜻합니다.
#[derive(Debug, Error)]
pub enum StorageError {
    /// 연결 실패
    #[error("저장소 연결 에러: {0}")]
    Connection(String),

    /// 쿼리 실패
    #[error("쿼리 에러: {0}")]
    Query(String),

    /// 트랜잭션 실패
    #[error("트랜잭션 에러: {0}")]
    Transaction(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// 시세 저장소
// =============================================================================

/// 종목 단위로 독립된 트랜잭션을 여는 시세 저장소.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// 새 트랜잭션을 시작합니다. 다른 종목의 트랜잭션과 독립적입니다.
    async fn begin(&self) -> StorageResult<Box<dyn PriceTransaction>>;
}

/// 한 종목의 작업 단위.
///
/// `commit` 없이 drop되면 모든 변경이 롤백됩니다.
#[async_trait]
pub trait PriceTransaction: Send {
    /// `[start, end]` 구간에 이미 저장된 영업일 집합.
    async fn existing_dates(
        &mut self,
        key: &InstrumentKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StorageResult<HashSet<NaiveDate>>;

    /// 시세 일괄 저장. 실제로 삽입된 행 수를 반환합니다.
    async fn save_all(&mut self, key: &InstrumentKey, bars: &[DailyBar]) -> StorageResult<usize>;

    /// 관심종목의 백필 완료 플래그를 true로 바꿉니다.
    async fn mark_backfill_completed(&mut self, instrument_id: i64) -> StorageResult<()>;

    /// 커밋.
    async fn commit(self: Box<Self>) -> StorageResult<()>;
}

// =============================================================================
// 관심종목 저장소
// =============================================================================

/// 관심종목 조회.
#[async_trait]
pub trait InstrumentRepository: Send + Sync {
    /// `backfill_completed`가 일치하는 종목을 ID 오름차순으로 최대 `limit`개 조회합니다.
    ///
    /// `after_id`보다 큰 ID만 반환하는 키셋 방식이므로, 조회 도중 플래그가
    /// 바뀌어도 뒤 페이지의 종목을 건너뛰지 않습니다.
    async fn find_page(
        &self,
        backfill_completed: bool,
        after_id: Option<i64>,
        limit: usize,
    ) -> StorageResult<Vec<Instrument>>;
}

// =============================================================================
// TTL 키-값 저장소
// =============================================================================

/// 만료 시간이 있는 키-값 저장소.
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// 값 조회. 없거나 만료되었으면 `None`.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// TTL과 함께 저장.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()>;
}

// =============================================================================
// 분산 실행 잠금
// =============================================================================

/// 획득한 실행 잠금.
#[derive(Debug, Clone)]
pub struct RunLock {
    /// 잠금 이름 (작업 이름)
    pub name: String,
    /// 보유자 식별 값
    pub token: String,
    /// 획득 시각
    pub acquired_at: Instant,
    /// 최소 유지 시간
    pub at_least: Duration,
    /// 최대 유지 시간
    pub at_most: Duration,
}

impl RunLock {
    /// 해제 시점에 남겨둬야 할 최소 유지 시간. 이미 지났으면 `None`.
    pub fn remaining_hold(&self) -> Option<Duration> {
        let remaining = self.at_least.checked_sub(self.acquired_at.elapsed())?;
        (!remaining.is_zero()).then_some(remaining)
    }
}

/// 이름 기반 분산 실행 잠금 제공자.
///
/// 획득한 잠금은 `at_most` 후 저장소에서 자동 만료됩니다.
/// 해제하더라도 `at_least`가 지나기 전에는 다른 프로세스가 획득할 수 없습니다.
#[async_trait]
pub trait RunLockProvider: Send + Sync {
    /// 잠금 획득 시도. 다른 보유자가 있으면 `Ok(None)`.
    async fn try_acquire(
        &self,
        name: &str,
        at_most: Duration,
        at_least: Duration,
    ) -> StorageResult<Option<RunLock>>;

    /// 잠금 해제 (최소 유지 시간이 남았으면 그만큼 만료를 줄임).
    async fn release(&self, lock: RunLock) -> StorageResult<()>;
}
