//! 수집 작업 설정 모듈.

use chrono::{NaiveDate, NaiveTime};
use std::time::Duration;
use trader_core::{AppConfig, JobsConfig};

/// 일일 수집 작업 잠금 이름
pub const COLLECT_JOB: &str = "collectDailyPrices";
/// 백필 작업 잠금 이름
pub const BACKFILL_JOB: &str = "backfillHistoricalPrices";

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 배치 실행 설정
    pub batch: BatchConfig,
    /// 분산 잠금 설정
    pub lock: LockConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 배치 실행 설정
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// 관심종목 페이지 크기
    pub instrument_page_size: usize,
    /// 증권사 일봉 조회 한 페이지의 최대 행 수
    pub price_page_size: usize,
    /// 백필 시작일
    pub backfill_start_date: NaiveDate,
}

/// 분산 잠금 설정
#[derive(Debug, Clone, Copy)]
pub struct LockConfig {
    /// 최대 유지 시간 (저장소가 만료시킴)
    pub at_most: Duration,
    /// 최소 유지 시간 (해제 후에도 유지)
    pub at_least: Duration,
}

/// 데몬 모드 설정 (Asia/Seoul 기준 시각)
#[derive(Debug, Clone, Copy)]
pub struct DaemonConfig {
    /// 백필 실행 시각
    pub backfill_time: NaiveTime,
    /// 일일 수집 실행 시각
    pub collection_time: NaiveTime,
}

/// KIS 일봉 조회 API의 페이지 크기
pub const PRICE_PAGE_SIZE: usize = 100;

impl CollectorConfig {
    /// 애플리케이션 설정에서 생성
    pub fn from_app(config: &AppConfig) -> Self {
        Self::from_jobs(&config.jobs)
    }

    /// `[jobs]` 섹션에서 생성
    pub fn from_jobs(jobs: &JobsConfig) -> Self {
        Self {
            batch: BatchConfig {
                instrument_page_size: jobs.instrument_page_size.max(1),
                price_page_size: PRICE_PAGE_SIZE,
                backfill_start_date: jobs.backfill_start_date,
            },
            lock: LockConfig {
                at_most: jobs.lock_at_most(),
                at_least: jobs.lock_at_least(),
            },
            daemon: DaemonConfig {
                backfill_time: jobs.backfill_time,
                collection_time: jobs.collection_time,
            },
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self::from_jobs(&JobsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.batch.instrument_page_size, 100);
        assert_eq!(config.batch.price_page_size, 100);
        assert_eq!(
            config.batch.backfill_start_date,
            NaiveDate::from_ymd_opt(1900, 1, 1).unwrap()
        );
        assert_eq!(config.lock.at_most, Duration::from_secs(30 * 60));
        assert_eq!(config.lock.at_least, Duration::from_secs(5 * 60));
        assert_eq!(config.daemon.collection_time, NaiveTime::from_hms_opt(18, 30, 0).unwrap());
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let jobs = JobsConfig {
            instrument_page_size: 0,
            ..Default::default()
        };
        assert_eq!(CollectorConfig::from_jobs(&jobs).batch.instrument_page_size, 1);
    }
}
