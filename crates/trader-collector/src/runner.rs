//! 배치 실행기.
//!
//! 관심종목을 키셋 페이지로 순회하며 종목마다 독립된 트랜잭션에서 전략을
//! 실행합니다. 한 종목의 실패는 집계만 하고 다음 종목으로 넘어갑니다.

use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Seoul;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument as _};
use trader_core::{job_span, Instrument, InstrumentRepository, PriceStore};

use crate::config::{BatchConfig, BACKFILL_JOB, COLLECT_JOB};
use crate::error::FailureKind;
use crate::strategy::StrategyRegistry;
use crate::{BatchOutcome, CollectorError, Result};

/// 배치 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// 일일 수집: 백필이 끝난 종목의 당일 시세
    Collection,
    /// 백필: 아직 백필하지 않은 종목의 전체 이력
    Backfill,
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Collection => COLLECT_JOB,
            JobKind::Backfill => BACKFILL_JOB,
        }
    }

    /// 조회 대상 종목의 `backfill_completed` 값.
    fn reads_completed(&self) -> bool {
        matches!(self, JobKind::Collection)
    }
}

/// 오늘 날짜 (Asia/Seoul).
pub fn today_kst() -> NaiveDate {
    Utc::now().with_timezone(&Seoul).date_naive()
}

/// 배치 실행기.
pub struct BatchRunner {
    instruments: Arc<dyn InstrumentRepository>,
    store: Arc<dyn PriceStore>,
    strategies: StrategyRegistry,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(
        instruments: Arc<dyn InstrumentRepository>,
        store: Arc<dyn PriceStore>,
        strategies: StrategyRegistry,
        config: BatchConfig,
    ) -> Self {
        Self {
            instruments,
            store,
            strategies,
            config,
        }
    }

    /// 일일 수집 (오늘 하루).
    pub async fn run_collection(&self) -> Result<BatchOutcome> {
        self.run_collection_on(today_kst()).await
    }

    /// 지정한 날짜 하루를 수집합니다.
    pub async fn run_collection_on(&self, day: NaiveDate) -> Result<BatchOutcome> {
        self.run(JobKind::Collection, day, day).await
    }

    /// 백필 (설정된 시작일부터 오늘까지).
    pub async fn run_backfill(&self) -> Result<BatchOutcome> {
        self.run_backfill_until(today_kst()).await
    }

    /// 설정된 시작일부터 `end`까지 백필합니다.
    pub async fn run_backfill_until(&self, end: NaiveDate) -> Result<BatchOutcome> {
        self.run(JobKind::Backfill, self.config.backfill_start_date, end)
            .await
    }

    /// 관심종목 페이지 조회 실패만 배치를 중단시킵니다.
    async fn run(&self, job: JobKind, start: NaiveDate, end: NaiveDate) -> Result<BatchOutcome> {
        let started = Instant::now();
        let mut outcome = BatchOutcome::new();
        let mut after_id = None;
        let page_size = self.config.instrument_page_size;

        info!(job = job.name(), %start, %end, "Batch started");

        loop {
            let page = self
                .instruments
                .find_page(job.reads_completed(), after_id, page_size)
                .await
                .map_err(|e| {
                    error!(job = job.name(), alert = true, error = %e, "Failed to load instrument page");
                    CollectorError::from(e)
                })?;

            if page.is_empty() {
                break;
            }
            after_id = page.last().map(|i| i.id);

            for instrument in &page {
                self.visit(job, instrument, start, end, &mut outcome).await;
            }

            if page.len() < page_size {
                break;
            }
        }

        outcome.elapsed = started.elapsed();
        outcome.log_summary(job.name());
        Ok(outcome)
    }

    /// 종목 하나 처리. 에러는 여기서 모두 흡수합니다.
    async fn visit(
        &self,
        job: JobKind,
        instrument: &Instrument,
        start: NaiveDate,
        end: NaiveDate,
        outcome: &mut BatchOutcome,
    ) {
        if instrument.asset_type.is_none() {
            warn!(
                job = job.name(),
                id = instrument.id,
                stock_code = %instrument.stock_code,
                "Asset type is missing, skipping instrument"
            );
            outcome.record_skipped();
            return;
        }

        let span = job_span!(job.name(), instrument.stock_code, instrument.asset_type);
        let result = self.process(job, instrument, start, end).instrument(span).await;

        match result {
            Ok(saved) => outcome.record_success(saved),
            Err(e) => {
                let kind = e.failure_kind();
                match kind {
                    FailureKind::Recoverable => warn!(
                        job = job.name(),
                        stock_code = %instrument.stock_code,
                        error = %e,
                        "Broker request failed, will retry on next run"
                    ),
                    FailureKind::Critical => error!(
                        job = job.name(),
                        stock_code = %instrument.stock_code,
                        alert = true,
                        error = %e,
                        "Storage failure"
                    ),
                    FailureKind::Unexpected => error!(
                        job = job.name(),
                        stock_code = %instrument.stock_code,
                        error = %e,
                        "Unexpected failure"
                    ),
                }
                outcome.record_failure(kind);
            }
        }
    }

    /// 종목 하나를 독립 트랜잭션에서 수집합니다. 커밋 전 에러는 롤백됩니다.
    async fn process(
        &self,
        job: JobKind,
        instrument: &Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize> {
        let strategy = self.strategies.for_asset_type(instrument.asset_type)?;
        let mut tx = self.store.begin().await?;

        let saved = match job {
            JobKind::Collection => strategy.collect(instrument, tx.as_mut(), start, end).await?,
            JobKind::Backfill => {
                let saved = strategy.backfill(instrument, tx.as_mut(), start, end).await?;
                tx.mark_backfill_completed(instrument.id).await?;
                saved
            }
        };

        tx.commit().await?;
        Ok(saved)
    }
}
