//! 작업 단위 실행 잠금.
//!
//! 여러 인스턴스가 같은 스케줄로 떠 있어도 한 작업은 동시에 한 곳에서만
//! 실행됩니다. 잠금 획득에 실패하면(다른 보유자, 저장소 장애 모두) 실행을
//! 건너뜁니다.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use trader_core::{RunLock, RunLockProvider, StorageResult};

use crate::config::{LockConfig, BACKFILL_JOB, COLLECT_JOB};
use crate::runner::BatchRunner;
use crate::{BatchOutcome, Result};

/// 잠금 보호 실행 결과.
#[derive(Debug, PartialEq, Eq)]
pub enum JobRun<T> {
    /// 잠금을 얻어 실행함
    Executed(T),
    /// 다른 보유자가 있거나 잠금 저장소 장애로 건너뜀
    Skipped,
}

impl<T> JobRun<T> {
    pub fn is_executed(&self) -> bool {
        matches!(self, JobRun::Executed(_))
    }

    pub fn executed(self) -> Option<T> {
        match self {
            JobRun::Executed(value) => Some(value),
            JobRun::Skipped => None,
        }
    }
}

/// 잠금을 얻은 경우에만 `job`을 실행합니다.
///
/// 본문이 끝나면 잠금을 해제하며, `at_least`가 남아 있으면 그 시간만큼은
/// 다른 인스턴스가 다시 획득하지 못합니다. 해제 실패는 경고만 남깁니다
/// (최악의 경우 `at_most` 후 저장소에서 만료).
pub async fn run_locked<F, Fut, T>(
    provider: &dyn RunLockProvider,
    name: &str,
    at_most: Duration,
    at_least: Duration,
    job: F,
) -> JobRun<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let lock = match provider.try_acquire(name, at_most, at_least).await {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            info!(lock = name, "Job is running elsewhere, skipping");
            return JobRun::Skipped;
        }
        Err(e) => {
            error!(lock = name, error = %e, "Failed to acquire run lock, skipping");
            return JobRun::Skipped;
        }
    };

    let output = job().await;

    if let Err(e) = provider.release(lock).await {
        warn!(lock = name, error = %e, "Failed to release run lock");
    }

    JobRun::Executed(output)
}

/// 잠금으로 보호되는 두 배치 작업.
pub struct LockedJobs {
    runner: Arc<BatchRunner>,
    locks: Arc<dyn RunLockProvider>,
    lock: LockConfig,
}

impl LockedJobs {
    pub fn new(runner: Arc<BatchRunner>, locks: Arc<dyn RunLockProvider>, lock: LockConfig) -> Self {
        Self { runner, locks, lock }
    }

    /// 일일 수집.
    pub async fn collect_daily_prices(&self) -> JobRun<Result<BatchOutcome>> {
        let runner = self.runner.clone();
        self.guarded(COLLECT_JOB, || async move { runner.run_collection().await })
            .await
    }

    /// 과거 시세 백필.
    pub async fn backfill_historical_prices(&self) -> JobRun<Result<BatchOutcome>> {
        let runner = self.runner.clone();
        self.guarded(BACKFILL_JOB, || async move { runner.run_backfill().await })
            .await
    }

    async fn guarded<F, Fut>(&self, name: &str, job: F) -> JobRun<Result<BatchOutcome>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BatchOutcome>>,
    {
        let run = run_locked(
            self.locks.as_ref(),
            name,
            self.lock.at_most,
            self.lock.at_least,
            job,
        )
        .await;

        if let JobRun::Executed(Err(ref e)) = run {
            error!(job = name, alert = true, error = %e, "Batch aborted");
        }
        run
    }
}

/// 단일 프로세스용 잠금 제공자.
///
/// Redis 없이 실행하거나 테스트할 때 씁니다. 동작은 Redis 구현과 같습니다:
/// 만료는 `at_most`, 해제 후에도 `at_least`까지는 유지됩니다.
#[derive(Debug, Default)]
pub struct LocalRunLockProvider {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    counter: std::sync::atomic::AtomicU64,
}

impl LocalRunLockProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunLockProvider for LocalRunLockProvider {
    async fn try_acquire(
        &self,
        name: &str,
        at_most: Duration,
        at_least: Duration,
    ) -> StorageResult<Option<RunLock>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if let Some((_, expires_at)) = entries.get(name) {
            if *expires_at > now {
                return Ok(None);
            }
        }

        let seq = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let token = format!("local:{}", seq);
        entries.insert(name.to_string(), (token.clone(), now + at_most));

        Ok(Some(RunLock {
            name: name.to_string(),
            token,
            acquired_at: now,
            at_least,
            at_most,
        }))
    }

    async fn release(&self, lock: RunLock) -> StorageResult<()> {
        let mut entries = self.entries.lock().await;

        let held = matches!(entries.get(&lock.name), Some((token, _)) if *token == lock.token);
        if !held {
            debug!(lock = %lock.name, "Run lock already expired or taken over");
            return Ok(());
        }

        match lock.remaining_hold() {
            Some(hold) => {
                entries.insert(lock.name.clone(), (lock.token, Instant::now() + hold));
            }
            None => {
                entries.remove(&lock.name);
            }
        }
        Ok(())
    }
}
