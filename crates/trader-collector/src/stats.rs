//! 배치 실행 결과 집계.

use serde::Serialize;
use std::time::Duration;

use crate::error::FailureKind;

/// 한 번의 배치 실행 결과.
///
/// 실행마다 새로 만들고 로그로 남긴 뒤 버립니다.
/// 자산 유형이 없어 건너뛴 종목은 `total`에 포함하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// 처리한 종목 수
    pub total: usize,
    /// 성공
    pub success: usize,
    /// 증권사 API 실패
    pub recoverable_failure: usize,
    /// 저장소 장애
    pub critical_failure: usize,
    /// 기타 실패
    pub unexpected_failure: usize,
    /// 자산 유형 누락으로 건너뜀
    pub skipped: usize,
    /// 저장된 일봉 수
    pub saved_rows: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공 기록.
    pub fn record_success(&mut self, saved_rows: usize) {
        self.total += 1;
        self.success += 1;
        self.saved_rows += saved_rows;
    }

    /// 실패 기록.
    pub fn record_failure(&mut self, kind: FailureKind) {
        self.total += 1;
        match kind {
            FailureKind::Recoverable => self.recoverable_failure += 1,
            FailureKind::Critical => self.critical_failure += 1,
            FailureKind::Unexpected => self.unexpected_failure += 1,
        }
    }

    /// 건너뛴 종목 기록.
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// 성공률 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// `total == success + recoverable + critical + unexpected`
    pub fn is_consistent(&self) -> bool {
        self.total
            == self.success
                + self.recoverable_failure
                + self.critical_failure
                + self.unexpected_failure
    }

    /// 요약 한 줄을 남기고, 저장소 장애가 있으면 경보 로그를 추가로 남깁니다.
    pub fn log_summary(&self, job: &str) {
        tracing::info!(
            job = job,
            total = self.total,
            success = self.success,
            recoverable = self.recoverable_failure,
            critical = self.critical_failure,
            unexpected = self.unexpected_failure,
            skipped = self.skipped,
            saved_rows = self.saved_rows,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "{} finished - Total: {}, Success: {} ({:.2}%), Recoverable: {}, Critical: {}, Unexpected: {}",
            job,
            self.total,
            self.success,
            self.success_rate(),
            self.recoverable_failure,
            self.critical_failure,
            self.unexpected_failure
        );

        if self.critical_failure > 0 {
            tracing::error!(
                job = job,
                alert = true,
                critical = self.critical_failure,
                "ALERT: {} critical database failures detected!",
                self.critical_failure
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_stay_consistent() {
        let mut outcome = BatchOutcome::new();
        outcome.record_success(3);
        outcome.record_failure(FailureKind::Recoverable);
        outcome.record_failure(FailureKind::Critical);
        outcome.record_failure(FailureKind::Unexpected);
        outcome.record_skipped();

        assert_eq!(outcome.total, 4);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.saved_rows, 3);
        assert!(outcome.is_consistent());
        assert!((outcome.success_rate() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_success_rate() {
        assert_eq!(BatchOutcome::new().success_rate(), 0.0);
    }
}
