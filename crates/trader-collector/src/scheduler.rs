//! 데몬 모드 일일 스케줄러 (Asia/Seoul 기준).

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Asia::Seoul;
use chrono_tz::Tz;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// `now` 이후 처음 돌아오는 `at` 시각 (서울 기준).
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Tz> {
    let local_now = now.with_timezone(&Seoul);
    let today = local_now.date_naive();

    let candidate = today
        .and_time(at)
        .and_local_timezone(Seoul)
        .earliest()
        .filter(|t| *t > local_now);

    candidate.unwrap_or_else(|| {
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        // 서울은 서머타임이 없어 항상 단일 시각으로 변환됨
        Seoul
            .from_local_datetime(&tomorrow.and_time(at))
            .earliest()
            .unwrap_or(local_now)
    })
}

/// 다음 실행까지 남은 시간.
pub fn duration_until_next(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    (next_run_after(now, at).with_timezone(&Utc) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// 매일 `at` 시각에 `task`를 실행합니다. 반환하지 않습니다.
pub async fn run_daily<F, Fut>(job: &str, at: NaiveTime, mut task: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let now = Utc::now();
        let wait = duration_until_next(now, at);
        info!(
            job,
            next_run = %next_run_after(now, at),
            wait_secs = wait.as_secs(),
            "Next run scheduled"
        );

        tokio::time::sleep(wait).await;
        task().await;
    }
}
