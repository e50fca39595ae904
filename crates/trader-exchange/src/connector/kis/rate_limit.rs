//! KIS REST 요청 간격 제한.
//!
//! KIS는 계좌(앱키)당 초당 요청 수를 제한하며 초과 시 `EGW00201`을 반환합니다.
//! 요청마다 다음 허용 시각을 예약하여 호출 간 최소 간격을 보장합니다.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// 초당 요청 수 기반 간격 제한기.
#[derive(Debug)]
pub struct RequestRateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RequestRateLimiter {
    /// 초당 `requests_per_second`건을 허용하는 제한기. 0은 1로 취급합니다.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = requests_per_second.max(1);
        Self {
            interval: Duration::from_secs(1) / rps,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// 요청 간 최소 간격.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 다음 요청 슬롯까지 대기합니다.
    pub async fn acquire(&self) {
        let wait_until = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = (*next_slot).max(now);
            *next_slot = slot + self.interval;
            slot
        };

        tokio::time::sleep_until(wait_until).await;
    }
}

impl Default for RequestRateLimiter {
    fn default() -> Self {
        Self::new(20)
    }
}
