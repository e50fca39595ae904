//! 중복 제거 저장.
//!
//! 페이지를 저장하기 전에 이미 저장된 영업일을 조회해 걸러냅니다.
//! 걸러낸 결과가 비어 있으면 저장 호출을 하지 않습니다.

use async_trait::async_trait;
use tracing::debug;
use trader_core::{DailyBar, InstrumentKey, PriceTransaction};

use crate::engine::PageSink;
use crate::Result;

/// 종목 트랜잭션에 기록하는 중복 제거 저장기.
pub struct DedupSink<'a> {
    tx: &'a mut dyn PriceTransaction,
    key: &'a InstrumentKey,
}

impl<'a> DedupSink<'a> {
    pub fn new(tx: &'a mut dyn PriceTransaction, key: &'a InstrumentKey) -> Self {
        Self { tx, key }
    }
}

#[async_trait]
impl<'a> PageSink<DailyBar> for DedupSink<'a> {
    async fn persist(&mut self, page: &[DailyBar]) -> Result<usize> {
        let dates = page.iter().map(|bar| bar.trade_date);
        let (Some(oldest), Some(newest)) = (dates.clone().min(), dates.max()) else {
            return Ok(0);
        };

        let existing = self.tx.existing_dates(self.key, oldest, newest).await?;
        let fresh: Vec<DailyBar> = page
            .iter()
            .filter(|bar| !existing.contains(&bar.trade_date))
            .cloned()
            .collect();

        if fresh.is_empty() {
            debug!(key = %self.key, rows = page.len(), "All rows already stored");
            return Ok(0);
        }

        let saved = self.tx.save_all(self.key, &fresh).await?;
        debug!(
            key = %self.key,
            fetched = page.len(),
            skipped = page.len() - fresh.len(),
            saved,
            "Page persisted"
        );
        Ok(saved)
    }
}
