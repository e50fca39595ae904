//! 일봉 시세 저장소 (PostgreSQL).
//!
//! 종목마다 독립된 트랜잭션을 열어 기존 날짜 조회, 일괄 삽입,
//! 백필 완료 플래그 갱신을 한 작업 단위로 묶습니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashSet;
use tracing::{debug, instrument};
use trader_core::{
    DailyBar, InstrumentKey, PriceStore, PriceTransaction, StorageResult,
};

use super::database::Database;
use crate::error::DataError;

/// 한 번의 INSERT에 담는 최대 행 수.
const INSERT_CHUNK_SIZE: usize = 500;

/// 일봉 시세 저장소.
#[derive(Clone)]
pub struct PgPriceStore {
    pool: PgPool,
}

impl PgPriceStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl PriceStore for PgPriceStore {
    async fn begin(&self) -> StorageResult<Box<dyn PriceTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DataError::TransactionError(e.to_string()))?;
        Ok(Box::new(PgPriceTransaction { tx }))
    }
}

/// 종목 하나의 트랜잭션. 커밋하지 않고 drop되면 롤백됩니다.
pub struct PgPriceTransaction {
    tx: Transaction<'static, Postgres>,
}

/// 국내 종목은 빈 문자열로 저장합니다.
fn exchange_code(key: &InstrumentKey) -> &str {
    key.exchange_code.as_deref().unwrap_or("")
}

#[async_trait]
impl PriceTransaction for PgPriceTransaction {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn existing_dates(
        &mut self,
        key: &InstrumentKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StorageResult<HashSet<NaiveDate>> {
        let dates: Vec<NaiveDate> = sqlx::query_scalar(
            r#"
            SELECT trade_date FROM daily_price
            WHERE asset_type = $1 AND stock_code = $2 AND exchange_code = $3
              AND trade_date BETWEEN $4 AND $5
            "#,
        )
        .bind(key.asset_type.code())
        .bind(&key.stock_code)
        .bind(exchange_code(key))
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DataError::from)?;

        Ok(dates.into_iter().collect())
    }

    #[instrument(skip(self, key, bars), fields(key = %key, rows = bars.len()))]
    async fn save_all(&mut self, key: &InstrumentKey, bars: &[DailyBar]) -> StorageResult<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let asset_type = key.asset_type.code();
        let excd = exchange_code(key);
        let mut inserted = 0;

        // UNNEST 패턴으로 일괄 삽입
        for chunk in bars.chunks(INSERT_CHUNK_SIZE) {
            let asset_types: Vec<i32> = chunk.iter().map(|_| asset_type).collect();
            let codes: Vec<&str> = chunk.iter().map(|_| key.stock_code.as_str()).collect();
            let exchanges: Vec<&str> = chunk.iter().map(|_| excd).collect();
            let dates: Vec<NaiveDate> = chunk.iter().map(|b| b.trade_date).collect();
            let opens: Vec<Decimal> = chunk.iter().map(|b| b.open).collect();
            let highs: Vec<Decimal> = chunk.iter().map(|b| b.high).collect();
            let lows: Vec<Decimal> = chunk.iter().map(|b| b.low).collect();
            let closes: Vec<Decimal> = chunk.iter().map(|b| b.close).collect();
            let volumes: Vec<Decimal> = chunk.iter().map(|b| b.volume).collect();
            let values: Vec<Decimal> = chunk.iter().map(|b| b.trading_value).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO daily_price
                    (asset_type, stock_code, exchange_code, trade_date,
                     open, high, low, close, volume, trading_value)
                SELECT * FROM UNNEST(
                    $1::int4[], $2::text[], $3::text[], $4::date[],
                    $5::numeric[], $6::numeric[], $7::numeric[], $8::numeric[],
                    $9::numeric[], $10::numeric[]
                )
                ON CONFLICT (asset_type, stock_code, exchange_code, trade_date) DO NOTHING
                "#,
            )
            .bind(&asset_types)
            .bind(&codes)
            .bind(&exchanges)
            .bind(&dates)
            .bind(&opens)
            .bind(&highs)
            .bind(&lows)
            .bind(&closes)
            .bind(&volumes)
            .bind(&values)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

            inserted += result.rows_affected() as usize;
        }

        debug!(inserted, "Daily prices saved");
        Ok(inserted)
    }

    async fn mark_backfill_completed(&mut self, instrument_id: i64) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE watchlist_instrument
            SET backfill_completed = TRUE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(instrument_id)
        .execute(&mut *self.tx)
        .await
        .map_err(DataError::from)?;

        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("watchlist_instrument id={}", instrument_id)).into());
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DataError::TransactionError(e.to_string()))?;
        Ok(())
    }
}
