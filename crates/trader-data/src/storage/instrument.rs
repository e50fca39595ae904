//! 관심종목 저장소 (PostgreSQL).

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::{instrument, warn};
use trader_core::{AssetType, Instrument, InstrumentRepository, MarketCode, StorageResult};

use super::database::Database;
use crate::error::DataError;

/// 관심종목 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct InstrumentRecord {
    pub id: i64,
    pub stock_code: String,
    pub stock_name: Option<String>,
    pub market_code: Option<i32>,
    pub asset_type: Option<i32>,
    pub backfill_completed: bool,
}

impl From<InstrumentRecord> for Instrument {
    fn from(record: InstrumentRecord) -> Self {
        // 알 수 없는 코드는 미분류로 취급
        let asset_type = record.asset_type.and_then(|code| {
            let parsed = AssetType::from_code(code);
            if parsed.is_none() {
                warn!(id = record.id, code, "Unknown asset type code");
            }
            parsed
        });
        let market_code = record.market_code.and_then(|code| {
            let parsed = MarketCode::from_code(code);
            if parsed.is_none() {
                warn!(id = record.id, code, "Unknown market code");
            }
            parsed
        });

        Instrument {
            id: record.id,
            stock_code: record.stock_code,
            stock_name: record.stock_name,
            market_code,
            asset_type,
            backfill_completed: record.backfill_completed,
        }
    }
}

/// 관심종목 repository.
#[derive(Clone)]
pub struct PgInstrumentRepository {
    pool: PgPool,
}

impl PgInstrumentRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl InstrumentRepository for PgInstrumentRepository {
    #[instrument(skip(self))]
    async fn find_page(
        &self,
        backfill_completed: bool,
        after_id: Option<i64>,
        limit: usize,
    ) -> StorageResult<Vec<Instrument>> {
        let records: Vec<InstrumentRecord> = sqlx::query_as(
            r#"
            SELECT id, stock_code, stock_name, market_code, asset_type, backfill_completed
            FROM watchlist_instrument
            WHERE backfill_completed = $1
              AND ($2::BIGINT IS NULL OR id > $2)
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(backfill_completed)
        .bind(after_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DataError::from)?;

        Ok(records.into_iter().map(Instrument::from).collect())
    }
}
