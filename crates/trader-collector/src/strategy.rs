//! 자산 유형별 수집 전략과 디스패처.
//!
//! 네 자산 유형은 조회 엔드포인트(쿼리 파라미터, 날짜 필드, 거래소 코드 필요 여부)만
//! 다르고 페이지네이션은 [`BackfillEngine`] 하나를 공유합니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use trader_core::{AssetType, DailyBar, Instrument, InstrumentKey, PriceTransaction};
use trader_exchange::{DailyPriceApi, DailyPriceEndpoint};

use crate::engine::{BackfillEngine, PageSource};
use crate::error::{CollectorError, DispatchError};
use crate::persist::DedupSink;
use crate::Result;

/// 종목 하나를 수집하는 전략.
#[async_trait]
pub trait PriceStrategy: Send + Sync {
    /// 담당 자산 유형.
    fn asset_type(&self) -> AssetType;

    /// 한 페이지만 조회해 저장합니다. 저장된 행 수를 반환합니다.
    async fn collect(
        &self,
        instrument: &Instrument,
        tx: &mut dyn PriceTransaction,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize>;

    /// `end`부터 `start`까지 과거로 걸어가며 저장합니다.
    async fn backfill(
        &self,
        instrument: &Instrument,
        tx: &mut dyn PriceTransaction,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize>;
}

/// 일봉 API 한 페이지 조회.
struct ApiPageSource<'a> {
    api: &'a dyn DailyPriceApi,
    endpoint: DailyPriceEndpoint,
    key: &'a InstrumentKey,
}

#[async_trait]
impl<'a> PageSource for ApiPageSource<'a> {
    type Row = DailyBar;

    async fn fetch_page(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyBar>> {
        Ok(self
            .api
            .fetch_daily_prices(self.endpoint, self.key, start, end)
            .await?)
    }

    fn row_date(&self, row: &DailyBar) -> NaiveDate {
        row.trade_date
    }
}

/// KIS 일봉 API 기반 전략.
pub struct DailyPriceStrategy {
    asset_type: AssetType,
    endpoint: DailyPriceEndpoint,
    api: Arc<dyn DailyPriceApi>,
    engine: BackfillEngine,
}

impl DailyPriceStrategy {
    pub fn new(asset_type: AssetType, api: Arc<dyn DailyPriceApi>, engine: BackfillEngine) -> Self {
        Self {
            asset_type,
            endpoint: DailyPriceEndpoint::for_asset_type(asset_type),
            api,
            engine,
        }
    }

    /// 저장 키. 해외 종목은 거래소 코드가 있어야 합니다.
    fn key_for(&self, instrument: &Instrument) -> Result<InstrumentKey> {
        instrument.key().ok_or_else(|| {
            CollectorError::InvalidInstrument(format!(
                "{} ({}): 거래소 코드가 없습니다",
                instrument.stock_code, self.asset_type
            ))
        })
    }
}

#[async_trait]
impl PriceStrategy for DailyPriceStrategy {
    fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    async fn collect(
        &self,
        instrument: &Instrument,
        tx: &mut dyn PriceTransaction,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize> {
        let key = self.key_for(instrument)?;
        let source = ApiPageSource {
            api: self.api.as_ref(),
            endpoint: self.endpoint,
            key: &key,
        };
        let mut sink = DedupSink::new(tx, &key);
        self.engine.collect(&source, &mut sink, start, end).await
    }

    async fn backfill(
        &self,
        instrument: &Instrument,
        tx: &mut dyn PriceTransaction,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize> {
        let key = self.key_for(instrument)?;
        let source = ApiPageSource {
            api: self.api.as_ref(),
            endpoint: self.endpoint,
            key: &key,
        };
        let mut sink = DedupSink::new(tx, &key);
        let progress = self.engine.backfill(&source, &mut sink, start, end).await?;

        tracing::info!(
            key = %key,
            pages = progress.pages,
            saved = progress.saved,
            "Backfill finished"
        );
        Ok(progress.saved)
    }
}

/// 자산 유형 → 전략.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<AssetType, Arc<dyn PriceStrategy>>,
}

impl StrategyRegistry {
    /// 빈 레지스트리.
    pub fn empty() -> Self {
        Self::default()
    }

    /// 네 자산 유형 모두에 KIS 일봉 전략을 등록합니다.
    pub fn kis(api: Arc<dyn DailyPriceApi>, page_size: usize) -> Self {
        let engine = BackfillEngine::new(page_size);
        AssetType::ALL
            .into_iter()
            .fold(Self::empty(), |registry, asset_type| {
                registry.with_strategy(Arc::new(DailyPriceStrategy::new(
                    asset_type,
                    api.clone(),
                    engine,
                )))
            })
    }

    /// 전략 등록 (같은 자산 유형은 교체).
    pub fn with_strategy(mut self, strategy: Arc<dyn PriceStrategy>) -> Self {
        self.strategies.insert(strategy.asset_type(), strategy);
        self
    }

    /// 자산 유형에 맞는 전략.
    ///
    /// # Errors
    /// - `DispatchError::MissingAssetType`: 자산 유형이 없음
    /// - `DispatchError::Unsupported`: 등록된 전략이 없음
    pub fn for_asset_type(
        &self,
        asset_type: Option<AssetType>,
    ) -> std::result::Result<Arc<dyn PriceStrategy>, DispatchError> {
        let asset_type = asset_type.ok_or(DispatchError::MissingAssetType)?;
        self.strategies
            .get(&asset_type)
            .cloned()
            .ok_or(DispatchError::Unsupported(asset_type))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use trader_core::{MarketCode, StorageResult};
    use trader_exchange::ExchangeError;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// 요청을 기록하고 고정 응답을 돌려주는 API.
    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<(DailyPriceEndpoint, InstrumentKey)>>,
    }

    #[async_trait]
    impl DailyPriceApi for RecordingApi {
        async fn fetch_daily_prices(
            &self,
            endpoint: DailyPriceEndpoint,
            key: &InstrumentKey,
            _start: NaiveDate,
            end: NaiveDate,
        ) -> std::result::Result<Vec<DailyBar>, ExchangeError> {
            self.calls.lock().unwrap().push((endpoint, key.clone()));
            Ok(vec![DailyBar::close_only(end, dec!(1))])
        }
    }

    #[derive(Default)]
    struct NoopTx;

    #[async_trait]
    impl PriceTransaction for NoopTx {
        async fn existing_dates(
            &mut self,
            _: &InstrumentKey,
            _: NaiveDate,
            _: NaiveDate,
        ) -> StorageResult<HashSet<NaiveDate>> {
            Ok(HashSet::new())
        }

        async fn save_all(&mut self, _: &InstrumentKey, bars: &[DailyBar]) -> StorageResult<usize> {
            Ok(bars.len())
        }

        async fn mark_backfill_completed(&mut self, _: i64) -> StorageResult<()> {
            Ok(())
        }

        async fn commit(self: Box<Self>) -> StorageResult<()> {
            Ok(())
        }
    }

    fn instrument(asset_type: Option<AssetType>, market_code: Option<MarketCode>) -> Instrument {
        Instrument {
            id: 1,
            stock_code: "AAPL".to_string(),
            stock_name: None,
            market_code,
            asset_type,
            backfill_completed: false,
        }
    }

    #[test]
    fn test_dispatch() {
        let registry = StrategyRegistry::kis(Arc::new(RecordingApi::default()), 100);
        assert_eq!(registry.len(), 4);

        for asset_type in AssetType::ALL {
            let strategy = registry.for_asset_type(Some(asset_type)).ok().unwrap();
            assert_eq!(strategy.asset_type(), asset_type);
        }

        assert_eq!(
            registry.for_asset_type(None).err(),
            Some(DispatchError::MissingAssetType)
        );
    }

    #[test]
    fn test_unsupported_is_distinct_from_missing() {
        let registry = StrategyRegistry::empty();
        assert_eq!(
            registry.for_asset_type(Some(AssetType::DomesticIndex)).err(),
            Some(DispatchError::Unsupported(AssetType::DomesticIndex))
        );
    }

    #[tokio::test]
    async fn test_strategy_uses_its_endpoint_and_exchange_code() {
        let api = Arc::new(RecordingApi::default());
        let registry = StrategyRegistry::kis(api.clone(), 100);
        let strategy = registry.for_asset_type(Some(AssetType::OverseasStock)).ok().unwrap();

        let mut tx = NoopTx;
        let saved = strategy
            .collect(
                &instrument(Some(AssetType::OverseasStock), Some(MarketCode::Nas)),
                &mut tx,
                date("2024-01-05"),
                date("2024-01-05"),
            )
            .await
            .unwrap();

        assert_eq!(saved, 1);
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[0].0, DailyPriceEndpoint::OverseasStock);
        assert_eq!(calls[0].1.exchange_code.as_deref(), Some("NAS"));
    }

    #[tokio::test]
    async fn test_overseas_without_market_code_is_invalid() {
        let registry = StrategyRegistry::kis(Arc::new(RecordingApi::default()), 100);
        let strategy = registry.for_asset_type(Some(AssetType::OverseasIndex)).ok().unwrap();

        let mut tx = NoopTx;
        let result = strategy
            .backfill(
                &instrument(Some(AssetType::OverseasIndex), None),
                &mut tx,
                date("2024-01-01"),
                date("2024-01-05"),
            )
            .await;

        assert!(matches!(result, Err(CollectorError::InvalidInstrument(_))));
    }
}
