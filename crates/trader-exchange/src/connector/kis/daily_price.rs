//! KIS 일봉 시세 조회.
//!
//! 자산 유형별 엔드포인트 4종을 하나의 클라이언트로 처리합니다.
//! 엔드포인트마다 쿼리 파라미터와 행 필드 이름만 다르고, 응답 봉투
//! (`rt_cd`, `msg_cd`, `msg1`, `output2`)는 동일합니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use trader_core::{AssetType, DailyBar, InstrumentKey};

use super::auth::build_headers;
use super::config::KisConfig;
use super::rate_limit::RequestRateLimiter;
use super::token_cache::AccessTokenProvider;
use super::tr_id;
use crate::ExchangeError;

/// KIS 날짜 형식 (YYYYMMDD).
const KIS_DATE_FORMAT: &str = "%Y%m%d";

/// 일봉 조회 엔드포인트.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DailyPriceEndpoint {
    /// 국내 주식 기간별 시세
    DomesticStock,
    /// 국내 업종(지수) 일자별 시세
    DomesticIndex,
    /// 해외 주식 기간별 시세
    OverseasStock,
    /// 해외 지수 기간별 시세
    OverseasIndex,
}

impl DailyPriceEndpoint {
    /// 자산 유형에 대응하는 엔드포인트.
    pub fn for_asset_type(asset_type: AssetType) -> Self {
        match asset_type {
            AssetType::DomesticStock => Self::DomesticStock,
            AssetType::DomesticIndex => Self::DomesticIndex,
            AssetType::OverseasStock => Self::OverseasStock,
            AssetType::OverseasIndex => Self::OverseasIndex,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::DomesticStock => "/uapi/domestic-stock/v1/quotations/inquire-daily-itemchartprice",
            Self::DomesticIndex => "/uapi/domestic-stock/v1/quotations/inquire-index-daily-price",
            Self::OverseasStock => "/uapi/overseas-price/v1/quotations/dailyprice",
            Self::OverseasIndex => "/uapi/overseas-price/v1/quotations/inquire-daily-chartprice",
        }
    }

    pub fn tr_id(&self) -> &'static str {
        match self {
            Self::DomesticStock => tr_id::KR_DAILY_CHART,
            Self::DomesticIndex => tr_id::KR_INDEX_DAILY,
            Self::OverseasStock => tr_id::US_DAILY_PRICE,
            Self::OverseasIndex => tr_id::OVERSEAS_INDEX_DAILY,
        }
    }

    /// 요청에 거래소 코드가 필요한지 여부.
    pub fn requires_exchange_code(&self) -> bool {
        matches!(self, Self::OverseasStock | Self::OverseasIndex)
    }

    /// 쿼리 파라미터 생성.
    ///
    /// 해외 주식은 기준일(`BYMD`)부터 과거로 조회하므로 시작일을 보내지 않습니다.
    pub fn query(
        &self,
        key: &InstrumentKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(&'static str, String)>, ExchangeError> {
        let start = start.format(KIS_DATE_FORMAT).to_string();
        let end = end.format(KIS_DATE_FORMAT).to_string();
        let code = key.stock_code.clone();

        let params = match self {
            Self::DomesticStock => vec![
                ("FID_COND_MRKT_DIV_CODE", "J".to_string()),
                ("FID_INPUT_ISCD", code),
                ("FID_INPUT_DATE_1", start),
                ("FID_INPUT_DATE_2", end),
                ("FID_PERIOD_DIV_CODE", "D".to_string()),
                // 0=수정주가
                ("FID_ORG_ADJ_PRC", "0".to_string()),
            ],
            Self::DomesticIndex => vec![
                ("FID_COND_MRKT_DIV_CODE", "U".to_string()),
                ("FID_INPUT_ISCD", code),
                ("FID_INPUT_DATE_1", start),
                ("FID_INPUT_DATE_2", end),
                ("FID_PERIOD_DIV_CODE", "D".to_string()),
            ],
            Self::OverseasStock => {
                let excd = key.exchange_code.clone().ok_or_else(|| {
                    ExchangeError::InvalidRequest(format!("{}: 거래소 코드가 필요합니다", key))
                })?;
                vec![
                    ("EXCD", excd),
                    ("SYMB", code),
                    // 0=일, 1=주, 2=월
                    ("GUBN", "0".to_string()),
                    ("BYMD", end),
                    // 1=수정주가 반영
                    ("MODP", "1".to_string()),
                ]
            }
            Self::OverseasIndex => {
                if key.exchange_code.is_none() {
                    return Err(ExchangeError::InvalidRequest(format!(
                        "{}: 거래소 코드가 필요합니다",
                        key
                    )));
                }
                vec![
                    ("FID_COND_MRKT_DIV_CODE", "N".to_string()),
                    ("FID_INPUT_ISCD", code),
                    ("FID_INPUT_DATE_1", start),
                    ("FID_INPUT_DATE_2", end),
                    ("FID_PERIOD_DIV_CODE", "D".to_string()),
                ]
            }
        };

        Ok(params)
    }
}

/// 일봉 조회 API.
#[async_trait]
pub trait DailyPriceApi: Send + Sync {
    /// `[start, end]` 구간의 일봉 한 페이지를 조회합니다.
    ///
    /// 응답 순서는 보장되지 않습니다.
    async fn fetch_daily_prices(
        &self,
        endpoint: DailyPriceEndpoint,
        key: &InstrumentKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ExchangeError>;
}

/// KIS 공통 응답 봉투.
#[derive(Debug, Deserialize)]
pub struct KisEnvelope<R> {
    /// 성공 여부 ("0" = 성공)
    pub rt_cd: String,
    #[serde(default)]
    pub msg_cd: String,
    #[serde(default)]
    pub msg1: String,
    /// 일별 행 목록 (없으면 빈 페이지)
    pub output2: Option<Vec<R>>,
}

impl<R> KisEnvelope<R> {
    /// 실패 봉투는 `ExchangeError::ApiError`로 변환합니다.
    pub fn into_rows(self) -> Result<Vec<R>, ExchangeError> {
        if self.rt_cd != "0" {
            return Err(ExchangeError::ApiError {
                code: self.msg_cd,
                message: self.msg1,
            });
        }
        Ok(self.output2.unwrap_or_default())
    }
}

/// 엔드포인트별 응답 행.
pub trait DailyRow: DeserializeOwned + Send {
    /// 행의 영업일 필드 원문.
    fn raw_date(&self) -> &str;

    /// 일봉으로 변환 (영업일은 파싱된 값).
    fn to_bar(&self, trade_date: NaiveDate) -> DailyBar;

    /// 영업일이 비어 있는 행은 `None`.
    fn parse(&self) -> Result<Option<DailyBar>, ExchangeError> {
        let raw = self.raw_date().trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let trade_date = NaiveDate::parse_from_str(raw, KIS_DATE_FORMAT)
            .map_err(|e| ExchangeError::ParseError(format!("Invalid trade date '{}': {}", raw, e)))?;
        Ok(Some(self.to_bar(trade_date)))
    }
}

/// 국내 주식 일봉 행.
#[derive(Debug, Clone, Deserialize)]
pub struct DomesticStockDailyRow {
    /// 영업일자
    #[serde(default)]
    pub stck_bsop_date: String,
    /// 시가
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub stck_oprc: Decimal,
    /// 고가
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub stck_hgpr: Decimal,
    /// 저가
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub stck_lwpr: Decimal,
    /// 종가
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub stck_clpr: Decimal,
    /// 누적 거래량
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub acml_vol: Decimal,
    /// 누적 거래대금
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub acml_tr_pbmn: Decimal,
}

impl DailyRow for DomesticStockDailyRow {
    fn raw_date(&self) -> &str {
        &self.stck_bsop_date
    }

    fn to_bar(&self, trade_date: NaiveDate) -> DailyBar {
        DailyBar {
            trade_date,
            open: self.stck_oprc,
            high: self.stck_hgpr,
            low: self.stck_lwpr,
            close: self.stck_clpr,
            volume: self.acml_vol,
            trading_value: self.acml_tr_pbmn,
        }
    }
}

/// 국내 지수 일봉 행.
#[derive(Debug, Clone, Deserialize)]
pub struct DomesticIndexDailyRow {
    #[serde(default)]
    pub stck_bsop_date: String,
    /// 업종 지수 현재가 (종가)
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub bstp_nmix_prpr: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub bstp_nmix_oprc: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub bstp_nmix_hgpr: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub bstp_nmix_lwpr: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub acml_vol: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub acml_tr_pbmn: Decimal,
}

impl DailyRow for DomesticIndexDailyRow {
    fn raw_date(&self) -> &str {
        &self.stck_bsop_date
    }

    fn to_bar(&self, trade_date: NaiveDate) -> DailyBar {
        DailyBar {
            trade_date,
            open: self.bstp_nmix_oprc,
            high: self.bstp_nmix_hgpr,
            low: self.bstp_nmix_lwpr,
            close: self.bstp_nmix_prpr,
            volume: self.acml_vol,
            trading_value: self.acml_tr_pbmn,
        }
    }
}

/// 해외 주식 일봉 행.
#[derive(Debug, Clone, Deserialize)]
pub struct OverseasStockDailyRow {
    /// 일자 (YYYYMMDD)
    #[serde(default)]
    pub xymd: String,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub clos: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub open: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub high: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub low: Decimal,
    /// 거래량
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub tvol: Decimal,
    /// 거래대금
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub tamt: Decimal,
}

impl DailyRow for OverseasStockDailyRow {
    fn raw_date(&self) -> &str {
        &self.xymd
    }

    fn to_bar(&self, trade_date: NaiveDate) -> DailyBar {
        DailyBar {
            trade_date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.clos,
            volume: self.tvol,
            trading_value: self.tamt,
        }
    }
}

/// 해외 지수 일봉 행. 거래대금은 제공되지 않습니다.
#[derive(Debug, Clone, Deserialize)]
pub struct OverseasIndexDailyRow {
    #[serde(default)]
    pub stck_bsop_date: String,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub ovrs_nmix_prpr: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub ovrs_nmix_oprc: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub ovrs_nmix_hgpr: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub ovrs_nmix_lwpr: Decimal,
    #[serde(deserialize_with = "deserialize_decimal", default)]
    pub acml_vol: Decimal,
}

impl DailyRow for OverseasIndexDailyRow {
    fn raw_date(&self) -> &str {
        &self.stck_bsop_date
    }

    fn to_bar(&self, trade_date: NaiveDate) -> DailyBar {
        DailyBar {
            trade_date,
            open: self.ovrs_nmix_oprc,
            high: self.ovrs_nmix_hgpr,
            low: self.ovrs_nmix_lwpr,
            close: self.ovrs_nmix_prpr,
            volume: self.acml_vol,
            trading_value: Decimal::ZERO,
        }
    }
}

/// 응답 본문을 일봉 목록으로 변환합니다.
pub fn parse_daily_page<R: DailyRow>(body: &str) -> Result<Vec<DailyBar>, ExchangeError> {
    let envelope: KisEnvelope<R> = serde_json::from_str(body)
        .map_err(|e| ExchangeError::ParseError(format!("Failed to parse daily price response: {}", e)))?;

    let rows = envelope.into_rows()?;
    let mut bars = Vec::with_capacity(rows.len());
    for row in &rows {
        match row.parse()? {
            Some(bar) => bars.push(bar),
            None => debug!("Skipping daily row without trade date"),
        }
    }
    Ok(bars)
}

/// KIS 일봉 시세 클라이언트.
pub struct KisPriceClient {
    config: Arc<KisConfig>,
    tokens: Arc<dyn AccessTokenProvider>,
    client: Client,
    limiter: RequestRateLimiter,
}

impl KisPriceClient {
    /// 새 시세 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`.
    pub fn new(
        config: Arc<KisConfig>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP client 생성 실패: {}", e)))?;
        let limiter = RequestRateLimiter::new(config.requests_per_second);

        Ok(Self {
            config,
            tokens,
            client,
            limiter,
        })
    }
}

#[async_trait]
impl DailyPriceApi for KisPriceClient {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn fetch_daily_prices(
        &self,
        endpoint: DailyPriceEndpoint,
        key: &InstrumentKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ExchangeError> {
        let query = endpoint.query(key, start, end)?;
        let account = self.config.default_account().ok_or_else(|| {
            ExchangeError::AccountNotFound("기본 계좌가 설정되지 않았습니다".to_string())
        })?;
        let token = self.tokens.access_token().await?;
        let headers = build_headers(account, &token, endpoint.tr_id())?;
        let url = format!("{}{}", self.config.rest_base_url(), endpoint.path());

        self.limiter.acquire().await;

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(status = %status, "Daily price inquiry failed");
            if status.as_u16() == 429 {
                return Err(ExchangeError::RateLimited);
            }
            return Err(ExchangeError::ApiError {
                code: status.as_u16().to_string(),
                message: body,
            });
        }

        let bars = match endpoint {
            DailyPriceEndpoint::DomesticStock => parse_daily_page::<DomesticStockDailyRow>(&body),
            DailyPriceEndpoint::DomesticIndex => parse_daily_page::<DomesticIndexDailyRow>(&body),
            DailyPriceEndpoint::OverseasStock => parse_daily_page::<OverseasStockDailyRow>(&body),
            DailyPriceEndpoint::OverseasIndex => parse_daily_page::<OverseasIndexDailyRow>(&body),
        }?;

        debug!(rows = bars.len(), "Daily price page received");
        Ok(bars)
    }
}

/// 빈 문자열이나 "-"는 0으로 처리하는 Decimal 역직렬화.
fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = String::deserialize(deserializer)?;
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return Ok(Decimal::ZERO);
    }
    s.parse::<Decimal>()
        .map_err(|_| serde::de::Error::custom(format!("Invalid decimal: {}", s)))
}
