//! 관심종목 및 자산 유형 정의.
//!
//! - `AssetType` - 국내/해외 × 주식/지수 구분
//! - `MarketCode` - 거래소 코드 (해외 종목 조회에 필요)
//! - `Instrument` - 수집 대상 관심종목
//! - `InstrumentKey` - 시세 저장 시 종목을 식별하는 키

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 자산 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    /// 국내 주식
    DomesticStock,
    /// 국내 지수
    DomesticIndex,
    /// 해외 주식
    OverseasStock,
    /// 해외 지수
    OverseasIndex,
}

impl AssetType {
    /// 모든 자산 유형.
    pub const ALL: [AssetType; 4] = [
        AssetType::DomesticStock,
        AssetType::DomesticIndex,
        AssetType::OverseasStock,
        AssetType::OverseasIndex,
    ];

    /// DB 저장용 숫자 코드.
    pub fn code(&self) -> i32 {
        match self {
            AssetType::DomesticStock => 1,
            AssetType::DomesticIndex => 2,
            AssetType::OverseasStock => 3,
            AssetType::OverseasIndex => 4,
        }
    }

    /// 숫자 코드에서 변환.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// 시세 조회에 거래소 코드가 필요한지 여부.
    pub fn requires_exchange_code(&self) -> bool {
        matches!(self, AssetType::OverseasStock | AssetType::OverseasIndex)
    }

    /// 로그용 이름.
    pub fn display_name(&self) -> &'static str {
        match self {
            AssetType::DomesticStock => "domestic stock",
            AssetType::DomesticIndex => "domestic index",
            AssetType::OverseasStock => "overseas stock",
            AssetType::OverseasIndex => "overseas index",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetType::DomesticStock => "DOMESTIC_STOCK",
            AssetType::DomesticIndex => "DOMESTIC_INDEX",
            AssetType::OverseasStock => "OVERSEAS_STOCK",
            AssetType::OverseasIndex => "OVERSEAS_INDEX",
        };
        f.write_str(s)
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown asset type: {}", s))
    }
}

/// 거래소 코드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketCode {
    /// 한국거래소
    Krx,
    /// 뉴욕
    Nys,
    /// 나스닥
    Nas,
    /// 아멕스
    Ams,
    /// 도쿄
    Tse,
    /// 홍콩
    Hks,
    /// 상해
    Shs,
    /// 심천
    Szs,
    /// 호치민
    Hsx,
    /// 하노이
    Hnx,
}

impl MarketCode {
    /// 모든 거래소 코드.
    pub const ALL: [MarketCode; 10] = [
        MarketCode::Krx,
        MarketCode::Nys,
        MarketCode::Nas,
        MarketCode::Ams,
        MarketCode::Tse,
        MarketCode::Hks,
        MarketCode::Shs,
        MarketCode::Szs,
        MarketCode::Hsx,
        MarketCode::Hnx,
    ];

    /// DB 저장용 숫자 코드.
    pub fn code(&self) -> i32 {
        match self {
            MarketCode::Krx => 1,
            MarketCode::Nys => 10,
            MarketCode::Nas => 11,
            MarketCode::Ams => 12,
            MarketCode::Tse => 13,
            MarketCode::Hks => 14,
            MarketCode::Shs => 15,
            MarketCode::Szs => 16,
            MarketCode::Hsx => 17,
            MarketCode::Hnx => 18,
        }
    }

    /// KIS API 거래소 코드 (EXCD).
    pub fn excd(&self) -> &'static str {
        match self {
            MarketCode::Krx => "KRX",
            MarketCode::Nys => "NYS",
            MarketCode::Nas => "NAS",
            MarketCode::Ams => "AMS",
            MarketCode::Tse => "TSE",
            MarketCode::Hks => "HKS",
            MarketCode::Shs => "SHS",
            MarketCode::Szs => "SZS",
            MarketCode::Hsx => "HSX",
            MarketCode::Hnx => "HNX",
        }
    }

    /// 숫자 코드에서 변환.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    /// EXCD 문자열에서 변환 (대소문자 무시).
    pub fn from_excd(excd: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.excd().eq_ignore_ascii_case(excd.trim()))
    }
}

impl fmt::Display for MarketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.excd())
    }
}

/// 수집 대상 관심종목.
///
/// `backfill_completed`는 백필이 끝나면 false → true로 한 번만 바뀝니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// 내부 ID (키셋 페이지네이션 기준)
    pub id: i64,
    /// 종목/지수 코드 (예: "005930", "AAPL", "0001")
    pub stock_code: String,
    /// 종목명
    pub stock_name: Option<String>,
    /// 거래소 코드 (국내는 없을 수 있음)
    pub market_code: Option<MarketCode>,
    /// 자산 유형 (미분류면 None)
    pub asset_type: Option<AssetType>,
    /// 백필 완료 여부
    pub backfill_completed: bool,
}

impl Instrument {
    /// 시세 저장용 키를 만듭니다.
    ///
    /// 자산 유형이 없거나, 해외 종목인데 거래소 코드가 없으면 `None`입니다.
    pub fn key(&self) -> Option<InstrumentKey> {
        let asset_type = self.asset_type?;
        let exchange_code = if asset_type.requires_exchange_code() {
            Some(self.market_code?.excd().to_string())
        } else {
            None
        };

        Some(InstrumentKey {
            asset_type,
            stock_code: self.stock_code.clone(),
            exchange_code,
        })
    }
}

/// 시세 저장 시 종목 식별 키: (자산 유형, 코드, 거래소 코드).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentKey {
    /// 자산 유형
    pub asset_type: AssetType,
    /// 종목/지수 코드
    pub stock_code: String,
    /// 거래소 코드 (해외만)
    pub exchange_code: Option<String>,
}

impl InstrumentKey {
    /// 국내 종목 키.
    pub fn domestic(asset_type: AssetType, stock_code: impl Into<String>) -> Self {
        Self {
            asset_type,
            stock_code: stock_code.into(),
            exchange_code: None,
        }
    }

    /// 해외 종목 키.
    pub fn overseas(
        asset_type: AssetType,
        stock_code: impl Into<String>,
        exchange_code: impl Into<String>,
    ) -> Self {
        Self {
            asset_type,
            stock_code: stock_code.into(),
            exchange_code: Some(exchange_code.into()),
        }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.exchange_code {
            Some(excd) => write!(f, "{}:{}:{}", self.asset_type, excd, self.stock_code),
            None => write!(f, "{}:{}", self.asset_type, self.stock_code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(asset_type: Option<AssetType>, market_code: Option<MarketCode>) -> Instrument {
        Instrument {
            id: 1,
            stock_code: "AAPL".to_string(),
            stock_name: Some("Apple".to_string()),
            market_code,
            asset_type,
            backfill_completed: false,
        }
    }

    #[test]
    fn test_asset_type_codes() {
        for t in AssetType::ALL {
            assert_eq!(AssetType::from_code(t.code()), Some(t));
        }
        assert_eq!(AssetType::from_code(9), None);
        assert_eq!("overseas_stock".parse::<AssetType>().unwrap(), AssetType::OverseasStock);
        assert!("crypto".parse::<AssetType>().is_err());
    }

    #[test]
    fn test_market_codes() {
        assert_eq!(MarketCode::from_code(11), Some(MarketCode::Nas));
        assert_eq!(MarketCode::from_excd("nys"), Some(MarketCode::Nys));
        assert_eq!(MarketCode::from_excd("XXX"), None);
        assert_eq!(MarketCode::Hnx.code(), 18);
    }

    #[test]
    fn test_key_for_domestic_ignores_market() {
        let key = instrument(Some(AssetType::DomesticStock), None).key().unwrap();
        assert_eq!(key.exchange_code, None);
        assert_eq!(key.to_string(), "DOMESTIC_STOCK:AAPL");
    }

    #[test]
    fn test_key_for_overseas_requires_market() {
        assert!(instrument(Some(AssetType::OverseasStock), None).key().is_none());

        let key = instrument(Some(AssetType::OverseasStock), Some(MarketCode::Nas))
            .key()
            .unwrap();
        assert_eq!(key.exchange_code.as_deref(), Some("NAS"));
    }

    #[test]
    fn test_key_without_asset_type() {
        assert!(instrument(None, Some(MarketCode::Nas)).key().is_none());
    }
}
