//! 일봉 시세 구조체.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 하루치 시세 (OHLC, 거래량, 거래대금).
///
/// 저장소에서는 (종목 키, 영업일)이 유일합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBar {
    /// 영업일
    pub trade_date: NaiveDate,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 누적 거래량
    pub volume: Decimal,
    /// 누적 거래대금 (제공되지 않으면 0)
    pub trading_value: Decimal,
}

impl DailyBar {
    /// 종가만 있는 시세를 만듭니다.
    pub fn close_only(trade_date: NaiveDate, close: Decimal) -> Self {
        Self {
            trade_date,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ZERO,
            trading_value: Decimal::ZERO,
        }
    }
}
