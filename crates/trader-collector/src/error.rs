//! 에러 타입 정의.

use thiserror::Error;
use trader_core::{AssetType, StorageError, TraderError};
use trader_exchange::ExchangeError;

/// 배치 집계용 실패 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 증권사 API 실패 (인증 포함). 다음 실행에서 다시 시도됩니다.
    Recoverable,
    /// 저장소 장애. 경보 대상입니다.
    Critical,
    /// 분류되지 않은 실패
    Unexpected,
}

/// 전략 선택 에러.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// 자산 유형이 비어 있음 (호출자 오류)
    #[error("Asset type is missing")]
    MissingAssetType,

    /// 등록된 전략이 없는 자산 유형
    #[error("Unsupported asset type: {0}")]
    Unsupported(AssetType),
}

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 증권사 API 에러
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// 저장소 에러
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// 전략 선택 에러
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// 수집할 수 없는 종목 (예: 해외 종목의 거래소 코드 누락)
    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 일반 에러
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CollectorError {
    /// 배치 집계용 분류.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Exchange(_) => FailureKind::Recoverable,
            Self::Storage(_) => FailureKind::Critical,
            _ => FailureKind::Unexpected,
        }
    }
}

impl From<TraderError> for CollectorError {
    fn from(err: TraderError) -> Self {
        if err.is_config() {
            Self::Config(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<trader_data::DataError> for CollectorError {
    fn from(err: trader_data::DataError) -> Self {
        Self::Storage(err.into())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind() {
        let auth = CollectorError::from(ExchangeError::Unauthorized("no token".to_string()));
        assert_eq!(auth.failure_kind(), FailureKind::Recoverable);

        let missing = CollectorError::from(ExchangeError::AccountNotFound("isa".to_string()));
        assert_eq!(missing.failure_kind(), FailureKind::Recoverable);

        let api = CollectorError::from(ExchangeError::ApiError {
            code: "EGW00201".to_string(),
            message: "rate".to_string(),
        });
        assert_eq!(api.failure_kind(), FailureKind::Recoverable);

        let storage = CollectorError::from(StorageError::Query("deadlock".to_string()));
        assert_eq!(storage.failure_kind(), FailureKind::Critical);

        let dispatch = CollectorError::from(DispatchError::Unsupported(AssetType::OverseasIndex));
        assert_eq!(dispatch.failure_kind(), FailureKind::Unexpected);

        let invalid = CollectorError::InvalidInstrument("AAPL".to_string());
        assert_eq!(invalid.failure_kind(), FailureKind::Unexpected);
    }

    #[test]
    fn test_data_error_is_critical() {
        let err = CollectorError::from(trader_data::DataError::PoolExhausted);
        assert_eq!(err.failure_kind(), FailureKind::Critical);
    }
}
