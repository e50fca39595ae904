//! 수집 시스템의 공용 에러 타입.

use thiserror::Error;

use crate::crypto::CryptoError;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum TraderError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 암호화 에러
    #[error("암호화 에러: {0}")]
    Crypto(#[from] CryptoError),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type TraderResult<T> = Result<T, TraderError>;

impl TraderError {
    /// 기동을 중단해야 하는 설정 계열 에러인지 확인합니다.
    pub fn is_config(&self) -> bool {
        matches!(self, TraderError::Config(_) | TraderError::Crypto(_))
    }
}

impl From<config::ConfigError> for TraderError {
    fn from(err: config::ConfigError) -> Self {
        TraderError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TraderError {
    fn from(err: serde_json::Error) -> Self {
        TraderError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors() {
        assert!(TraderError::Config("missing".to_string()).is_config());
        assert!(TraderError::Crypto(CryptoError::InvalidKeyLength(16)).is_config());
        assert!(!TraderError::InvalidInput("bad".to_string()).is_config());
    }

    #[test]
    fn test_error_message() {
        let err = TraderError::Config("accounts 비어 있음".to_string());
        assert_eq!(err.to_string(), "설정 에러: accounts 비어 있음");
    }
}
