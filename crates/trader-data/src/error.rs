//! 데이터 모듈 오류 타입.

use thiserror::Error;
use trader_core::StorageError;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 중복 레코드
    #[error("Duplicate record: {0}")]
    DuplicateError(String),

    /// 캐시 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 마이그레이션 오류
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 트랜잭션 오류
    #[error("Transaction error: {0}")]
    TransactionError(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Io(e) => DataError::ConnectionError(e.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    DataError::DuplicateError(db_err.message().to_string())
                } else {
                    DataError::QueryError(db_err.message().to_string())
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        DataError::CacheError(err.to_string())
    }
}

/// 수집 엔진이 보는 저장소 에러로 변환.
impl From<DataError> for StorageError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::ConnectionError(_) | DataError::PoolExhausted | DataError::CacheError(_) => {
                StorageError::Connection(err.to_string())
            }
            DataError::TransactionError(_) => StorageError::Transaction(err.to_string()),
            _ => StorageError::Query(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_storage_error() {
        let err: StorageError = DataError::PoolExhausted.into();
        assert!(matches!(err, StorageError::Connection(_)));

        let err: StorageError = DataError::InsertError("boom".to_string()).into();
        assert!(matches!(err, StorageError::Query(_)));

        let err: StorageError = DataError::TransactionError("commit".to_string()).into();
        assert!(matches!(err, StorageError::Transaction(_)));
    }

    #[test]
    fn test_row_not_found() {
        let err: DataError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DataError::NotFound(_)));
    }
}
