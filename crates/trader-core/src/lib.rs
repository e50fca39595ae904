//! # Trader Core
//!
//! 일봉 시세 수집기의 핵심 도메인 모델 및 공용 인프라를 제공합니다.
//!
//! 이 크레이트는 수집 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 종목(관심종목) 및 자산 유형 정의
//! - 일봉 시세 구조체
//! - 저장소/분산 잠금 포트 (trait)
//! - 설정 관리
//! - 로깅 인프라 및 민감정보 마스킹
//! - 토큰 암호화 및 계좌 키 해싱

pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use crypto::{AccountKeyHasher, CryptoError, TokenEncryptor};
pub use domain::*;
pub use error::*;
pub use logging::*;
