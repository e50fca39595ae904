//! # 암호화 모듈
//!
//! 캐시에 저장되는 접근 토큰을 보호하기 위한 기능을 제공합니다.
//!
//! - [`TokenEncryptor`]: AES-256-GCM 암호화, `Base64(nonce ‖ ciphertext)` 형식
//! - [`AccountKeyHasher`]: HMAC-SHA256 기반 계좌번호 해시 (캐시 키/잠금 키 용도)
//!
//! ## 보안 고려사항
//! - 마스터 키는 설정 파일 또는 환경변수에서 로드
//! - 각 암호화마다 고유한 nonce (12바이트) 사용
//! - 해시는 앞 16자(hex)만 사용하며 원래 계좌번호로 되돌릴 수 없음

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

/// 암호화 에러
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid master key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("HMAC secret too short: expected at least 32 characters, got {0}")]
    SecretTooShort(usize),

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Ciphertext too short: {0} bytes")]
    CiphertextTooShort(usize),

    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("UTF-8 decode error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

/// AES-256-GCM nonce 크기 (바이트)
pub const NONCE_SIZE: usize = 12;

/// AES-256 키 크기 (바이트)
pub const KEY_SIZE: usize = 32;

/// HMAC 비밀키 최소 길이 (문자)
pub const MIN_HMAC_SECRET_LEN: usize = 32;

/// 계좌 해시 접두사 길이 (hex 문자)
pub const HASH_PREFIX_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// 캐시 저장용 토큰 암호화기.
pub struct TokenEncryptor {
    cipher: Aes256Gcm,
}

impl TokenEncryptor {
    /// Base64로 인코딩된 32바이트 마스터 키로 생성합니다.
    pub fn new(master_key: &str) -> Result<Self, CryptoError> {
        let key_bytes = base64::engine::general_purpose::STANDARD.decode(master_key.trim())?;
        if key_bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key_bytes.len()));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(Self { cipher })
    }

    fn generate_nonce() -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    /// 문자열을 암호화하여 `Base64(nonce ‖ ciphertext)`로 반환합니다.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Err(CryptoError::EmptyInput("plaintext"));
        }

        let nonce_bytes = Self::generate_nonce();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(combined))
    }

    /// `encrypt`가 만든 문자열을 복호화합니다.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        if encoded.is_empty() {
            return Err(CryptoError::EmptyInput("ciphertext"));
        }

        let combined = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        if combined.len() <= NONCE_SIZE {
            return Err(CryptoError::CiphertextTooShort(combined.len()));
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext).map_err(CryptoError::from)
    }
}

impl std::fmt::Debug for TokenEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEncryptor").finish_non_exhaustive()
    }
}

/// 계좌번호를 되돌릴 수 없는 짧은 키로 변환하는 해시기.
#[derive(Clone)]
pub struct AccountKeyHasher {
    mac: HmacSha256,
}

impl AccountKeyHasher {
    /// HMAC 비밀키로 생성합니다. 비밀키는 최소 32자 이상이어야 합니다.
    pub fn new(secret: &str) -> Result<Self, CryptoError> {
        if secret.trim().is_empty() {
            return Err(CryptoError::EmptyInput("hmac secret"));
        }
        if secret.chars().count() < MIN_HMAC_SECRET_LEN {
            return Err(CryptoError::SecretTooShort(secret.chars().count()));
        }

        let mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(Self { mac })
    }

    /// HMAC-SHA256 결과의 앞 16자(hex)를 반환합니다.
    pub fn hash(&self, account_number: &str) -> Result<String, CryptoError> {
        if account_number.trim().is_empty() {
            return Err(CryptoError::EmptyInput("account number"));
        }

        let mut mac = self.mac.clone();
        mac.update(account_number.as_bytes());
        let mut digest = hex::encode(mac.finalize().into_bytes());
        digest.truncate(HASH_PREFIX_LEN);
        Ok(digest)
    }
}

impl std::fmt::Debug for AccountKeyHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKeyHasher").finish_non_exhaustive()
    }
}

/// 새로운 마스터 키 생성 (초기 설정용)
///
/// # Example
/// ```
/// let key = trader_core::crypto::generate_master_key();
/// assert!(trader_core::TokenEncryptor::new(&key).is_ok());
/// ```
pub fn generate_master_key() -> String {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    base64::engine::general_purpose::STANDARD.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn test_encryptor() -> TokenEncryptor {
        TokenEncryptor::new(&generate_master_key()).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_token() {
        let encryptor = test_encryptor();
        let token = "eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9.payload.signature";

        let encoded = encryptor.encrypt(token).unwrap();
        assert_ne!(encoded, token);
        assert_eq!(encryptor.decrypt(&encoded).unwrap(), token);
    }

    #[test]
    fn test_same_plaintext_different_ciphertext() {
        let encryptor = test_encryptor();
        let a = encryptor.encrypt("token").unwrap();
        let b = encryptor.encrypt("token").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        let result = TokenEncryptor::new(&short_key);
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength(16))));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let encryptor = test_encryptor();
        assert!(matches!(encryptor.encrypt(""), Err(CryptoError::EmptyInput(_))));
        assert!(matches!(encryptor.decrypt(""), Err(CryptoError::EmptyInput(_))));
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let encryptor = test_encryptor();
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; NONCE_SIZE]);
        assert!(matches!(
            encryptor.decrypt(&short),
            Err(CryptoError::CiphertextTooShort(NONCE_SIZE))
        ));
    }

    #[test]
    fn test_other_key_cannot_decrypt() {
        let encoded = test_encryptor().encrypt("token").unwrap();
        let result = test_encryptor().decrypt(&encoded);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_hash_is_stable_prefix() {
        let hasher = AccountKeyHasher::new(SECRET).unwrap();
        let a = hasher.hash("12345678-01").unwrap();
        let b = hasher.hash("12345678-01").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_PREFIX_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!a.contains("12345678"));
    }

    #[test]
    fn test_hash_differs_per_account_and_secret() {
        let hasher = AccountKeyHasher::new(SECRET).unwrap();
        let other = AccountKeyHasher::new("fedcba9876543210fedcba9876543210").unwrap();

        assert_ne!(
            hasher.hash("12345678-01").unwrap(),
            hasher.hash("12345678-02").unwrap()
        );
        assert_ne!(
            hasher.hash("12345678-01").unwrap(),
            other.hash("12345678-01").unwrap()
        );
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            AccountKeyHasher::new("short"),
            Err(CryptoError::SecretTooShort(5))
        ));
        assert!(matches!(
            AccountKeyHasher::new("   "),
            Err(CryptoError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_blank_account_rejected() {
        let hasher = AccountKeyHasher::new(SECRET).unwrap();
        assert!(hasher.hash(" ").is_err());
    }
}
