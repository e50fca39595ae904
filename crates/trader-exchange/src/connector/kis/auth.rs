//! KIS OAuth 2.0 접근 토큰 발급.
//!
//! 처리 기능:
//! - 접근 토큰 발급 (POST /oauth2/tokenP)
//! - 토큰 만료 시각 파싱 (KST "YYYY-MM-DD HH:MM:SS")
//! - 인증 헤더 생성
//!
//! 캐시와 동시성 제어는 [`super::token_cache`]가 담당합니다.

use super::config::{KisAccount, KisConfig};
use crate::ExchangeError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use trader_core::{mask_access_token, mask_account_number, mask_app_key};

/// KIS OAuth 토큰 응답.
///
/// 증권사가 필드를 누락할 수 있으므로 모두 선택 값으로 받습니다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    /// 접근 토큰
    #[serde(default)]
    pub access_token: Option<String>,
    /// 접근 토큰 만료 시각 (KIS 형식: "YYYY-MM-DD HH:MM:SS", KST)
    #[serde(default)]
    pub access_token_token_expired: Option<String>,
    /// 토큰 타입 (항상 "Bearer")
    #[serde(default)]
    pub token_type: Option<String>,
    /// 토큰 만료 시간 (초)
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// 비어 있지 않은 토큰 값.
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// 만료 시각.
    ///
    /// 만료 문자열을 파싱할 수 없으면 `issued_at + expires_in`을 사용합니다.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.access_token_token_expired
            .as_deref()
            .and_then(parse_kis_datetime)
            .or_else(|| {
                self.expires_in
                    .and_then(Duration::try_seconds)
                    .and_then(|ttl| issued_at.checked_add_signed(ttl))
            })
    }
}

/// KIS OAuth 오류 응답 (토큰 발급 실패 시).
#[derive(Debug, Clone, Deserialize)]
pub struct KisOAuthErrorResponse {
    /// 에러 코드 (예: "EGW00103")
    pub error_code: String,
    /// 에러 설명 (예: "유효하지 않은 AppKey입니다.")
    pub error_description: String,
}

/// 계좌의 키 쌍으로 접근 토큰을 발급하는 주체.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// 토큰 발급. 응답 본문이 비어 있으면 `Ok(None)`.
    async fn issue(&self, account: &KisAccount) -> Result<Option<TokenResponse>, ExchangeError>;
}

/// HTTP 기반 KIS 토큰 발급기.
pub struct KisTokenIssuer {
    config: Arc<KisConfig>,
    client: Client,
}

impl KisTokenIssuer {
    /// 새로운 토큰 발급기 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: Arc<KisConfig>) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl TokenIssuer for KisTokenIssuer {
    async fn issue(&self, account: &KisAccount) -> Result<Option<TokenResponse>, ExchangeError> {
        info!(
            account = %mask_account_number(&account.account_number),
            app_key = %mask_app_key(&account.app_key),
            "Requesting new KIS access token"
        );

        let url = format!("{}/oauth2/tokenP", self.config.rest_base_url());

        #[derive(Serialize)]
        struct TokenRequest<'a> {
            grant_type: &'a str,
            appkey: &'a str,
            appsecret: &'a str,
        }

        let request_body = TokenRequest {
            grant_type: "client_credentials",
            appkey: &account.app_key,
            appsecret: account.app_secret(),
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(status = %status, "Token request failed");

            if let Ok(oauth_error) = serde_json::from_str::<KisOAuthErrorResponse>(&body) {
                let error_msg = match oauth_error.error_code.as_str() {
                    "EGW00103" => "유효하지 않은 AppKey입니다.".to_string(),
                    "EGW00102" => "AppKey가 만료되었습니다.".to_string(),
                    "EGW00101" => "AppSecret이 일치하지 않습니다.".to_string(),
                    _ => format!(
                        "{} ({})",
                        oauth_error.error_description, oauth_error.error_code
                    ),
                };
                return Err(ExchangeError::Unauthorized(error_msg));
            }

            return Err(ExchangeError::Unauthorized(format!(
                "Token request failed: HTTP {}",
                status.as_u16()
            )));
        }

        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }

        let token_resp: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ExchangeError::ParseError(format!("Failed to parse token response: {}", e))
        })?;

        if let Some(token) = token_resp.token() {
            info!(
                token = %mask_access_token(token),
                expires = ?token_resp.access_token_token_expired,
                "KIS access token obtained"
            );
        }

        Ok(Some(token_resp))
    }
}

/// KIS 날짜시간 형식 파싱 ("YYYY-MM-DD HH:MM:SS", KST).
pub fn parse_kis_datetime(s: &str) -> Option<DateTime<Utc>> {
    use chrono::{NaiveDateTime, TimeZone};
    use chrono_tz::Asia::Seoul;

    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
    let kst = Seoul.from_local_datetime(&naive).single()?;
    Some(kst.with_timezone(&Utc))
}

/// 인증된 시세 조회 요청을 위한 공통 헤더 생성.
///
/// # Errors
/// 헤더 값에 허용되지 않는 문자가 있으면 `ExchangeError::ParseError`를 반환합니다.
pub fn build_headers(
    account: &KisAccount,
    access_token: &str,
    tr_id: &str,
) -> Result<HeaderMap, ExchangeError> {
    fn value(raw: &str, name: &str) -> Result<HeaderValue, ExchangeError> {
        HeaderValue::from_str(raw)
            .map_err(|_| ExchangeError::ParseError(format!("{}에 유효하지 않은 문자 포함", name)))
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        "content-type",
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    headers.insert(
        "authorization",
        value(&format!("Bearer {}", access_token), "authorization")?,
    );
    headers.insert("appkey", value(&account.app_key, "appkey")?);
    headers.insert("appsecret", value(account.app_secret(), "appsecret")?);
    headers.insert("tr_id", value(tr_id, "tr_id")?);
    // P = 개인
    headers.insert("custtype", HeaderValue::from_static("P"));

    Ok(headers)
}
