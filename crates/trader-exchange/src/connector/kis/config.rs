//! 한국투자증권 (KIS) API 설정.
//!
//! KIS API는 계좌별 app_key와 app_secret을 사용한 OAuth 2.0 인증이 필요합니다.
//! 여러 계좌를 설정할 수 있으며, 시세 조회는 기본 계좌로 수행합니다.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trader_core::{mask_account_number, mask_app_key, mask_user_id, AccountSettings, KisSettings};

use crate::ExchangeError;

/// KIS API 환경 유형.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KisEnvironment {
    /// 실전투자
    #[default]
    Real,
    /// 모의투자
    Paper,
}

impl KisEnvironment {
    /// 이 환경의 REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        match self {
            KisEnvironment::Real => "https://openapi.koreainvestment.com:9443",
            KisEnvironment::Paper => "https://openapivts.koreainvestment.com:29443",
        }
    }

    /// 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "real" | "prod" => Some(KisEnvironment::Real),
            "paper" | "mock" | "test" => Some(KisEnvironment::Paper),
            _ => None,
        }
    }
}

/// KIS 계좌.
pub struct KisAccount {
    /// 계좌 이름
    pub name: String,
    /// 계좌번호 - 형식: "XXXXXXXX-XX"
    pub account_number: String,
    /// 앱키
    pub app_key: String,
    /// 앱시크릿
    app_secret: SecretString,
}

impl KisAccount {
    /// 새 계좌 생성.
    pub fn new(
        name: impl Into<String>,
        account_number: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        let app_secret: String = app_secret.into();
        Self {
            name: name.into(),
            account_number: account_number.into(),
            app_key: app_key.into(),
            app_secret: SecretString::new(app_secret.into()),
        }
    }

    /// 앱시크릿 원문 (요청 헤더/본문용).
    pub fn app_secret(&self) -> &str {
        self.app_secret.expose_secret()
    }

    /// 이름 또는 계좌번호가 일치하는지 확인.
    pub fn matches(&self, reference: &str) -> bool {
        self.name == reference || self.account_number == reference
    }
}

impl From<&AccountSettings> for KisAccount {
    fn from(settings: &AccountSettings) -> Self {
        Self::new(
            settings.name.clone(),
            settings.account_number.clone(),
            settings.app_key.clone(),
            settings.app_secret.clone(),
        )
    }
}

impl std::fmt::Debug for KisAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KisAccount")
            .field("name", &self.name)
            .field("account_number", &mask_account_number(&self.account_number))
            .field("app_key", &mask_app_key(&self.app_key))
            .finish_non_exhaustive()
    }
}

/// KIS API 설정.
pub struct KisConfig {
    /// 환경 (실전/모의)
    pub environment: KisEnvironment,
    /// REST 기본 URL 직접 지정 (테스트 서버 등)
    pub base_url_override: Option<String>,
    /// HTS 사용자 ID
    pub user_id: Option<String>,
    /// 요청 타임아웃
    pub timeout: Duration,
    /// 초당 최대 요청 수
    pub requests_per_second: u32,
    accounts: Vec<KisAccount>,
    default_account: Option<String>,
}

impl KisConfig {
    /// 계좌 목록으로 설정 생성.
    pub fn new(environment: KisEnvironment, accounts: Vec<KisAccount>) -> Self {
        Self {
            environment,
            base_url_override: None,
            user_id: None,
            timeout: Duration::from_secs(10),
            requests_per_second: 20,
            accounts,
            default_account: None,
        }
    }

    /// REST 기본 URL 직접 지정.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// 초당 최대 요청 수 설정.
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// 기본 계좌 이름 설정.
    pub fn with_default_account(mut self, name: impl Into<String>) -> Self {
        self.default_account = Some(name.into());
        self
    }

    /// 애플리케이션 설정에서 생성.
    ///
    /// # Errors
    /// 환경 값이 잘못되었거나 계좌가 없으면 `ExchangeError::InvalidRequest`.
    pub fn from_settings(settings: &KisSettings) -> Result<Self, ExchangeError> {
        let environment = KisEnvironment::parse(&settings.environment).ok_or_else(|| {
            ExchangeError::InvalidRequest(format!("알 수 없는 KIS 환경: {}", settings.environment))
        })?;

        if settings.accounts.is_empty() {
            return Err(ExchangeError::InvalidRequest(
                "KIS 계좌가 설정되지 않았습니다".to_string(),
            ));
        }

        Ok(Self {
            environment,
            base_url_override: settings.base_url.clone(),
            user_id: settings.user_id.clone(),
            timeout: settings.timeout(),
            requests_per_second: settings.requests_per_second.max(1),
            accounts: settings.accounts.iter().map(KisAccount::from).collect(),
            default_account: settings.default_account.clone(),
        })
    }

    /// REST 기본 URL.
    pub fn rest_base_url(&self) -> &str {
        self.base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.rest_base_url())
    }

    /// 이름 또는 계좌번호로 계좌 조회.
    pub fn find_account(&self, reference: &str) -> Option<&KisAccount> {
        self.accounts.iter().find(|a| a.matches(reference))
    }

    /// 기본 계좌 (지정된 이름 또는 첫 번째 계좌).
    pub fn default_account(&self) -> Option<&KisAccount> {
        match self.default_account {
            Some(ref name) => self.find_account(name),
            None => self.accounts.first(),
        }
    }

    /// 설정된 계좌 목록.
    pub fn accounts(&self) -> &[KisAccount] {
        &self.accounts
    }
}

impl std::fmt::Debug for KisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KisConfig")
            .field("environment", &self.environment)
            .field("base_url", &self.rest_base_url())
            .field("user_id", &self.user_id.as_deref().map(mask_user_id))
            .field("timeout", &self.timeout)
            .field("requests_per_second", &self.requests_per_second)
            .field("accounts", &self.accounts)
            .field("default_account", &self.default_account)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KisConfig {
        KisConfig::new(
            KisEnvironment::Paper,
            vec![
                KisAccount::new("main", "12345678-01", "PSmainkey", "main-secret"),
                KisAccount::new("isa", "87654321-01", "PSisakey", "isa-secret"),
            ],
        )
    }

    #[test]
    fn test_find_account_by_name_or_number() {
        let config = config();
        assert_eq!(config.find_account("isa").unwrap().account_number, "87654321-01");
        assert_eq!(config.find_account("12345678-01").unwrap().name, "main");
        assert!(config.find_account("unknown").is_none());
    }

    #[test]
    fn test_default_account() {
        assert_eq!(config().default_account().unwrap().name, "main");
        assert_eq!(
            config().with_default_account("isa").default_account().unwrap().name,
            "isa"
        );
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            config().rest_base_url(),
            "https://openapivts.koreainvestment.com:29443"
        );
        assert_eq!(
            config().with_base_url("http://127.0.0.1:1234").rest_base_url(),
            "http://127.0.0.1:1234"
        );
    }

    #[test]
    fn test_debug_masks_secrets() {
        let mut config = config();
        config.user_id = Some("P1234567".to_string());

        let debug = format!("{:?}", config);
        assert!(!debug.contains("main-secret"));
        assert!(!debug.contains("12345678"));
        assert!(!debug.contains("P1234567"));
        assert!(debug.contains("P1********"));
    }

    #[test]
    fn test_from_settings_rejects_unknown_environment() {
        let settings = KisSettings {
            environment: "staging".to_string(),
            ..Default::default()
        };
        assert!(KisConfig::from_settings(&settings).is_err());
    }
}
