//! tracing을 사용한 로깅 인프라.
//!
//! 이 모듈은 다양한 출력 형식을 지원하는 구조화된 로깅을 제공합니다:
//! - **pretty**: 개발용 사람이 읽기 쉬운 형식
//! - **json**: 운영환경/로그 집계용 JSON 형식
//! - **compact**: 로그 크기를 줄이기 위한 간결한 형식
//!
//! 계좌번호, 앱키, 토큰 등 민감정보는 `mask_*` 함수를 거친 뒤에만 로그에 남깁니다.
//! 마스킹 결과는 원래 값의 길이를 드러내지 않도록 고정 길이입니다.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;
use crate::error::{TraderError, TraderResult};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// 색상이 포함된 사람이 읽기 쉬운 형식 (개발용)
    #[default]
    Pretty,
    /// 로그 집계용 JSON 형식 (운영용)
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "trader_collector=debug")
    pub level: String,
    /// 출력 형식
    pub format: LogFormat,
    /// span 이벤트 포함 여부 (진입/종료)
    pub with_span_events: bool,
    /// 파일명과 줄 번호 포함 여부
    pub with_file: bool,
    /// 대상(모듈 경로) 포함 여부
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_span_events: false,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// 새 로그 설정을 생성합니다.
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// 로그 형식을 설정합니다.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// span 이벤트를 활성화합니다.
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    /// 애플리케이션 설정의 `[logging]` 섹션에서 생성합니다.
    ///
    /// `LOG_FORMAT` 환경 변수가 있으면 설정 파일보다 우선합니다.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        let format = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .or_else(|| settings.format.parse().ok())
            .unwrap_or_default();

        Self {
            level: settings.level.clone(),
            format,
            ..Default::default()
        }
    }
}

/// 주어진 설정으로 로깅 시스템을 초기화합니다.
///
/// `RUST_LOG`가 설정되어 있으면 `config.level`보다 우선합니다.
///
/// ```no_run
/// use trader_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> TraderResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| TraderError::Config(format!("로그 레벨 파싱 실패: {}", e)))?;

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer()
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_target(config.with_target)
        .with_span_events(span_events);

    let result = match config.format {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
    };
    result.map_err(|e| TraderError::Internal(format!("로깅 초기화 실패: {}", e)))?;

    tracing::info!(
        format = ?config.format,
        level = %config.level,
        "Logging initialized"
    );

    Ok(())
}

/// 배치 작업 단위 span을 생성하는 매크로.
#[macro_export]
macro_rules! job_span {
    ($job:expr) => {
        tracing::info_span!("job", job = %$job)
    };
    ($job:expr, $stock_code:expr, $asset_type:expr) => {
        tracing::info_span!("instrument", job = %$job, stock_code = %$stock_code, asset_type = ?$asset_type)
    };
}

// =============================================================================
// 민감정보 마스킹
// =============================================================================

const FALLBACK_MASK: &str = "***";

/// 사용자 ID: 앞 2자 + `********`.
pub fn mask_user_id(user_id: &str) -> String {
    mask_keep_prefix(user_id, 2, "********")
}

/// 계좌번호: `*******` + 뒤 4자.
pub fn mask_account_number(account_number: &str) -> String {
    let chars: Vec<char> = account_number.chars().collect();
    if chars.len() <= 4 {
        return FALLBACK_MASK.to_string();
    }
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("*******{}", suffix)
}

/// 앱키: 앞 4자 + `*` 12개.
pub fn mask_app_key(app_key: &str) -> String {
    mask_keep_prefix(app_key, 4, "************")
}

/// 앱시크릿: 항상 `*` 22개.
pub fn mask_app_secret(_app_secret: &str) -> String {
    "**********************".to_string()
}

/// 접근 토큰: 앞 4자 + `*` 16개.
pub fn mask_access_token(token: &str) -> String {
    mask_keep_prefix(token, 4, "****************")
}

fn mask_keep_prefix(value: &str, keep: usize, mask: &str) -> String {
    if value.chars().count() <= keep {
        return FALLBACK_MASK.to_string();
    }
    let prefix: String = value.chars().take(keep).collect();
    format!("{}{}", prefix, mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("invalid".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new("debug")
            .with_format(LogFormat::Json)
            .with_span_events(true);

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.with_span_events);
    }

    #[test]
    fn test_mask_account_number() {
        assert_eq!(mask_account_number("12345678-01"), "*******8-01");
        assert_eq!(mask_account_number("1234"), "***");
        assert_eq!(mask_account_number(""), "***");
    }

    #[test]
    fn test_mask_keys_and_tokens() {
        assert_eq!(mask_user_id("P1234567"), "P1********");
        assert_eq!(mask_app_key("PSabcdefghijklmnop"), "PSab************");
        assert_eq!(mask_app_secret("anything"), "**********************");
        assert_eq!(mask_access_token("eyJhbGciOiJIUzI1NiJ9"), "eyJh****************");
        assert_eq!(mask_access_token("abc"), "***");
    }

    #[test]
    fn test_mask_hides_length() {
        let short = mask_access_token("eyJh12345");
        let long = mask_access_token(&"eyJh".repeat(200));
        assert_eq!(short.len(), long.len());
    }

    proptest::proptest! {
        #[test]
        fn prop_masks_have_fixed_length(value in "[A-Za-z0-9-]{5,256}") {
            proptest::prop_assert_eq!(mask_account_number(&value).chars().count(), 11);
            proptest::prop_assert_eq!(mask_app_key(&value).chars().count(), 16);
            proptest::prop_assert_eq!(mask_access_token(&value).chars().count(), 20);
        }

        #[test]
        fn prop_masked_token_never_contains_tail(value in "[a-z]{4}[0-9]{8,64}") {
            let masked = mask_access_token(&value);
            proptest::prop_assert!(!masked.contains(&value[4..]));
        }
    }
}
