//! 설정 관리 — logtail.toml 파싱 및 런타임 설정
//!
//! [`LogtailConfig`]는 검색 대상, 쿼리, tail 동작, 터널 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGTAIL_SEARCH_URL=es:9200` 형식)
//! 3. 설정 파일 (`logtail.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logtail_core::error::LogtailError> {
//! use logtail_core::config::LogtailConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogtailConfig::load("logtail.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogtailConfig::parse("[search]\nurl = \"es.internal:9200\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, LogtailError};
use crate::types::{QueryDefinition, SearchTarget};

/// 추적 페이지 크기 상한 (검색 엔진의 기본 `max_result_window`)
const MAX_FOLLOW_PAGE_SIZE: usize = 10_000;

/// logtail 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogtailConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 검색 대상 설정
    #[serde(default)]
    pub search: SearchConfig,
    /// 쿼리 설정
    #[serde(default)]
    pub query: QueryConfig,
    /// tail 루프 설정
    #[serde(default)]
    pub tail: TailConfig,
    /// SSH 터널 설정
    #[serde(default)]
    pub tunnel: TunnelConfig,
}

impl LogtailConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogtailError> {
        let config = Self::resolve(path, true).await?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일이 없으면 기본값에 환경변수 오버라이드만 적용합니다.
    ///
    /// 파일이 존재하지만 파싱에 실패하면 에러를 반환합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, LogtailError> {
        let config = Self::resolve(path, false).await?;
        config.validate()?;
        Ok(config)
    }

    /// 파일(또는 기본값)에 환경변수 오버라이드까지 적용하고 검증은 하지 않습니다.
    ///
    /// 호출자가 값을 더 덮어쓴 뒤 [`validate`](Self::validate)를 한 번 호출합니다.
    /// `require_file`이 `false`이면 파일이 없을 때 기본값에서 시작합니다.
    pub async fn resolve(
        path: impl AsRef<Path>,
        require_file: bool,
    ) -> Result<Self, LogtailError> {
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(LogtailError::Config(ConfigError::FileNotFound { .. })) if !require_file => {
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogtailError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogtailError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogtailError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogtailError> {
        toml::from_str(toml_str).map_err(|e| {
            LogtailError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGTAIL_{SECTION}_{FIELD}`
    /// 예: `LOGTAIL_QUERY_TIMESTAMP_FIELD=event.created`
    ///
    /// 숫자/불리언으로 해석할 수 없는 값은 `InvalidValue` 에러입니다.
    pub fn apply_env_overrides(&mut self) -> Result<(), LogtailError> {
        // General
        override_string(&mut self.general.log_level, "LOGTAIL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGTAIL_GENERAL_LOG_FORMAT");
        override_bool(&mut self.general.color, "LOGTAIL_GENERAL_COLOR")?;

        // Search
        override_string(&mut self.search.url, "LOGTAIL_SEARCH_URL");
        override_string(
            &mut self.search.index_pattern,
            "LOGTAIL_SEARCH_INDEX_PATTERN",
        );
        override_string(&mut self.search.user, "LOGTAIL_SEARCH_USER");
        override_string(&mut self.search.password, "LOGTAIL_SEARCH_PASSWORD");
        override_bool(
            &mut self.search.trace_requests,
            "LOGTAIL_SEARCH_TRACE_REQUESTS",
        )?;

        // Query
        override_csv(&mut self.query.terms, "LOGTAIL_QUERY_TERMS");
        override_string(
            &mut self.query.timestamp_field,
            "LOGTAIL_QUERY_TIMESTAMP_FIELD",
        );
        override_string(&mut self.query.after, "LOGTAIL_QUERY_AFTER");
        override_string(&mut self.query.before, "LOGTAIL_QUERY_BEFORE");
        override_string(&mut self.query.format, "LOGTAIL_QUERY_FORMAT");

        // Tail
        override_bool(&mut self.tail.follow, "LOGTAIL_TAIL_FOLLOW")?;
        override_usize(
            &mut self.tail.initial_entries,
            "LOGTAIL_TAIL_INITIAL_ENTRIES",
        )?;
        override_usize(
            &mut self.tail.follow_page_size,
            "LOGTAIL_TAIL_FOLLOW_PAGE_SIZE",
        )?;
        override_u64(&mut self.tail.poll_floor_ms, "LOGTAIL_TAIL_POLL_FLOOR_MS")?;
        override_u64(
            &mut self.tail.poll_ceiling_ms,
            "LOGTAIL_TAIL_POLL_CEILING_MS",
        )?;
        override_u64(&mut self.tail.poll_step_ms, "LOGTAIL_TAIL_POLL_STEP_MS")?;

        // Tunnel
        override_string(&mut self.tunnel.ssh, "LOGTAIL_TUNNEL_SSH");
        override_u64(
            &mut self.tunnel.ready_timeout_secs,
            "LOGTAIL_TUNNEL_READY_TIMEOUT_SECS",
        )?;
        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogtailError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty", "compact"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.search.url.trim().is_empty() {
            return Err(invalid("search.url", "must not be empty".to_owned()));
        }

        if let Err(e) = Regex::new(&self.search.index_pattern) {
            return Err(invalid(
                "search.index_pattern",
                format!("invalid regular expression: {e}"),
            ));
        }

        if self.query.timestamp_field.trim().is_empty() {
            return Err(invalid(
                "query.timestamp_field",
                "must not be empty".to_owned(),
            ));
        }

        validate_date("query.after", &self.query.after)?;
        validate_date("query.before", &self.query.before)?;

        if self.tail.initial_entries == 0 {
            return Err(invalid(
                "tail.initial_entries",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.tail.follow_page_size == 0 || self.tail.follow_page_size > MAX_FOLLOW_PAGE_SIZE {
            return Err(invalid(
                "tail.follow_page_size",
                format!("must be 1-{MAX_FOLLOW_PAGE_SIZE}"),
            ));
        }

        if self.tail.poll_floor_ms == 0 || self.tail.poll_floor_ms > self.tail.poll_ceiling_ms {
            return Err(invalid(
                "tail.poll_floor_ms",
                "must be greater than 0 and not exceed poll_ceiling_ms".to_owned(),
            ));
        }

        if self.tail.poll_step_ms == 0 {
            return Err(invalid(
                "tail.poll_step_ms",
                "must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// 쿼리 정의를 생성합니다.
    pub fn query_definition(&self) -> QueryDefinition {
        QueryDefinition {
            terms: self.query.terms.clone(),
            timestamp_field: self.query.timestamp_field.clone(),
            after: optional(&self.query.after),
            before: optional(&self.query.before),
            format: self.query.format.clone(),
        }
    }

    /// 검색 대상을 생성합니다. 터널 URL은 터널이 열린 뒤에 채워집니다.
    pub fn search_target(&self) -> SearchTarget {
        SearchTarget {
            url: self.search.url.clone(),
            index_pattern: self.search.index_pattern.clone(),
            tunnel_url: None,
            user: optional(&self.search.user),
            password: optional(&self.search.password),
        }
    }
}

fn invalid(field: &str, reason: String) -> LogtailError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

/// 사용자 날짜는 `YYYY-MM-DD`로 시작해야 합니다 (시각은 뒤에 붙을 수 있음).
fn validate_date(field: &str, value: &str) -> Result<(), LogtailError> {
    if value.is_empty() {
        return Ok(());
    }
    let starts_with_date = value.len() >= 10
        && value.is_char_boundary(10)
        && value[..10]
            .char_indices()
            .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
    if !starts_with_date {
        return Err(invalid(
            field,
            format!("'{value}' must start with a YYYY-MM-DD date"),
        ));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty, compact)
    pub log_format: String,
    /// 결과 라인 색상 출력 여부
    pub color: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_owned(),
            log_format: "compact".to_owned(),
            color: true,
        }
    }
}

/// 검색 대상 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 검색 엔진 URL (스킴/포트 생략 가능)
    pub url: String,
    /// 인덱스 이름 패턴 (정규식)
    pub index_pattern: String,
    /// Basic 인증 사용자 (빈 문자열이면 인증 없음)
    pub user: String,
    /// Basic 인증 비밀번호
    pub password: String,
    /// 요청 본문을 debug 레벨로 기록할지 여부
    pub trace_requests: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "localhost:9200".to_owned(),
            index_pattern: "logstash-[0-9].*".to_owned(),
            user: String::new(),
            password: String::new(),
            trace_requests: false,
        }
    }
}

/// 쿼리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// 검색어 목록
    pub terms: Vec<String>,
    /// 타임스탬프 필드명
    pub timestamp_field: String,
    /// 시작 시각 (포함, 빈 문자열이면 없음)
    pub after: String,
    /// 종료 시각 (미포함, 빈 문자열이면 없음)
    pub before: String,
    /// 출력 템플릿
    pub format: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            timestamp_field: "@timestamp".to_owned(),
            after: String::new(),
            before: String::new(),
            format: "%message".to_owned(),
        }
    }
}

/// tail 루프 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// 초기 검색 이후 계속 추적할지 여부 (false면 목록만 출력)
    pub follow: bool,
    /// 초기 검색에서 가져올 문서 수
    pub initial_entries: usize,
    /// 추적 검색 한 번에 가져올 최대 문서 수
    ///
    /// 한 폴링 주기 동안 이보다 많은 문서가 들어오면 초과분은 조회되지 않습니다.
    pub follow_page_size: usize,
    /// 폴링 간격 하한 (밀리초)
    pub poll_floor_ms: u64,
    /// 폴링 간격 상한 (밀리초)
    pub poll_ceiling_ms: u64,
    /// 결과가 없을 때 늘리는 폴링 간격 (밀리초)
    pub poll_step_ms: u64,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            follow: true,
            initial_entries: 50,
            follow_page_size: 9000,
            poll_floor_ms: 500,
            poll_ceiling_ms: 2000,
            poll_step_ms: 500,
        }
    }
}

/// SSH 터널 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// SSH 서버 (`[user@]host[:port]`, 빈 문자열이면 터널 없음)
    pub ssh: String,
    /// 로컬 포트가 열리기를 기다리는 최대 시간 (초)
    pub ready_timeout_secs: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            ssh: String::new(),
            ready_timeout_secs: 10,
        }
    }
}

impl TunnelConfig {
    /// 터널 사용 여부
    pub fn is_enabled(&self) -> bool {
        !self.ssh.trim().is_empty()
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) -> Result<(), LogtailError> {
    override_parsed(target, env_key, "true or false")
}

fn override_usize(target: &mut usize, env_key: &str) -> Result<(), LogtailError> {
    override_parsed(target, env_key, "a non-negative integer")
}

fn override_u64(target: &mut u64, env_key: &str) -> Result<(), LogtailError> {
    override_parsed(target, env_key, "a non-negative integer")
}

fn override_parsed<T: FromStr>(
    target: &mut T,
    env_key: &str,
    expected: &str,
) -> Result<(), LogtailError> {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .trim()
            .parse()
            .map_err(|_| invalid(env_key, format!("expected {expected}, got '{val}'")))?;
        debug!(env_key, "config value overridden from env");
    }
    Ok(())
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = LogtailConfig::default();
        assert_eq!(config.search.url, "localhost:9200");
        assert_eq!(config.query.timestamp_field, "@timestamp");
        assert_eq!(config.query.format, "%message");
        assert!(config.tail.follow);
        assert_eq!(config.tail.initial_entries, 50);
        assert_eq!(config.tail.follow_page_size, 9000);
        assert!(!config.tunnel.is_enabled());
    }

    #[test]
    fn default_config_passes_validation() {
        LogtailConfig::default().validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = LogtailConfig::parse("").unwrap();
        assert_eq!(config.search.index_pattern, "logstash-[0-9].*");
        assert_eq!(config.tail.poll_ceiling_ms, 2000);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[search]
url = "https://es.internal:9243"

[query]
terms = ["level:ERROR", "service:api"]
after = "2024-01-02"
"#;
        let config = LogtailConfig::parse(toml).unwrap();
        assert_eq!(config.search.url, "https://es.internal:9243");
        assert_eq!(config.search.index_pattern, "logstash-[0-9].*");
        assert_eq!(config.query.terms.len(), 2);

        let def = config.query_definition();
        assert_eq!(def.after(), Some("2024-01-02"));
        assert_eq!(def.before(), None);
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = LogtailConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            LogtailError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LogtailConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_bad_index_pattern() {
        let mut config = LogtailConfig::default();
        config.search.index_pattern = "logs-[".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("index_pattern"));
    }

    #[test]
    fn validate_rejects_malformed_dates() {
        let mut config = LogtailConfig::default();
        config.query.after = "02/01/2024".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("query.after"));

        config.query.after = "2024-01-02T10:00:00".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_oversized_follow_page() {
        let mut config = LogtailConfig::default();
        config.tail.follow_page_size = 20_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("follow_page_size"));
    }

    #[test]
    fn validate_rejects_floor_above_ceiling() {
        let mut config = LogtailConfig::default();
        config.tail.poll_floor_ms = 3000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_floor_ms"));
    }

    #[test]
    fn search_target_treats_empty_credentials_as_absent() {
        let config = LogtailConfig::default();
        let target = config.search_target();
        assert!(target.user.is_none());
        assert!(target.password.is_none());
        assert!(target.tunnel_url.is_none());
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: serial 테스트로 실행되어 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_LOGTAIL_STR", "overridden") };
        override_string(&mut val, "TEST_LOGTAIL_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_LOGTAIL_STR") };
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_is_rejected() {
        let mut val = false;
        // SAFETY: serial 테스트로 실행되어 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_LOGTAIL_BOOL_BAD", "not-a-bool") };
        let result = override_bool(&mut val, "TEST_LOGTAIL_BOOL_BAD");
        unsafe { std::env::remove_var("TEST_LOGTAIL_BOOL_BAD") };

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            LogtailError::Config(ConfigError::InvalidValue { .. })
        ));
        assert!(err.to_string().contains("TEST_LOGTAIL_BOOL_BAD"));
        assert!(err.to_string().contains("not-a-bool"));
        assert!(!val);
    }

    #[test]
    #[serial]
    fn env_override_u64_parses_value() {
        let mut val = 10u64;
        // SAFETY: serial 테스트로 실행되어 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_LOGTAIL_U64", " 750 ") };
        let result = override_u64(&mut val, "TEST_LOGTAIL_U64");
        unsafe { std::env::remove_var("TEST_LOGTAIL_U64") };

        result.unwrap();
        assert_eq!(val, 750);
    }

    #[test]
    #[serial]
    fn env_override_csv_drops_empty_items() {
        let mut val = vec!["a".to_owned()];
        // SAFETY: serial 테스트로 실행되어 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_LOGTAIL_CSV", "x, y,,z") };
        override_csv(&mut val, "TEST_LOGTAIL_CSV");
        assert_eq!(val, vec!["x", "y", "z"]);
        unsafe { std::env::remove_var("TEST_LOGTAIL_CSV") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = 42usize;
        override_usize(&mut val, "TEST_LOGTAIL_NONEXISTENT_12345").unwrap();
        assert_eq!(val, 42);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = LogtailConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = LogtailConfig::parse(&toml_str).unwrap();
        assert_eq!(config.search.url, parsed.search.url);
        assert_eq!(config.tail.follow_page_size, parsed.tail.follow_page_size);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = LogtailConfig::from_file("/nonexistent/path/logtail.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogtailError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn load_or_default_falls_back_when_missing() {
        let config = LogtailConfig::load_or_default("/nonexistent/path/logtail.toml")
            .await
            .unwrap();
        assert_eq!(config.search.url, "localhost:9200");
    }
}
