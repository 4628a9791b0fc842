//! 설정 관리 -- trafficwatch.toml 파싱 및 런타임 설정
//!
//! [`TrafficwatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, daemon에서 적용)
//! 2. 환경변수 (`TRAFFICWATCH_ALERT_THRESHOLD=500` 형식)
//! 3. 설정 파일 (`trafficwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), trafficwatch_core::error::TrafficwatchError> {
//! use trafficwatch_core::config::TrafficwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TrafficwatchConfig::load("trafficwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TrafficwatchConfig::parse("[alert]\nthreshold = 10")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TrafficwatchError};

// --- 설정값 상한 (타이머/버퍼 연산이 넘치지 않도록) ---

/// 최대 라인 길이 상한 (16MB)
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;
/// 채널 용량 상한
pub const MAX_CHANNEL_CAPACITY: usize = 1_000_000;
/// 폴링/재평가 주기 상한 (밀리초, 1시간)
pub const MAX_PERIOD_MS: u64 = 60 * 60 * 1000;
/// 요약 주기 상한 (초, 1일)
pub const MAX_SUMMARY_INTERVAL_SECS: u64 = 24 * 60 * 60;
/// 알림 윈도우 상한 (초, 7일)
pub const MAX_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

/// trafficwatch 통합 설정
///
/// `trafficwatch.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 소스 설정
    #[serde(default)]
    pub source: SourceConfig,
    /// 통계 집계 설정
    #[serde(default)]
    pub statistics: StatisticsConfig,
    /// 트래픽 알림 설정
    #[serde(default)]
    pub alert: AlertConfig,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TrafficwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TrafficwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TrafficwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TrafficwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TrafficwatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TrafficwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            TrafficwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TRAFFICWATCH_{SECTION}_{FIELD}`
    /// 예: `TRAFFICWATCH_SOURCE_PATH=/var/log/nginx/access.log`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TRAFFICWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TRAFFICWATCH_GENERAL_LOG_FORMAT");

        // Source
        override_string(&mut self.source.path, "TRAFFICWATCH_SOURCE_PATH");
        override_u64(
            &mut self.source.poll_interval_ms,
            "TRAFFICWATCH_SOURCE_POLL_INTERVAL_MS",
        );
        override_usize(
            &mut self.source.max_line_length,
            "TRAFFICWATCH_SOURCE_MAX_LINE_LENGTH",
        );
        override_bool(
            &mut self.source.read_from_start,
            "TRAFFICWATCH_SOURCE_READ_FROM_START",
        );
        override_usize(
            &mut self.source.channel_capacity,
            "TRAFFICWATCH_SOURCE_CHANNEL_CAPACITY",
        );

        // Statistics
        override_u64(
            &mut self.statistics.interval_secs,
            "TRAFFICWATCH_STATISTICS_INTERVAL_SECS",
        );
        override_string(
            &mut self.statistics.group_by,
            "TRAFFICWATCH_STATISTICS_GROUP_BY",
        );
        override_bool(
            &mut self.statistics.response_classes,
            "TRAFFICWATCH_STATISTICS_RESPONSE_CLASSES",
        );

        // Alert
        override_u64(&mut self.alert.window_secs, "TRAFFICWATCH_ALERT_WINDOW_SECS");
        override_u64(&mut self.alert.threshold, "TRAFFICWATCH_ALERT_THRESHOLD");
        override_u64(&mut self.alert.tick_ms, "TRAFFICWATCH_ALERT_TICK_MS");

        // Metrics
        override_bool(&mut self.metrics.enabled, "TRAFFICWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "TRAFFICWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "TRAFFICWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TrafficwatchError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.source.path.is_empty() {
            return Err(invalid("source.path", "must not be empty"));
        }
        if self.source.poll_interval_ms == 0 || self.source.poll_interval_ms > MAX_PERIOD_MS {
            return Err(invalid(
                "source.poll_interval_ms",
                format!("must be 1-{}", MAX_PERIOD_MS),
            ));
        }
        if self.source.max_line_length == 0 || self.source.max_line_length > MAX_LINE_LENGTH {
            return Err(invalid(
                "source.max_line_length",
                format!("must be 1-{}", MAX_LINE_LENGTH),
            ));
        }
        if self.source.channel_capacity == 0 || self.source.channel_capacity > MAX_CHANNEL_CAPACITY
        {
            return Err(invalid(
                "source.channel_capacity",
                format!("must be 1-{}", MAX_CHANNEL_CAPACITY),
            ));
        }

        if self.statistics.interval_secs == 0
            || self.statistics.interval_secs > MAX_SUMMARY_INTERVAL_SECS
        {
            return Err(invalid(
                "statistics.interval_secs",
                format!("must be 1-{}", MAX_SUMMARY_INTERVAL_SECS),
            ));
        }
        let valid_groupings = ["path", "host"];
        if !valid_groupings.contains(&self.statistics.group_by.as_str()) {
            return Err(invalid(
                "statistics.group_by",
                format!("must be one of: {}", valid_groupings.join(", ")),
            ));
        }

        if self.alert.window_secs == 0 || self.alert.window_secs > MAX_WINDOW_SECS {
            return Err(invalid(
                "alert.window_secs",
                format!("must be 1-{}", MAX_WINDOW_SECS),
            ));
        }
        if self.alert.threshold == 0 {
            return Err(invalid("alert.threshold", "must be greater than 0"));
        }
        if self.alert.tick_ms == 0 || self.alert.tick_ms > MAX_PERIOD_MS {
            return Err(invalid("alert.tick_ms", format!("must be 1-{}", MAX_PERIOD_MS)));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be non-zero when metrics are enabled",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> TrafficwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 로그 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// tail 할 접근 로그 파일 경로
    pub path: String,
    /// EOF 도달 시 재시도 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 파일 처음부터 읽을지 여부 (false면 현재 끝에서 시작)
    pub read_from_start: bool,
    /// 단계 간 이벤트 채널 용량
    pub channel_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: "access.log".to_owned(),
            poll_interval_ms: 200,
            max_line_length: 64 * 1024, // 64KB
            read_from_start: true,
            channel_capacity: 1024,
        }
    }
}

/// 통계 집계 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// 요약 발행 주기 (초)
    pub interval_secs: u64,
    /// 섹션 그룹 기준 (path, host)
    pub group_by: String,
    /// 응답 분류(2xx/3xx/4xx/5xx) 카운트 포함 여부
    pub response_classes: bool,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            group_by: "path".to_owned(),
            response_classes: true,
        }
    }
}

/// 트래픽 알림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// 슬라이딩 윈도우 길이 (초)
    pub window_secs: u64,
    /// 윈도우 내 요청 수 임계값 (초과 시 알림)
    pub threshold: u64,
    /// 트래픽이 없을 때 윈도우 감쇠를 위한 재평가 주기 (밀리초)
    pub tick_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            window_secs: 120,
            threshold: 1000,
            tick_ms: 1000,
        }
    }
}

/// Prometheus 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9184,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
