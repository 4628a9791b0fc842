//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`TrafficwatchConfig`](trafficwatch_core::config::TrafficwatchConfig)를
//! 기반으로 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use trafficwatch_core::config::TrafficwatchConfig;
//! use trafficwatch_log_pipeline::config::PipelineConfig;
//!
//! let core_config = TrafficwatchConfig::default();
//! let config = PipelineConfig::from_core(&core_config)?;
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use trafficwatch_core::config::{
    MAX_CHANNEL_CAPACITY, MAX_LINE_LENGTH, MAX_PERIOD_MS, MAX_SUMMARY_INTERVAL_SECS, MAX_WINDOW_SECS,
};

use crate::error::LogPipelineError;

/// 통계 섹션 그룹 기준
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionGrouping {
    /// 요청 경로의 첫 구간 (`/pages/reports` -> `/pages`) (기본값)
    #[default]
    Path,
    /// 목적지 호스트
    Host,
}

impl FromStr for SectionGrouping {
    type Err = LogPipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(Self::Path),
            "host" => Ok(Self::Host),
            other => Err(LogPipelineError::Config {
                field: "group_by".to_owned(),
                reason: format!("unknown grouping '{other}', expected 'path' or 'host'"),
            }),
        }
    }
}

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// tail 할 파일 경로
    pub path: PathBuf,
    /// EOF 재시도 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 파일 처음부터 읽을지 여부
    pub read_from_start: bool,
    /// 단계 간 채널 용량
    pub channel_capacity: usize,
    /// 통계 요약 발행 주기 (초)
    pub stats_interval_secs: u64,
    /// 섹션 그룹 기준
    pub grouping: SectionGrouping,
    /// 요약에 응답 분류 카운트 포함 여부
    pub response_classes: bool,
    /// 알림 윈도우 길이 (초)
    pub alert_window_secs: u64,
    /// 알림 임계값 (요청 수)
    pub alert_threshold: u64,
    /// 알림 윈도우 재평가 주기 (밀리초)
    pub alert_tick_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("access.log"),
            poll_interval_ms: 200,
            max_line_length: 64 * 1024, // 64KB
            read_from_start: true,
            channel_capacity: 1024,
            stats_interval_secs: 10,
            grouping: SectionGrouping::Path,
            response_classes: true,
            alert_window_secs: 120,
            alert_threshold: 1000,
            alert_tick_ms: 1000,
        }
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(
        core: &trafficwatch_core::config::TrafficwatchConfig,
    ) -> Result<Self, LogPipelineError> {
        Ok(Self {
            path: PathBuf::from(&core.source.path),
            poll_interval_ms: core.source.poll_interval_ms,
            max_line_length: core.source.max_line_length,
            read_from_start: core.source.read_from_start,
            channel_capacity: core.source.channel_capacity,
            stats_interval_secs: core.statistics.interval_secs,
            grouping: core.statistics.group_by.parse()?,
            response_classes: core.statistics.response_classes,
            alert_window_secs: core.alert.window_secs,
            alert_threshold: core.alert.threshold,
            alert_tick_ms: core.alert.tick_ms,
        })
    }

    /// EOF 재시도 간격
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 통계 발행 주기
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// 알림 윈도우 길이
    pub fn alert_window(&self) -> Duration {
        Duration::from_secs(self.alert_window_secs)
    }

    /// 알림 재평가 주기
    pub fn alert_tick(&self) -> Duration {
        Duration::from_millis(self.alert_tick_ms)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.path.as_os_str().is_empty() {
            return Err(config_err("path", "must not be empty"));
        }

        check_range("poll_interval_ms", self.poll_interval_ms, MAX_PERIOD_MS)?;
        check_range(
            "max_line_length",
            self.max_line_length as u64,
            MAX_LINE_LENGTH as u64,
        )?;
        check_range(
            "channel_capacity",
            self.channel_capacity as u64,
            MAX_CHANNEL_CAPACITY as u64,
        )?;
        check_range(
            "stats_interval_secs",
            self.stats_interval_secs,
            MAX_SUMMARY_INTERVAL_SECS,
        )?;
        check_range("alert_window_secs", self.alert_window_secs, MAX_WINDOW_SECS)?;
        check_range("alert_tick_ms", self.alert_tick_ms, MAX_PERIOD_MS)?;

        if self.alert_threshold == 0 {
            return Err(config_err("alert_threshold", "must be greater than 0"));
        }

        Ok(())
    }
}

fn check_range(field: &str, value: u64, max: u64) -> Result<(), LogPipelineError> {
    if value == 0 || value > max {
        return Err(config_err(field, format!("must be 1-{}", max)));
    }
    Ok(())
}

fn config_err(field: &str, reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// tail 할 파일 경로를 설정합니다.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// EOF 재시도 간격(밀리초)을 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.config.max_line_length = len;
        self
    }

    /// 파일 처음부터 읽을지 설정합니다.
    pub fn read_from_start(mut self, from_start: bool) -> Self {
        self.config.read_from_start = from_start;
        self
    }

    /// 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// 통계 발행 주기(초)를 설정합니다.
    pub fn stats_interval_secs(mut self, secs: u64) -> Self {
        self.config.stats_interval_secs = secs;
        self
    }

    /// 섹션 그룹 기준을 설정합니다.
    pub fn grouping(mut self, grouping: SectionGrouping) -> Self {
        self.config.grouping = grouping;
        self
    }

    /// 응답 분류 카운트 포함 여부를 설정합니다.
    pub fn response_classes(mut self, enabled: bool) -> Self {
        self.config.response_classes = enabled;
        self
    }

    /// 알림 윈도우 길이(초)를 설정합니다.
    pub fn alert_window_secs(mut self, secs: u64) -> Self {
        self.config.alert_window_secs = secs;
        self
    }

    /// 알림 임계값을 설정합니다.
    pub fn alert_threshold(mut self, threshold: u64) -> Self {
        self.config.alert_threshold = threshold;
        self
    }

    /// 알림 재평가 주기(밀리초)를 설정합니다.
    pub fn alert_tick_ms(mut self, ms: u64) -> Self {
        self.config.alert_tick_ms = ms;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
