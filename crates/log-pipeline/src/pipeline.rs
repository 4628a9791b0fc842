//! 파이프라인 오케스트레이션 -- 수집/통계/알림의 전체 흐름을 관리합니다.
//!
//! [`TrafficPipeline`]은 [`LogSource`]에서 이벤트를 꺼내
//! 통계 모니터와 알림 모니터에 같은 순서로 전달합니다.
//!
//! # 내부 아키텍처
//! ```text
//! FileCollector -> mpsc -> TrafficPipeline -+-> mpsc -> StatisticsMonitor -> Notifier
//!                                           +-> mpsc -> AlertMonitor      -> Notifier
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use trafficwatch_core::pipeline::{ConsoleNotifier, LogParser, Notifier};
use trafficwatch_core::types::AccessEvent;

use crate::alert::AlertMonitor;
use crate::collector::{FileCollectorConfig, LogSource};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::parser::AccessLogParser;
use crate::stats::{StatisticsAggregator, StatisticsMonitor};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 트래픽 파이프라인 -- 로그 소스를 두 소비자로 fan-out 합니다.
///
/// # 사용 예시
/// ```ignore
/// use trafficwatch_log_pipeline::TrafficPipelineBuilder;
///
/// let mut pipeline = TrafficPipelineBuilder::new()
///     .config(config)
///     .notifier(notifier)
///     .build()?;
///
/// let source = pipeline.open_source().await?;
/// pipeline.run(source).await?;
/// ```
pub struct TrafficPipeline {
    config: PipelineConfig,
    state: PipelineState,
    parser: Arc<dyn LogParser>,
    notifier: Arc<dyn Notifier>,
    statistics: Option<StatisticsMonitor>,
    alert: Option<AlertMonitor>,
    shutdown: CancellationToken,
    processed_count: u64,
}

impl TrafficPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 두 소비자에 전달된 이벤트 수를 반환합니다.
    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 실행 루프를 외부에서 끝내기 위한 토큰
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 설정된 파일을 열어 로그 소스를 만듭니다.
    ///
    /// 파일을 열 수 없으면 `LogPipelineError::Collector`를 반환합니다.
    pub async fn open_source(&self) -> Result<LogSource, LogPipelineError> {
        LogSource::open(
            FileCollectorConfig::from(&self.config),
            Arc::clone(&self.parser),
        )
        .await
    }

    /// 소스가 끝나거나 종료 토큰이 취소될 때까지 이벤트를 fan-out 합니다.
    ///
    /// 개별 이벤트 처리 실패는 루프를 중단하지 않습니다.
    pub async fn run(&mut self, mut source: LogSource) -> Result<(), LogPipelineError> {
        if self.state != PipelineState::Initialized {
            return Err(LogPipelineError::AlreadyStarted);
        }

        let statistics = StatisticsMonitor::spawn(
            StatisticsAggregator::new(self.config.grouping, self.config.response_classes),
            self.config.stats_interval(),
            Arc::clone(&self.notifier),
            self.config.channel_capacity,
        );
        let alert = AlertMonitor::spawn(
            self.config.alert_window(),
            self.config.alert_threshold,
            self.config.alert_tick(),
            Arc::clone(&self.notifier),
            self.config.channel_capacity,
        );

        self.state = PipelineState::Running;
        tracing::info!(
            path = %source.path().display(),
            stats_interval_secs = self.config.stats_interval_secs,
            alert_window_secs = self.config.alert_window_secs,
            alert_threshold = self.config.alert_threshold,
            "traffic pipeline started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    // 닫은 뒤에도 채널에 남은 이벤트는 모두 전달
                    source.close();
                    while let Some(event) = source.next_event().await {
                        self.fan_out(&statistics, &alert, event).await;
                    }
                    break;
                }
                event = source.next_event() => {
                    let Some(event) = event else {
                        tracing::info!("log source ended");
                        break;
                    };
                    self.fan_out(&statistics, &alert, event).await;
                }
            }
        }

        let stats = source.stats();
        tracing::info!(
            processed = self.processed_count,
            lines = stats.lines_read(),
            parse_errors = stats.parse_errors(),
            "traffic pipeline loop finished"
        );

        self.statistics = Some(statistics);
        self.alert = Some(alert);
        self.shutdown().await;
        Ok(())
    }

    /// 이벤트 하나를 두 소비자에 전달합니다. 전달 실패는 기록만 합니다.
    async fn fan_out(
        &mut self,
        statistics: &StatisticsMonitor,
        alert: &AlertMonitor,
        event: Arc<AccessEvent>,
    ) {
        tracing::trace!(event = %event, "event received");

        let (stats_result, alert_result) =
            tokio::join!(statistics.monitor(Arc::clone(&event)), alert.check(event));
        if let Err(e) = stats_result {
            tracing::warn!(error = %e, "failed to deliver event to statistics monitor");
        }
        if let Err(e) = alert_result {
            tracing::warn!(error = %e, "failed to deliver event to alert monitor");
        }
        self.processed_count += 1;
    }

    /// 두 소비자를 정지합니다. 여러 번 호출해도 안전합니다.
    pub async fn shutdown(&mut self) {
        if self.state == PipelineState::Stopped {
            return;
        }

        self.shutdown.cancel();
        if let Some(statistics) = self.statistics.take() {
            statistics.stop().await;
        }
        if let Some(alert) = self.alert.take() {
            alert.stop().await;
        }

        self.state = PipelineState::Stopped;
        tracing::info!("traffic pipeline stopped");
    }
}

/// 파이프라인 빌더
#[derive(Default)]
pub struct TrafficPipelineBuilder {
    config: Option<PipelineConfig>,
    notifier: Option<Arc<dyn Notifier>>,
    parser: Option<Arc<dyn LogParser>>,
}

impl TrafficPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 요약/알림을 받을 알림기를 지정합니다. 기본값은 [`ConsoleNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 로그 파서를 지정합니다. 기본값은 [`AccessLogParser`].
    pub fn parser(mut self, parser: Arc<dyn LogParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// 설정을 검증하고 파이프라인을 생성합니다.
    pub fn build(self) -> Result<TrafficPipeline, LogPipelineError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let parser = match self.parser {
            Some(parser) => parser,
            None => Arc::new(
                AccessLogParser::new()?.with_max_line_length(config.max_line_length),
            ),
        };
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(ConsoleNotifier));

        Ok(TrafficPipeline {
            config,
            state: PipelineState::Initialized,
            parser,
            notifier,
            statistics: None,
            alert: None,
            shutdown: CancellationToken::new(),
            processed_count: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let pipeline = TrafficPipelineBuilder::new().build().unwrap();
        assert_eq!(pipeline.state_name(), "initialized");
        assert_eq!(pipeline.processed_count(), 0);
        assert_eq!(pipeline.config().alert_threshold, 1000);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let config = PipelineConfig {
            stats_interval_secs: 0,
            ..Default::default()
        };
        let result = TrafficPipelineBuilder::new().config(config).build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn open_source_fails_for_missing_file() {
        let config = PipelineConfig {
            path: "/nonexistent/trafficwatch/access.log".into(),
            ..Default::default()
        };
        let pipeline = TrafficPipelineBuilder::new().config(config).build().unwrap();
        let result = pipeline.open_source().await;
        assert!(matches!(result, Err(LogPipelineError::Collector { .. })));
    }

    #[tokio::test]
    async fn shutdown_before_run_is_idempotent() {
        let mut pipeline = TrafficPipelineBuilder::new().build().unwrap();
        pipeline.shutdown().await;
        pipeline.shutdown().await;
        assert_eq!(pipeline.state_name(), "stopped");
        assert!(pipeline.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn run_after_stop_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = PipelineConfig {
            path: file.path().to_path_buf(),
            ..Default::default()
        };
        let mut pipeline = TrafficPipelineBuilder::new().config(config).build().unwrap();
        let source = pipeline.open_source().await.unwrap();
        pipeline.shutdown().await;

        let result = pipeline.run(source).await;
        assert!(matches!(result, Err(LogPipelineError::AlreadyStarted)));
    }
}
