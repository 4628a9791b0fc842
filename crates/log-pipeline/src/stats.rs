//! 섹션별 트래픽 통계 -- 주기적으로 요약을 발행하는 집계기
//!
//! [`StatisticsAggregator`]는 이벤트를 섹션 키별 [`TrafficStatistics`]와
//! `Total Traffic` 버킷에 누적하는 순수 상태이고,
//! [`StatisticsMonitor`]는 이를 단독 소유하는 태스크에서 이벤트 수신과
//! 주기적 요약 발행을 `tokio::select!`로 직렬화합니다.
//!
//! # 요약 형식
//! ```text
//! Section: /pages
//! Average Payload: 15.000000
//! Total Payload: 30
//! Successes: 2
//! Redirects: 0
//! Client Failures: 0
//! Server Failures: 0
//! Count: 2
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use trafficwatch_core::metrics as m;
use trafficwatch_core::pipeline::Notifier;
use trafficwatch_core::types::{AccessEvent, ResponseClass};

use crate::config::SectionGrouping;
use crate::consumer::ConsumerHandle;
use crate::error::LogPipelineError;

/// 전체 트래픽 버킷 이름
pub const TOTAL_TRAFFIC: &str = "Total Traffic";

/// 요약 주기 상한. 더 긴 값은 이 값으로 잘린다.
pub const MAX_SUMMARY_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// 섹션 하나의 누적 통계
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficStatistics {
    section: String,
    average_payload: f64,
    total_payload: u64,
    count: u64,
    successes: u64,
    redirects: u64,
    client_failures: u64,
    server_failures: u64,
}

impl TrafficStatistics {
    /// 빈 통계를 생성합니다.
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            average_payload: 0.0,
            total_payload: 0,
            count: 0,
            successes: 0,
            redirects: 0,
            client_failures: 0,
            server_failures: 0,
        }
    }

    /// 이벤트 하나를 누적합니다. 평균은 이벤트를 보관하지 않고 점진적으로 갱신됩니다.
    pub fn record(&mut self, event: &AccessEvent) {
        let count = self.count as f64;
        self.average_payload =
            (self.average_payload * count + event.payload_size as f64) / (count + 1.0);
        self.total_payload = self.total_payload.saturating_add(event.payload_size);
        self.count += 1;

        match event.response_class() {
            ResponseClass::Success => self.successes += 1,
            ResponseClass::Redirect => self.redirects += 1,
            ResponseClass::ClientFailure => self.client_failures += 1,
            ResponseClass::ServerFailure => self.server_failures += 1,
            ResponseClass::Other => {}
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn average_payload(&self) -> f64 {
        self.average_payload
    }

    pub fn total_payload(&self) -> u64 {
        self.total_payload
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn redirects(&self) -> u64 {
        self.redirects
    }

    pub fn client_failures(&self) -> u64 {
        self.client_failures
    }

    pub fn server_failures(&self) -> u64 {
        self.server_failures
    }

    /// 요약 블록 하나를 렌더링합니다.
    pub fn render(&self, response_classes: bool) -> String {
        let mut out = format!(
            "Section: {}\nAverage Payload: {:.6}\nTotal Payload: {}\n",
            self.section, self.average_payload, self.total_payload
        );
        if response_classes {
            out.push_str(&format!(
                "Successes: {}\nRedirects: {}\nClient Failures: {}\nServer Failures: {}\n",
                self.successes, self.redirects, self.client_failures, self.server_failures
            ));
        }
        out.push_str(&format!("Count: {}", self.count));
        out
    }
}

/// 이벤트의 섹션 키를 계산합니다.
///
/// - `Path`: 쿼리/프래그먼트를 제거한 경로의 첫 구간 (`/pages/reports` -> `/pages`)
/// - `Host`: 목적지 호스트
///
/// 키를 만들 수 없으면 `None` (전체 트래픽에만 집계).
pub fn section_key(event: &AccessEvent, grouping: SectionGrouping) -> Option<String> {
    match grouping {
        SectionGrouping::Path => {
            let path = event
                .path
                .split(['?', '#'])
                .next()
                .unwrap_or_default();
            if path.is_empty() {
                return None;
            }
            let segments: Vec<&str> = path.splitn(3, '/').take(2).collect();
            Some(segments.join("/")).filter(|key| !key.is_empty())
        }
        SectionGrouping::Host => Some(event.host.clone()).filter(|host| !host.is_empty()),
    }
}

/// 섹션별 통계 집계기
///
/// 모든 이벤트는 섹션 버킷과 `Total Traffic` 버킷을 함께 갱신합니다.
#[derive(Debug)]
pub struct StatisticsAggregator {
    grouping: SectionGrouping,
    response_classes: bool,
    sections: BTreeMap<String, TrafficStatistics>,
    total: TrafficStatistics,
}

impl StatisticsAggregator {
    pub fn new(grouping: SectionGrouping, response_classes: bool) -> Self {
        Self {
            grouping,
            response_classes,
            sections: BTreeMap::new(),
            total: TrafficStatistics::new(TOTAL_TRAFFIC),
        }
    }

    /// 이벤트 하나를 누적합니다.
    pub fn record(&mut self, event: &AccessEvent) {
        if let Some(key) = section_key(event, self.grouping) {
            self.sections
                .entry(key)
                .or_insert_with_key(|key| TrafficStatistics::new(key.clone()))
                .record(event);
        }
        self.total.record(event);
    }

    /// 이번 주기에 이벤트가 없었는지
    pub fn is_empty(&self) -> bool {
        self.total.count() == 0
    }

    /// 섹션 통계 조회
    pub fn section(&self, key: &str) -> Option<&TrafficStatistics> {
        self.sections.get(key)
    }

    /// 전체 트래픽 통계
    pub fn total(&self) -> &TrafficStatistics {
        &self.total
    }

    /// 현재 섹션 수 (`Total Traffic` 제외)
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// 요약을 만들고 모든 버킷을 비웁니다. 이벤트가 없었으면 `None`.
    ///
    /// 섹션은 사전순, `Total Traffic`은 마지막입니다.
    pub fn drain_summary(&mut self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let sections = std::mem::take(&mut self.sections);
        let total = std::mem::replace(&mut self.total, TrafficStatistics::new(TOTAL_TRAFFIC));

        let blocks: Vec<String> = sections
            .values()
            .chain(std::iter::once(&total))
            .map(|stats| stats.render(self.response_classes))
            .collect();
        Some(blocks.join("\n\n"))
    }
}

/// 통계 모니터 -- 집계기를 소유하는 태스크와 그 핸들
///
/// # 사용 예시
/// ```ignore
/// let monitor = StatisticsMonitor::spawn(aggregator, Duration::from_secs(10), notifier, 1024);
/// monitor.monitor(event).await?;
/// monitor.stop().await;
/// ```
pub struct StatisticsMonitor {
    handle: ConsumerHandle,
}

impl StatisticsMonitor {
    /// 집계 태스크를 시작합니다. 첫 요약은 `interval` 뒤에 발행됩니다.
    pub fn spawn(
        aggregator: StatisticsAggregator,
        interval: Duration,
        notifier: Arc<dyn Notifier>,
        channel_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let task = tokio::spawn(run_statistics(aggregator, interval, notifier, rx));
        Self {
            handle: ConsumerHandle::new("statistics", tx, task),
        }
    }

    /// 이벤트 하나를 집계 태스크로 전달합니다.
    ///
    /// 정지된 뒤에는 `LogPipelineError::Channel`을 반환합니다.
    pub async fn monitor(&self, event: Arc<AccessEvent>) -> Result<(), LogPipelineError> {
        self.handle.send(event).await
    }

    /// 주기 발행을 멈춥니다. 대기 중인 이벤트는 집계되지만 마지막 요약은 발행하지 않습니다.
    pub async fn stop(&self) {
        self.handle.stop().await;
    }

    pub async fn is_stopped(&self) -> bool {
        self.handle.is_stopped().await
    }
}

async fn run_statistics(
    mut aggregator: StatisticsAggregator,
    interval: Duration,
    notifier: Arc<dyn Notifier>,
    mut rx: mpsc::Receiver<Arc<AccessEvent>>,
) {
    let interval = interval.min(MAX_SUMMARY_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(interval_secs = interval.as_secs(), "statistics monitor started");

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    aggregator.record(&event);
                    metrics::counter!(
                        m::STATISTICS_EVENTS_TOTAL,
                        m::LABEL_RESPONSE_CLASS => event.response_class().to_string()
                    )
                    .increment(1);
                }
                None => break,
            },
            _ = ticker.tick() => {
                let sections = aggregator.section_count();
                if let Some(summary) = aggregator.drain_summary() {
                    tracing::debug!(sections, "publishing traffic summary");
                    notifier.send(&summary);
                    metrics::counter!(m::STATISTICS_SUMMARIES_PUBLISHED_TOTAL).increment(1);
                    metrics::gauge!(m::STATISTICS_SECTIONS).set(sections as f64);
                }
            }
        }
    }
}
