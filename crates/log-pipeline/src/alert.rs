//! 고트래픽 알림 -- 슬라이딩 윈도우 기반 임계값 감시
//!
//! [`AlertWindow`]는 최근 `window` 동안의 요청 수를 추적하는 상태 머신이고,
//! [`AlertMonitor`]는 이를 단독 소유하는 태스크에서 이벤트와 주기적 tick을 처리합니다.
//!
//! # 상태 전이
//! ```text
//! Normal  --(total > threshold)-->  Breached   : 경보 알림
//! Breached --(total <= threshold)--> Normal    : 복구 알림
//! ```
//!
//! 트래픽이 없어도 tick마다 오래된 샘플을 제거하므로 윈도우가 자연히 줄어듭니다.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, SecondsFormat};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use trafficwatch_core::metrics as m;
use trafficwatch_core::pipeline::Notifier;
use trafficwatch_core::types::AccessEvent;

use crate::consumer::ConsumerHandle;
use crate::error::LogPipelineError;

/// 재평가 주기 상한
const MAX_TICK: Duration = Duration::from_secs(24 * 60 * 60);

/// 알림 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
    /// 임계값 이하
    Normal,
    /// 임계값 초과
    Breached,
}

/// 상태 전이 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertTransition {
    /// Normal -> Breached
    Breached {
        /// 전이 시점의 윈도우 내 요청 수
        hits: u64,
    },
    /// Breached -> Normal
    Recovered {
        /// 경보가 지속된 시간
        lasted: Duration,
    },
}

/// 슬라이딩 윈도우 상태
#[derive(Debug)]
pub struct AlertWindow {
    window: Duration,
    threshold: u64,
    /// (도착 시각, 가중치), 오래된 순
    samples: VecDeque<(Instant, u64)>,
    total: u64,
    status: AlertStatus,
    since: Instant,
}

impl AlertWindow {
    pub fn new(window: Duration, threshold: u64, now: Instant) -> Self {
        Self {
            window,
            threshold,
            samples: VecDeque::new(),
            total: 0,
            status: AlertStatus::Normal,
            since: now,
        }
    }

    /// 요청을 기록하고 윈도우를 재평가합니다.
    pub fn record(&mut self, now: Instant, weight: u64) -> Option<AlertTransition> {
        self.samples.push_back((now, weight));
        self.total = self.total.saturating_add(weight);
        self.evaluate(now)
    }

    /// 윈도우 밖의 샘플을 제거하고 상태 전이를 판단합니다.
    pub fn evaluate(&mut self, now: Instant) -> Option<AlertTransition> {
        self.evict(now);

        match self.status {
            AlertStatus::Normal if self.total > self.threshold => {
                self.status = AlertStatus::Breached;
                self.since = now;
                Some(AlertTransition::Breached { hits: self.total })
            }
            AlertStatus::Breached if self.total <= self.threshold => {
                let lasted = now.saturating_duration_since(self.since);
                self.status = AlertStatus::Normal;
                self.since = now;
                Some(AlertTransition::Recovered { lasted })
            }
            _ => None,
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(at, weight)) = self.samples.front() {
            if now.saturating_duration_since(at) < self.window {
                break;
            }
            self.samples.pop_front();
            self.total = self.total.saturating_sub(weight);
        }
    }

    /// 윈도우 내 요청 수
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn status(&self) -> AlertStatus {
        self.status
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }
}

/// 상태 전이를 알림 메시지로 변환합니다.
pub fn format_transition(transition: &AlertTransition, window: Duration) -> String {
    let now = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
    match transition {
        AlertTransition::Breached { hits } => format!(
            "High traffic generated an alert - hits = {} over the last {}s, triggered at {}",
            hits,
            window.as_secs(),
            now
        ),
        AlertTransition::Recovered { lasted } => format!(
            "High traffic alert recovered - lasted {}s, recovered at {}",
            lasted.as_secs(),
            now
        ),
    }
}

/// 알림 모니터 -- 윈도우를 소유하는 태스크와 그 핸들
pub struct AlertMonitor {
    handle: ConsumerHandle,
}

impl AlertMonitor {
    /// 알림 태스크를 시작합니다. 윈도우는 `tick`마다 재평가됩니다.
    pub fn spawn(
        window: Duration,
        threshold: u64,
        tick: Duration,
        notifier: Arc<dyn Notifier>,
        channel_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let state = AlertWindow::new(window, threshold, Instant::now());
        let task = tokio::spawn(run_alert(state, tick, notifier, rx));
        Self {
            handle: ConsumerHandle::new("alert", tx, task),
        }
    }

    /// 요청 하나(가중치 1)를 도착 시각 기준으로 등록합니다.
    ///
    /// 정지된 뒤에는 `LogPipelineError::Channel`을 반환합니다.
    pub async fn check(&self, event: Arc<AccessEvent>) -> Result<(), LogPipelineError> {
        self.handle.send(event).await
    }

    /// 태스크를 멈춥니다. 여러 번 호출해도 안전합니다.
    pub async fn stop(&self) {
        self.handle.stop().await;
    }

    pub async fn is_stopped(&self) -> bool {
        self.handle.is_stopped().await
    }
}

async fn run_alert(
    mut state: AlertWindow,
    tick: Duration,
    notifier: Arc<dyn Notifier>,
    mut rx: mpsc::Receiver<Arc<AccessEvent>>,
) {
    let mut ticker = tokio::time::interval(tick.min(MAX_TICK));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::debug!(
        window_secs = state.window().as_secs(),
        threshold = state.threshold(),
        "alert monitor started"
    );

    loop {
        let transition = tokio::select! {
            event = rx.recv() => match event {
                Some(_) => state.record(Instant::now(), 1),
                None => break,
            },
            _ = ticker.tick() => state.evaluate(Instant::now()),
        };

        metrics::gauge!(m::ALERT_WINDOW_HITS).set(state.total() as f64);

        if let Some(transition) = transition {
            match &transition {
                AlertTransition::Breached { hits } => {
                    tracing::warn!(hits, threshold = state.threshold(), "high traffic alert");
                    metrics::counter!(m::ALERT_BREACHES_TOTAL).increment(1);
                }
                AlertTransition::Recovered { lasted } => {
                    tracing::info!(lasted_secs = lasted.as_secs(), "high traffic recovered");
                    metrics::counter!(m::ALERT_RECOVERIES_TOTAL).increment(1);
                }
            }
            notifier.send(&format_transition(&transition, state.window()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_owned());
        }
    }

    fn event() -> Arc<AccessEvent> {
        Arc::new(AccessEvent {
            client: "10.0.0.1".to_owned(),
            user: String::new(),
            identifier: String::new(),
            time: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2015, 12, 23, 12, 0, 0)
                .unwrap(),
            method: "GET".to_owned(),
            path: "/pages".to_owned(),
            protocol: "HTTP/1.1".to_owned(),
            status_code: 200,
            payload_size: 10,
            user_agent: String::new(),
            referer: String::new(),
            host: String::new(),
        })
    }

    #[test]
    fn breach_requires_strictly_greater_than_threshold() {
        let t0 = Instant::now();
        let mut window = AlertWindow::new(Duration::from_secs(120), 3, t0);

        for _ in 0..3 {
            assert_eq!(window.record(t0, 1), None);
        }
        assert_eq!(window.status(), AlertStatus::Normal);

        assert_eq!(
            window.record(t0, 1),
            Some(AlertTransition::Breached { hits: 4 })
        );
        assert_eq!(window.status(), AlertStatus::Breached);
    }

    #[test]
    fn no_duplicate_breach_while_breached() {
        let t0 = Instant::now();
        let mut window = AlertWindow::new(Duration::from_secs(120), 1, t0);
        window.record(t0, 1);
        assert!(window.record(t0, 1).is_some());
        assert_eq!(window.record(t0, 1), None);
        assert_eq!(window.evaluate(t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn window_decays_without_traffic() {
        let t0 = Instant::now();
        let mut window = AlertWindow::new(Duration::from_secs(120), 2, t0);
        for _ in 0..3 {
            window.record(t0, 1);
        }
        assert_eq!(window.status(), AlertStatus::Breached);

        assert_eq!(window.evaluate(t0 + Duration::from_secs(119)), None);
        assert_eq!(window.total(), 3);

        assert_eq!(
            window.evaluate(t0 + Duration::from_secs(120)),
            Some(AlertTransition::Recovered {
                lasted: Duration::from_secs(120)
            })
        );
        assert_eq!(window.total(), 0);
        assert_eq!(window.status(), AlertStatus::Normal);
        assert_eq!(window.evaluate(t0 + Duration::from_secs(240)), None);
    }

    #[test]
    fn recovery_at_threshold_equality() {
        let t0 = Instant::now();
        let mut window = AlertWindow::new(Duration::from_secs(10), 2, t0);
        window.record(t0, 1);
        window.record(t0 + Duration::from_secs(5), 1);
        window.record(t0 + Duration::from_secs(5), 1);
        assert_eq!(window.status(), AlertStatus::Breached);

        // t0 샘플만 빠져서 total == threshold
        let transition = window.evaluate(t0 + Duration::from_secs(10));
        assert!(matches!(transition, Some(AlertTransition::Recovered { .. })));
        assert_eq!(window.total(), 2);
    }

    #[test]
    fn messages_follow_format() {
        let breach = format_transition(
            &AlertTransition::Breached { hits: 1001 },
            Duration::from_secs(120),
        );
        assert!(breach.starts_with(
            "High traffic generated an alert - hits = 1001 over the last 120s, triggered at "
        ));

        let recovered = format_transition(
            &AlertTransition::Recovered {
                lasted: Duration::from_secs(42),
            },
            Duration::from_secs(120),
        );
        assert!(recovered.starts_with("High traffic alert recovered - lasted 42s, recovered at "));
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_emits_one_breach_and_one_recovery() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = AlertMonitor::spawn(
            Duration::from_secs(120),
            3,
            Duration::from_secs(1),
            notifier.clone(),
            16,
        );

        for _ in 0..5 {
            monitor.check(event()).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("hits = 4 over the last 120s"));

        tokio::time::sleep(Duration::from_secs(125)).await;
        let messages = notifier.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].starts_with("High traffic alert recovered - lasted 120s"));

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(notifier.messages().len(), 2);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_below_threshold_stays_quiet() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = AlertMonitor::spawn(
            Duration::from_secs(120),
            3,
            Duration::from_secs(1),
            notifier.clone(),
            16,
        );

        for _ in 0..3 {
            monitor.check(event()).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert!(notifier.messages().is_empty());
        monitor.stop().await;
    }

    #[tokio::test]
    async fn check_after_stop_returns_channel_error() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = AlertMonitor::spawn(
            Duration::from_secs(120),
            3,
            Duration::from_secs(1),
            notifier,
            16,
        );

        monitor.stop().await;
        monitor.stop().await;
        assert!(monitor.is_stopped().await);

        let err = monitor.check(event()).await.unwrap_err();
        assert!(matches!(err, LogPipelineError::Channel(_)));
    }
}
