//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `trafficwatch_`
//! - 단계명: `source_`, `statistics_`, `alert_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 파싱 실패 종류 레이블 키 (no_timestamp, no_status_payload 등)
pub const LABEL_REASON: &str = "reason";

/// 응답 분류 레이블 키 (success, redirect, client_failure, server_failure)
pub const LABEL_RESPONSE_CLASS: &str = "class";

// ─── Log Source 메트릭 ──────────────────────────────────────────────

/// Source: 파일에서 읽은 라인 수 (counter)
pub const SOURCE_LINES_READ_TOTAL: &str = "trafficwatch_source_lines_read_total";

/// Source: 파싱에 성공한 이벤트 수 (counter)
pub const SOURCE_EVENTS_PARSED_TOTAL: &str = "trafficwatch_source_events_parsed_total";

/// Source: 파싱 에러 수 (counter, label: reason)
pub const SOURCE_PARSE_ERRORS_TOTAL: &str = "trafficwatch_source_parse_errors_total";

/// Source: 감지된 파일 truncation 횟수 (counter)
pub const SOURCE_TRUNCATIONS_TOTAL: &str = "trafficwatch_source_truncations_total";

// ─── Statistics 메트릭 ──────────────────────────────────────────────

/// Statistics: 집계된 이벤트 수 (counter, label: class)
pub const STATISTICS_EVENTS_TOTAL: &str = "trafficwatch_statistics_events_total";

/// Statistics: 발행된 요약 수 (counter)
pub const STATISTICS_SUMMARIES_PUBLISHED_TOTAL: &str =
    "trafficwatch_statistics_summaries_published_total";

/// Statistics: 직전 요약의 섹션 수 (gauge)
pub const STATISTICS_SECTIONS: &str = "trafficwatch_statistics_sections";

// ─── Alert 메트릭 ───────────────────────────────────────────────────

/// Alert: 현재 윈도우 내 요청 수 (gauge)
pub const ALERT_WINDOW_HITS: &str = "trafficwatch_alert_window_hits";

/// Alert: 임계값 초과 알림 수 (counter)
pub const ALERT_BREACHES_TOTAL: &str = "trafficwatch_alert_breaches_total";

/// Alert: 복구 알림 수 (counter)
pub const ALERT_RECOVERIES_TOTAL: &str = "trafficwatch_alert_recoveries_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, 항상 1, `version` 레이블)
pub const DAEMON_BUILD_INFO: &str = "trafficwatch_build_info";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없어도 패닉하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Log Source
    describe_counter!(
        SOURCE_LINES_READ_TOTAL,
        "Total number of raw lines read from the tailed log file"
    );
    describe_counter!(
        SOURCE_EVENTS_PARSED_TOTAL,
        "Total number of lines successfully parsed into access events"
    );
    describe_counter!(
        SOURCE_PARSE_ERRORS_TOTAL,
        "Total number of lines skipped due to parse errors, by reason"
    );
    describe_counter!(
        SOURCE_TRUNCATIONS_TOTAL,
        "Number of times the tailed file shrank and reading restarted from the beginning"
    );

    // Statistics
    describe_counter!(
        STATISTICS_EVENTS_TOTAL,
        "Events aggregated into section statistics, by response class"
    );
    describe_counter!(
        STATISTICS_SUMMARIES_PUBLISHED_TOTAL,
        "Number of periodic traffic summaries sent to the notifier"
    );
    describe_gauge!(
        STATISTICS_SECTIONS,
        "Number of sections in the most recently published summary"
    );

    // Alert
    describe_gauge!(
        ALERT_WINDOW_HITS,
        "Requests currently inside the alert sliding window"
    );
    describe_counter!(
        ALERT_BREACHES_TOTAL,
        "Number of high-traffic alerts raised"
    );
    describe_counter!(
        ALERT_RECOVERIES_TOTAL,
        "Number of high-traffic alerts recovered"
    );

    // Daemon
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information, always 1, labelled with the crate version"
    );
}
