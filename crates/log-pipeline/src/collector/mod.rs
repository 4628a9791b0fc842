//! 로그 수집 모듈 -- 증가하는 접근 로그 파일에서 이벤트를 수집합니다.
//!
//! # 수집 소스
//! - [`FileCollector`]: 파일 감시 (tail -f 방식)
//!
//! # 아키텍처
//! 수집기는 자체 tokio 태스크에서 실행되며, 파싱된 이벤트를
//! `tokio::mpsc::Sender<Arc<AccessEvent>>` 채널을 통해 [`LogSource`]로 전달합니다.
//! 채널이 가득 차면 수집기가 대기하므로 이벤트가 유실되지 않습니다.

pub mod file;

pub use file::{FileCollector, FileCollectorConfig, LogSource};

use std::sync::atomic::{AtomicU64, Ordering};

/// 수집기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 중
    Running,
    /// 정상 종료됨
    Stopped,
}

/// 수집기 카운터
///
/// 수집 태스크와 파이프라인이 `Arc`로 공유합니다.
#[derive(Debug, Default)]
pub struct CollectorStats {
    lines_read: AtomicU64,
    events_emitted: AtomicU64,
    parse_errors: AtomicU64,
    truncations: AtomicU64,
}

impl CollectorStats {
    /// 읽은 라인 수
    pub fn lines_read(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    /// 파싱에 성공해 전달된 이벤트 수
    pub fn events_emitted(&self) -> u64 {
        self.events_emitted.load(Ordering::Relaxed)
    }

    /// 파싱 실패로 건너뛴 라인 수
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    /// 감지된 truncation 횟수
    pub fn truncations(&self) -> u64 {
        self.truncations.load(Ordering::Relaxed)
    }

    pub(crate) fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_event(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_truncation(&self) {
        self.truncations.fetch_add(1, Ordering::Relaxed);
    }
}
