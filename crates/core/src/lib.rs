//! trafficwatch 공통 타입, trait, 에러, 설정
//!
//! # 모듈 구성
//!
//! - [`types`]: 파싱된 접근 이벤트 [`AccessEvent`]와 응답 분류
//! - [`pipeline`]: 파서/알림기 확장 포인트 trait
//! - [`error`]: 도메인별 에러 타입
//! - [`config`]: `trafficwatch.toml` 로딩, 환경변수 오버라이드, 검증
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ParseError, PipelineError, TrafficwatchError};

// 설정
pub use config::TrafficwatchConfig;

// 파이프라인 trait
pub use pipeline::{ConsoleNotifier, LogParser, Notifier};

// 도메인 타입
pub use types::{AccessEvent, ResponseClass};
