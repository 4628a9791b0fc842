#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: 접근 로그 파일 tail 및 이벤트 스트림 ([`LogSource`])
//! - [`parser`]: Common / Combined Log Format 파서
//! - [`stats`]: 섹션별 통계 집계와 주기적 요약 발행
//! - [`alert`]: 슬라이딩 윈도우 기반 고트래픽 알림
//! - [`pipeline`]: 소스 -> {통계, 알림} fan-out 오케스트레이션
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod alert;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod stats;

pub mod collector;
pub mod parser;

mod consumer;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{TrafficPipeline, TrafficPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder, SectionGrouping};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::AccessLogParser;

// 수집기
pub use collector::{CollectorStats, CollectorStatus, FileCollectorConfig, LogSource};

// 통계
pub use stats::{StatisticsAggregator, StatisticsMonitor, TrafficStatistics};

// 알림
pub use alert::{AlertMonitor, AlertStatus, AlertWindow};
