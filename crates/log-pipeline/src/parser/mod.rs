//! 로그 파싱 모듈 -- HTTP 접근 로그 파서
//!
//! 각 파서는 core의 [`LogParser`](trafficwatch_core::pipeline::LogParser) trait을 구현합니다.
//! 파싱에 실패한 라인은 수집기가 건너뜁니다.
//!
//! # 지원 형식
//! - Common / Combined Log Format ([`AccessLogParser`])

pub mod access_log;

pub use access_log::AccessLogParser;
