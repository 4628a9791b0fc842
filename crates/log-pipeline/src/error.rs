//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for TrafficwatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use trafficwatch_core::error::{ParseError, PipelineError, TrafficwatchError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 로그 라인 파싱 실패
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 수집기 에러 (파일 열기 실패 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (file 등)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러 (정지된 모니터에 이벤트 전달 등)
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 이미 시작된 파이프라인을 다시 실행
    #[error("pipeline already started")]
    AlreadyStarted,

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for TrafficwatchError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Parse(e) => TrafficwatchError::Parse(e),
            LogPipelineError::Io(e) => TrafficwatchError::Io(e),
            LogPipelineError::Channel(reason) => {
                TrafficwatchError::Pipeline(PipelineError::ChannelSend(reason))
            }
            other => TrafficwatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
