//! 에러 타입 -- 도메인별 에러 정의

/// trafficwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TrafficwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 로그 라인 파싱 에러
///
/// 모든 변형은 "이 라인을 건너뛴다"로 처리되며 수집을 중단시키지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// 빈 입력
    #[error("empty line")]
    Empty,

    /// 입력 데이터 초과
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// 타임스탬프를 찾거나 해석할 수 없음
    #[error("no parsable timestamp in line")]
    NoTimestamp,

    /// 상태 코드/페이로드 크기 쌍이 없음
    #[error("status code and payload size not present")]
    NoStatusPayload,

    /// 상태 코드를 정수로 변환할 수 없음
    #[error("could not parse status code '{0}' to integer")]
    BadStatusCode(String),

    /// 페이로드 크기를 정수로 변환할 수 없음
    #[error("could not parse payload size '{0}' to integer")]
    BadPayloadSize(String),
}

impl ParseError {
    /// 메트릭 레이블용 짧은 이름
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLarge { .. } => "too_large",
            Self::NoTimestamp => "no_timestamp",
            Self::NoStatusPayload => "no_status_payload",
            Self::BadStatusCode(_) => "bad_status_code",
            Self::BadPayloadSize(_) => "bad_payload_size",
        }
    }
}
