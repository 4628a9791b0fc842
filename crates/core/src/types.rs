//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 파서가 생성하고 통계 집계기와 알림 엔진이 함께 소비하는
//! [`AccessEvent`]와 응답 분류 [`ResponseClass`]를 정의합니다.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// HTTP 접근 로그 한 줄을 파싱한 결과
///
/// 파서만 생성하며, 생성 이후에는 변경되지 않습니다.
/// 파이프라인 fan-out 단계에서 `Arc<AccessEvent>`로 공유됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// 클라이언트 IPv4 주소 (점 표기)
    pub client: String,
    /// 인증된 사용자 (없으면 빈 문자열)
    pub user: String,
    /// RFC 1413 식별자 (없으면 빈 문자열)
    pub identifier: String,
    /// 요청 시각. 오프셋이 없는 로그 라인은 UTC로 해석됩니다.
    pub time: DateTime<FixedOffset>,
    /// HTTP 메서드 (인식하지 못하면 빈 문자열)
    pub method: String,
    /// 요청 경로 (`/`로 시작하거나 빈 문자열)
    pub path: String,
    /// 프로토콜 토큰 (예: `HTTP/1.1`)
    pub protocol: String,
    /// 응답 상태 코드
    pub status_code: u16,
    /// 응답 페이로드 크기 (바이트)
    pub payload_size: u64,
    /// User-Agent
    pub user_agent: String,
    /// Referer
    pub referer: String,
    /// 목적지 호스트 (가상 호스트 기준 집계에 사용)
    pub host: String,
}

impl AccessEvent {
    /// 상태 코드에서 응답 분류를 계산합니다.
    pub fn response_class(&self) -> ResponseClass {
        ResponseClass::from_status(self.status_code)
    }
}

impl fmt::Display for AccessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] \"{} {} {}\" {} {}",
            self.client,
            self.time.to_rfc3339(),
            self.method,
            self.path,
            self.protocol,
            self.status_code,
            self.payload_size,
        )
    }
}

/// 응답 상태 코드 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseClass {
    /// 2xx
    Success,
    /// 3xx
    Redirect,
    /// 4xx
    ClientFailure,
    /// 5xx 이상
    ServerFailure,
    /// 1xx 등 위 분류에 속하지 않는 코드
    Other,
}

impl ResponseClass {
    /// 상태 코드를 분류합니다.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            300..=399 => Self::Redirect,
            400..=499 => Self::ClientFailure,
            500.. => Self::ServerFailure,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ResponseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Redirect => write!(f, "redirect"),
            Self::ClientFailure => write!(f, "client_failure"),
            Self::ServerFailure => write!(f, "server_failure"),
            Self::Other => write!(f, "other"),
        }
    }
}
