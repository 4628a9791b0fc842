//! 파이프라인 trait -- 모듈 확장 포인트 정의

use crate::error::ParseError;
use crate::types::AccessEvent;

/// 로그 파서 trait
///
/// 새로운 접근 로그 형식을 지원하려면 이 trait을 구현합니다.
pub trait LogParser: Send + Sync {
    /// 지원하는 로그 형식 이름
    fn format_name(&self) -> &str;

    /// 로그 한 줄을 접근 이벤트로 파싱
    fn parse(&self, line: &str) -> Result<AccessEvent, ParseError>;
}

/// 알림 전송 trait
///
/// 통계 요약과 트래픽 알림이 이 trait을 통해 외부로 전달됩니다.
/// 전송 실패 시 재시도 정책은 구현체가 결정합니다.
pub trait Notifier: Send + Sync {
    /// 메시지를 전송합니다 (fire-and-forget).
    fn send(&self, message: &str);
}

/// 표준 출력으로 메시지를 내보내는 알림기
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, message: &str) {
        println!("{message}");
    }
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn send(&self, message: &str) {
        (**self).send(message);
    }
}
