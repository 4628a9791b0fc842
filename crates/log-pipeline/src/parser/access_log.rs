//! HTTP 접근 로그 파서 (Common / Combined Log Format)
//!
//! # 지원 형식
//! ```text
//! CLIENT IDENT USER [TIMESTAMP] "METHOD PATH PROTOCOL" STATUS PAYLOAD "REFERER" "USER_AGENT"
//! ```
//!
//! 각 필드는 독립적인 패턴으로 추출됩니다. 타임스탬프와 상태 코드/페이로드 크기는
//! 필수이며, 나머지 필드는 찾지 못하면 빈 문자열이 됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use trafficwatch_core::pipeline::LogParser;
//! use trafficwatch_log_pipeline::parser::AccessLogParser;
//!
//! let parser = AccessLogParser::new()?;
//! let event = parser.parse(r#"127.0.0.1 - - [23/Dec/2015:12:00:00] "GET /pages HTTP/1.1" 200 10"#)?;
//! assert_eq!(event.path, "/pages");
//! ```

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use regex::Regex;
use trafficwatch_core::error::ParseError;
use trafficwatch_core::pipeline::LogParser;
use trafficwatch_core::types::AccessEvent;

use crate::error::LogPipelineError;

/// 오프셋이 포함된 타임스탬프 형식
const TIME_FORMAT_WITH_OFFSET: &str = "%d/%b/%Y:%H:%M:%S %z";

/// 오프셋이 없는 타임스탬프 형식 (UTC로 해석)
const TIME_FORMAT_NAIVE: &str = "%d/%b/%Y:%H:%M:%S";

/// 기본 최대 라인 길이
const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024; // 64KB

/// HTTP 접근 로그 파서
///
/// core의 [`LogParser`] trait을 구현하여 로그 한 줄을 [`AccessEvent`]로 변환합니다.
/// 부작용이 없으므로 여러 태스크에서 공유해도 안전합니다.
pub struct AccessLogParser {
    client: Regex,
    time: Regex,
    request: Regex,
    method: Regex,
    protocol: Regex,
    path: Regex,
    status_payload: Regex,
    user_agent: Regex,
    referer_agent: Regex,
    /// 최대 허용 라인 길이 (바이트)
    max_line_length: usize,
}

impl AccessLogParser {
    /// 추출 패턴을 컴파일하여 새 파서를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            client: Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b")?,
            time: Regex::new(r"\[([^\[\]]*)\]")?,
            request: Regex::new(r#""([A-Z]+[^"]*)""#)?,
            method: Regex::new(r"\b(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\b")?,
            protocol: Regex::new(r"HTTP[/ ][0-9]\.[0-9]")?,
            path: Regex::new(r"/[a-zA-Z0-9\-/?&=.]*")?,
            status_payload: Regex::new(r"\b(\d+) (\d+)\b")?,
            user_agent: Regex::new(r#""([^"]*)"$"#)?,
            referer_agent: Regex::new(r#""([^"]*)"\s+"([^"]*)"$"#)?,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        })
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn with_max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len;
        self
    }

    /// 대괄호 안의 타임스탬프를 해석합니다.
    ///
    /// 오프셋 포함 형식을 먼저 시도하고, 실패하면 오프셋 없는 형식을 UTC로 해석합니다.
    fn parse_time(raw: &str) -> Result<DateTime<FixedOffset>, ParseError> {
        let raw = raw.trim();
        if let Ok(time) = DateTime::parse_from_str(raw, TIME_FORMAT_WITH_OFFSET) {
            return Ok(time);
        }
        NaiveDateTime::parse_from_str(raw, TIME_FORMAT_NAIVE)
            .map(|naive| naive.and_utc().fixed_offset())
            .map_err(|_| ParseError::NoTimestamp)
    }

    /// 요청 라인에서 (method, host, path, protocol)을 추출합니다.
    fn parse_request(&self, request: &str) -> (String, String, String, String) {
        let method = self
            .method
            .find(request)
            .map(|m| m.as_str().to_owned())
            .unwrap_or_default();
        let protocol = self
            .protocol
            .find(request)
            .map(|m| m.as_str().to_owned())
            .unwrap_or_default();

        // 요청 대상은 두 번째 토큰. 프로토콜 토큰을 경로로 오인하지 않도록 분리해서 본다.
        let target = request
            .split_whitespace()
            .nth(1)
            .filter(|t| !t.starts_with("HTTP"))
            .unwrap_or("");

        let (host, target) = split_absolute_target(target);
        let path = self
            .path
            .find(target)
            .filter(|m| m.start() == 0)
            .map(|m| m.as_str().to_owned())
            .unwrap_or_default();

        (method, host.to_owned(), path, protocol)
    }

    /// 상태 코드와 페이로드 크기를 추출합니다.
    ///
    /// 요청 라인 뒤, 다음 따옴표 이전 구간에서만 찾습니다.
    fn parse_status_payload(&self, region: &str) -> Result<(u16, u64), ParseError> {
        let region = match region.find('"') {
            Some(end) => &region[..end],
            None => region,
        };
        let caps = self
            .status_payload
            .captures(region)
            .ok_or(ParseError::NoStatusPayload)?;

        let status = &caps[1];
        let payload = &caps[2];
        let status_code = status
            .parse::<u16>()
            .map_err(|_| ParseError::BadStatusCode(status.to_owned()))?;
        let payload_size = payload
            .parse::<u64>()
            .map_err(|_| ParseError::BadPayloadSize(payload.to_owned()))?;
        Ok((status_code, payload_size))
    }

    /// 꼬리 따옴표 필드에서 (referer, user_agent)를 추출합니다.
    ///
    /// `tail_start` 이전(요청 라인 포함)에서 시작하는 매치는 무시합니다.
    fn parse_trailer(&self, line: &str, tail_start: usize) -> (String, String) {
        let pair = self
            .referer_agent
            .captures(line)
            .filter(|caps| caps.get(0).is_some_and(|m| m.start() >= tail_start));
        if let Some(caps) = pair {
            let referer = dash_to_empty(&caps[1]);
            return (referer.to_owned(), caps[2].to_owned());
        }

        let user_agent = self
            .user_agent
            .captures(line)
            .filter(|caps| caps.get(0).is_some_and(|m| m.start() >= tail_start))
            .map(|caps| caps[1].to_owned())
            .unwrap_or_default();
        (String::new(), user_agent)
    }
}

impl LogParser for AccessLogParser {
    fn format_name(&self) -> &str {
        "access_log"
    }

    fn parse(&self, line: &str) -> Result<AccessEvent, ParseError> {
        if line.len() > self.max_line_length {
            return Err(ParseError::TooLarge {
                size: line.len(),
                max: self.max_line_length,
            });
        }

        let line = line.trim_end_matches(['\r', '\n']).trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let time_caps = self.time.captures(line).ok_or(ParseError::NoTimestamp)?;
        let time = Self::parse_time(&time_caps[1])?;

        let client = self
            .client
            .captures(line)
            .map(|caps| caps[1].to_owned())
            .unwrap_or_default();

        // CLF: CLIENT IDENT USER [TIMESTAMP] ...
        let mut tokens = line
            .split_whitespace()
            .skip(1)
            .take_while(|t| !t.starts_with('['));
        let identifier = tokens.next().map(clf_field).unwrap_or_default();
        let user = tokens.next().map(clf_field).unwrap_or_default();

        let (method, host, path, protocol, tail_start) = match self.request.captures(line) {
            Some(caps) => {
                let (method, host, path, protocol) = self.parse_request(&caps[1]);
                let end = caps.get(0).map_or(0, |m| m.end());
                (method, host, path, protocol, end)
            }
            None => (String::new(), String::new(), String::new(), String::new(), 0),
        };

        let (status_code, payload_size) = self.parse_status_payload(&line[tail_start..])?;
        let (referer, user_agent) = self.parse_trailer(line, tail_start);

        Ok(AccessEvent {
            client,
            user,
            identifier,
            time,
            method,
            path,
            protocol,
            status_code,
            payload_size,
            user_agent,
            referer,
            host,
        })
    }
}

/// `http://host/path` 형태의 요청 대상을 (host, path)로 분리합니다.
fn split_absolute_target(target: &str) -> (&str, &str) {
    let rest = target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"));
    match rest {
        Some(rest) => match rest.find('/') {
            Some(slash) => (&rest[..slash], &rest[slash..]),
            None => (rest, ""),
        },
        None => ("", target),
    }
}

/// CLF의 ident/user 토큰. `-`이면 빈 문자열.
fn clf_field(token: &str) -> String {
    if token == "-" {
        String::new()
    } else {
        token.to_owned()
    }
}

fn dash_to_empty(value: &str) -> &str {
    if value == "-" { "" } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PURCHASE_LINE: &str = r#"209.160.2.63 - - [23/Dec/2015:18:22:21 -0700] "POST /cart.do?action=purchase&itemId=EST-21&JSESSIONID=SD0SL6FF7ADFF4953 HTTP/1.1" 200 486 "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/536.5 (KHTML, like Gecko) Chrome/19.0.1084.46 Safari/536.5""#;

    const ORDER_LINE: &str = r#"209.160.24.64 - - [23/Dec/2015:12:00:00] "POST /order.do?action=remove&itemId=EST-7 HTTP/1.1" 201 396 "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/536.5 (KHTML, like Gecko) Chrome/19.0.1084.46 Safari/536.5""#;

    const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/536.5 (KHTML, like Gecko) Chrome/19.0.1084.46 Safari/536.5";

    fn parser() -> AccessLogParser {
        AccessLogParser::new().unwrap()
    }

    #[test]
    fn parses_line_with_offset() {
        let event = parser().parse(PURCHASE_LINE).unwrap();

        let expected_time = FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2015, 12, 23, 18, 22, 21)
            .unwrap();

        assert_eq!(event.client, "209.160.2.63");
        assert_eq!(event.time, expected_time);
        assert_eq!(event.time.offset().local_minus_utc(), -7 * 3600);
        assert_eq!(event.method, "POST");
        assert_eq!(
            event.path,
            "/cart.do?action=purchase&itemId=EST-21&JSESSIONID=SD0SL6FF7ADFF4953"
        );
        assert_eq!(event.protocol, "HTTP/1.1");
        assert_eq!(event.status_code, 200);
        assert_eq!(event.payload_size, 486);
        assert_eq!(event.user_agent, CHROME_UA);
        assert_eq!(event.user, "");
        assert_eq!(event.identifier, "");
        assert_eq!(event.referer, "");
        assert_eq!(event.host, "");
    }

    #[test]
    fn parses_line_without_offset_as_utc() {
        let event = parser().parse(ORDER_LINE).unwrap();

        let expected_time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2015, 12, 23, 12, 0, 0)
            .unwrap();

        assert_eq!(event.client, "209.160.24.64");
        assert_eq!(event.time, expected_time);
        assert_eq!(event.time.offset().local_minus_utc(), 0);
        assert_eq!(event.path, "/order.do?action=remove&itemId=EST-7");
        assert_eq!(event.status_code, 201);
        assert_eq!(event.payload_size, 396);
    }

    #[test]
    fn trailing_newline_is_ignored() {
        let line = format!("{PURCHASE_LINE}\r\n");
        let event = parser().parse(&line).unwrap();
        assert_eq!(event.user_agent, CHROME_UA);
    }

    #[test]
    fn combined_format_extracts_referer_and_user() {
        let line = r#"127.0.0.1 ident frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 304 0 "http://www.example.com/start.html" "Mozilla/4.08""#;
        let event = parser().parse(line).unwrap();
        assert_eq!(event.identifier, "ident");
        assert_eq!(event.user, "frank");
        assert_eq!(event.referer, "http://www.example.com/start.html");
        assert_eq!(event.user_agent, "Mozilla/4.08");
        assert_eq!(event.status_code, 304);
        assert_eq!(event.payload_size, 0);
    }

    #[test]
    fn dash_referer_becomes_empty() {
        let line = r#"10.0.0.1 - - [10/Oct/2000:13:55:36 +0000] "GET /pages HTTP/1.1" 200 12 "-" "curl/8.0""#;
        let event = parser().parse(line).unwrap();
        assert_eq!(event.referer, "");
        assert_eq!(event.user_agent, "curl/8.0");
    }

    #[test]
    fn missing_user_agent_yields_empty() {
        let line = r#"10.0.0.1 - - [10/Oct/2000:13:55:36 +0000] "GET /pages/a HTTP/1.1" 200 12"#;
        let event = parser().parse(line).unwrap();
        assert_eq!(event.user_agent, "");
        assert_eq!(event.path, "/pages/a");
    }

    #[test]
    fn absolute_target_sets_host() {
        let line = r#"10.0.0.1 - - [10/Oct/2000:13:55:36 +0000] "GET http://example.com/pages/a HTTP/1.1" 200 12"#;
        let event = parser().parse(line).unwrap();
        assert_eq!(event.host, "example.com");
        assert_eq!(event.path, "/pages/a");
    }

    #[test]
    fn target_without_path_leaves_path_empty() {
        let line = r#"10.0.0.1 - - [10/Oct/2000:13:55:36 +0000] "OPTIONS * HTTP/1.1" 200 0"#;
        let event = parser().parse(line).unwrap();
        assert_eq!(event.method, "OPTIONS");
        assert_eq!(event.path, "");
        assert_eq!(event.protocol, "HTTP/1.1");
    }

    #[test]
    fn missing_status_payload_fails() {
        let line = r#"209.160.2.63 - - [23/Dec/2015:18:22:21 -0700] "POST /cart.do HTTP/1.1" "Mozilla/5.0""#;
        let err = parser().parse(line).unwrap_err();
        assert_eq!(err, ParseError::NoStatusPayload);
    }

    #[test]
    fn digits_in_user_agent_are_not_status() {
        let line = r#"209.160.2.63 - - [23/Dec/2015:18:22:21 -0700] "GET /a HTTP/1.1" "Agent 200 300""#;
        assert_eq!(parser().parse(line).unwrap_err(), ParseError::NoStatusPayload);
    }

    #[test]
    fn missing_timestamp_fails() {
        let line = r#"209.160.2.63 - - "GET /a HTTP/1.1" 200 10"#;
        assert_eq!(parser().parse(line).unwrap_err(), ParseError::NoTimestamp);
    }

    #[test]
    fn unparsable_timestamp_fails() {
        let line = r#"209.160.2.63 - - [yesterday] "GET /a HTTP/1.1" 200 10"#;
        assert_eq!(parser().parse(line).unwrap_err(), ParseError::NoTimestamp);
    }

    #[test]
    fn overflowing_status_fails() {
        let line = r#"10.0.0.1 - - [10/Oct/2000:13:55:36 +0000] "GET /a HTTP/1.1" 99999 10"#;
        assert_eq!(
            parser().parse(line).unwrap_err(),
            ParseError::BadStatusCode("99999".to_owned())
        );
    }

    #[test]
    fn overflowing_payload_fails() {
        let line = r#"10.0.0.1 - - [10/Oct/2000:13:55:36 +0000] "GET /a HTTP/1.1" 200 99999999999999999999999"#;
        assert!(matches!(
            parser().parse(line).unwrap_err(),
            ParseError::BadPayloadSize(_)
        ));
    }

    #[test]
    fn empty_line_fails() {
        assert_eq!(parser().parse("").unwrap_err(), ParseError::Empty);
        assert_eq!(parser().parse("   \n").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn oversized_line_fails() {
        let parser = parser().with_max_line_length(16);
        let err = parser.parse(PURCHASE_LINE).unwrap_err();
        assert!(matches!(err, ParseError::TooLarge { max: 16, .. }));
    }

    #[test]
    fn format_name_is_access_log() {
        assert_eq!(parser().format_name(), "access_log");
    }

    #[test]
    fn split_absolute_target_variants() {
        assert_eq!(split_absolute_target("/a/b"), ("", "/a/b"));
        assert_eq!(split_absolute_target("http://h.io/a"), ("h.io", "/a"));
        assert_eq!(split_absolute_target("https://h.io"), ("h.io", ""));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_arbitrary_text_does_not_panic(line in "\\PC{0,512}") {
                let _ = parser().parse(&line);
            }

            #[test]
            fn parse_valid_status_and_payload(status in 100u16..600, payload in any::<u64>()) {
                let line = format!(
                    r#"10.0.0.1 - - [10/Oct/2000:13:55:36 +0000] "GET /x HTTP/1.1" {status} {payload} "ua""#
                );
                let event = parser().parse(&line).unwrap();
                prop_assert_eq!(event.status_code, status);
                prop_assert_eq!(event.payload_size, payload);
            }

            #[test]
            fn parse_preserves_path(path in "/[a-z0-9]{1,20}(/[a-z0-9]{1,20}){0,3}") {
                let line = format!(
                    r#"10.0.0.1 - - [10/Oct/2000:13:55:36 +0000] "GET {path} HTTP/1.1" 200 1"#
                );
                let event = parser().parse(&line).unwrap();
                prop_assert_eq!(event.path, path);
            }
        }
    }
}
