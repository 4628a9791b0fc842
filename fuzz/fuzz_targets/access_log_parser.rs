#![no_main]

use libfuzzer_sys::fuzz_target;
use trafficwatch_core::pipeline::LogParser;
use trafficwatch_log_pipeline::parser::AccessLogParser;

fuzz_target!(|data: &[u8]| {
    let Ok(parser) = AccessLogParser::new() else {
        return;
    };
    let line = String::from_utf8_lossy(data);

    // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
    if let Ok(event) = parser.parse(&line) {
        assert!(event.path.is_empty() || event.path.starts_with('/'));
    }
});
