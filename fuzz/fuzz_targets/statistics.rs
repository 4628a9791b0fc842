#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use trafficwatch_core::pipeline::LogParser;
use trafficwatch_log_pipeline::config::SectionGrouping;
use trafficwatch_log_pipeline::parser::AccessLogParser;
use trafficwatch_log_pipeline::stats::StatisticsAggregator;

#[derive(Debug, Arbitrary)]
struct Request {
    path: String,
    status: u16,
    payload: u32,
}

fuzz_target!(|requests: Vec<Request>| {
    let Ok(parser) = AccessLogParser::new() else {
        return;
    };
    let mut aggregator = StatisticsAggregator::new(SectionGrouping::Path, true);
    let mut expected_total = 0u64;
    let mut expected_count = 0u64;

    for request in &requests {
        let line = format!(
            r#"10.0.0.1 - - [23/Dec/2015:18:22:21 -0700] "GET {} HTTP/1.1" {} {} "fuzz""#,
            request.path, request.status, request.payload
        );
        if let Ok(event) = parser.parse(&line) {
            aggregator.record(&event);
            expected_total += event.payload_size;
            expected_count += 1;
        }
    }

    // 전체 트래픽 버킷은 모든 이벤트의 합과 같아야 한다
    assert_eq!(aggregator.total().count(), expected_count);
    assert_eq!(aggregator.total().total_payload(), expected_total);

    let summary = aggregator.drain_summary();
    assert_eq!(summary.is_some(), expected_count > 0);
    assert!(aggregator.is_empty());
});
