//! 파일 기반 로그 수집기
//!
//! 로그 파일을 감시하며 새로운 라인이 추가되면 수집합니다.
//! `tail -f`와 유사한 동작을 비동기 방식으로 구현합니다.
//!
//! # 동작
//! - EOF에 도달하면 `poll_interval_ms` 만큼 대기 후 재시도
//! - 개행 없는 마지막 라인은 새 바이트 없이 [`PARTIAL_LINE_QUIET_POLLS`]번 폴링할 때까지 보류 후 완성된 라인으로 처리
//! - 파일 크기 축소 감지 시 처음부터 다시 읽음 (truncation)
//! - `max_line_length`를 넘는 라인은 경고 후 폐기

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trafficwatch_core::metrics as m;
use trafficwatch_core::pipeline::LogParser;
use trafficwatch_core::types::AccessEvent;

use super::{CollectorStats, CollectorStatus};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;

/// 개행 없는 조각을 완성된 라인으로 간주하기 전까지 기다리는 무변화 폴링 횟수
pub const PARTIAL_LINE_QUIET_POLLS: u32 = 5;

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct FileCollectorConfig {
    /// 감시할 파일 경로
    pub path: PathBuf,
    /// EOF 재시도 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 파일 처음부터 읽을지 여부 (false면 현재 끝에서 시작)
    pub read_from_start: bool,
    /// 이벤트 채널 용량
    pub channel_capacity: usize,
}

impl Default for FileCollectorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("access.log"),
            poll_interval_ms: 200,
            max_line_length: 64 * 1024, // 64KB
            read_from_start: true,
            channel_capacity: 1024,
        }
    }
}

impl From<&PipelineConfig> for FileCollectorConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            path: config.path.clone(),
            poll_interval_ms: config.poll_interval_ms,
            max_line_length: config.max_line_length,
            read_from_start: config.read_from_start,
            channel_capacity: config.channel_capacity,
        }
    }
}

/// 접근 이벤트 스트림 핸들
///
/// [`LogSource::open`]으로 파일을 열면 수집 태스크가 시작되고,
/// [`next_event`](LogSource::next_event)로 도착 순서대로 이벤트를 받습니다.
/// [`close`](LogSource::close) 이후에는 이미 채널에 들어간 이벤트를 모두 전달한 뒤 `None`을 반환합니다.
pub struct LogSource {
    rx: mpsc::Receiver<Arc<AccessEvent>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    stats: Arc<CollectorStats>,
    path: PathBuf,
}

impl LogSource {
    /// 파일을 열고 수집 태스크를 시작합니다.
    ///
    /// 파일을 열 수 없으면 `LogPipelineError::Collector`를 반환합니다.
    pub async fn open(
        config: FileCollectorConfig,
        parser: Arc<dyn LogParser>,
    ) -> Result<Self, LogPipelineError> {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let stats = Arc::new(CollectorStats::default());
        let path = config.path.clone();

        let collector =
            FileCollector::open(config, parser, tx, cancel.clone(), Arc::clone(&stats)).await?;
        let handle = tokio::spawn(collector.run());

        Ok(Self {
            rx,
            cancel,
            handle,
            stats,
            path,
        })
    }

    /// 다음 이벤트를 기다립니다. 소스가 닫히면 `None`을 반환합니다.
    pub async fn next_event(&mut self) -> Option<Arc<AccessEvent>> {
        self.rx.recv().await
    }

    /// 수집을 중단합니다. 여러 번 호출해도 안전합니다.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(path = %self.path.display(), "closing log source");
            self.cancel.cancel();
        }
    }

    /// 수집기 카운터
    pub fn stats(&self) -> Arc<CollectorStats> {
        Arc::clone(&self.stats)
    }

    /// 수집 태스크 상태
    pub fn status(&self) -> CollectorStatus {
        if self.cancel.is_cancelled() || self.handle.is_finished() {
            CollectorStatus::Stopped
        } else {
            CollectorStatus::Running
        }
    }

    /// 감시 중인 파일 경로
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for LogSource {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 파일 기반 로그 수집기
///
/// 단일 파일을 주기적으로 폴링하여 새로운 라인을 파싱하고 채널로 전달합니다.
pub struct FileCollector {
    config: FileCollectorConfig,
    parser: Arc<dyn LogParser>,
    tx: mpsc::Sender<Arc<AccessEvent>>,
    cancel: CancellationToken,
    stats: Arc<CollectorStats>,
    reader: BufReader<File>,
    /// 마지막 읽기 위치 (바이트 오프셋)
    offset: u64,
    /// 아직 개행을 만나지 못한 라인 조각
    pending: Vec<u8>,
    /// 보류 중인 조각이 새 바이트 없이 기다린 폴링 횟수
    pending_polls: u32,
    /// 너무 긴 라인의 나머지를 버리는 중인지
    discarding: bool,
}

impl FileCollector {
    /// 파일을 열고 시작 위치로 이동합니다.
    pub async fn open(
        config: FileCollectorConfig,
        parser: Arc<dyn LogParser>,
        tx: mpsc::Sender<Arc<AccessEvent>>,
        cancel: CancellationToken,
        stats: Arc<CollectorStats>,
    ) -> Result<Self, LogPipelineError> {
        let mut file = File::open(&config.path)
            .await
            .map_err(|e| LogPipelineError::Collector {
                source_type: "file".to_owned(),
                reason: format!("{}: {}", config.path.display(), e),
            })?;

        let offset = if config.read_from_start {
            0
        } else {
            file.seek(SeekFrom::End(0)).await?
        };

        tracing::info!(
            path = %config.path.display(),
            offset,
            parser = parser.format_name(),
            "log source opened"
        );

        Ok(Self {
            config,
            parser,
            tx,
            cancel,
            stats,
            reader: BufReader::new(file),
            offset,
            pending: Vec::new(),
            pending_polls: 0,
            discarding: false,
        })
    }

    /// 수집 루프를 실행합니다.
    ///
    /// 취소 토큰이 취소되거나 수신 측이 닫힐 때까지 실행됩니다.
    pub async fn run(mut self) {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            // 최대 길이 + 1 바이트까지만 읽어 긴 라인을 감지
            let limit = self
                .config
                .max_line_length
                .saturating_add(1)
                .saturating_sub(self.pending.len()) as u64;
            let read = {
                let mut limited = (&mut self.reader).take(limit.max(1));
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    read = limited.read_until(b'\n', &mut self.pending) => read,
                }
            };

            let keep_running = match read {
                Ok(0) => self.on_eof(poll_interval).await,
                Ok(n) => {
                    self.offset += n as u64;
                    self.on_bytes().await
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.config.path.display(),
                        error = %e,
                        "read failed, retrying"
                    );
                    self.wait(poll_interval).await
                }
            };

            if !keep_running {
                break;
            }
        }

        tracing::debug!(
            path = %self.config.path.display(),
            lines = self.stats.lines_read(),
            events = self.stats.events_emitted(),
            "file collector stopped"
        );
    }

    /// 새 바이트를 읽은 뒤 처리합니다.
    async fn on_bytes(&mut self) -> bool {
        if self.pending.last() == Some(&b'\n') {
            self.pending_polls = 0;
            if self.discarding {
                self.discarding = false;
                self.pending.clear();
                return true;
            }
            let line = std::mem::take(&mut self.pending);
            return self.emit_line(&line).await;
        }

        // 새 조각이 도착했으므로 보류 시간을 다시 센다
        self.pending_polls = 0;
        if self.pending.len() > self.config.max_line_length {
            if !self.discarding {
                tracing::warn!(
                    path = %self.config.path.display(),
                    max = self.config.max_line_length,
                    "line exceeds max length, discarding"
                );
            }
            self.discarding = true;
            self.pending.clear();
        }
        true
    }

    /// EOF에서 보류 라인과 truncation을 처리하고 대기합니다.
    async fn on_eof(&mut self, poll_interval: Duration) -> bool {
        if !self.pending.is_empty() && !self.discarding {
            self.pending_polls += 1;
            if self.pending_polls > PARTIAL_LINE_QUIET_POLLS {
                self.pending_polls = 0;
                let line = std::mem::take(&mut self.pending);
                if !self.emit_line(&line).await {
                    return false;
                }
            }
        }

        if let Err(e) = self.check_truncation().await {
            tracing::warn!(
                path = %self.config.path.display(),
                error = %e,
                "failed to check file length"
            );
        }

        self.wait(poll_interval).await
    }

    /// 파일 길이가 읽기 위치보다 작아졌으면 처음부터 다시 읽습니다.
    async fn check_truncation(&mut self) -> Result<(), LogPipelineError> {
        let len = tokio::fs::metadata(&self.config.path).await?.len();
        if len < self.offset {
            tracing::info!(
                path = %self.config.path.display(),
                previous_offset = self.offset,
                len,
                "file truncated, reading from start"
            );
            self.reader.seek(SeekFrom::Start(0)).await?;
            self.offset = 0;
            self.pending.clear();
            self.pending_polls = 0;
            self.discarding = false;
            self.stats.record_truncation();
            metrics::counter!(m::SOURCE_TRUNCATIONS_TOTAL).increment(1);
        }
        Ok(())
    }

    /// 라인을 파싱하여 채널로 전송합니다. 수신 측이 사라졌으면 `false`.
    async fn emit_line(&mut self, raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return true;
        }

        self.stats.record_line();
        metrics::counter!(m::SOURCE_LINES_READ_TOTAL).increment(1);

        let event = match self.parser.parse(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, line, "skipping unparsable line");
                self.stats.record_parse_error();
                metrics::counter!(m::SOURCE_PARSE_ERRORS_TOTAL, m::LABEL_REASON => e.kind())
                    .increment(1);
                return true;
            }
        };

        metrics::counter!(m::SOURCE_EVENTS_PARSED_TOTAL).increment(1);

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(Arc::new(event)) => match sent {
                Ok(()) => {
                    self.stats.record_event();
                    true
                }
                Err(_) => {
                    tracing::debug!("event receiver dropped, stopping collector");
                    false
                }
            }
        }
    }

    /// 폴링 간격만큼 대기합니다. 취소되면 `false`.
    async fn wait(&self, poll_interval: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(poll_interval) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::AccessLogParser;
    use std::io::Write;
    use tokio::time::timeout;

    const LINE_A: &str = r#"10.0.0.1 - - [23/Dec/2015:12:00:00 +0000] "GET /pages/a HTTP/1.1" 200 10 "ua""#;
    const LINE_B: &str = r#"10.0.0.2 - - [23/Dec/2015:12:00:01 +0000] "GET /users/b HTTP/1.1" 404 20 "ua""#;

    fn test_config(path: &std::path::Path) -> FileCollectorConfig {
        FileCollectorConfig {
            path: path.to_path_buf(),
            poll_interval_ms: 20,
            ..Default::default()
        }
    }

    fn parser() -> Arc<dyn LogParser> {
        Arc::new(AccessLogParser::new().unwrap())
    }

    fn append(path: &std::path::Path, text: &str) {
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    async fn next(source: &mut LogSource) -> Arc<AccessEvent> {
        timeout(Duration::from_secs(1), source.next_event())
            .await
            .expect("no event within 1s")
            .expect("source ended")
    }

    #[test]
    fn default_config() {
        let config = FileCollectorConfig::default();
        assert_eq!(config.poll_interval_ms, 200);
        assert!(config.read_from_start);
    }

    #[test]
    fn config_from_pipeline_config() {
        let pipeline = PipelineConfig {
            poll_interval_ms: 5,
            read_from_start: false,
            ..Default::default()
        };
        let config = FileCollectorConfig::from(&pipeline);
        assert_eq!(config.poll_interval_ms, 5);
        assert!(!config.read_from_start);
    }

    #[tokio::test]
    async fn open_missing_file_fails() {
        let config = test_config(std::path::Path::new("/nonexistent/access.log"));
        let err = LogSource::open(config, parser()).await.err().unwrap();
        assert!(matches!(err, LogPipelineError::Collector { .. }));
    }

    #[tokio::test]
    async fn reads_existing_lines_in_order() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append(file.path(), &format!("{LINE_A}\n{LINE_B}\n"));

        let mut source = LogSource::open(test_config(file.path()), parser())
            .await
            .unwrap();
        assert_eq!(source.status(), CollectorStatus::Running);

        assert_eq!(next(&mut source).await.path, "/pages/a");
        assert_eq!(next(&mut source).await.path, "/users/b");
        source.close();
    }

    #[tokio::test]
    async fn appended_line_after_eof_is_delivered() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut source = LogSource::open(test_config(file.path()), parser())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        append(file.path(), &format!("{LINE_A}\n"));

        let event = next(&mut source).await;
        assert_eq!(event.client, "10.0.0.1");
        assert!(
            timeout(Duration::from_millis(200), source.next_event())
                .await
                .is_err(),
            "only one event expected"
        );
        source.close();
    }

    #[tokio::test]
    async fn read_from_end_skips_existing_lines() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append(file.path(), &format!("{LINE_A}\n"));

        let config = FileCollectorConfig {
            read_from_start: false,
            ..test_config(file.path())
        };
        let mut source = LogSource::open(config, parser()).await.unwrap();

        append(file.path(), &format!("{LINE_B}\n"));
        assert_eq!(next(&mut source).await.path, "/users/b");
        source.close();
    }

    #[tokio::test]
    async fn unterminated_line_is_emitted_after_one_poll() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append(file.path(), LINE_A);

        let mut source = LogSource::open(test_config(file.path()), parser())
            .await
            .unwrap();
        assert_eq!(next(&mut source).await.path, "/pages/a");
        source.close();
    }

    #[tokio::test]
    async fn line_written_in_two_chunks_is_joined() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source_config = test_config(file.path());
        let mut source = LogSource::open(source_config, parser()).await.unwrap();

        let (head, tail) = LINE_A.split_at(LINE_A.find(" 10 ").unwrap() + 2);
        append(file.path(), head);
        // 한 번의 폴링보다 길고 보류 한도보다는 짧게 쉰다
        tokio::time::sleep(Duration::from_millis(50)).await;
        append(file.path(), &format!("{tail}\n"));

        let event = next(&mut source).await;
        assert_eq!(event.status_code, 200);
        assert_eq!(event.payload_size, 10);
        assert_eq!(event.user_agent, "ua");
        source.close();
    }

    #[tokio::test]
    async fn max_line_length_at_upper_limit_does_not_overflow() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append(file.path(), &format!("{LINE_A}\n"));

        let config = FileCollectorConfig {
            max_line_length: usize::MAX,
            ..test_config(file.path())
        };
        let mut source = LogSource::open(config, parser()).await.unwrap();
        assert_eq!(next(&mut source).await.path, "/pages/a");
        source.close();
    }

    #[tokio::test]
    async fn unparsable_lines_are_skipped_and_counted() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append(file.path(), &format!("garbage line\n{LINE_B}\n"));

        let mut source = LogSource::open(test_config(file.path()), parser())
            .await
            .unwrap();
        assert_eq!(next(&mut source).await.path, "/users/b");

        let stats = source.stats();
        assert_eq!(stats.lines_read(), 2);
        assert_eq!(stats.parse_errors(), 1);
        assert_eq!(stats.events_emitted(), 1);
        source.close();
    }

    #[tokio::test]
    async fn truncated_file_is_reread_from_start() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append(file.path(), &format!("{LINE_A}\n{LINE_B}\n"));

        let mut source = LogSource::open(test_config(file.path()), parser())
            .await
            .unwrap();
        next(&mut source).await;
        next(&mut source).await;

        std::fs::File::create(file.path()).unwrap();
        append(file.path(), &format!("{LINE_B}\n"));

        assert_eq!(next(&mut source).await.path, "/users/b");
        assert_eq!(source.stats().truncations(), 1);
        source.close();
    }

    #[tokio::test]
    async fn overlong_line_is_discarded() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let long = format!("{}\n", "x".repeat(256));
        append(file.path(), &format!("{long}{LINE_A}\n"));

        let config = FileCollectorConfig {
            max_line_length: 128,
            ..test_config(file.path())
        };
        let mut source = LogSource::open(config, parser()).await.unwrap();
        assert_eq!(next(&mut source).await.path, "/pages/a");
        assert_eq!(source.stats().lines_read(), 1);
        source.close();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_stream() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut source = LogSource::open(test_config(file.path()), parser())
            .await
            .unwrap();

        source.close();
        source.close();
        assert_eq!(source.status(), CollectorStatus::Stopped);

        let end = timeout(Duration::from_secs(1), source.next_event())
            .await
            .unwrap();
        assert!(end.is_none());
    }
}
