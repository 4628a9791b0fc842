//! 소비자 태스크 핸들 -- 통계/알림 모니터가 공유하는 채널 + 태스크 관리
//!
//! 각 모니터는 자체 태스크가 상태를 단독으로 소유하고,
//! 외부에서는 이 핸들을 통해 이벤트를 넣거나 정지시킵니다.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use trafficwatch_core::types::AccessEvent;

use crate::error::LogPipelineError;

/// 이벤트 채널 송신측과 태스크 핸들
pub(crate) struct ConsumerHandle {
    name: &'static str,
    tx: Mutex<Option<mpsc::Sender<Arc<AccessEvent>>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConsumerHandle {
    pub(crate) fn new(
        name: &'static str,
        tx: mpsc::Sender<Arc<AccessEvent>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            tx: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        }
    }

    /// 이벤트를 태스크로 전달합니다. 채널이 가득 차면 대기합니다.
    pub(crate) async fn send(&self, event: Arc<AccessEvent>) -> Result<(), LogPipelineError> {
        let tx = self.tx.lock().await.clone().ok_or_else(|| {
            LogPipelineError::Channel(format!("{} monitor stopped", self.name))
        })?;

        tx.send(event)
            .await
            .map_err(|_| LogPipelineError::Channel(format!("{} monitor task ended", self.name)))
    }

    /// 송신측을 닫고 태스크가 남은 이벤트를 처리한 뒤 끝나기를 기다립니다.
    ///
    /// 두 번째 호출부터는 아무 일도 하지 않습니다.
    pub(crate) async fn stop(&self) {
        let tx = self.tx.lock().await.take();
        if tx.is_none() {
            return;
        }
        drop(tx);

        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::warn!(monitor = self.name, error = %e, "monitor task failed");
            }
        }
        tracing::debug!(monitor = self.name, "monitor stopped");
    }

    /// 정지 여부
    pub(crate) async fn is_stopped(&self) -> bool {
        self.tx.lock().await.is_none()
    }
}
