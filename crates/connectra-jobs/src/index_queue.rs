//! Bounded async search-index write-behind queue (§4.5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use connectra_core::defaults::{
    INDEX_QUEUE_BACKOFF_BASE_SECS, INDEX_QUEUE_BACKOFF_MAX_SECS, INDEX_QUEUE_CAPACITY,
    INDEX_QUEUE_MAX_RETRIES, INDEX_QUEUE_WORKERS,
};
use connectra_core::{IndexOperation, IndexOperationKind, SearchIndex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Write-behind queue for single-record search-index mutations. Availability
/// is preferred over durability: the channel is bounded and enqueue never
/// blocks — a full channel drops the operation with a warning.
pub struct IndexQueue {
    sender: mpsc::Sender<IndexOperation>,
    cancelled: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl IndexQueue {
    pub fn start(index: Arc<dyn SearchIndex>) -> Self {
        Self::start_with(
            index,
            INDEX_QUEUE_CAPACITY,
            INDEX_QUEUE_WORKERS,
        )
    }

    pub fn start_with(index: Arc<dyn SearchIndex>, capacity: usize, worker_count: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        let cancelled = Arc::new(AtomicBool::new(false));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..worker_count)
            .map(|worker_id| {
                let index = index.clone();
                let receiver = receiver.clone();
                let cancelled = cancelled.clone();
                tokio::spawn(async move {
                    loop {
                        let op = {
                            let mut guard = receiver.lock().await;
                            guard.recv().await
                        };
                        let Some(op) = op else { break };
                        if cancelled.load(Ordering::Relaxed) {
                            break;
                        }
                        debug!(worker_id, doc_id = %op.doc_id, "index queue worker picked up op");
                        process_with_backoff(index.as_ref(), op).await;
                    }
                })
            })
            .collect();

        Self {
            sender,
            cancelled,
            workers,
        }
    }

    /// Enqueue an operation without blocking; drops with a warning if the
    /// channel is full (§4.5).
    pub fn enqueue(&self, op: IndexOperation) {
        if let Err(err) = self.sender.try_send(op) {
            warn!(error = %err, "index queue full, dropping operation");
        }
    }

    /// Close the channel, signal in-flight workers to stop after their
    /// current operation, and wait for them to finish.
    pub async fn stop(self) {
        self.cancelled.store(true, Ordering::Relaxed);
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn process_with_backoff(index: &dyn SearchIndex, op: IndexOperation) {
    let mut attempt = 0u32;
    loop {
        let result = match op.kind {
            IndexOperationKind::Create | IndexOperationKind::Update => {
                let document = op.document.clone().unwrap_or(serde_json::Value::Null);
                index.index_one(&op.index_name, op.doc_id, document).await
            }
            IndexOperationKind::Delete => index.delete_one(&op.index_name, op.doc_id).await,
        };

        match result {
            Ok(()) => return,
            Err(err) if attempt + 1 >= INDEX_QUEUE_MAX_RETRIES => {
                warn!(
                    error = %err,
                    doc_id = %op.doc_id,
                    attempt,
                    "index queue op exhausted retries, dropping"
                );
                return;
            }
            Err(err) => {
                let backoff = Duration::from_secs(
                    (INDEX_QUEUE_BACKOFF_BASE_SECS * 2u64.pow(attempt))
                        .min(INDEX_QUEUE_BACKOFF_MAX_SECS),
                );
                warn!(error = %err, doc_id = %op.doc_id, attempt, backoff_secs = backoff.as_secs(), "index queue op failed, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectra_core::{Result, SearchPage};
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    struct CountingIndex {
        calls: AtomicUsize,
        fail_times: AtomicUsize,
    }

    #[async_trait]
    impl SearchIndex for CountingIndex {
        async fn bulk_index(&self, _: &str, _: &[(Uuid, serde_json::Value)]) -> Result<()> {
            Ok(())
        }

        async fn index_one(&self, _: &str, _: Uuid, _: serde_json::Value) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(connectra_core::Error::Search("boom".into()));
            }
            Ok(())
        }

        async fn delete_one(&self, _: &str, _: Uuid) -> Result<()> {
            Ok(())
        }

        async fn search(&self, _: &str, _: serde_json::Value) -> Result<SearchPage> {
            Ok(SearchPage::default())
        }

        async fn count(&self, _: &str, _: serde_json::Value) -> Result<i64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_process() {
        let index = Arc::new(CountingIndex {
            calls: AtomicUsize::new(0),
            fail_times: AtomicUsize::new(0),
        });
        let queue = IndexQueue::start_with(index.clone(), 10, 1);
        queue.enqueue(IndexOperation {
            kind: IndexOperationKind::Create,
            index_name: "companies".into(),
            doc_id: Uuid::new_v4(),
            document: Some(serde_json::json!({"name": "Acme"})),
        });
        queue.stop().await;
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enqueue_beyond_capacity_drops() {
        let index = Arc::new(CountingIndex {
            calls: AtomicUsize::new(0),
            fail_times: AtomicUsize::new(0),
        });
        let queue = IndexQueue::start_with(index.clone(), 1, 0);
        for _ in 0..5 {
            queue.enqueue(IndexOperation {
                kind: IndexOperationKind::Delete,
                index_name: "companies".into(),
                doc_id: Uuid::new_v4(),
                document: None,
            });
        }
        queue.stop().await;
    }
}
