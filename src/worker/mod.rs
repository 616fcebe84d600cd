// Worker pool: background document processing under a supervisor

mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::core::DocumentProcessor;
use crate::domain::model::{DocumentStatus, ProcessDocumentTask, ProcessingOutcome};
use crate::domain::ports::{DocumentRepository, Storage};
use crate::utils::error::{IngestError, Result};
use crate::utils::monitor::SystemMonitor;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

type TaskReceiver = Arc<Mutex<mpsc::Receiver<ProcessDocumentTask>>>;

/// Everything a worker needs to run a document task.
pub struct WorkerContext<S: Storage> {
    pub storage: S,
    pub documents: Arc<dyn DocumentRepository>,
    pub processor: Arc<DocumentProcessor>,
    pub monitor: Arc<SystemMonitor>,
}

struct Worker<S: Storage> {
    id: usize,
    queue: TaskReceiver,
    ctx: Arc<WorkerContext<S>>,
}

impl<S: Storage + Clone + 'static> Worker<S> {
    async fn run(&self, mut shutdown: ShutdownToken) {
        info!(worker = self.id, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }

            let task = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                task = async { self.queue.lock().await.recv().await } => task,
            };

            match task {
                Some(task) => self.handle(task).await,
                None => {
                    info!(worker = self.id, "Task queue closed");
                    break;
                }
            }
        }
        info!(worker = self.id, "Worker stopped");
    }

    async fn handle(&self, task: ProcessDocumentTask) {
        let document_id = task.document_id;
        info!(worker = self.id, document_id, "📄 Processing {}", task.file_name);

        if let Err(e) = self
            .ctx
            .documents
            .update_status(document_id, DocumentStatus::Processing, None, None)
            .await
        {
            error!(document_id, "Could not mark document as processing: {}", e);
            return;
        }

        let (status, error_message, stats) = match self.execute(task).await {
            Ok(outcome) if outcome.is_completed() => {
                (DocumentStatus::Completed, None, Some(outcome.stats))
            }
            Ok(outcome) => (DocumentStatus::Failed, outcome.error, Some(outcome.stats)),
            Err(message) => {
                error!(worker = self.id, document_id, "❌ {}", message);
                (DocumentStatus::Failed, Some(message), None)
            }
        };

        if let Err(e) = self
            .ctx
            .documents
            .update_status(document_id, status, error_message, stats)
            .await
        {
            error!(document_id, "Could not record document status: {}", e);
        }

        self.ctx
            .monitor
            .log_stats(&format!("worker {} document {}", self.id, document_id));
    }

    /// 在獨立 task 中執行，panic 只會讓這份文件失敗
    async fn execute(
        &self,
        task: ProcessDocumentTask,
    ) -> std::result::Result<ProcessingOutcome, String> {
        let ctx = Arc::clone(&self.ctx);
        let handle = tokio::spawn(async move {
            let data = ctx.storage.read_file(&task.file_path).await?;
            let outcome = ctx
                .processor
                .process_document(&task.file_name, &data, task.document_id, task.fund_id)
                .await;
            Ok::<_, IngestError>(outcome)
        });

        match handle.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) if e.is_panic() => Err(format!(
                "Processing panicked: {}",
                panic_message(e.into_panic())
            )),
            Err(e) => Err(format!("Processing was cancelled: {}", e)),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Cloneable handle used to enqueue work and read pool status.
#[derive(Clone)]
pub struct PoolHandle {
    sender: mpsc::Sender<ProcessDocumentTask>,
    restarts: Arc<AtomicUsize>,
    size: usize,
}

impl PoolHandle {
    /// Waits for queue capacity when the queue is full.
    pub async fn enqueue(&self, task: ProcessDocumentTask) -> Result<()> {
        self.sender
            .send(task)
            .await
            .map_err(|_| IngestError::QueueClosed)
    }

    /// Fails with `QueueFull` instead of waiting when the queue has no room.
    pub fn try_enqueue(&self, task: ProcessDocumentTask) -> Result<()> {
        self.sender.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => IngestError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => IngestError::QueueClosed,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::Relaxed)
    }
}

/// Starts a fixed number of workers and restarts any that panic.
pub struct WorkerPool {
    handle: PoolHandle,
    shutdown: ShutdownSender,
    supervisors: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start<S: Storage + Clone + 'static>(
        size: usize,
        queue_capacity: usize,
        ctx: WorkerContext<S>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let queue: TaskReceiver = Arc::new(Mutex::new(receiver));
        let (shutdown, token) = shutdown_channel();
        let restarts = Arc::new(AtomicUsize::new(0));
        let ctx = Arc::new(ctx);

        let supervisors = (1..=size)
            .map(|id| {
                let worker = Arc::new(Worker {
                    id,
                    queue: Arc::clone(&queue),
                    ctx: Arc::clone(&ctx),
                });
                tokio::spawn(supervise(worker, token.clone(), Arc::clone(&restarts)))
            })
            .collect();

        info!("🚀 Worker pool started with {} workers", size);

        Self {
            handle: PoolHandle {
                sender,
                restarts,
                size,
            },
            shutdown,
            supervisors,
        }
    }

    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Stops taking new tasks; documents already being processed are finished.
    pub async fn shutdown(self) {
        info!("Stopping worker pool");
        self.shutdown.shutdown();
        drop(self.handle);

        for supervisor in self.supervisors {
            if let Err(e) = supervisor.await {
                warn!("Worker supervisor ended abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
    }
}

async fn supervise<S: Storage + Clone + 'static>(
    worker: Arc<Worker<S>>,
    shutdown: ShutdownToken,
    restarts: Arc<AtomicUsize>,
) {
    loop {
        let running = Arc::clone(&worker);
        let token = shutdown.clone();
        let result = tokio::spawn(async move { running.run(token).await }).await;

        match result {
            Ok(()) => break,
            Err(e) if e.is_panic() => {
                if shutdown.is_shutdown() {
                    break;
                }
                let total = restarts.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    worker = worker.id,
                    restarts = total,
                    "Worker panicked ({}), restarting",
                    panic_message(e.into_panic())
                );
            }
            Err(e) => {
                warn!(worker = worker.id, "Worker task cancelled: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DelimitedTableSource, FileRepository};
    use crate::domain::model::{Document, NewDocument, ProcessingStats};
    use crate::domain::ports::LedgerRepository;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                IngestError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    /// Delegates to a real repository but panics on the first status update.
    struct PanicOnceDocuments {
        inner: Arc<FileRepository<MockStorage>>,
        panicked: AtomicBool,
    }

    #[async_trait::async_trait]
    impl DocumentRepository for PanicOnceDocuments {
        async fn create_document(&self, new: NewDocument) -> Result<Document> {
            self.inner.create_document(new).await
        }

        async fn get_document(&self, id: u64) -> Result<Option<Document>> {
            self.inner.get_document(id).await
        }

        async fn list_documents(&self, fund_id: Option<u64>) -> Result<Vec<Document>> {
            self.inner.list_documents(fund_id).await
        }

        async fn update_status(
            &self,
            id: u64,
            status: DocumentStatus,
            error_message: Option<String>,
            stats: Option<ProcessingStats>,
        ) -> Result<()> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("status store exploded");
            }
            self.inner
                .update_status(id, status, error_message, stats)
                .await
        }

        async fn unfinished_documents(&self) -> Result<Vec<Document>> {
            self.inner.unfinished_documents().await
        }
    }

    async fn create(
        repo: &FileRepository<MockStorage>,
        storage: &MockStorage,
        file_name: &str,
        content: &[u8],
    ) -> Document {
        let doc = repo
            .create_document(NewDocument {
                fund_id: 1,
                file_name: file_name.to_string(),
            })
            .await
            .unwrap();
        storage.write_file(&doc.file_path, content).await.unwrap();
        doc
    }

    async fn wait_until_finished(repo: &FileRepository<MockStorage>, id: u64) -> Document {
        for _ in 0..200 {
            let doc = repo.get_document(id).await.unwrap().unwrap();
            if doc.status.is_finished() {
                return doc;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("document {} did not finish", id);
    }

    fn context(
        storage: MockStorage,
        documents: Arc<dyn DocumentRepository>,
        ledger: Arc<dyn LedgerRepository>,
    ) -> WorkerContext<MockStorage> {
        WorkerContext {
            storage,
            documents,
            processor: Arc::new(DocumentProcessor::new(
                Arc::new(DelimitedTableSource::new()),
                ledger,
            )),
            monitor: Arc::new(SystemMonitor::new(false)),
        }
    }

    #[tokio::test]
    async fn test_pool_processes_documents() {
        let storage = MockStorage::default();
        let repo = Arc::new(FileRepository::open(storage.clone()).await.unwrap());
        let pool = WorkerPool::start(2, 8, context(storage.clone(), repo.clone(), repo.clone()));

        let good = create(
            &repo,
            &storage,
            "calls.csv",
            b"Date,Call Number,Amount\n2024-01-15,Call 1,\"$1,000\"\n",
        )
        .await;
        let bad = create(&repo, &storage, "scan.pdf", b"%PDF").await;

        pool.handle().enqueue((&good).into()).await.unwrap();
        pool.handle().enqueue((&bad).into()).await.unwrap();

        let good = wait_until_finished(&repo, good.id).await;
        assert_eq!(good.status, DocumentStatus::Completed);
        assert_eq!(good.stats.unwrap().capital_calls, 1);

        let bad = wait_until_finished(&repo, bad.id).await;
        assert_eq!(bad.status, DocumentStatus::Failed);
        assert!(bad.error_message.unwrap().contains("scan.pdf"));

        assert_eq!(repo.fund_ledger(1).await.unwrap().totals.capital_called, 1000.0);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_upload_marks_failed() {
        let storage = MockStorage::default();
        let repo = Arc::new(FileRepository::open(storage.clone()).await.unwrap());
        let pool = WorkerPool::start(1, 8, context(storage.clone(), repo.clone(), repo.clone()));

        let doc = repo
            .create_document(NewDocument {
                fund_id: 1,
                file_name: "gone.csv".to_string(),
            })
            .await
            .unwrap();
        pool.handle().enqueue((&doc).into()).await.unwrap();

        let doc = wait_until_finished(&repo, doc.id).await;
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error_message.unwrap().contains("File not found"));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_supervisor_restarts_panicked_worker() {
        let storage = MockStorage::default();
        let repo = Arc::new(FileRepository::open(storage.clone()).await.unwrap());
        let documents = Arc::new(PanicOnceDocuments {
            inner: repo.clone(),
            panicked: AtomicBool::new(false),
        });
        let pool = WorkerPool::start(1, 8, context(storage.clone(), documents, repo.clone()));
        let handle = pool.handle();

        let lost = create(&repo, &storage, "a.csv", b"Date,Call,Amount\n").await;
        let kept = create(
            &repo,
            &storage,
            "b.csv",
            b"Date,Call,Amount\n2024-01-15,Call 1,100\n",
        )
        .await;

        handle.enqueue((&lost).into()).await.unwrap();
        handle.enqueue((&kept).into()).await.unwrap();

        let kept = wait_until_finished(&repo, kept.id).await;
        assert_eq!(kept.status, DocumentStatus::Completed);
        assert_eq!(handle.restarts(), 1);
        assert_eq!(handle.size(), 1);

        // the task in flight during the panic stays unfinished for recovery
        let lost = repo.get_document(lost.id).await.unwrap().unwrap();
        assert_eq!(lost.status, DocumentStatus::Pending);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let storage = MockStorage::default();
        let repo = Arc::new(FileRepository::open(storage.clone()).await.unwrap());
        let pool = WorkerPool::start(1, 1, context(storage.clone(), repo.clone(), repo.clone()));
        let handle = pool.handle();

        pool.shutdown().await;

        let doc = create(&repo, &storage, "late.csv", b"").await;
        let result = handle.enqueue((&doc).into()).await;
        assert!(matches!(result, Err(IngestError::QueueClosed)));
    }
}
