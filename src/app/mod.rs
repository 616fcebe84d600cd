//! Application wiring and the dev / prod run loops.

pub mod reload;

pub use reload::FileWatcher;

use crate::adapters::{DelimitedTableSource, DocumentFetcher, FileRepository, LocalStorage};
use crate::config::{AppConfig, RunMode};
use crate::core::DocumentProcessor;
use crate::domain::model::{DocumentStatus, NewDocument, ProcessDocumentTask, ProcessingOutcome};
use crate::domain::ports::{DocumentRepository, LedgerRepository, Storage};
use crate::server::{RpcHandler, RpcServer};
use crate::utils::error::{IngestError, Result};
use crate::utils::monitor::SystemMonitor;
use crate::utils::validation::validate_file_name;
use crate::worker::{PoolHandle, WorkerContext, WorkerPool};
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// A running server plus its worker pool.
pub struct Application {
    server: RpcServer,
    pool: WorkerPool,
    mode: RunMode,
}

impl Application {
    pub async fn start(config: &AppConfig, mode: RunMode) -> Result<Self> {
        let storage = LocalStorage::new(config.data_dir());
        let repository = Arc::new(FileRepository::open(storage.clone()).await?);
        let documents: Arc<dyn DocumentRepository> = repository.clone();
        let ledger: Arc<dyn LedgerRepository> = repository;

        let processor = Arc::new(DocumentProcessor::new(
            Arc::new(DelimitedTableSource::new()),
            Arc::clone(&ledger),
        ));
        let monitor = Arc::new(SystemMonitor::new(config.monitoring.enabled));
        if monitor.is_enabled() {
            info!("🔍 System monitoring enabled");
        }

        let pool = WorkerPool::start(
            mode.worker_count(config),
            config.workers.queue_capacity,
            WorkerContext {
                storage: storage.clone(),
                documents: Arc::clone(&documents),
                processor,
                monitor,
            },
        );

        match Self::serve(config, mode, storage, documents, ledger, pool.handle()).await {
            Ok(server) => {
                info!(
                    mode = %mode,
                    workers = pool.handle().size(),
                    "✅ fund-ingest ready on {}",
                    server.local_addr()
                );
                Ok(Self { server, pool, mode })
            }
            Err(e) => {
                pool.shutdown().await;
                Err(e)
            }
        }
    }

    async fn serve(
        config: &AppConfig,
        mode: RunMode,
        storage: LocalStorage,
        documents: Arc<dyn DocumentRepository>,
        ledger: Arc<dyn LedgerRepository>,
        pool: PoolHandle,
    ) -> Result<RpcServer> {
        recover_unfinished(documents.as_ref(), &pool).await?;

        let fetcher = DocumentFetcher::new(
            config.fetch_timeout(),
            config.server.max_request_body_bytes as usize,
        )?;
        let handler = RpcHandler::new(storage, documents, ledger, pool, fetcher, mode);
        RpcServer::start(
            &config.bind_address(),
            config.server.max_request_body_bytes,
            handler,
        )
        .await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// 先停止接收請求，再讓 worker 完成手上的文件
    pub async fn shutdown(self) {
        info!("🛑 Shutting down");
        self.server.stop().await;
        self.pool.shutdown().await;
    }
}

/// 重新排入上次執行時尚未完成的文件
async fn recover_unfinished(documents: &dyn DocumentRepository, pool: &PoolHandle) -> Result<()> {
    let unfinished = documents.unfinished_documents().await?;
    if unfinished.is_empty() {
        return Ok(());
    }

    info!("♻️ Re-queueing {} unfinished documents", unfinished.len());
    for document in &unfinished {
        pool.enqueue(ProcessDocumentTask::from(document)).await?;
    }
    Ok(())
}

/// run-prod: serve until `shutdown` resolves.
pub async fn run_prod<F>(config: AppConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let app = Application::start(&config, RunMode::Prod).await?;
    shutdown.await;
    app.shutdown().await;
    Ok(())
}

/// run-dev: serve, and restart with a freshly loaded config whenever a watched
/// path changes. A config that fails to load or to start leaves the previous
/// one running.
pub async fn run_dev<L, F>(
    load_config: L,
    config_file: Option<PathBuf>,
    shutdown: F,
) -> Result<()>
where
    L: Fn() -> Result<AppConfig>,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut config = load_config()?;
    let mut app = Application::start(&config, RunMode::Dev).await?;

    loop {
        let mut watcher = FileWatcher::new(watch_paths(&config, config_file.as_deref()));
        if watcher.paths().is_empty() {
            warn!("No files to watch; reload is inactive");
        } else {
            info!("👀 Watching {:?} for changes", watcher.paths());
        }

        let mut ticker = tokio::time::interval(config.poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let next = loop {
            tokio::select! {
                _ = &mut shutdown => break None,
                _ = ticker.tick() => {
                    let changed = watcher.poll();
                    if changed.is_empty() {
                        continue;
                    }
                    info!("🔄 Change detected in {:?}", changed);
                    match load_config() {
                        Ok(new_config) => break Some(new_config),
                        Err(e) => {
                            error!("❌ Reload skipped, keeping current config: {}", e);
                            warn!("💡 Suggestion: {}", e.recovery_suggestion());
                        }
                    }
                }
            }
        };

        // 舊的實例必須先釋放埠號，新設定才能綁定同一個位址
        app.shutdown().await;
        let Some(new_config) = next else {
            return Ok(());
        };

        info!("Restarting with reloaded config");
        app = match Application::start(&new_config, RunMode::Dev).await {
            Ok(app) => {
                config = new_config;
                app
            }
            Err(e) => {
                error!("❌ Restart failed, going back to the previous config: {}", e);
                warn!("💡 Suggestion: {}", e.recovery_suggestion());
                Application::start(&config, RunMode::Dev).await?
            }
        };
    }
}

fn watch_paths(config: &AppConfig, config_file: Option<&Path>) -> Vec<PathBuf> {
    if config.reload.watch.is_empty() {
        config_file.map(Path::to_path_buf).into_iter().collect()
    } else {
        config.reload.watch.iter().map(PathBuf::from).collect()
    }
}

/// Processes one local file right away, recording it like an upload would.
pub async fn process_once(
    config: &AppConfig,
    fund_id: u64,
    file: &Path,
) -> Result<ProcessingOutcome> {
    if fund_id == 0 {
        return Err(IngestError::ValidationError {
            message: "fund_id must be a positive integer".to_string(),
        });
    }
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::ValidationError {
            message: format!("Cannot infer a file name from path: {}", file.display()),
        })?;
    validate_file_name("file", &file_name)?;
    let data = tokio::fs::read(file).await?;

    let storage = LocalStorage::new(config.data_dir());
    let repository = Arc::new(FileRepository::open(storage.clone()).await?);
    let document = repository
        .create_document(NewDocument { fund_id, file_name })
        .await?;
    storage.write_file(&document.file_path, &data).await?;
    repository
        .update_status(document.id, DocumentStatus::Processing, None, None)
        .await?;

    let processor =
        DocumentProcessor::new(Arc::new(DelimitedTableSource::new()), repository.clone());
    let outcome = processor
        .process_document(&document.file_name, &data, document.id, fund_id)
        .await;

    let status = if outcome.is_completed() {
        DocumentStatus::Completed
    } else {
        DocumentStatus::Failed
    };
    repository
        .update_status(
            document.id,
            status,
            outcome.error.clone(),
            Some(outcome.stats.clone()),
        )
        .await?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::OutcomeStatus;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.storage.data_dir = dir.path().join("data").display().to_string();
        config
    }

    #[test]
    fn test_watch_paths_default_to_config_file() {
        let mut config = AppConfig::default();
        let file = PathBuf::from("fund-ingest.toml");
        assert_eq!(watch_paths(&config, Some(&file)), vec![file.clone()]);
        assert!(watch_paths(&config, None).is_empty());

        config.reload.watch = vec!["fixtures".to_string()];
        assert_eq!(watch_paths(&config, Some(&file)), vec![PathBuf::from("fixtures")]);
    }

    #[tokio::test]
    async fn test_process_once_records_ledger() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let file = dir.path().join("calls.csv");
        std::fs::write(
            &file,
            "Date,Call Number,Amount,Description\n2024-01-15,Call 1,\"$1,000,000\",Initial\n",
        )
        .unwrap();

        let outcome = process_once(&config, 7, &file).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(outcome.stats.capital_calls, 1);

        let repository = FileRepository::open(LocalStorage::new(config.data_dir()))
            .await
            .unwrap();
        let ledger = repository.fund_ledger(7).await.unwrap();
        assert_eq!(ledger.totals.capital_called, 1_000_000.0);

        let document = repository.get_document(1).await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_non_finite_amount_keeps_data_dir_readable() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let file = dir.path().join("calls.csv");
        std::fs::write(&file, "Date,Call,Amount\n2024-01-15,Call 1,NaN\n").unwrap();

        let outcome = process_once(&config, 4, &file).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Completed);

        let repository = FileRepository::open(LocalStorage::new(config.data_dir()))
            .await
            .unwrap();
        let ledger = repository.fund_ledger(4).await.unwrap();
        assert_eq!(ledger.capital_calls.len(), 1);
        assert_eq!(ledger.capital_calls[0].amount, 0.0);
    }

    #[tokio::test]
    async fn test_process_once_rejects_zero_fund() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let err = process_once(&config, 0, Path::new("calls.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::ValidationError { .. }));
    }
}
