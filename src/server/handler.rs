//! RPC method handlers.

use crate::adapters::DocumentFetcher;
use crate::config::RunMode;
use crate::domain::model::{Document, DocumentStatus, NewDocument};
use crate::domain::ports::{DocumentRepository, LedgerRepository, Storage};
use crate::server::error::to_rpc_error;
use crate::server::types::{
    FundLedgerRequest, FundLedgerResponse, GetDocumentRequest, HealthResponse,
    ListDocumentsRequest, ListDocumentsResponse, UploadRequest, UploadResponse,
};
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::validate_file_name;
use crate::worker::PoolHandle;
use jsonrpsee::types::ErrorObjectOwned;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

type RpcResult<T> = std::result::Result<T, ErrorObjectOwned>;

pub struct RpcHandler<S: Storage> {
    storage: S,
    documents: Arc<dyn DocumentRepository>,
    ledger: Arc<dyn LedgerRepository>,
    pool: PoolHandle,
    fetcher: DocumentFetcher,
    mode: RunMode,
    start_time: Instant,
}

impl<S: Storage + Clone + 'static> RpcHandler<S> {
    pub fn new(
        storage: S,
        documents: Arc<dyn DocumentRepository>,
        ledger: Arc<dyn LedgerRepository>,
        pool: PoolHandle,
        fetcher: DocumentFetcher,
        mode: RunMode,
    ) -> Self {
        Self {
            storage,
            documents,
            ledger,
            pool,
            fetcher,
            mode,
            start_time: Instant::now(),
        }
    }

    /// documents.upload.v1
    pub async fn upload(&self, req: UploadRequest) -> RpcResult<UploadResponse> {
        self.store_and_enqueue(req).await.map_err(to_rpc_error)
    }

    /// documents.get.v1
    pub async fn get_document(&self, req: GetDocumentRequest) -> RpcResult<Document> {
        self.documents
            .get_document(req.document_id)
            .await
            .and_then(|doc| {
                doc.ok_or(IngestError::NotFound {
                    entity: "document",
                    id: req.document_id,
                })
            })
            .map_err(to_rpc_error)
    }

    /// documents.list.v1
    pub async fn list_documents(
        &self,
        req: ListDocumentsRequest,
    ) -> RpcResult<ListDocumentsResponse> {
        let documents = self
            .documents
            .list_documents(req.fund_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(ListDocumentsResponse { documents })
    }

    /// funds.ledger.v1
    pub async fn fund_ledger(&self, req: FundLedgerRequest) -> RpcResult<FundLedgerResponse> {
        self.ledger
            .fund_ledger(req.fund_id)
            .await
            .map_err(to_rpc_error)
    }

    /// health.v1
    pub fn health(&self) -> RpcResult<HealthResponse> {
        Ok(HealthResponse {
            status: "ok".to_string(),
            mode: self.mode.to_string(),
            workers: self.pool.size(),
            worker_restarts: self.pool.restarts(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        })
    }

    async fn store_and_enqueue(&self, req: UploadRequest) -> Result<UploadResponse> {
        if req.fund_id == 0 {
            return Err(IngestError::ValidationError {
                message: "fund_id must be a positive integer".to_string(),
            });
        }
        let fund_id = req.fund_id;
        let (file_name, data) = self.resolve_source(req).await?;
        validate_file_name("file_name", &file_name)?;

        let document = self
            .documents
            .create_document(NewDocument { fund_id, file_name })
            .await?;

        if let Err(e) = self.storage.write_file(&document.file_path, &data).await {
            self.documents
                .update_status(
                    document.id,
                    DocumentStatus::Failed,
                    Some(format!("Could not store upload: {}", e)),
                    None,
                )
                .await?;
            return Err(e);
        }

        match self.pool.try_enqueue((&document).into()) {
            Ok(()) => {}
            Err(IngestError::QueueFull) => {
                self.documents
                    .update_status(
                        document.id,
                        DocumentStatus::Failed,
                        Some("Processing queue is full".to_string()),
                        None,
                    )
                    .await?;
                return Err(IngestError::QueueFull);
            }
            // 若佇列已關閉，文件保持 pending，下次啟動時會重新排入
            Err(e) => return Err(e),
        }

        tracing::info!(
            document_id = document.id,
            fund_id,
            bytes = data.len(),
            "📥 Document queued: {}",
            document.file_name
        );

        Ok(UploadResponse {
            document_id: document.id,
            status: document.status,
        })
    }

    async fn resolve_source(&self, req: UploadRequest) -> Result<(String, Vec<u8>)> {
        let sources = [req.path.is_some(), req.url.is_some(), req.content.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if sources != 1 {
            return Err(IngestError::ValidationError {
                message: "exactly one of path, url or content must be provided".to_string(),
            });
        }

        if let Some(path) = req.path {
            let data = tokio::fs::read(&path).await?;
            let file_name = match req.file_name {
                Some(name) => name,
                None => Path::new(&path)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| IngestError::ValidationError {
                        message: format!("Cannot infer a file name from path: {}", path),
                    })?,
            };
            return Ok((file_name, data));
        }

        if let Some(url) = req.url {
            let fetched = self.fetcher.fetch(&url).await?;
            return Ok((req.file_name.unwrap_or(fetched.file_name), fetched.data));
        }

        let content = req.content.unwrap_or_default();
        let file_name = req.file_name.ok_or_else(|| IngestError::ValidationError {
            message: "file_name is required when uploading inline content".to_string(),
        })?;
        Ok((file_name, content.into_bytes()))
    }
}
