use crate::domain::model::{
    Document, DocumentStatus, FundLedger, NewDocument, ProcessingStats, Table, TransactionBatch,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Turns the raw bytes of an uploaded document into tables.
pub trait TableSource: Send + Sync {
    /// Returns one entry per sheet read; each sheet may hold several tables.
    fn extract_sheets(&self, file_name: &str, data: &[u8]) -> Result<Vec<Vec<Table>>>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create_document(&self, new: NewDocument) -> Result<Document>;
    async fn get_document(&self, id: u64) -> Result<Option<Document>>;
    async fn list_documents(&self, fund_id: Option<u64>) -> Result<Vec<Document>>;
    async fn update_status(
        &self,
        id: u64,
        status: DocumentStatus,
        error_message: Option<String>,
        stats: Option<ProcessingStats>,
    ) -> Result<()>;
    /// Documents still `pending` or `processing`, oldest first.
    async fn unfinished_documents(&self) -> Result<Vec<Document>>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn commit(&self, batch: TransactionBatch) -> Result<()>;
    async fn fund_ledger(&self, fund_id: u64) -> Result<FundLedger>;
}
