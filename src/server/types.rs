//! JSON-RPC request and response payloads.

use crate::domain::model::{Document, DocumentStatus, FundLedger};
use serde::{Deserialize, Serialize};

/// Exactly one of `path`, `url` or `content` must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub fund_id: u64,
    /// Required with `content`; defaults to the source's own name otherwise.
    pub file_name: Option<String>,
    /// Local file readable by the server.
    pub path: Option<String>,
    /// http(s) location to download.
    pub url: Option<String>,
    /// Inline CSV/TSV text.
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: u64,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetDocumentRequest {
    pub document_id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDocumentsRequest {
    pub fund_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDocumentsResponse {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundLedgerRequest {
    pub fund_id: u64,
}

pub type FundLedgerResponse = FundLedger;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub mode: String,
    pub workers: usize,
    pub worker_restarts: usize,
    pub uptime_secs: u64,
}
