use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 表格：第一列為表頭
pub type Table = Vec<Vec<String>>;

/// One data row keyed by its canonical field name.
pub type ParsedRow = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    CapitalCalls,
    Distributions,
    Adjustments,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub pages: usize,
    pub tables: usize,
    pub capital_calls: usize,
    pub distributions: usize,
    pub adjustments: usize,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub stats: ProcessingStats,
}

impl ProcessingOutcome {
    pub fn completed(stats: ProcessingStats) -> Self {
        Self {
            status: OutcomeStatus::Completed,
            error: None,
            stats,
        }
    }

    pub fn failed(error: impl Into<String>, stats: ProcessingStats) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            error: Some(error.into()),
            stats,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub fund_id: u64,
    pub file_name: String,
    /// Path relative to the data directory.
    pub file_path: String,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub stats: Option<ProcessingStats>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub fund_id: u64,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalCall {
    pub id: u64,
    pub fund_id: u64,
    pub document_id: u64,
    pub call_date: Option<NaiveDate>,
    pub call_type: String,
    pub amount: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub id: u64,
    pub fund_id: u64,
    pub document_id: u64,
    pub distribution_date: Option<NaiveDate>,
    pub distribution_type: String,
    pub is_recallable: bool,
    pub amount: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: u64,
    pub fund_id: u64,
    pub document_id: u64,
    pub adjustment_date: Option<NaiveDate>,
    pub adjustment_type: String,
    pub category: Option<String>,
    pub amount: f64,
    pub is_contribution_adjustment: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row routed to one of the ledger tables, before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEntry {
    CapitalCall {
        date: Option<NaiveDate>,
        call_type: String,
        amount: f64,
        description: Option<String>,
    },
    Distribution {
        date: Option<NaiveDate>,
        distribution_type: String,
        is_recallable: bool,
        amount: f64,
        description: Option<String>,
    },
    Adjustment {
        date: Option<NaiveDate>,
        adjustment_type: String,
        category: Option<String>,
        amount: f64,
        is_contribution_adjustment: bool,
        description: Option<String>,
    },
}

/// Everything one document contributes to a fund ledger; committed as a unit.
#[derive(Debug, Clone)]
pub struct TransactionBatch {
    pub fund_id: u64,
    pub document_id: u64,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub capital_called: f64,
    pub distributed: f64,
    pub adjustments: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundLedger {
    pub fund_id: u64,
    pub capital_calls: Vec<CapitalCall>,
    pub distributions: Vec<Distribution>,
    pub adjustments: Vec<Adjustment>,
    pub totals: LedgerTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDocumentTask {
    pub document_id: u64,
    pub fund_id: u64,
    pub file_name: String,
    pub file_path: String,
}

impl From<&Document> for ProcessDocumentTask {
    fn from(document: &Document) -> Self {
        Self {
            document_id: document.id,
            fund_id: document.fund_id,
            file_name: document.file_name.clone(),
            file_path: document.file_path.clone(),
        }
    }
}
