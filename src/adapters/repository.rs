use crate::domain::model::{
    Adjustment, CapitalCall, Distribution, Document, DocumentStatus, FundLedger, LedgerEntry,
    LedgerTotals, NewDocument, ProcessingStats, TransactionBatch,
};
use crate::domain::ports::{DocumentRepository, LedgerRepository, Storage};
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct State {
    next_document_id: u64,
    next_transaction_id: u64,
    documents: BTreeMap<u64, Document>,
    capital_calls: Vec<CapitalCall>,
    distributions: Vec<Distribution>,
    adjustments: Vec<Adjustment>,
}

impl State {
    fn allocate_document_id(&mut self) -> u64 {
        self.next_document_id += 1;
        self.next_document_id
    }

    fn allocate_transaction_id(&mut self) -> u64 {
        self.next_transaction_id += 1;
        self.next_transaction_id
    }
}

/// Documents and fund ledgers kept in memory and snapshotted to `state.json`.
///
/// Every mutation writes the snapshot while still holding the write lock, so
/// the file on disk always matches a state that readers could have observed.
pub struct FileRepository<S: Storage> {
    storage: S,
    state: RwLock<State>,
}

impl<S: Storage> FileRepository<S> {
    /// 開啟儲存庫；若已有快照則載入
    pub async fn open(storage: S) -> Result<Self> {
        let state = match storage.read_file(STATE_FILE).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(IngestError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                State::default()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            storage,
            state: RwLock::new(state),
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn persist(&self, state: &State) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        self.storage.write_file(STATE_FILE, &bytes).await
    }
}

#[async_trait]
impl<S: Storage> DocumentRepository for FileRepository<S> {
    async fn create_document(&self, new: NewDocument) -> Result<Document> {
        let mut state = self.state.write().await;
        let mut next = state.clone();

        let id = next.allocate_document_id();
        let document = Document {
            id,
            fund_id: new.fund_id,
            file_path: format!("uploads/{}/{}", id, new.file_name),
            file_name: new.file_name,
            status: DocumentStatus::Pending,
            error_message: None,
            stats: None,
            uploaded_at: Utc::now(),
            processed_at: None,
        };
        next.documents.insert(id, document.clone());

        self.persist(&next).await?;
        *state = next;
        Ok(document)
    }

    async fn get_document(&self, id: u64) -> Result<Option<Document>> {
        Ok(self.state.read().await.documents.get(&id).cloned())
    }

    async fn list_documents(&self, fund_id: Option<u64>) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .values()
            .filter(|d| fund_id.map_or(true, |f| d.fund_id == f))
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: u64,
        status: DocumentStatus,
        error_message: Option<String>,
        stats: Option<ProcessingStats>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let mut next = state.clone();

        let document = next.documents.get_mut(&id).ok_or(IngestError::NotFound {
            entity: "document",
            id,
        })?;
        document.status = status;
        document.error_message = error_message;
        if stats.is_some() {
            document.stats = stats;
        }
        if status.is_finished() {
            document.processed_at = Some(Utc::now());
        }

        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    async fn unfinished_documents(&self) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .values()
            .filter(|d| !d.status.is_finished())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl<S: Storage> LedgerRepository for FileRepository<S> {
    async fn commit(&self, batch: TransactionBatch) -> Result<()> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let created_at = Utc::now();

        // 同一份文件重新處理時取代舊的交易，不重複累加
        next.capital_calls.retain(|c| c.document_id != batch.document_id);
        next.distributions.retain(|d| d.document_id != batch.document_id);
        next.adjustments.retain(|a| a.document_id != batch.document_id);

        for entry in batch.entries {
            let id = next.allocate_transaction_id();
            match entry {
                LedgerEntry::CapitalCall {
                    date,
                    call_type,
                    amount,
                    description,
                } => next.capital_calls.push(CapitalCall {
                    id,
                    fund_id: batch.fund_id,
                    document_id: batch.document_id,
                    call_date: date,
                    call_type,
                    amount,
                    description,
                    created_at,
                }),
                LedgerEntry::Distribution {
                    date,
                    distribution_type,
                    is_recallable,
                    amount,
                    description,
                } => next.distributions.push(Distribution {
                    id,
                    fund_id: batch.fund_id,
                    document_id: batch.document_id,
                    distribution_date: date,
                    distribution_type,
                    is_recallable,
                    amount,
                    description,
                    created_at,
                }),
                LedgerEntry::Adjustment {
                    date,
                    adjustment_type,
                    category,
                    amount,
                    is_contribution_adjustment,
                    description,
                } => next.adjustments.push(Adjustment {
                    id,
                    fund_id: batch.fund_id,
                    document_id: batch.document_id,
                    adjustment_date: date,
                    adjustment_type,
                    category,
                    amount,
                    is_contribution_adjustment,
                    description,
                    created_at,
                }),
            }
        }

        // 寫入失敗時保留原狀態，整批交易不生效
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    async fn fund_ledger(&self, fund_id: u64) -> Result<FundLedger> {
        let state = self.state.read().await;

        let capital_calls: Vec<CapitalCall> = state
            .capital_calls
            .iter()
            .filter(|c| c.fund_id == fund_id)
            .cloned()
            .collect();
        let distributions: Vec<Distribution> = state
            .distributions
            .iter()
            .filter(|d| d.fund_id == fund_id)
            .cloned()
            .collect();
        let adjustments: Vec<Adjustment> = state
            .adjustments
            .iter()
            .filter(|a| a.fund_id == fund_id)
            .cloned()
            .collect();

        let totals = LedgerTotals {
            capital_called: capital_calls.iter().map(|c| c.amount).sum(),
            distributed: distributions.iter().map(|d| d.amount).sum(),
            adjustments: adjustments.iter().map(|a| a.amount).sum(),
        };

        Ok(FundLedger {
            fund_id,
            capital_calls,
            distributions,
            adjustments,
            totals,
        })
    }
}
