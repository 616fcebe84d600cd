use crate::core::table_parser::TableParser;
use crate::core::values::{parse_amount, parse_bool, parse_date};
use crate::domain::model::{
    LedgerEntry, ParsedRow, ProcessingOutcome, ProcessingStats, Table, TableKind,
    TransactionBatch,
};
use crate::domain::ports::{LedgerRepository, TableSource};
use crate::utils::error::Result;
use std::sync::Arc;

/// Extracts, classifies and records the transactions of one uploaded document.
pub struct DocumentProcessor {
    tables: Arc<dyn TableSource>,
    ledger: Arc<dyn LedgerRepository>,
    parser: TableParser,
}

impl DocumentProcessor {
    pub fn new(tables: Arc<dyn TableSource>, ledger: Arc<dyn LedgerRepository>) -> Self {
        Self {
            tables,
            ledger,
            parser: TableParser::new(),
        }
    }

    /// 處理文件；任何錯誤都會回傳 failed 結果，且不寫入任何交易
    pub async fn process_document(
        &self,
        file_name: &str,
        data: &[u8],
        document_id: u64,
        fund_id: u64,
    ) -> ProcessingOutcome {
        let mut stats = ProcessingStats::default();

        match self
            .extract_and_commit(file_name, data, document_id, fund_id, &mut stats)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    document_id,
                    fund_id,
                    capital_calls = stats.capital_calls,
                    distributions = stats.distributions,
                    adjustments = stats.adjustments,
                    "✅ Document processed"
                );
                ProcessingOutcome::completed(stats)
            }
            Err(e) => {
                tracing::error!(document_id, fund_id, "❌ Document processing failed: {}", e);
                ProcessingOutcome::failed(e.to_string(), stats)
            }
        }
    }

    async fn extract_and_commit(
        &self,
        file_name: &str,
        data: &[u8],
        document_id: u64,
        fund_id: u64,
        stats: &mut ProcessingStats,
    ) -> Result<()> {
        let sheets = self.tables.extract_sheets(file_name, data)?;
        stats.pages = sheets.len();

        let tables: Vec<Table> = sheets
            .into_iter()
            .flatten()
            .filter(|t| t.len() > 1)
            .collect();
        stats.tables = tables.len();
        tracing::debug!(document_id, "Found {} tables in {} pages", stats.tables, stats.pages);

        let mut entries = Vec::new();
        for table in &tables {
            let kind = self.parser.classify_table(table);
            tracing::debug!(document_id, ?kind, rows = table.len() - 1, "Classified table");

            for row in self.parser.parse_table(table, kind) {
                match route_row(&row, kind) {
                    Some(entry) => {
                        match entry {
                            LedgerEntry::CapitalCall { .. } => stats.capital_calls += 1,
                            LedgerEntry::Distribution { .. } => stats.distributions += 1,
                            LedgerEntry::Adjustment { .. } => stats.adjustments += 1,
                        }
                        entries.push(entry);
                    }
                    None => stats.skipped_rows += 1,
                }
            }
        }

        self.ledger
            .commit(TransactionBatch {
                fund_id,
                document_id,
                entries,
            })
            .await
    }
}

fn field<'a>(row: &'a ParsedRow, name: &str) -> Option<&'a str> {
    row.get(name).map(String::as_str).filter(|v| !v.is_empty())
}

fn owned(row: &ParsedRow, name: &str) -> Option<String> {
    field(row, name).map(str::to_string)
}

/// Decides which ledger table a parsed row belongs to, if any.
pub fn route_row(row: &ParsedRow, kind: TableKind) -> Option<LedgerEntry> {
    let call_type = field(row, "call_type");
    let type_col = field(row, "distribution_type")
        .or_else(|| field(row, "type"))
        .or_else(|| field(row, "adjustment_type"));
    let type_lower = type_col.map(str::to_lowercase);
    let type_has = |needle: &str| type_lower.as_deref().is_some_and(|t| t.contains(needle));

    let date = parse_date(field(row, "date"));
    let amount = parse_amount(field(row, "amount"));
    let description = owned(row, "description");

    if kind == TableKind::CapitalCalls {
        if let Some(call_type) = call_type {
            return Some(LedgerEntry::CapitalCall {
                date,
                call_type: call_type.to_string(),
                amount,
                description,
            });
        }
    }

    let type_col = type_col?;
    let plain_distribution = kind == TableKind::Distributions
        && call_type.is_none()
        && !type_has("adjust")
        && !type_has("recallable");

    if plain_distribution || type_has("return") || type_has("income") {
        Some(LedgerEntry::Distribution {
            date,
            distribution_type: type_col.to_string(),
            is_recallable: parse_bool(field(row, "recallable")),
            amount: amount.abs(),
            description,
        })
    } else if type_has("adjust") || type_has("recallable") {
        Some(LedgerEntry::Adjustment {
            date,
            adjustment_type: type_col.to_string(),
            category: owned(row, "category"),
            amount,
            is_contribution_adjustment: parse_bool(field(row, "is_contribution_adjustment")),
            description,
        })
    } else {
        None
    }
}
