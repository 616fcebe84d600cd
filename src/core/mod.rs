pub mod processor;
pub mod table_parser;
pub mod values;

pub use crate::domain::model::{ProcessingOutcome, ProcessingStats, Table, TableKind};
pub use crate::domain::ports::{DocumentRepository, LedgerRepository, Storage, TableSource};
pub use crate::utils::error::Result;
pub use processor::DocumentProcessor;
pub use table_parser::TableParser;
