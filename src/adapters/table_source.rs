use crate::domain::model::Table;
use crate::domain::ports::TableSource;
use crate::utils::error::{IngestError, Result};
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

/// Reads CSV/TSV exports and ZIP bundles of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedTableSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetFormat {
    Csv,
    Tsv,
}

impl SheetFormat {
    fn from_name(file_name: &str) -> Option<Self> {
        match extension(file_name).as_deref() {
            Some("csv") => Some(SheetFormat::Csv),
            Some("tsv") => Some(SheetFormat::Tsv),
            _ => None,
        }
    }

    fn delimiter(self) -> u8 {
        match self {
            SheetFormat::Csv => b',',
            SheetFormat::Tsv => b'\t',
        }
    }
}

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

impl DelimitedTableSource {
    pub fn new() -> Self {
        Self
    }

    fn read_zip(&self, data: &[u8]) -> Result<Vec<Vec<Table>>> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut sheets = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let Some(format) = SheetFormat::from_name(&name) else {
                tracing::debug!("Skipping non-table entry in bundle: {}", name);
                continue;
            };

            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            sheets.push(read_sheet(&content, format)?);
        }

        Ok(sheets)
    }
}

impl TableSource for DelimitedTableSource {
    fn extract_sheets(&self, file_name: &str, data: &[u8]) -> Result<Vec<Vec<Table>>> {
        if let Some(format) = SheetFormat::from_name(file_name) {
            return Ok(vec![read_sheet(data, format)?]);
        }

        match extension(file_name).as_deref() {
            Some("zip") => self.read_zip(data),
            _ => Err(IngestError::UnsupportedFormat {
                file_name: file_name.to_string(),
            }),
        }
    }
}

/// 一個工作表可包含多個表格，以空白列分隔
fn read_sheet(data: &[u8], format: SheetFormat) -> Result<Vec<Table>> {
    let raw = String::from_utf8_lossy(data);
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw.as_ref());

    let mut tables = Vec::new();
    for block in blocks(text) {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(false)
            .flexible(true)
            .from_reader(block.as_bytes());

        let mut table: Table = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                if !table.is_empty() {
                    tables.push(std::mem::take(&mut table));
                }
                continue;
            }
            table.push(record.iter().map(str::to_string).collect());
        }
        if !table.is_empty() {
            tables.push(table);
        }
    }

    Ok(tables)
}

/// Splits a sheet on blank lines that fall outside quoted cells.
///
/// The csv reader skips blank lines on its own, so table boundaries have to be
/// found before parsing.
fn blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for line in text.lines() {
        if !in_quotes && line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        // `""` 跳脫不改變狀態，奇數個引號才會進出引號欄位
        if line.matches('"').count() % 2 == 1 {
            in_quotes = !in_quotes;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}
