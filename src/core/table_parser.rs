use crate::domain::model::{ParsedRow, Table, TableKind};

/// 依表頭判斷表格類型，並將資料列轉成欄位對應
#[derive(Debug, Clone, Copy, Default)]
pub struct TableParser;

impl TableParser {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_table(&self, table: &Table) -> TableKind {
        let Some(header) = table.first().filter(|h| !h.is_empty()) else {
            return TableKind::Unknown;
        };

        let header: Vec<String> = header
            .iter()
            .map(|h| h.to_lowercase().replace([' ', '-', '_'], ""))
            .collect();
        let any = |needle: &str| header.iter().any(|h| h.contains(needle));

        if any("call") && any("amount") {
            TableKind::CapitalCalls
        } else if any("distribution") || any("recallable") || any("type") {
            TableKind::Distributions
        } else if any("adjustment") || any("contribution") || any("category") {
            TableKind::Adjustments
        } else {
            TableKind::Unknown
        }
    }

    pub fn parse_table(&self, table: &Table, kind: TableKind) -> Vec<ParsedRow> {
        if table.len() < 2 {
            return Vec::new();
        }

        let fields: Vec<String> = table[0]
            .iter()
            .map(|h| canonical_field(&normalize_header(h), kind))
            .collect();

        // 表頭重複時以後面的欄位為準；缺少的儲存格會清除先前的值
        table[1..]
            .iter()
            .map(|row| {
                let mut parsed = ParsedRow::new();
                for (i, field) in fields.iter().enumerate() {
                    match row.get(i) {
                        Some(cell) => {
                            parsed.insert(field.clone(), cell.trim().to_string());
                        }
                        None => {
                            parsed.remove(field);
                        }
                    }
                }
                parsed
            })
            .collect()
    }
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace([' ', '-'], "_")
}

fn canonical_field(header: &str, kind: TableKind) -> String {
    match header {
        "call_number" | "call" => "call_type".to_string(),
        "type" => match kind {
            TableKind::Distributions => "distribution_type".to_string(),
            TableKind::Adjustments => "adjustment_type".to_string(),
            _ => "type".to_string(),
        },
        "contribution_adjustment" => "is_contribution_adjustment".to_string(),
        other => other.to_string(),
    }
}
