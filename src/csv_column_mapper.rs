use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{LedgerError, LedgerResult};
use crate::transaction_normalizer::RawStatementRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Date,
    Description,
    Debit,
    Credit,
}

impl ColumnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Description => "description",
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

#[derive(Debug)]
struct RoleSpec {
    role: ColumnRole,
    keywords: &'static [&'static str],
}

/// Checked in this order for every header cell; the first role with a
/// keyword contained in the header claims the column.
const ROLE_SPECS: &[RoleSpec] = &[
    RoleSpec {
        role: ColumnRole::Date,
        keywords: &["date", "txn date", "transaction date"],
    },
    RoleSpec {
        role: ColumnRole::Description,
        keywords: &["description", "narration", "particulars"],
    },
    RoleSpec {
        role: ColumnRole::Debit,
        keywords: &["dr", "debit", "withdrawal"],
    },
    RoleSpec {
        role: ColumnRole::Credit,
        keywords: &["cr", "credit", "deposit"],
    },
];

/// Column indexes resolved from a CSV header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub date: usize,
    pub description: usize,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    pub headers: Vec<String>,
}

impl ColumnMapping {
    /// Role name to header text, for logs and previews.
    pub fn describe(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let mut put = |role: ColumnRole, idx: Option<usize>| {
            if let Some(header) = idx.and_then(|i| self.headers.get(i)) {
                out.insert(role.as_str().to_string(), header.clone());
            }
        };
        put(ColumnRole::Date, Some(self.date));
        put(ColumnRole::Description, Some(self.description));
        put(ColumnRole::Debit, self.debit);
        put(ColumnRole::Credit, self.credit);
        out
    }
}

fn trim_cell(text: &str) -> String {
    text.trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}

/// Role of a single header cell, if any.
pub fn resolve_header_role(header: &str) -> Option<ColumnRole> {
    let key = trim_cell(header).to_lowercase();
    ROLE_SPECS
        .iter()
        .find(|spec| spec.keywords.iter().any(|k| key.contains(k)))
        .map(|spec| spec.role)
}

/// Resolves header cells to column roles.
///
/// Columns are scanned left to right; when several columns resolve to the
/// same role the rightmost one is kept. Date and description are required.
pub fn map_columns(headers: &[String]) -> LedgerResult<ColumnMapping> {
    let mut resolved: BTreeMap<ColumnRole, usize> = BTreeMap::new();
    for (idx, header) in headers.iter().enumerate() {
        if let Some(role) = resolve_header_role(header) {
            resolved.insert(role, idx);
        }
    }

    let date = resolved.get(&ColumnRole::Date).copied();
    let description = resolved.get(&ColumnRole::Description).copied();
    match (date, description) {
        (Some(date), Some(description)) => Ok(ColumnMapping {
            date,
            description,
            debit: resolved.get(&ColumnRole::Debit).copied(),
            credit: resolved.get(&ColumnRole::Credit).copied(),
            headers: headers.to_vec(),
        }),
        _ => {
            let mut missing = Vec::new();
            if date.is_none() {
                missing.push("Date");
            }
            if description.is_none() {
                missing.push("Description");
            }
            Err(LedgerError::MissingRequiredColumns {
                missing,
                found: headers.to_vec(),
            })
        }
    }
}

/// A CSV statement split into its header mapping and data rows.
#[derive(Debug)]
pub struct CsvStatement {
    pub mapping: ColumnMapping,
    pub rows: Vec<RawStatementRow>,
    /// Records the CSV reader could not decode.
    pub unreadable_rows: usize,
}

fn row_get(record: &csv::StringRecord, idx: Option<usize>) -> String {
    idx.and_then(|i| record.get(i))
        .map(trim_cell)
        .unwrap_or_default()
}

/// Reads CSV bytes whose first record is the header row.
pub fn read_csv_statement(bytes: &[u8]) -> LedgerResult<CsvStatement> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut records = reader.records();

    let headers = match records.next() {
        Some(rec) => rec
            .map_err(|e| LedgerError::MalformedCsv(e.to_string()))?
            .iter()
            .map(trim_cell)
            .collect::<Vec<_>>(),
        None => Vec::new(),
    };
    let mapping = map_columns(&headers)?;
    tracing::info!(mapping = ?mapping.describe(), "detected CSV columns");

    let mut rows = Vec::new();
    let mut unreadable_rows = 0_usize;
    for rec in records {
        let rec = match rec {
            Ok(rec) => rec,
            Err(err) => {
                tracing::warn!("skipping unreadable CSV record: {err}");
                unreadable_rows += 1;
                continue;
            }
        };
        let line_no = rec.position().map(|p| p.line() as usize).unwrap_or_default();
        rows.push(RawStatementRow {
            line_no,
            date: row_get(&rec, Some(mapping.date)),
            description: row_get(&rec, Some(mapping.description)),
            debit: row_get(&rec, mapping.debit),
            credit: row_get(&rec, mapping.credit),
        });
    }

    Ok(CsvStatement {
        mapping,
        rows,
        unreadable_rows,
    })
}
