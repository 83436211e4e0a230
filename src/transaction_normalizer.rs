use serde::Serialize;

use crate::amount_parser::parse_optional_amount;
use crate::date_normalizer::{normalize_date, StatementDate};
use crate::error::LedgerError;
use crate::models::TransactionKind;

/// One statement row as read from a CSV record or a PDF text line, before
/// any value is interpreted. Blank `debit`/`credit` mean "no value".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawStatementRow {
    pub line_no: usize,
    pub date: String,
    pub description: String,
    pub debit: String,
    pub credit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedTransaction {
    pub date: StatementDate,
    pub description: String,
    pub amount_cents: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

impl NormalizedTransaction {
    pub fn signed_delta(&self) -> i64 {
        self.kind.signed_delta(self.amount_cents)
    }
}

/// Why a row produced no transaction.
#[derive(Debug)]
pub enum RowSkip {
    /// Neither debit nor credit carried a non-zero value.
    NoAmount,
    Invalid(LedgerError),
}

fn resolve_amount(row: &RawStatementRow, column: &str, raw: &str) -> i64 {
    match parse_optional_amount(raw) {
        Ok(v) => v.map(i64::abs).unwrap_or(0),
        Err(err) => {
            tracing::warn!(line = row.line_no, "could not parse {column} value: {err}");
            0
        }
    }
}

/// Turns a raw row into a canonical transaction.
///
/// An unparseable amount cell counts as empty. A positive credit wins over
/// the debit; otherwise the row is a debit. Amounts are stored unsigned.
pub fn normalize_row(row: &RawStatementRow) -> Result<NormalizedTransaction, RowSkip> {
    let debit = resolve_amount(row, "debit", &row.debit);
    let credit = resolve_amount(row, "credit", &row.credit);
    if debit == 0 && credit == 0 {
        return Err(RowSkip::NoAmount);
    }

    let date = normalize_date(&row.date).map_err(RowSkip::Invalid)?;
    let (kind, amount_cents) = if credit > 0 {
        (TransactionKind::Credit, credit)
    } else {
        (TransactionKind::Debit, debit)
    };

    Ok(NormalizedTransaction {
        date,
        description: row.description.trim().to_string(),
        amount_cents,
        kind,
    })
}

/// Normalized rows of one file plus the number of rows that were dropped.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub rows: Vec<(RawStatementRow, NormalizedTransaction)>,
    pub skipped: usize,
}

pub fn normalize_rows(raw_rows: Vec<RawStatementRow>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for raw in raw_rows {
        match normalize_row(&raw) {
            Ok(tx) => batch.rows.push((raw, tx)),
            Err(RowSkip::NoAmount) => {
                tracing::debug!(line = raw.line_no, "skipping row without amount: {}", raw.description);
                batch.skipped += 1;
            }
            Err(RowSkip::Invalid(err)) => {
                tracing::warn!(line = raw.line_no, "skipping row: {err}");
                batch.skipped += 1;
            }
        }
    }
    batch
}
