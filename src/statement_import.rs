//! Statement import pipeline.
//!
//! `detect format -> extract rows -> normalize -> classify -> persist`.
//! File-level problems (unknown extension, unreadable PDF, missing CSV
//! columns) fail the whole import before anything is written. Everything
//! after that is per row: a bad row is logged, counted as skipped, and the
//! batch continues.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::account_catalog::get_account;
use crate::category_catalog::list_categories;
use crate::category_classifier::classify;
use crate::csv_column_mapper::read_csv_statement;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger_db::open_migrated_at_db_path;
use crate::models::{cents_to_text, new_record_id, now_rfc3339, Transaction, TransactionKind};
use crate::pdf_table_extractor::extract_pdf_rows;
use crate::transaction_normalizer::{normalize_rows, RawStatementRow};
use crate::transaction_mutations::persist_transaction;

const PREVIEW_ROW_LIMIT: usize = 20;
const ERROR_SAMPLE_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementFormat {
    Csv,
    Pdf,
}

impl StatementFormat {
    /// Picks the parser from the file extension alone (case-insensitive).
    pub fn detect(filename: &str) -> LedgerResult<Self> {
        let ext = Path::new(filename.trim())
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("pdf") => Ok(Self::Pdf),
            _ => Err(LedgerError::UnsupportedFileType(filename.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Pdf => "pdf",
        }
    }
}

/// Rows extracted from one file, before normalization.
#[derive(Debug)]
struct ExtractedStatement {
    format: StatementFormat,
    rows: Vec<RawStatementRow>,
    column_mapping: Option<BTreeMap<String, String>>,
    /// CSV records the reader could not decode; they count as seen and skipped.
    unreadable_rows: usize,
}

impl ExtractedStatement {
    fn total_rows(&self) -> usize {
        self.rows.len() + self.unreadable_rows
    }
}

fn extract_statement(bytes: &[u8], format: StatementFormat) -> LedgerResult<ExtractedStatement> {
    match format {
        StatementFormat::Csv => {
            let statement = read_csv_statement(bytes)?;
            Ok(ExtractedStatement {
                format,
                column_mapping: Some(statement.mapping.describe()),
                rows: statement.rows,
                unreadable_rows: statement.unreadable_rows,
            })
        }
        StatementFormat::Pdf => Ok(ExtractedStatement {
            format,
            rows: extract_pdf_rows(bytes)?,
            column_mapping: None,
            unreadable_rows: 0,
        }),
    }
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub format: StatementFormat,
    pub imported_count: usize,
    pub total_rows: usize,
    pub skipped_count: usize,
    pub error_samples: Vec<String>,
}

/// Imports a statement into `account_id`.
///
/// The category list is read once up front and used for every row.
pub fn import_statement(
    conn: &Connection,
    bytes: &[u8],
    filename: &str,
    account_id: &str,
    user_id: &str,
) -> LedgerResult<ImportSummary> {
    let format = StatementFormat::detect(filename)?;
    get_account(conn, user_id, account_id)?;
    tracing::info!(filename, format = format.as_str(), "importing statement");

    let extracted = extract_statement(bytes, format)?;
    persist_extracted(conn, extracted, account_id, user_id)
}

/// Normalizes, classifies and stores already-extracted rows one by one.
fn persist_extracted(
    conn: &Connection,
    extracted: ExtractedStatement,
    account_id: &str,
    user_id: &str,
) -> LedgerResult<ImportSummary> {
    let format = extracted.format;
    let total_rows = extracted.total_rows();
    let categories = list_categories(conn, user_id)?;
    let batch = normalize_rows(extracted.rows);

    let mut imported_count = 0_usize;
    let mut error_samples = Vec::<String>::new();
    for (raw, normalized) in batch.rows {
        let tx = Transaction {
            id: new_record_id(),
            user_id: user_id.to_string(),
            account_id: account_id.to_string(),
            date: normalized.date.display.clone(),
            category_id: classify(&normalized.description, &categories).map(|c| c.id.clone()),
            description: normalized.description,
            amount_cents: normalized.amount_cents,
            kind: normalized.kind,
            created_at: now_rfc3339(),
        };
        match persist_transaction(conn, &tx) {
            Ok(()) => imported_count += 1,
            Err(err) => {
                tracing::warn!(line = raw.line_no, "failed to import row: {err}");
                if error_samples.len() < ERROR_SAMPLE_LIMIT {
                    error_samples.push(format!("line {}: {err}", raw.line_no));
                }
            }
        }
    }

    let skipped_count = total_rows - imported_count;
    tracing::info!(imported_count, total_rows, skipped_count, "statement import finished");
    Ok(ImportSummary {
        format,
        imported_count,
        total_rows,
        skipped_count,
        error_samples,
    })
}

#[derive(Debug, Serialize)]
pub struct PreviewRow {
    pub line_no: usize,
    pub date: String,
    pub description: String,
    pub amount_cents: i64,
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

#[derive(Debug, Serialize)]
pub struct StatementPreview {
    pub format: StatementFormat,
    pub column_mapping: Option<BTreeMap<String, String>>,
    pub total_rows: usize,
    pub parsed_count: usize,
    pub skipped_count: usize,
    pub rows: Vec<PreviewRow>,
}

/// Parses and normalizes a statement without writing anything.
pub fn preview_statement(bytes: &[u8], filename: &str) -> LedgerResult<StatementPreview> {
    let format = StatementFormat::detect(filename)?;
    let extracted = extract_statement(bytes, format)?;
    let total_rows = extracted.total_rows();
    let column_mapping = extracted.column_mapping.clone();
    let batch = normalize_rows(extracted.rows);
    let parsed_count = batch.rows.len();

    let rows = batch
        .rows
        .into_iter()
        .take(PREVIEW_ROW_LIMIT)
        .map(|(raw, tx)| PreviewRow {
            line_no: raw.line_no,
            date: tx.date.display,
            description: tx.description,
            amount: cents_to_text(tx.amount_cents),
            amount_cents: tx.amount_cents,
            kind: tx.kind,
        })
        .collect();

    Ok(StatementPreview {
        format: extracted.format,
        column_mapping,
        total_rows,
        parsed_count,
        skipped_count: total_rows - parsed_count,
        rows,
    })
}

fn file_name_text(file_path: &Path) -> String {
    file_path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn import_statement_file_at_db_path(
    db_path: &Path,
    file_path: &Path,
    account_id: &str,
    user_id: &str,
) -> LedgerResult<ImportSummary> {
    let filename = file_name_text(file_path);
    StatementFormat::detect(&filename)?;
    let bytes = std::fs::read(file_path)?;
    let conn = open_migrated_at_db_path(db_path)?;
    import_statement(&conn, &bytes, &filename, account_id.trim(), user_id)
}

pub fn preview_statement_file(file_path: &Path) -> LedgerResult<StatementPreview> {
    let filename = file_name_text(file_path);
    StatementFormat::detect(&filename)?;
    let bytes = std::fs::read(file_path)?;
    preview_statement(&bytes, &filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_catalog::create_account;
    use crate::category_catalog::seed_default_categories;
    use crate::ledger_db::test_support::{create_temp_path, TempLedger};
    use crate::models::{AccountCreateRequest, TransactionsQueryRequest};
    use crate::transaction_mutations::list_transactions;

    const SAMPLE_CSV: &str = "Date,Description,Debit,Credit\n\
                              01-01-2024,Salary,,50000\n\
                              02-01-2024,Office Rent,5000,\n";

    fn open_account(ledger: &TempLedger, user_id: &str) -> String {
        create_account(
            &ledger.conn,
            user_id,
            &AccountCreateRequest {
                account_name: "Current".to_string(),
                bank_name: "ICICI".to_string(),
                opening_balance_cents: 0,
            },
        )
        .unwrap()
        .id
    }

    fn balance(ledger: &TempLedger, account_id: &str) -> i64 {
        get_account(&ledger.conn, "u1", account_id).unwrap().balance_cents
    }

    #[test]
    fn detects_format_by_extension_only() {
        assert_eq!(StatementFormat::detect("jan.csv").unwrap(), StatementFormat::Csv);
        assert_eq!(StatementFormat::detect("Jan.PDF").unwrap(), StatementFormat::Pdf);
        for name in ["statement.xlsx", "statement", "csv", "notes.csv.txt"] {
            assert!(matches!(
                StatementFormat::detect(name),
                Err(LedgerError::UnsupportedFileType(_))
            ));
        }
    }

    #[test]
    fn csv_import_updates_balance_and_classifies() {
        let ledger = TempLedger::new("vitta_import_csv");
        let account_id = open_account(&ledger, "u1");
        let categories = seed_default_categories(&ledger.conn, "u1").unwrap().categories;

        let summary =
            import_statement(&ledger.conn, SAMPLE_CSV.as_bytes(), "jan.csv", &account_id, "u1").unwrap();
        assert_eq!(summary.imported_count, 2);
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.skipped_count, 0);
        assert_eq!(balance(&ledger, &account_id), 4_500_000);

        let stored = list_transactions(&ledger.conn, "u1", &TransactionsQueryRequest::default()).unwrap();
        let salary = stored.iter().find(|t| t.description == "Salary").unwrap();
        let rent = stored.iter().find(|t| t.description == "Office Rent").unwrap();
        assert_eq!(salary.kind, TransactionKind::Credit);
        assert_eq!(salary.date, "01-01-2024");
        assert_eq!(salary.category_id.as_deref(), Some(categories[0].id.as_str()));
        assert_eq!(rent.kind, TransactionKind::Debit);
        assert_eq!(rent.category_id.as_deref(), Some(categories[2].id.as_str()));
    }

    #[test]
    fn bad_rows_are_skipped_without_aborting_the_batch() {
        let ledger = TempLedger::new("vitta_import_partial");
        let account_id = open_account(&ledger, "u1");
        let csv = "Txn Date,Narration,Withdrawal,Deposit\n\
                   01-01-2024,Opening credit,,1000\n\
                   someday,Broken date,50,\n\
                   03-01-2024,Nothing here,0,0\n\
                   04-01-2024,Coffee,4.50,\n";

        let summary = import_statement(&ledger.conn, csv.as_bytes(), "feb.CSV", &account_id, "u1").unwrap();
        assert_eq!(summary.total_rows, 4);
        assert_eq!(summary.imported_count, 2);
        assert_eq!(summary.skipped_count, 2);
        assert_eq!(balance(&ledger, &account_id), 100_000 - 450);
    }

    #[test]
    fn pdf_rows_are_persisted_like_csv_rows() {
        use crate::pdf_table_extractor::parse_statement_text;

        let ledger = TempLedger::new("vitta_import_pdf_rows");
        let account_id = open_account(&ledger, "u1");
        let categories = seed_default_categories(&ledger.conn, "u1").unwrap().categories;
        let text = "Date Narration Withdrawal Deposit Balance\n\
                    01-01-2024 Salary Jan 0.00 50,000.00 50,000.00\n\
                    \u{000C}Page 2\n\
                    15-01-2024 ATM WDL 2,000.00 0.00 48,000.00\n";
        let extracted = ExtractedStatement {
            format: StatementFormat::Pdf,
            rows: parse_statement_text(text).unwrap(),
            column_mapping: None,
            unreadable_rows: 0,
        };

        let summary = persist_extracted(&ledger.conn, extracted, &account_id, "u1").unwrap();
        assert_eq!(summary.format, StatementFormat::Pdf);
        assert_eq!((summary.imported_count, summary.total_rows, summary.skipped_count), (2, 2, 0));
        assert_eq!(balance(&ledger, &account_id), 5_000_000 - 200_000);

        let stored = list_transactions(&ledger.conn, "u1", &TransactionsQueryRequest::default()).unwrap();
        let salary = stored.iter().find(|t| t.description == "Salary Jan").unwrap();
        let atm = stored.iter().find(|t| t.description == "ATM WDL").unwrap();
        assert_eq!((salary.kind, salary.amount_cents), (TransactionKind::Credit, 5_000_000));
        assert_eq!(salary.category_id.as_deref(), Some(categories[0].id.as_str()));
        assert_eq!((atm.kind, atm.amount_cents), (TransactionKind::Debit, 200_000));
        assert_eq!(atm.date, "15-01-2024");
    }

    #[test]
    fn oversized_amounts_are_skipped_and_leave_the_account_readable() {
        let ledger = TempLedger::new("vitta_import_oversized");
        let account_id = open_account(&ledger, "u1");
        let csv = "Date,Description,Debit,Credit\n\
                   01-01-2024,Huge one,90000000000000000,\n\
                   02-01-2024,Huge two,90000000000000000,\n\
                   03-01-2024,Coffee,4.50,\n";

        let summary = import_statement(&ledger.conn, csv.as_bytes(), "big.csv", &account_id, "u1").unwrap();
        assert_eq!((summary.imported_count, summary.total_rows, summary.skipped_count), (1, 3, 2));
        assert_eq!(balance(&ledger, &account_id), -450);
        assert_eq!(
            crate::reports::summary_report(&ledger.conn, "u1").unwrap().total_expense_cents,
            450
        );
    }

    #[test]
    fn rows_that_would_push_the_balance_out_of_range_are_skipped() {
        use crate::amount_parser::MAX_AMOUNT_CENTS;
        use crate::ledger_balance::MAX_BALANCE_CENTS;

        let ledger = TempLedger::new("vitta_import_balance_range");
        let account_id = create_account(
            &ledger.conn,
            "u1",
            &AccountCreateRequest {
                account_name: "Vault".to_string(),
                bank_name: "ICICI".to_string(),
                opening_balance_cents: MAX_BALANCE_CENTS - MAX_AMOUNT_CENTS / 2,
            },
        )
        .unwrap()
        .id;
        let csv = "Date,Description,Debit,Credit\n\
                   01-01-2024,Big deposit,,10000000000000\n\
                   02-01-2024,Small deposit,,100\n";

        let summary = import_statement(&ledger.conn, csv.as_bytes(), "vault.csv", &account_id, "u1").unwrap();
        assert_eq!((summary.imported_count, summary.skipped_count), (1, 1));
        assert!(summary.error_samples[0].starts_with("line 2: Invalid amount"));
        assert_eq!(balance(&ledger, &account_id), MAX_BALANCE_CENTS - MAX_AMOUNT_CENTS / 2 + 10_000);
        let stored = list_transactions(&ledger.conn, "u1", &TransactionsQueryRequest::default()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].description, "Small deposit");
    }

    #[test]
    fn batch_fatal_errors_write_nothing() {
        let ledger = TempLedger::new("vitta_import_fatal");
        let account_id = open_account(&ledger, "u1");

        assert!(matches!(
            import_statement(&ledger.conn, SAMPLE_CSV.as_bytes(), "jan.xlsx", &account_id, "u1"),
            Err(LedgerError::UnsupportedFileType(_))
        ));
        let err = import_statement(
            &ledger.conn,
            b"Date,Notes,Amount\n01-01-2024,x,1\n",
            "jan.csv",
            &account_id,
            "u1",
        )
        .unwrap_err();
        assert!(err.is_batch_fatal());
        assert!(err.to_string().contains("Notes"));
        assert!(matches!(
            import_statement(&ledger.conn, b"not a pdf", "jan.pdf", &account_id, "u1"),
            Err(LedgerError::UnreadablePdf(_))
        ));

        assert_eq!(balance(&ledger, &account_id), 0);
        assert!(list_transactions(&ledger.conn, "u1", &TransactionsQueryRequest::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn account_must_belong_to_importing_user() {
        let ledger = TempLedger::new("vitta_import_owner");
        let someone_else = open_account(&ledger, "u2");
        // checked before the (invalid) file body is looked at
        assert!(matches!(
            import_statement(&ledger.conn, b"", "jan.csv", &someone_else, "u1"),
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[test]
    fn preview_reports_mapping_and_rows_without_persisting() {
        let preview = preview_statement(SAMPLE_CSV.as_bytes(), "jan.csv").unwrap();
        assert_eq!(preview.format, StatementFormat::Csv);
        assert_eq!(preview.parsed_count, 2);
        assert_eq!(preview.skipped_count, 0);
        let mapping = preview.column_mapping.unwrap();
        assert_eq!(mapping.get("credit").map(String::as_str), Some("Credit"));
        assert_eq!(preview.rows[0].amount, "50000.00");
        assert_eq!(preview.rows[1].kind, TransactionKind::Debit);
        assert_eq!(preview.rows[1].line_no, 3);
    }

    #[test]
    fn file_entry_point_reads_from_disk() {
        let ledger = TempLedger::new("vitta_import_file");
        let account_id = open_account(&ledger, "u1");
        let csv_path = create_temp_path("vitta_import_fixture", "csv");
        std::fs::write(&csv_path, SAMPLE_CSV).unwrap();

        let summary =
            import_statement_file_at_db_path(ledger.path(), &csv_path, &account_id, "u1").unwrap();
        assert_eq!(summary.imported_count, 2);
        assert_eq!(balance(&ledger, &account_id), 4_500_000);

        let preview = preview_statement_file(&csv_path).unwrap();
        assert_eq!(preview.total_rows, 2);
        let _ = std::fs::remove_file(&csv_path);
    }
}
