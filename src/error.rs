//! Errors raised by the ledger library.
//!
//! The variants fall into three groups:
//!
//! - batch-fatal import errors ([`UnsupportedFileType`], [`NoExtractableText`],
//!   [`UnreadablePdf`], [`MissingRequiredColumns`], [`MalformedCsv`]) abort an
//!   import before any row is persisted;
//! - row-local errors ([`UnparseableAmount`], [`UnrecognizedDateFormat`]) are
//!   only ever counted as skipped rows by the importer;
//! - request and store errors returned by the mutation and query entry points.
//!
//!  [`UnsupportedFileType`]: LedgerError::UnsupportedFileType
//!  [`NoExtractableText`]: LedgerError::NoExtractableText
//!  [`UnreadablePdf`]: LedgerError::UnreadablePdf
//!  [`MissingRequiredColumns`]: LedgerError::MissingRequiredColumns
//!  [`MalformedCsv`]: LedgerError::MalformedCsv
//!  [`UnparseableAmount`]: LedgerError::UnparseableAmount
//!  [`UnrecognizedDateFormat`]: LedgerError::UnrecognizedDateFormat
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Unsupported file type: {0} (only .csv and .pdf statements are supported)")]
    UnsupportedFileType(String),
    #[error(
        "No extractable text found in PDF. Please ensure it's a text-based PDF with a transaction table, or upload a CSV file instead."
    )]
    NoExtractableText,
    #[error("Error reading PDF: {0}")]
    UnreadablePdf(String),
    #[error("CSV must have {} columns. Found columns: {found:?}", .missing.join(" and "))]
    MissingRequiredColumns {
        missing: Vec<&'static str>,
        found: Vec<String>,
    },
    #[error("Error reading CSV: {0}")]
    MalformedCsv(String),
    #[error("Unparseable amount: {0:?}")]
    UnparseableAmount(String),
    #[error("Unrecognized date format: {0:?}")]
    UnrecognizedDateFormat(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Category not found: {0}")]
    CategoryNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Category type must be income or expense, got {0:?}")]
    InvalidCategoryKind(String),
    #[error("Transaction type must be debit or credit, got {0:?}")]
    InvalidTransactionKind(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Report total out of range: {0}")]
    ReportOverflow(String),
    #[error("No update data provided")]
    EmptyUpdate,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Whether the error aborts a whole statement import.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFileType(_)
                | Self::NoExtractableText
                | Self::UnreadablePdf(_)
                | Self::MissingRequiredColumns { .. }
                | Self::MalformedCsv(_)
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
