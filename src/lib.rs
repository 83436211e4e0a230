//! Bank statement ingestion and a per-user ledger whose account balances
//! always equal the opening balance plus every stored transaction.

pub mod account_catalog;
pub mod amount_parser;
pub mod category_catalog;
pub mod category_classifier;
pub mod csv_column_mapper;
pub mod date_normalizer;
pub mod error;
pub mod ledger_balance;
pub mod ledger_db;
pub mod models;
pub mod pdf_table_extractor;
pub mod reports;
pub mod settings;
pub mod statement_import;
pub mod transaction_mutations;
pub mod transaction_normalizer;

pub use account_catalog::{
    create_account_at_db_path, delete_account_at_db_path, list_accounts_at_db_path,
};
pub use category_catalog::{
    create_category_at_db_path, delete_category_at_db_path, list_categories_at_db_path,
    seed_default_categories_at_db_path,
};
pub use error::{LedgerError, LedgerResult};
pub use ledger_db::{migrate_at_db_path, migration_status};
pub use models::{
    AccountCreateRequest, CategoryCreateRequest, TransactionCreateRequest,
    TransactionUpdateRequest, TransactionsQueryRequest,
};
pub use reports::{
    category_breakdown_at_db_path, monthly_trend_at_db_path, summary_report_at_db_path,
};
pub use settings::Settings;
pub use statement_import::{
    import_statement, import_statement_file_at_db_path, preview_statement,
    preview_statement_file, ImportSummary, StatementFormat,
};
pub use transaction_mutations::{
    create_transaction_at_db_path, delete_transaction_at_db_path, list_transactions_at_db_path,
    update_transaction_at_db_path,
};
