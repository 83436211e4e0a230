use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

use crate::account_catalog::get_account;
use crate::amount_parser::MAX_AMOUNT_CENTS;
use crate::category_catalog::find_category;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger_balance::{apply_balance_delta, reverse_transaction};
use crate::ledger_db::open_migrated_at_db_path;
use crate::models::{
    cents_to_text, new_record_id, now_rfc3339, Transaction, TransactionCreateRequest,
    TransactionKind, TransactionUpdateRequest, TransactionsQueryRequest,
};

const DEFAULT_LIST_LIMIT: u32 = 1000;
const MAX_LIST_LIMIT: u32 = 1000;

const TRANSACTION_COLUMNS: &str =
    "id, user_id, account_id, date, description, amount_cents, type, category_id, created_at";

#[derive(Debug, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub amount: String,
}

impl From<Transaction> for TransactionView {
    fn from(transaction: Transaction) -> Self {
        let amount = cents_to_text(transaction.amount_cents);
        Self { transaction, amount }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionDeleteResult {
    pub deleted_id: String,
    pub balance_reversed: bool,
}

fn parse_limit(raw: Option<u32>) -> u32 {
    raw.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

fn parse_optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let kind_text: String = row.get(6)?;
    let kind = kind_text.parse::<TransactionKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_id: row.get(2)?,
        date: row.get(3)?,
        description: row.get(4)?,
        amount_cents: row.get(5)?,
        kind,
        category_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn ensure_category_owned(conn: &Connection, user_id: &str, category_id: &str) -> LedgerResult<()> {
    match find_category(conn, user_id, category_id)? {
        Some(_) => Ok(()),
        None => Err(LedgerError::CategoryNotFound(category_id.to_string())),
    }
}

/// Inserts `tx` and applies its balance delta as one SQLite transaction.
///
/// Fails with `AccountNotFound` (and persists nothing) when the account is
/// not the user's.
pub(crate) fn persist_transaction(conn: &Connection, tx: &Transaction) -> LedgerResult<()> {
    let db_tx = conn.unchecked_transaction()?;
    db_tx.execute(
        &format!(
            "INSERT INTO transactions({TRANSACTION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            tx.id,
            tx.user_id,
            tx.account_id,
            tx.date,
            tx.description,
            tx.amount_cents,
            tx.kind.as_str(),
            tx.category_id,
            tx.created_at
        ],
    )?;
    if !apply_balance_delta(&db_tx, &tx.user_id, &tx.account_id, tx.signed_delta())? {
        return Err(LedgerError::AccountNotFound(tx.account_id.clone()));
    }
    db_tx.commit()?;
    Ok(())
}

pub fn create_transaction(
    conn: &Connection,
    user_id: &str,
    req: &TransactionCreateRequest,
) -> LedgerResult<Transaction> {
    let account_id = req.account_id.trim();
    get_account(conn, user_id, account_id)?;

    let kind = req.kind.parse::<TransactionKind>()?;
    if req.amount_cents <= 0 {
        return Err(LedgerError::InvalidAmount(format!(
            "amount must be positive, got {}",
            cents_to_text(req.amount_cents)
        )));
    }
    if req.amount_cents > MAX_AMOUNT_CENTS {
        return Err(LedgerError::InvalidAmount(format!(
            "amount must not exceed {}",
            cents_to_text(MAX_AMOUNT_CENTS)
        )));
    }
    let date = req.date.trim();
    if date.is_empty() {
        return Err(LedgerError::Validation("date is required".to_string()));
    }
    let category_id = parse_optional_text(req.category_id.as_deref());
    if let Some(category_id) = &category_id {
        ensure_category_owned(conn, user_id, category_id)?;
    }

    let tx = Transaction {
        id: new_record_id(),
        user_id: user_id.to_string(),
        account_id: account_id.to_string(),
        date: date.to_string(),
        description: req.description.trim().to_string(),
        amount_cents: req.amount_cents,
        kind,
        category_id,
        created_at: now_rfc3339(),
    };
    persist_transaction(conn, &tx)?;
    tracing::info!(transaction_id = %tx.id, account_id = %tx.account_id, "created transaction");
    Ok(tx)
}

pub fn find_transaction(
    conn: &Connection,
    user_id: &str,
    transaction_id: &str,
) -> LedgerResult<Option<Transaction>> {
    let tx = conn
        .query_row(
            &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1 AND user_id = ?2"),
            params![transaction_id, user_id],
            transaction_from_row,
        )
        .optional()?;
    Ok(tx)
}

/// Every transaction of the user, unpaged, in insertion order.
pub(crate) fn load_user_transactions(conn: &Connection, user_id: &str) -> LedgerResult<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = ?1 ORDER BY rowid ASC"
    ))?;
    let rows = stmt.query_map([user_id], transaction_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Lists transactions newest first by stored display date (string order).
pub fn list_transactions(
    conn: &Connection,
    user_id: &str,
    req: &TransactionsQueryRequest,
) -> LedgerResult<Vec<Transaction>> {
    let mut conditions: Vec<&str> = vec!["user_id = ?"];
    let mut sql_params: Vec<SqlValue> = vec![SqlValue::Text(user_id.to_string())];
    if let Some(account_id) = parse_optional_text(req.account_id.as_deref()) {
        conditions.push("account_id = ?");
        sql_params.push(SqlValue::Text(account_id));
    }
    if let Some(category_id) = parse_optional_text(req.category_id.as_deref()) {
        conditions.push("category_id = ?");
        sql_params.push(SqlValue::Text(category_id));
    }
    if let Some(kind) = parse_optional_text(req.kind.as_deref()) {
        let kind = kind.parse::<TransactionKind>()?;
        conditions.push("type = ?");
        sql_params.push(SqlValue::Text(kind.as_str().to_string()));
    }
    sql_params.push(SqlValue::Integer(i64::from(parse_limit(req.limit))));

    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE {} ORDER BY date DESC, created_at DESC, rowid DESC LIMIT ?",
        conditions.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(sql_params.iter()), transaction_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Changes description and/or category. Amount, kind and account are fixed
/// once created, so the balance is never touched here. An empty category id
/// clears the category.
pub fn update_transaction(
    conn: &Connection,
    user_id: &str,
    transaction_id: &str,
    req: &TransactionUpdateRequest,
) -> LedgerResult<Transaction> {
    if req.description.is_none() && req.category_id.is_none() {
        return Err(LedgerError::EmptyUpdate);
    }
    let mut tx = find_transaction(conn, user_id, transaction_id)?
        .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))?;

    if let Some(description) = &req.description {
        tx.description = description.trim().to_string();
    }
    if let Some(raw) = &req.category_id {
        let category_id = parse_optional_text(Some(raw));
        if let Some(category_id) = &category_id {
            ensure_category_owned(conn, user_id, category_id)?;
        }
        tx.category_id = category_id;
    }

    conn.execute(
        "UPDATE transactions SET description = ?1, category_id = ?2 WHERE id = ?3 AND user_id = ?4",
        params![tx.description, tx.category_id, tx.id, user_id],
    )?;
    Ok(tx)
}

/// Reverses the balance contribution, then removes the record, atomically.
pub fn delete_transaction(
    conn: &Connection,
    user_id: &str,
    transaction_id: &str,
) -> LedgerResult<TransactionDeleteResult> {
    let tx = find_transaction(conn, user_id, transaction_id)?
        .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))?;

    let db_tx = conn.unchecked_transaction()?;
    let balance_reversed = reverse_transaction(&db_tx, &tx)?;
    db_tx.execute(
        "DELETE FROM transactions WHERE id = ?1 AND user_id = ?2",
        params![tx.id, user_id],
    )?;
    db_tx.commit()?;

    Ok(TransactionDeleteResult {
        deleted_id: tx.id,
        balance_reversed,
    })
}

pub fn create_transaction_at_db_path(
    db_path: &Path,
    user_id: &str,
    req: TransactionCreateRequest,
) -> LedgerResult<TransactionView> {
    let conn = open_migrated_at_db_path(db_path)?;
    create_transaction(&conn, user_id, &req).map(TransactionView::from)
}

pub fn list_transactions_at_db_path(
    db_path: &Path,
    user_id: &str,
    req: TransactionsQueryRequest,
) -> LedgerResult<Vec<TransactionView>> {
    let conn = open_migrated_at_db_path(db_path)?;
    Ok(list_transactions(&conn, user_id, &req)?
        .into_iter()
        .map(TransactionView::from)
        .collect())
}

pub fn update_transaction_at_db_path(
    db_path: &Path,
    user_id: &str,
    transaction_id: &str,
    req: TransactionUpdateRequest,
) -> LedgerResult<TransactionView> {
    let conn = open_migrated_at_db_path(db_path)?;
    update_transaction(&conn, user_id, transaction_id.trim(), &req).map(TransactionView::from)
}

pub fn delete_transaction_at_db_path(
    db_path: &Path,
    user_id: &str,
    transaction_id: &str,
) -> LedgerResult<TransactionDeleteResult> {
    let conn = open_migrated_at_db_path(db_path)?;
    delete_transaction(&conn, user_id, transaction_id.trim())
}
