use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_balance::{balance_in_range, MAX_BALANCE_CENTS};
use crate::ledger_db::open_migrated_at_db_path;
use crate::models::{cents_to_text, new_record_id, now_rfc3339, Account, AccountCreateRequest};

const ACCOUNT_COLUMNS: &str = "id, user_id, account_name, bank_name, balance_cents, created_at";

#[derive(Debug, Serialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    pub balance: String,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        let balance = cents_to_text(account.balance_cents);
        Self { account, balance }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountDeleteResult {
    pub deleted_id: String,
    /// Transactions still pointing at the deleted account.
    pub orphaned_transactions: i64,
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_name: row.get(2)?,
        bank_name: row.get(3)?,
        balance_cents: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn required_text(field: &str, raw: &str) -> LedgerResult<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(LedgerError::Validation(format!("{field} is required")));
    }
    Ok(text.to_string())
}

pub fn create_account(
    conn: &Connection,
    user_id: &str,
    req: &AccountCreateRequest,
) -> LedgerResult<Account> {
    if !balance_in_range(req.opening_balance_cents) {
        return Err(LedgerError::InvalidAmount(format!(
            "opening balance must be within ±{}",
            cents_to_text(MAX_BALANCE_CENTS)
        )));
    }
    let account = Account {
        id: new_record_id(),
        user_id: user_id.to_string(),
        account_name: required_text("account_name", &req.account_name)?,
        bank_name: required_text("bank_name", &req.bank_name)?,
        balance_cents: req.opening_balance_cents,
        created_at: now_rfc3339(),
    };
    conn.execute(
        &format!("INSERT INTO accounts({ACCOUNT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            account.id,
            account.user_id,
            account.account_name,
            account.bank_name,
            account.balance_cents,
            account.created_at
        ],
    )?;
    tracing::info!(account_id = %account.id, "created account");
    Ok(account)
}

pub fn find_account(conn: &Connection, user_id: &str, account_id: &str) -> LedgerResult<Option<Account>> {
    let account = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1 AND user_id = ?2"),
            params![account_id, user_id],
            account_from_row,
        )
        .optional()?;
    Ok(account)
}

/// Like [`find_account`] but a missing account is an error.
pub fn get_account(conn: &Connection, user_id: &str, account_id: &str) -> LedgerResult<Account> {
    find_account(conn, user_id, account_id)?
        .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
}

pub fn list_accounts(conn: &Connection, user_id: &str) -> LedgerResult<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map([user_id], account_from_row)?;
    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(row?);
    }
    Ok(accounts)
}

/// Deletes the account only. Its transactions are left in place.
pub fn delete_account(
    conn: &Connection,
    user_id: &str,
    account_id: &str,
) -> LedgerResult<AccountDeleteResult> {
    let deleted = conn.execute(
        "DELETE FROM accounts WHERE id = ?1 AND user_id = ?2",
        params![account_id, user_id],
    )?;
    if deleted == 0 {
        return Err(LedgerError::AccountNotFound(account_id.to_string()));
    }
    let orphaned_transactions = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE account_id = ?1 AND user_id = ?2",
        params![account_id, user_id],
        |row| row.get::<_, i64>(0),
    )?;
    if orphaned_transactions > 0 {
        tracing::warn!(
            account_id,
            orphaned_transactions,
            "deleted account still referenced by transactions"
        );
    }
    Ok(AccountDeleteResult {
        deleted_id: account_id.to_string(),
        orphaned_transactions,
    })
}

pub fn create_account_at_db_path(
    db_path: &Path,
    user_id: &str,
    req: AccountCreateRequest,
) -> LedgerResult<AccountView> {
    let conn = open_migrated_at_db_path(db_path)?;
    create_account(&conn, user_id, &req).map(AccountView::from)
}

pub fn list_accounts_at_db_path(db_path: &Path, user_id: &str) -> LedgerResult<Vec<AccountView>> {
    let conn = open_migrated_at_db_path(db_path)?;
    Ok(list_accounts(&conn, user_id)?
        .into_iter()
        .map(AccountView::from)
        .collect())
}

pub fn delete_account_at_db_path(
    db_path: &Path,
    user_id: &str,
    account_id: &str,
) -> LedgerResult<AccountDeleteResult> {
    let conn = open_migrated_at_db_path(db_path)?;
    delete_account(&conn, user_id, account_id.trim())
}
