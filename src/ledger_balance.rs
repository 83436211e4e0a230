//! Balance mutation protocol.
//!
//! Every stored transaction contributes `signed_delta()` to its account's
//! balance: callers [`apply_balance_delta`] once when a transaction is
//! persisted and [`reverse_transaction`] once before it is removed. Nothing
//! here validates kinds; balances are kept within [`MAX_BALANCE_CENTS`].

use rusqlite::{params, Connection, OptionalExtension};

use crate::amount_parser::MAX_AMOUNT_CENTS;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{cents_to_text, Transaction};

/// Largest balance magnitude an account may hold.
pub const MAX_BALANCE_CENTS: i64 = 100 * MAX_AMOUNT_CENTS;

pub fn balance_in_range(balance_cents: i64) -> bool {
    balance_cents.checked_abs().is_some_and(|v| v <= MAX_BALANCE_CENTS)
}

/// Adds `delta` to the account balance as a single atomic increment.
///
/// Returns `false` when no account with that id belongs to the user, and
/// [`LedgerError::InvalidAmount`] when the new balance would leave
/// `±MAX_BALANCE_CENTS`; the balance is unchanged in both cases.
pub fn apply_balance_delta(
    conn: &Connection,
    user_id: &str,
    account_id: &str,
    delta: i64,
) -> LedgerResult<bool> {
    // SQLite promotes an overflowing sum to REAL, so the bound check holds
    // even when the addition itself would not fit an i64.
    let changed = conn.execute(
        "UPDATE accounts SET balance_cents = balance_cents + ?1
         WHERE id = ?2 AND user_id = ?3 AND balance_cents + ?1 BETWEEN ?4 AND ?5",
        params![delta, account_id, user_id, -MAX_BALANCE_CENTS, MAX_BALANCE_CENTS],
    )?;
    if changed > 0 {
        return Ok(true);
    }

    let current: Option<i64> = conn
        .query_row(
            "SELECT balance_cents FROM accounts WHERE id = ?1 AND user_id = ?2",
            params![account_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    match current {
        None => Ok(false),
        Some(balance) => Err(LedgerError::InvalidAmount(format!(
            "balance {} of account {account_id} cannot absorb {}",
            cents_to_text(balance),
            cents_to_text(delta)
        ))),
    }
}

/// Undoes the balance contribution of `tx`.
///
/// If the account is gone the update is skipped with a warning and the
/// caller carries on.
pub fn reverse_transaction(conn: &Connection, tx: &Transaction) -> LedgerResult<bool> {
    let applied = apply_balance_delta(conn, &tx.user_id, &tx.account_id, -tx.signed_delta())?;
    if !applied {
        tracing::warn!(
            transaction_id = %tx.id,
            account_id = %tx.account_id,
            "account missing, balance reversal skipped"
        );
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_catalog::{create_account, get_account};
    use crate::ledger_db::test_support::TempLedger;
    use crate::models::{AccountCreateRequest, TransactionKind};

    fn seeded(ledger: &TempLedger, opening: i64) -> String {
        create_account(
            &ledger.conn,
            "u1",
            &AccountCreateRequest {
                account_name: "Current".to_string(),
                bank_name: "Bank".to_string(),
                opening_balance_cents: opening,
            },
        )
        .expect("create account")
        .id
    }

    fn tx(account_id: &str, kind: TransactionKind, amount_cents: i64) -> Transaction {
        Transaction {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            account_id: account_id.to_string(),
            date: "01-01-2024".to_string(),
            description: "x".to_string(),
            amount_cents,
            kind,
            category_id: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn balance(ledger: &TempLedger, account_id: &str) -> i64 {
        get_account(&ledger.conn, "u1", account_id)
            .expect("get account")
            .balance_cents
    }

    #[test]
    fn apply_then_reverse_restores_balance() {
        let ledger = TempLedger::new("vitta_balance_roundtrip");
        let account_id = seeded(&ledger, 10_000);

        let deposit = tx(&account_id, TransactionKind::Credit, 2_500);
        let spend = tx(&account_id, TransactionKind::Debit, 700);
        assert!(apply_balance_delta(&ledger.conn, "u1", &account_id, deposit.signed_delta()).unwrap());
        assert!(apply_balance_delta(&ledger.conn, "u1", &account_id, spend.signed_delta()).unwrap());
        assert_eq!(balance(&ledger, &account_id), 11_800);

        assert!(reverse_transaction(&ledger.conn, &deposit).unwrap());
        assert_eq!(balance(&ledger, &account_id), 9_300);
        assert!(reverse_transaction(&ledger.conn, &spend).unwrap());
        assert_eq!(balance(&ledger, &account_id), 10_000);
    }

    #[test]
    fn other_users_account_is_not_touched() {
        let ledger = TempLedger::new("vitta_balance_scope");
        let account_id = seeded(&ledger, 0);
        assert!(!apply_balance_delta(&ledger.conn, "u2", &account_id, 500).unwrap());
        assert_eq!(balance(&ledger, &account_id), 0);
    }

    #[test]
    fn deltas_leaving_the_balance_range_are_refused() {
        let ledger = TempLedger::new("vitta_balance_range");
        let account_id = seeded(&ledger, MAX_BALANCE_CENTS - 100);

        assert!(matches!(
            apply_balance_delta(&ledger.conn, "u1", &account_id, 101),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            apply_balance_delta(&ledger.conn, "u1", &account_id, i64::MAX),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert_eq!(balance(&ledger, &account_id), MAX_BALANCE_CENTS - 100);

        assert!(apply_balance_delta(&ledger.conn, "u1", &account_id, 100).unwrap());
        assert_eq!(balance(&ledger, &account_id), MAX_BALANCE_CENTS);
        assert!(apply_balance_delta(&ledger.conn, "u1", &account_id, i64::MIN + 1).is_err());
        assert_eq!(balance(&ledger, &account_id), MAX_BALANCE_CENTS);

        assert!(!apply_balance_delta(&ledger.conn, "u1", "no-such-account", i64::MAX).unwrap());
        assert!(balance_in_range(-MAX_BALANCE_CENTS));
        assert!(!balance_in_range(i64::MIN));
    }

    #[test]
    fn reversing_against_missing_account_is_skipped() {
        let ledger = TempLedger::new("vitta_balance_orphan");
        let orphan = tx("no-such-account", TransactionKind::Debit, 100);
        assert!(!reverse_transaction(&ledger.conn, &orphan).unwrap());
    }
}
