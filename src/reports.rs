use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::category_catalog::list_categories;
use crate::date_normalizer::normalize_date;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger_db::open_migrated_at_db_path;
use crate::models::{cents_to_text, Category, CategoryKind, Transaction, TransactionKind};
use crate::transaction_mutations::load_user_transactions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub total_income_cents: i64,
    pub total_expense_cents: i64,
    pub net_cents: i64,
    pub total_income: String,
    pub total_expense: String,
    pub net: String,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryBreakdownRow {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    pub color: String,
    pub total_cents: i64,
    pub total: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTrendRow {
    pub month: String,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub income: String,
    pub expense: String,
}

fn accumulate(total: &mut i64, amount_cents: i64, what: &str) -> LedgerResult<()> {
    *total = total
        .checked_add(amount_cents)
        .ok_or_else(|| LedgerError::ReportOverflow(what.to_string()))?;
    Ok(())
}

pub fn summarize(transactions: &[Transaction]) -> LedgerResult<SummaryReport> {
    let (mut income, mut expense) = (0_i64, 0_i64);
    for tx in transactions {
        match tx.kind {
            TransactionKind::Credit => accumulate(&mut income, tx.amount_cents, "total income")?,
            TransactionKind::Debit => accumulate(&mut expense, tx.amount_cents, "total expense")?,
        }
    }
    let net = income
        .checked_sub(expense)
        .ok_or_else(|| LedgerError::ReportOverflow("net".to_string()))?;
    Ok(SummaryReport {
        total_income_cents: income,
        total_expense_cents: expense,
        net_cents: net,
        total_income: cents_to_text(income),
        total_expense: cents_to_text(expense),
        net: cents_to_text(net),
        transaction_count: transactions.len(),
    })
}

/// Totals per category name, sorted by name. Transactions with no category,
/// or whose category no longer exists, are left out.
pub fn breakdown_by_category(
    transactions: &[Transaction],
    categories: &[Category],
) -> LedgerResult<Vec<CategoryBreakdownRow>> {
    let by_id = categories
        .iter()
        .map(|c| (c.id.as_str(), c))
        .collect::<HashMap<_, _>>();

    let mut grouped: BTreeMap<&str, CategoryBreakdownRow> = BTreeMap::new();
    for tx in transactions {
        let Some(category) = tx.category_id.as_deref().and_then(|id| by_id.get(id)) else {
            continue;
        };
        let row = grouped
            .entry(category.name.as_str())
            .or_insert_with(|| CategoryBreakdownRow {
                name: category.name.clone(),
                kind: category.kind,
                color: category.color.clone(),
                total_cents: 0,
                total: String::new(),
                count: 0,
            });
        accumulate(&mut row.total_cents, tx.amount_cents, &category.name)?;
        row.count += 1;
    }

    Ok(grouped
        .into_values()
        .map(|mut row| {
            row.total = cents_to_text(row.total_cents);
            row
        })
        .collect())
}

/// Income and expense per `YYYY-MM`, oldest month first. Dates that do not
/// parse are ignored.
pub fn monthly_trend_of(transactions: &[Transaction]) -> LedgerResult<Vec<MonthlyTrendRow>> {
    let mut months: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for tx in transactions {
        let Ok(date) = normalize_date(&tx.date) else {
            tracing::debug!(transaction_id = %tx.id, date = %tx.date, "date ignored in monthly trend");
            continue;
        };
        let month = date.month_key();
        let slot = months.entry(month.clone()).or_default();
        match tx.kind {
            TransactionKind::Credit => accumulate(&mut slot.0, tx.amount_cents, &month)?,
            TransactionKind::Debit => accumulate(&mut slot.1, tx.amount_cents, &month)?,
        }
    }
    Ok(months
        .into_iter()
        .map(|(month, (income, expense))| MonthlyTrendRow {
            month,
            income_cents: income,
            expense_cents: expense,
            income: cents_to_text(income),
            expense: cents_to_text(expense),
        })
        .collect())
}

pub fn summary_report(conn: &Connection, user_id: &str) -> LedgerResult<SummaryReport> {
    summarize(&load_user_transactions(conn, user_id)?)
}

pub fn category_breakdown(conn: &Connection, user_id: &str) -> LedgerResult<Vec<CategoryBreakdownRow>> {
    let transactions = load_user_transactions(conn, user_id)?;
    let categories = list_categories(conn, user_id)?;
    breakdown_by_category(&transactions, &categories)
}

pub fn monthly_trend(conn: &Connection, user_id: &str) -> LedgerResult<Vec<MonthlyTrendRow>> {
    monthly_trend_of(&load_user_transactions(conn, user_id)?)
}

pub fn summary_report_at_db_path(db_path: &Path, user_id: &str) -> LedgerResult<SummaryReport> {
    let conn = open_migrated_at_db_path(db_path)?;
    summary_report(&conn, user_id)
}

pub fn category_breakdown_at_db_path(
    db_path: &Path,
    user_id: &str,
) -> LedgerResult<Vec<CategoryBreakdownRow>> {
    let conn = open_migrated_at_db_path(db_path)?;
    category_breakdown(&conn, user_id)
}

pub fn monthly_trend_at_db_path(db_path: &Path, user_id: &str) -> LedgerResult<Vec<MonthlyTrendRow>> {
    let conn = open_migrated_at_db_path(db_path)?;
    monthly_trend(&conn, user_id)
}
