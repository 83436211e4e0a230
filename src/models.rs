use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl FromStr for CategoryKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(LedgerError::InvalidCategoryKind(s.to_string())),
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Debit,
    Credit,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }

    /// Balance contribution of an unsigned amount of this kind.
    pub fn signed_delta(self, amount_cents: i64) -> i64 {
        match self {
            Self::Credit => amount_cents,
            Self::Debit => -amount_cents,
        }
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            _ => Err(LedgerError::InvalidTransactionKind(s.to_string())),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub account_name: String,
    pub bank_name: String,
    pub balance_cents: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    pub color: String,
    pub created_at: String,
}

/// A stored transaction. `amount_cents` is always the unsigned magnitude;
/// the sign applied to the account balance comes from `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub date: String,
    pub description: String,
    pub amount_cents: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category_id: Option<String>,
    pub created_at: String,
}

impl Transaction {
    pub fn signed_delta(&self) -> i64 {
        self.kind.signed_delta(self.amount_cents)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountCreateRequest {
    pub account_name: String,
    pub bank_name: String,
    #[serde(default)]
    pub opening_balance_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryCreateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionCreateRequest {
    pub account_id: String,
    pub date: String,
    pub description: String,
    pub amount_cents: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionUpdateRequest {
    pub description: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionsQueryRequest {
    pub account_id: Option<String>,
    pub category_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<u32>,
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn cents_to_text(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
