use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_db::open_migrated_at_db_path;
use crate::models::{new_record_id, now_rfc3339, Category, CategoryCreateRequest, CategoryKind};

pub const DEFAULT_CATEGORY_COLOR: &str = "#0F392B";

const CATEGORY_COLUMNS: &str = "id, user_id, name, type, color, created_at";

/// Starter set offered to a user with no categories yet.
const DEFAULT_CATEGORIES: &[(&str, CategoryKind, &str)] = &[
    ("Salary", CategoryKind::Income, "#10B981"),
    ("Sales", CategoryKind::Income, "#3B82F6"),
    ("Office Rent", CategoryKind::Expense, "#EF4444"),
    ("Utilities", CategoryKind::Expense, "#F59E0B"),
    ("Supplies", CategoryKind::Expense, "#8B5CF6"),
    ("Travel", CategoryKind::Expense, "#EC4899"),
    ("Food & Dining", CategoryKind::Expense, "#F97316"),
    ("Other", CategoryKind::Expense, "#6B7280"),
];

#[derive(Debug, Serialize)]
pub struct SeedCategoriesResult {
    pub created: usize,
    pub categories: Vec<Category>,
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    let kind_text: String = row.get(3)?;
    let kind = kind_text.parse::<CategoryKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        kind,
        color: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn insert_category(conn: &Connection, category: &Category) -> LedgerResult<()> {
    conn.execute(
        &format!("INSERT INTO categories({CATEGORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            category.id,
            category.user_id,
            category.name,
            category.kind.as_str(),
            category.color,
            category.created_at
        ],
    )?;
    Ok(())
}

pub fn create_category(
    conn: &Connection,
    user_id: &str,
    req: &CategoryCreateRequest,
) -> LedgerResult<Category> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(LedgerError::Validation("name is required".to_string()));
    }
    let kind = req.kind.parse::<CategoryKind>()?;
    let color = req
        .color
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CATEGORY_COLOR);

    let category = Category {
        id: new_record_id(),
        user_id: user_id.to_string(),
        name: name.to_string(),
        kind,
        color: color.to_string(),
        created_at: now_rfc3339(),
    };
    insert_category(conn, &category)?;
    Ok(category)
}

/// Categories of one user in creation order. The classifier relies on this
/// order when several categories could match.
pub fn list_categories(conn: &Connection, user_id: &str) -> LedgerResult<Vec<Category>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map([user_id], category_from_row)?;
    let mut categories = Vec::new();
    for row in rows {
        categories.push(row?);
    }
    Ok(categories)
}

pub fn find_category(
    conn: &Connection,
    user_id: &str,
    category_id: &str,
) -> LedgerResult<Option<Category>> {
    let category = conn
        .query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1 AND user_id = ?2"),
            params![category_id, user_id],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

pub fn delete_category(conn: &Connection, user_id: &str, category_id: &str) -> LedgerResult<()> {
    let deleted = conn.execute(
        "DELETE FROM categories WHERE id = ?1 AND user_id = ?2",
        params![category_id, user_id],
    )?;
    if deleted == 0 {
        return Err(LedgerError::CategoryNotFound(category_id.to_string()));
    }
    Ok(())
}

/// Inserts the default categories unless the user already has any.
pub fn seed_default_categories(conn: &Connection, user_id: &str) -> LedgerResult<SeedCategoriesResult> {
    let existing = list_categories(conn, user_id)?;
    if !existing.is_empty() {
        tracing::info!(user_id, count = existing.len(), "categories already present, seeding skipped");
        return Ok(SeedCategoriesResult {
            created: 0,
            categories: existing,
        });
    }

    let tx = conn.unchecked_transaction()?;
    let created_at = now_rfc3339();
    for (name, kind, color) in DEFAULT_CATEGORIES {
        insert_category(
            &tx,
            &Category {
                id: new_record_id(),
                user_id: user_id.to_string(),
                name: (*name).to_string(),
                kind: *kind,
                color: (*color).to_string(),
                created_at: created_at.clone(),
            },
        )?;
    }
    tx.commit()?;

    Ok(SeedCategoriesResult {
        created: DEFAULT_CATEGORIES.len(),
        categories: list_categories(conn, user_id)?,
    })
}

pub fn create_category_at_db_path(
    db_path: &Path,
    user_id: &str,
    req: CategoryCreateRequest,
) -> LedgerResult<Category> {
    let conn = open_migrated_at_db_path(db_path)?;
    create_category(&conn, user_id, &req)
}

pub fn list_categories_at_db_path(db_path: &Path, user_id: &str) -> LedgerResult<Vec<Category>> {
    let conn = open_migrated_at_db_path(db_path)?;
    list_categories(&conn, user_id)
}

pub fn delete_category_at_db_path(db_path: &Path, user_id: &str, category_id: &str) -> LedgerResult<()> {
    let conn = open_migrated_at_db_path(db_path)?;
    delete_category(&conn, user_id, category_id.trim())
}

pub fn seed_default_categories_at_db_path(
    db_path: &Path,
    user_id: &str,
) -> LedgerResult<SeedCategoriesResult> {
    let conn = open_migrated_at_db_path(db_path)?;
    seed_default_categories(&conn, user_id)
}
