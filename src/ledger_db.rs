use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use crate::error::LedgerResult;

pub const DEFAULT_LEDGER_DB_RELATIVE_PATH: &str = "ledger/vitta.db";

const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_init.sql", include_str!("../migrations/0001_init.sql")),
    (
        "0002_user_scope_indexes.sql",
        include_str!("../migrations/0002_user_scope_indexes.sql"),
    ),
];

#[derive(Debug, Serialize)]
pub struct LedgerDbStatus {
    pub db_path: String,
    pub exists: bool,
    pub migration_files: Vec<String>,
    pub applied_versions: Vec<String>,
    pub pending_versions: Vec<String>,
    pub schema_migrations_table_exists: bool,
    pub ready: bool,
}

#[derive(Debug, Serialize)]
pub struct LedgerDbMigrateResult {
    pub db_path: String,
    pub created: bool,
    pub applied_now: Vec<String>,
    pub skipped: Vec<String>,
    pub applied_total: usize,
    pub pending_total: usize,
}

fn ensure_schema_migrations_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
}

fn has_schema_migrations_table(conn: &Connection) -> rusqlite::Result<bool> {
    let exists = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_migrations')",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|v| v != 0)?;
    Ok(exists)
}

fn load_applied_versions(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version ASC")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut versions = Vec::new();
    for row in rows {
        versions.push(row?);
    }
    Ok(versions)
}

/// Opens the ledger database, creating the parent directory if needed.
/// Does not apply migrations.
pub fn open_ledger_connection(db_path: &Path) -> LedgerResult<Connection> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Connection::open(db_path)?)
}

/// Applies every embedded migration not yet recorded in `schema_migrations`.
/// Each migration runs in its own SQLite transaction.
pub fn apply_migrations(conn: &mut Connection) -> LedgerResult<(Vec<String>, Vec<String>)> {
    ensure_schema_migrations_table(conn)?;
    let already = load_applied_versions(conn)?
        .into_iter()
        .collect::<HashSet<_>>();

    let mut applied_now = Vec::new();
    let mut skipped = Vec::new();
    for (version, sql) in MIGRATIONS {
        if already.contains(*version) {
            skipped.push((*version).to_string());
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_migrations(version) VALUES (?1)", [*version])?;
        tx.commit()?;
        tracing::info!(version, "applied migration");
        applied_now.push((*version).to_string());
    }
    Ok((applied_now, skipped))
}

pub fn migrate_at_db_path(db_path: &Path) -> LedgerResult<LedgerDbMigrateResult> {
    let created = !db_path.exists();
    let mut conn = open_ledger_connection(db_path)?;
    let (applied_now, skipped) = apply_migrations(&mut conn)?;

    let applied_total = load_applied_versions(&conn)?.len();
    let pending_total = MIGRATIONS.len().saturating_sub(applied_total);

    Ok(LedgerDbMigrateResult {
        db_path: db_path.to_string_lossy().to_string(),
        created,
        applied_now,
        skipped,
        applied_total,
        pending_total,
    })
}

/// Reports applied and pending migrations without touching the file.
pub fn migration_status(db_path: &Path) -> LedgerResult<LedgerDbStatus> {
    let migration_files = MIGRATIONS
        .iter()
        .map(|(v, _)| (*v).to_string())
        .collect::<Vec<_>>();

    if !db_path.exists() {
        return Ok(LedgerDbStatus {
            db_path: db_path.to_string_lossy().to_string(),
            exists: false,
            migration_files: migration_files.clone(),
            applied_versions: Vec::new(),
            pending_versions: migration_files,
            schema_migrations_table_exists: false,
            ready: false,
        });
    }

    let conn = Connection::open(db_path)?;
    let schema_table_exists = has_schema_migrations_table(&conn)?;
    let applied_versions = if schema_table_exists {
        load_applied_versions(&conn)?
    } else {
        Vec::new()
    };
    let applied_set = applied_versions.iter().cloned().collect::<HashSet<_>>();
    let pending_versions = migration_files
        .iter()
        .filter(|v| !applied_set.contains(*v))
        .cloned()
        .collect::<Vec<_>>();

    Ok(LedgerDbStatus {
        db_path: db_path.to_string_lossy().to_string(),
        exists: true,
        migration_files,
        applied_versions,
        ready: pending_versions.is_empty(),
        pending_versions,
        schema_migrations_table_exists: schema_table_exists,
    })
}

/// Opens a database and brings its schema up to date.
pub fn open_migrated_at_db_path(db_path: &Path) -> LedgerResult<Connection> {
    let mut conn = open_ledger_connection(db_path)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}
