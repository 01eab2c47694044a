//! Forward-only schema migrations.
//!
//! The `db_version` table holds a single integer; each migration below runs
//! once when the stored version is lower than its number.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

/// Current schema version
pub const DB_VERSION: i64 = 3;

pub fn run_migrations(conn: &Connection) -> AppResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS db_version (version INTEGER PRIMARY KEY);")?;

    let current = schema_version(conn)?;
    if current >= DB_VERSION {
        debug!("Database schema is current (v{})", current);
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    if current < 1 {
        migrate_v1(&tx)?;
    }
    if current < 2 {
        migrate_v2(&tx)?;
    }
    if current < 3 {
        migrate_v3(&tx)?;
    }
    set_schema_version(&tx, DB_VERSION)?;
    tx.commit()?;

    info!("Migrated database schema from v{} to v{}", current, DB_VERSION);
    Ok(())
}

/// Stored schema version, 0 for a fresh database
pub fn schema_version(conn: &Connection) -> AppResult<i64> {
    let version: Option<i64> = conn
        .query_row("SELECT version FROM db_version LIMIT 1", [], |row| row.get(0))
        .optional()?;
    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i64) -> AppResult<()> {
    conn.execute("DELETE FROM db_version", [])?;
    conn.execute("INSERT INTO db_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// v1: activity log and the single-row timer slot
fn migrate_v1(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS activities (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            type        TEXT NOT NULL,
            sub_type    TEXT,
            start_time  TEXT,
            end_time    TEXT,
            duration    INTEGER,
            paused_time INTEGER,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_activities_type_created ON activities(type, created_at);

        CREATE TABLE IF NOT EXISTS active_timer (
            id                INTEGER PRIMARY KEY CHECK (id = 1),
            task_type         TEXT NOT NULL,
            start_time        TEXT NOT NULL,
            pause_time        TEXT,
            total_paused_time INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )?;
    Ok(())
}

/// v2: bottle-feeding volume on completed activities
fn migrate_v2(conn: &Connection) -> AppResult<()> {
    add_column_if_missing(conn, "activities", "milk_amount", "INTEGER DEFAULT NULL")
}

/// v3: bottle-feeding volume on the active timer
fn migrate_v3(conn: &Connection) -> AppResult<()> {
    add_column_if_missing(conn, "active_timer", "milk_amount", "INTEGER DEFAULT NULL")
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> AppResult<()> {
    if has_column(conn, table, column)? {
        return Ok(());
    }
    conn.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {} {};",
        table, column, definition
    ))
    .map_err(|e| AppError::storage(format!("Migration of {}.{} failed: {}", table, column, e)))
}

fn has_column(conn: &Connection, table: &str, column: &str) -> AppResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info('{}')", table))?;
    let columns = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in columns {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
