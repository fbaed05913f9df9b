//! Versioned schema migrations.
//!
//! Applied on every open. The `schema_version` table holds a single row with
//! the version the database has been brought to.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{debug, warn};

/// Version a freshly migrated database ends up at.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if a migration statement fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )?;

    let current = schema_version(conn);
    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    Ok(())
}

/// 0 for a database that has never been migrated.
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    debug!(version, "schema migrated");
    Ok(())
}

/// v1: key-value documents and finished workouts.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS workout_sessions (
            id            TEXT PRIMARY KEY,
            alarm_id      TEXT NOT NULL,
            alarm_title   TEXT NOT NULL DEFAULT '',
            activity      TEXT NOT NULL,
            target        INTEGER NOT NULL,
            completed     INTEGER NOT NULL,
            completed_at  TEXT NOT NULL,
            duration_secs INTEGER NOT NULL,
            was_completed INTEGER NOT NULL DEFAULT 1
        );",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// v2: indexes for the history listing and per-alarm queries.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_workout_sessions_completed_at
             ON workout_sessions(completed_at);
         CREATE INDEX IF NOT EXISTS idx_workout_sessions_alarm_id
             ON workout_sessions(alarm_id, completed_at);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
