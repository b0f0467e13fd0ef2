//! Database schema definitions

use anyhow::Result;
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Create all tables if they don't exist
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per exchange; `available = 0` hides a row from every read
        CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            time TEXT NOT NULL,
            username TEXT NOT NULL,
            user_id TEXT NOT NULL,
            group_id TEXT,
            message TEXT NOT NULL,
            respond TEXT NOT NULL,
            available INTEGER NOT NULL DEFAULT 1,
            images TEXT NOT NULL DEFAULT '[]'
        );

        -- History reads are always per user, newest last
        CREATE INDEX IF NOT EXISTS idx_history_user
        ON history(user_id, available, id);

        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
#[allow(dead_code)]
pub fn get_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row(
        "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}
