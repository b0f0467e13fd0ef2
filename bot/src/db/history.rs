//! Per-user chat history operations

use super::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One stored exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Insertion sequence; also the ordering key
    pub id: i64,
    pub time: DateTime<Utc>,
    pub username: String,
    pub user_id: String,
    pub group_id: Option<String>,
    /// Prompt sent by the user
    pub message: String,
    /// Post-processed model answer (never includes the thought prefix)
    pub respond: String,
    pub images: Vec<PathBuf>,
    pub available: bool,
}

/// Parameters for appending an exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHistoryItem {
    pub username: String,
    pub user_id: String,
    pub group_id: Option<String>,
    pub message: String,
    pub respond: String,
    pub images: Vec<PathBuf>,
}

const SELECT_COLUMNS: &str =
    "SELECT id, time, username, user_id, group_id, message, respond, images, available FROM history";

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let time: String = row.get(1)?;
    let images: String = row.get(7)?;

    Ok(HistoryEntry {
        id: row.get(0)?,
        time: DateTime::parse_from_rfc3339(&time)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
            })?,
        username: row.get(2)?,
        user_id: row.get(3)?,
        group_id: row.get(4)?,
        message: row.get(5)?,
        respond: row.get(6)?,
        images: serde_json::from_str(&images).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
        available: row.get(8)?,
    })
}

fn insert(conn: &rusqlite::Connection, item: &NewHistoryItem) -> Result<HistoryEntry> {
    let now = Utc::now();
    let images_json = serde_json::to_string(&item.images).context("Failed to encode image paths")?;

    conn.execute(
        r#"
        INSERT INTO history (time, username, user_id, group_id, message, respond, available, images)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
        "#,
        params![
            now.to_rfc3339(),
            &item.username,
            &item.user_id,
            &item.group_id,
            &item.message,
            &item.respond,
            images_json,
        ],
    )
    .context("Failed to insert history item")?;

    Ok(HistoryEntry {
        id: conn.last_insert_rowid(),
        time: now,
        username: item.username.clone(),
        user_id: item.user_id.clone(),
        group_id: item.group_id.clone(),
        message: item.message.clone(),
        respond: item.respond.clone(),
        images: item.images.clone(),
        available: true,
    })
}

impl Database {
    /// Append an exchange to a user's history
    pub fn add_item(&self, item: NewHistoryItem) -> Result<HistoryEntry> {
        let conn = self.conn()?;
        insert(&conn, &item)
    }

    /// Available history for a user, oldest first
    pub fn get_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ?1 AND available = 1 ORDER BY id ASC",
            SELECT_COLUMNS
        ))?;

        let entries = stmt
            .query_map([user_id], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Most recent available exchange for a user
    pub fn get_last_item(&self, user_id: &str) -> Result<Option<HistoryEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    "{} WHERE user_id = ?1 AND available = 1 ORDER BY id DESC LIMIT 1",
                    SELECT_COLUMNS
                ),
                [user_id],
                row_to_entry,
            )
            .optional()?;

        Ok(entry)
    }

    /// Delete the most recent available exchange
    ///
    /// Returns false when there was nothing to delete.
    pub fn remove_last_item(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            r#"
            DELETE FROM history WHERE id = (
                SELECT id FROM history
                WHERE user_id = ?1 AND available = 1
                ORDER BY id DESC LIMIT 1
            )
            "#,
            [user_id],
        )?;
        Ok(rows > 0)
    }

    /// Soft-delete all of a user's history
    pub fn mark_history_unavailable(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE history SET available = 0 WHERE user_id = ?1 AND available = 1",
            [user_id],
        )?;
        Ok(rows)
    }

    /// Swap one exchange for a new one in a single transaction
    pub fn replace_item(&self, id: i64, item: NewHistoryItem) -> Result<HistoryEntry> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let removed = tx.execute("DELETE FROM history WHERE id = ?1", [id])?;
        if removed == 0 {
            anyhow::bail!("History item {} no longer exists", id);
        }
        let entry = insert(&tx, &item)?;

        tx.commit().context("Failed to commit history replacement")?;
        Ok(entry)
    }

    /// Count a user's rows, including soft-deleted ones
    pub fn count_all_items(&self, user_id: &str) -> Result<u32> {
        let conn = self.conn()?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM history WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
