//! Mediashare Storage
//!
//! SQLite persistence for archived media and polling offsets

use anyhow::Result;
use rusqlite::OptionalExtension;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedMedia {
    pub source_chat_id: i64,
    pub source_message_id: i64,
    pub archive_chat_id: i64,
    pub archived_message_id: i64,
    pub created_at: String,
}

pub struct Storage {
    conn: rusqlite::Connection,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path.as_ref())?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(rusqlite::Connection::open_in_memory()?)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS archived_media (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_chat_id INTEGER NOT NULL,
                source_message_id INTEGER NOT NULL,
                archive_chat_id INTEGER NOT NULL,
                archived_message_id INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_archived_media_source
            ON archived_media(source_chat_id, source_message_id);

            CREATE TABLE IF NOT EXISTS channel_offsets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel TEXT NOT NULL,
                account_tag TEXT NOT NULL,
                offset_value INTEGER NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_channel_offsets_unique
            ON channel_offsets(channel, account_tag);
            ",
        )?;

        Ok(Self { conn })
    }

    /// Records an archived copy. Returns `false` when the source message was
    /// already recorded, leaving the existing row untouched.
    pub fn record_archive(
        &self,
        source_chat_id: i64,
        source_message_id: i64,
        archive_chat_id: i64,
        archived_message_id: i64,
    ) -> Result<bool> {
        let created_at = chrono::Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO archived_media
             (source_chat_id, source_message_id, archive_chat_id, archived_message_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                source_chat_id,
                source_message_id,
                archive_chat_id,
                archived_message_id,
                created_at,
            ),
        )?;
        Ok(inserted > 0)
    }

    pub fn find_archive(
        &self,
        source_chat_id: i64,
        source_message_id: i64,
    ) -> Result<Option<ArchivedMedia>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_chat_id, source_message_id, archive_chat_id, archived_message_id, created_at
             FROM archived_media
             WHERE source_chat_id = ?1 AND source_message_id = ?2
             LIMIT 1",
        )?;
        let row = stmt
            .query_row((source_chat_id, source_message_id), |row| {
                Ok(ArchivedMedia {
                    source_chat_id: row.get(0)?,
                    source_message_id: row.get(1)?,
                    archive_chat_id: row.get(2)?,
                    archived_message_id: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn is_archived(&self, source_chat_id: i64, source_message_id: i64) -> Result<bool> {
        Ok(self
            .find_archive(source_chat_id, source_message_id)?
            .is_some())
    }

    /// Whether `archived_message_id` is a copy this bot made into
    /// `archive_chat_id`.
    pub fn has_archived_copy(&self, archive_chat_id: i64, archived_message_id: i64) -> Result<bool> {
        let mut stmt = self.conn.prepare(
            "SELECT 1 FROM archived_media
             WHERE archive_chat_id = ?1 AND archived_message_id = ?2
             LIMIT 1",
        )?;
        let found: Option<i64> = stmt
            .query_row((archive_chat_id, archived_message_id), |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn archive_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM archived_media", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn save_offset(&self, channel: &str, account_tag: &str, offset: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO channel_offsets (channel, account_tag, offset_value)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(channel, account_tag)
             DO UPDATE SET offset_value = excluded.offset_value, updated_at = CURRENT_TIMESTAMP",
            (channel, account_tag, offset),
        )?;
        Ok(())
    }

    pub fn get_offset(&self, channel: &str, account_tag: &str) -> Result<Option<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT offset_value FROM channel_offsets WHERE channel = ?1 AND account_tag = ?2 LIMIT 1",
        )?;
        let offset: Option<i64> = stmt
            .query_row([channel, account_tag], |row| row.get(0))
            .optional()?;
        Ok(offset)
    }
}
