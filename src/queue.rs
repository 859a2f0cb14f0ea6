//! Local durable queue for captures awaiting remote confirmation.
//!
//! Backed by a single SQLite table keyed by a locally generated uuid, with a
//! `synced` integer as the pending/synced discriminator. The schema version
//! is tracked via `PRAGMA user_version`. Insertion order is the implicit
//! rowid, which is what the sync drain replays in.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DB_FILE_NAME;
use crate::domain::{CaptureKind, CaptureRecord, SyncStatus};

/// Current schema version written to `PRAGMA user_version`
const SCHEMA_VERSION: i32 = 1;

/// Errors that can occur in the local queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported schema version: {0}")]
    UnsupportedSchema(i32),
}

/// Queue statistics, used to refresh the cached pending count without
/// loading full records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub total: u64,
    pub unsynced: u64,
    pub synced: u64,
}

/// SQLite-backed capture queue.
pub struct CaptureQueue {
    conn: Mutex<Connection>,
}

impl CaptureQueue {
    /// Open (or create) a queue at the given database path.
    pub fn open(db_path: &Path) -> Result<Self, QueueError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory queue (tests, ephemeral runs).
    pub fn open_in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Default database path under a home directory.
    pub fn default_path(home: &Path) -> PathBuf {
        home.join(DB_FILE_NAME)
    }

    fn init_schema(conn: &Connection) -> Result<(), QueueError> {
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        match version {
            0 => {
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS captures (
                        id         TEXT PRIMARY KEY,
                        content    TEXT NOT NULL,
                        kind       TEXT NOT NULL,
                        created_at TEXT NOT NULL,
                        synced     INTEGER NOT NULL DEFAULT 0,
                        synced_at  TEXT,
                        error      TEXT
                    );
                    CREATE INDEX IF NOT EXISTS idx_captures_synced ON captures(synced);
                    PRAGMA user_version = 1;",
                )?;
                debug!("Capture database initialized (schema v{})", SCHEMA_VERSION);
            }
            SCHEMA_VERSION => {}
            other => return Err(QueueError::UnsupportedSchema(other)),
        }

        Ok(())
    }

    /// Persist a new capture with status pending and a locally generated id.
    /// Returns the stored record.
    pub fn add_capture(
        &self,
        content: &str,
        kind: CaptureKind,
    ) -> Result<CaptureRecord, QueueError> {
        let record = CaptureRecord::pending(content, kind);

        let conn = self.conn.lock().expect("queue lock poisoned");
        conn.execute(
            "INSERT INTO captures (id, content, kind, created_at, synced)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![
                record.id,
                record.content,
                record.kind.as_str(),
                record.created_at.to_rfc3339(),
            ],
        )?;

        debug!(id = %record.id, "Capture queued locally");
        Ok(record)
    }

    /// All pending records, in insertion order. Non-destructive.
    pub fn unsynced(&self) -> Result<Vec<CaptureRecord>, QueueError> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, content, kind, created_at, synced, synced_at, error
             FROM captures
             WHERE synced = 0
             ORDER BY rowid ASC",
        )?;

        let records = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Transition a record to synced.
    ///
    /// An absent id is a logged no-op, not an error: concurrent drains must
    /// tolerate duplicate completion signals.
    pub fn mark_synced(&self, id: &str) -> Result<(), QueueError> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        let updated = conn.execute(
            "UPDATE captures SET synced = 1, synced_at = ?1, error = NULL
             WHERE id = ?2 AND synced = 0",
            params![Utc::now().to_rfc3339(), id],
        )?;

        if updated == 0 {
            warn!(%id, "mark_synced: record absent or already synced");
        } else {
            debug!(%id, "Capture marked as synced");
        }

        Ok(())
    }

    /// Record a synchronization failure against a pending record.
    pub fn record_error(&self, id: &str, error: &str) -> Result<(), QueueError> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        conn.execute(
            "UPDATE captures SET error = ?1 WHERE id = ?2",
            params![error, id],
        )?;
        Ok(())
    }

    /// Up to `limit` most-recent records across both statuses, newest first.
    /// Read fallback when the remote is unreachable.
    pub fn all_captures(&self, limit: u64) -> Result<Vec<CaptureRecord>, QueueError> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, content, kind, created_at, synced, synced_at, error
             FROM captures
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;

        let records = stmt
            .query_map([limit], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Fetch a record by id.
    pub fn get(&self, id: &str) -> Result<Option<CaptureRecord>, QueueError> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        let record = conn
            .query_row(
                "SELECT id, content, kind, created_at, synced, synced_at, error
                 FROM captures WHERE id = ?1",
                [id],
                row_to_record,
            )
            .optional()?;

        Ok(record)
    }

    /// Delete a record.
    pub fn delete(&self, id: &str) -> Result<(), QueueError> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        conn.execute("DELETE FROM captures WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Delete everything.
    pub fn clear_all(&self) -> Result<(), QueueError> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        conn.execute("DELETE FROM captures", [])?;
        Ok(())
    }

    /// Counts across both statuses.
    pub fn stats(&self) -> Result<QueueStats, QueueError> {
        let conn = self.conn.lock().expect("queue lock poisoned");
        let (total, unsynced): (u64, u64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(synced = 0), 0) FROM captures",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(QueueStats {
            total,
            unsynced,
            synced: total - unsynced,
        })
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CaptureRecord> {
    let kind: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let synced: bool = row.get(4)?;
    let synced_at: Option<String> = row.get(5)?;

    Ok(CaptureRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        kind: if kind == "voice" {
            CaptureKind::Voice
        } else {
            CaptureKind::Text
        },
        created_at: parse_timestamp(&created_at),
        status: if synced {
            SyncStatus::Synced
        } else {
            SyncStatus::Pending
        },
        synced_at: synced_at.as_deref().map(parse_timestamp),
        error: row.get(6)?,
    })
}

/// Timestamps are written by this crate as RFC 3339; a malformed row falls
/// back to the epoch rather than poisoning a whole read.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(%value, "Malformed timestamp in capture row: {e}");
            DateTime::<Utc>::UNIX_EPOCH
        })
}
