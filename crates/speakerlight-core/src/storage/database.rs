//! SQLite-based session record storage.
//!
//! Stores one row per stopped session. Rows are never updated; `clear`
//! removes them all.

use std::path::Path;

use chrono::{DateTime, Utc};
use indoc::indoc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::data_dir;
use crate::error::{DatabaseError, Result};
use crate::records::{format_time, RecordSink, SessionRecord};

const SCHEMA: &str = indoc! {"
    CREATE TABLE IF NOT EXISTS records (
        id          TEXT PRIMARY KEY,
        speaker     TEXT NOT NULL,
        duration_ms INTEGER NOT NULL,
        preset      TEXT NOT NULL,
        recorded_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_records_recorded_at ON records(recorded_at);
"};

const SELECT_COLUMNS: &str = "SELECT id, speaker, duration_ms, preset, recorded_at FROM records";

/// SQLite database for session records.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/speakerlight/speakerlight.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("speakerlight.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(SCHEMA)
    }

    /// Find a record by full id or unique id prefix.
    ///
    /// Returns `None` when nothing matches or the prefix is ambiguous.
    /// The prefix is compared literally, so `%` and `_` match nothing.
    pub fn find(&self, id_prefix: &str) -> Result<Option<SessionRecord>> {
        let prefix = id_prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Ok(None);
        }
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE substr(id, 1, length(?1)) = ?1 LIMIT 2"
        ))?;
        let rows = stmt
            .query_map(params![prefix], raw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        match rows.as_slice() {
            [only] => Ok(Some(decode(only.clone())?)),
            _ => Ok(None),
        }
    }

    /// Exact-id lookup.
    pub fn get(&self, id: Uuid) -> Result<Option<SessionRecord>> {
        let raw = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.to_string()],
                raw_row,
            )
            .optional()?;
        raw.map(decode).transpose()
    }

    pub fn count(&self) -> Result<u64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?)
    }
}

type RawRecord = (String, String, u64, String, String);

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode((id, speaker, duration_ms, preset, recorded_at): RawRecord) -> Result<SessionRecord> {
    let corrupt = |message: String| DatabaseError::CorruptRecord {
        id: id.clone(),
        message,
    };
    let uuid = Uuid::parse_str(&id).map_err(|e| corrupt(e.to_string()))?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
        .map_err(|e| corrupt(e.to_string()))?
        .with_timezone(&Utc);
    Ok(SessionRecord {
        id: uuid,
        speaker,
        duration_ms,
        duration: format_time(duration_ms),
        preset,
        recorded_at,
    })
}

impl RecordSink for Database {
    fn append(&mut self, record: &SessionRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO records (id, speaker, duration_ms, preset, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id.to_string(),
                record.speaker,
                record.duration_ms,
                record.preset,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY recorded_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map([], raw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode).collect()
    }

    fn clear(&mut self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM records", [])?)
    }
}
