use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::Result;

/// Text layout of EXIF capture times, which carry no offset.
/// `modified_time` is stored as RFC 3339.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS duplicates (
    image_id            INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id            INTEGER NOT NULL,
    filename            TEXT NOT NULL,
    directory_name      TEXT NOT NULL,
    keep                INTEGER NOT NULL,
    modified_time       TEXT NOT NULL,
    picture_taken_time  TEXT
);
CREATE INDEX IF NOT EXISTS idx_duplicates_group_id ON duplicates(group_id);
";

/// One persisted keep/delete decision. Rows are only ever inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRecord {
    pub image_id: i64,
    pub group_id: i64,
    pub filename: String,
    pub directory_name: String,
    pub keep: bool,
    pub modified_time: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_taken_time: Option<NaiveDateTime>,
}

/// A record before the database has assigned it an `image_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub filename: String,
    pub directory_name: String,
    pub keep: bool,
    pub modified_time: DateTime<FixedOffset>,
    pub picture_taken_time: Option<NaiveDateTime>,
}

/// SQLite-backed log of completed groups.
pub struct DuplicateStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl DuplicateStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        log::info!("Duplicate database opened at {:?}", path);
        let store = Self { conn, db_path: Some(path.to_path_buf()) };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self { conn: Connection::open_in_memory()?, db_path: None };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Group ids grow monotonically across sessions.
    pub fn next_group_id(&self) -> Result<i64> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(group_id) FROM duplicates", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0) + 1)
    }

    /// Writes every member of a completed group in one transaction and
    /// returns the generated image ids in input order.
    pub fn insert_group(&mut self, group_id: i64, records: &[NewRecord]) -> Result<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(records.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO duplicates
                    (group_id, filename, directory_name, keep, modified_time, picture_taken_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                stmt.execute(params![
                    group_id,
                    record.filename,
                    record.directory_name,
                    record.keep,
                    record.modified_time.to_rfc3339(),
                    record.picture_taken_time.map(|t| t.format(TIME_FORMAT).to_string()),
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        log::debug!("Stored group {} with {} record(s)", group_id, ids.len());
        Ok(ids)
    }

    pub fn records(&self) -> Result<Vec<DuplicateRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT image_id, group_id, filename, directory_name, keep, modified_time, picture_taken_time
             FROM duplicates ORDER BY image_id",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Latest decision recorded for a file, if any.
    pub fn latest_for_file(&self, directory_name: &str, filename: &str) -> Result<Option<DuplicateRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT image_id, group_id, filename, directory_name, keep, modified_time, picture_taken_time
                 FROM duplicates WHERE directory_name = ?1 AND filename = ?2
                 ORDER BY image_id DESC LIMIT 1",
                params![directory_name, filename],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM duplicates", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_rfc3339(idx: usize, raw: &str) -> rusqlite::Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<DuplicateRecord> {
    let modified: String = row.get(5)?;
    let taken: Option<String> = row.get(6)?;
    Ok(DuplicateRecord {
        image_id: row.get(0)?,
        group_id: row.get(1)?,
        filename: row.get(2)?,
        directory_name: row.get(3)?,
        keep: row.get(4)?,
        modified_time: parse_rfc3339(5, &modified)?,
        picture_taken_time: taken.map(|t| parse_time(6, &t)).transpose()?,
    })
}
