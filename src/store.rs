//! Metadata store: one SQLite table of image records.
//!
//! CRUD plus reverse-chronological listing, case-insensitive substring
//! search, partial metadata updates, and the full-scan tag aggregation. The
//! connection sits behind a mutex — one process, low concurrency, every call
//! is a single implicit transaction so readers never observe partial writes.
//!
//! Tags are a `Vec<String>` of trimmed labels everywhere in the crate and
//! collapse to comma-joined text only at this storage boundary.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    stored_filename   TEXT NOT NULL UNIQUE,
    original_filename TEXT NOT NULL,
    description       TEXT,
    tags              TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT,
    width             INTEGER NOT NULL,
    height            INTEGER NOT NULL,
    file_size         INTEGER NOT NULL,
    mime_type         TEXT
);
CREATE INDEX IF NOT EXISTS idx_images_created_at ON images(created_at DESC);
"#;

/// A persisted image record. Field semantics follow the stored artifact, not
/// the original upload: `width`/`height`/`file_size` describe the normalized
/// file on disk.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub id: i64,
    pub stored_filename: String,
    pub original_filename: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub mime_type: Option<String>,
}

impl ImageRecord {
    /// The client-facing JSON shape returned by the upload endpoint.
    pub fn public_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "filename": self.stored_filename,
            "description": self.description.clone().unwrap_or_default(),
            "tags": self.tags,
            "created_at": self.created_at.to_rfc3339(),
            "width": self.width,
            "height": self.height,
        })
    }
}

/// Fields the caller supplies when creating a record; the store assigns
/// `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub stored_filename: String,
    pub original_filename: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub mime_type: Option<String>,
}

/// Partial update: `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Split a comma-joined tag string into trimmed labels, dropping empties.
/// Duplicates are preserved here; only [`ImageStore::tags`] deduplicates.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

/// Backslash-escape LIKE wildcards so a search term matches as a literal
/// substring. Pairs with `ESCAPE '\'` in the query.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Fixed-width RFC 3339 so lexicographic text order in SQLite matches
/// chronological order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

const RECORD_COLUMNS: &str = "id, stored_filename, original_filename, description, tags, \
                              created_at, updated_at, width, height, file_size, mime_type";

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRecord> {
    let created: String = row.get(5)?;
    let updated: Option<String> = row.get(6)?;
    Ok(ImageRecord {
        id: row.get(0)?,
        stored_filename: row.get(1)?,
        original_filename: row.get(2)?,
        description: row.get(3)?,
        tags: row
            .get::<_, Option<String>>(4)?
            .map(|t| parse_tags(&t))
            .unwrap_or_default(),
        created_at: parse_ts(&created)?,
        updated_at: updated.as_deref().map(parse_ts).transpose()?,
        width: row.get(7)?,
        height: row.get(8)?,
        file_size: row.get::<_, i64>(9)? as u64,
        mime_type: row.get(10)?,
    })
}

pub struct ImageStore {
    conn: Mutex<Connection>,
}

impl ImageStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means a panic mid-statement; propagating the panic
        // is the only sound option.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a record, assigning `id` and `created_at`.
    pub fn insert(&self, new: NewRecord) -> Result<ImageRecord> {
        let created_at = Utc::now();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO images (stored_filename, original_filename, description, tags, \
             created_at, width, height, file_size, mime_type) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                new.stored_filename,
                new.original_filename,
                new.description,
                if new.tags.is_empty() {
                    None
                } else {
                    Some(join_tags(&new.tags))
                },
                format_ts(created_at),
                new.width,
                new.height,
                new.file_size as i64,
                new.mime_type,
            ],
        )?;
        let id = conn.last_insert_rowid();
        let record = conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM images WHERE id = ?1"),
            [id],
            record_from_row,
        )?;
        Ok(record)
    }

    /// All records, most recent first. `id` breaks created_at ties so the
    /// order is total.
    pub fn list(&self, limit: Option<u32>, offset: Option<u32>) -> Result<Vec<ImageRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM images \
             ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(
            params![limit.map(i64::from).unwrap_or(-1), offset.unwrap_or(0)],
            record_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Records whose description or tags contain `term` as a case-insensitive
    /// substring, most recent first. A blank term matches everything and
    /// behaves exactly like [`ImageStore::list`] without pagination.
    pub fn search(&self, term: &str) -> Result<Vec<ImageRecord>> {
        if term.trim().is_empty() {
            return self.list(None, None);
        }
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM images \
             WHERE lower(coalesce(description, '')) LIKE ?1 ESCAPE '\\' \
                OR lower(coalesce(tags, '')) LIKE ?1 ESCAPE '\\' \
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([pattern], record_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Fetch a single record by id.
    pub fn get(&self, id: i64) -> Result<Option<ImageRecord>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM images WHERE id = ?1"),
                [id],
                record_from_row,
            )
            .optional()?)
    }

    /// Apply a partial metadata update. Returns false when no such record
    /// exists; on success `updated_at` is set to now. An update with no
    /// fields reports existence without touching the row. `stored_filename`
    /// and the artifact bytes are never touched by this path.
    pub fn update(&self, id: i64, update: RecordUpdate) -> Result<bool> {
        if update.description.is_none() && update.tags.is_none() {
            return Ok(self.get(id)?.is_some());
        }
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE images SET \
             description = CASE WHEN ?2 THEN ?3 ELSE description END, \
             tags = CASE WHEN ?4 THEN ?5 ELSE tags END, \
             updated_at = ?6 \
             WHERE id = ?1",
            params![
                id,
                update.description.is_some(),
                update.description,
                update.tags.is_some(),
                update.tags.as_deref().map(join_tags),
                format_ts(Utc::now()),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a record, returning the stored filename of the removed row so
    /// the caller can unlink the artifact. `None` when the id was not found.
    pub fn delete(&self, id: i64) -> Result<Option<String>> {
        let conn = self.lock();
        let filename: Option<String> = conn
            .query_row(
                "SELECT stored_filename FROM images WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        if filename.is_some() {
            conn.execute("DELETE FROM images WHERE id = ?1", [id])?;
        }
        Ok(filename)
    }

    /// Delete a record and its artifact file. Returns false when the id was
    /// not found. A failed unlink after the row delete committed is logged
    /// rather than surfaced: the record is gone either way, and the stray
    /// file is harmless.
    pub fn delete_with_artifact(&self, id: i64, artifact_root: &Path) -> Result<bool> {
        let Some(filename) = self.delete(id)? else {
            return Ok(false);
        };
        if let Err(e) = std::fs::remove_file(artifact_root.join(&filename)) {
            tracing::warn!(artifact = %filename, error = %e, "failed to remove artifact file");
        }
        Ok(true)
    }

    /// All distinct tag labels across every record, trimmed and sorted.
    ///
    /// Full-scan aggregation, O(records); fine at this system's scale.
    pub fn tags(&self) -> Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT tags FROM images WHERE tags IS NOT NULL")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut set = BTreeSet::new();
        for raw in rows {
            set.extend(parse_tags(&raw?));
        }
        Ok(set.into_iter().collect())
    }
}
