//! Local SQLite mirror of catalog entries.

use std::path::Path;

use chrono::DateTime;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Result};
use tracing::debug;

use crate::models::{EntryKind, FileEntry};

/// Table holding one row per catalog file.
pub const TABLE_NAME: &str = "box_files";

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS box_files (
        id TEXT PRIMARY KEY,
        name TEXT,
        folder_id TEXT,
        created_at TEXT,
        shared_link TEXT
    )";

const UPSERT_ROW: &str = "
    INSERT OR REPLACE INTO box_files (id, name, folder_id, created_at, shared_link)
    VALUES (?1, ?2, ?3, ?4, ?5)";

/// Column names and stringified values of a table, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// A `box_files` database file.
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    /// Open (or create) a database file and make sure the table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!(path = %path.as_ref().display(), "Opening catalog store");
        let conn = Connection::open(path)?;
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self { conn })
    }

    /// Open an existing database without creating or changing anything.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn })
    }

    /// In-memory store, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self { conn })
    }

    /// Insert an entry, fully replacing any row with the same id.
    pub fn upsert(&self, entry: &FileEntry) -> Result<()> {
        self.conn.execute(
            UPSERT_ROW,
            params![
                entry.id,
                entry.name,
                entry.parent_folder_id,
                entry.created_at_rfc3339(),
                entry.shared_link,
            ],
        )?;
        Ok(())
    }

    /// Upsert every entry in a single transaction.
    pub fn upsert_all(&mut self, entries: &[FileEntry]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_ROW)?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    entry.name,
                    entry.parent_folder_id,
                    entry.created_at_rfc3339(),
                    entry.shared_link,
                ])?;
            }
        }
        tx.commit()?;
        debug!(rows = entries.len(), "Upserted catalog rows");
        Ok(entries.len())
    }

    /// Look up a single row by id.
    pub fn get(&self, id: &str) -> Result<Option<FileEntry>> {
        self.conn
            .query_row(
                "SELECT id, name, folder_id, created_at, shared_link FROM box_files WHERE id = ?1",
                [id],
                row_to_entry,
            )
            .optional()
    }

    /// Every row, ordered by id.
    pub fn entries(&self) -> Result<Vec<FileEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, folder_id, created_at, shared_link FROM box_files ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_entry)?;
        rows.collect()
    }

    pub fn count(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM box_files", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
    }

    /// Names of the user tables in the database.
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        names.collect()
    }

    /// All rows of any table, for inspection.
    ///
    /// Returns `Ok(None)` when `table` is not one of [`CatalogStore::tables`].
    pub fn table_rows(&self, table: &str) -> Result<Option<TableRows>> {
        if !self.tables()?.iter().any(|t| t == table) {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM \"{}\"", table.replace('"', "\"\"")))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let rows = stmt.query_map([], |row| {
            (0..column_count)
                .map(|i| row.get_ref(i).map(value_to_string))
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(Some(TableRows {
            columns,
            rows: rows.collect::<Result<Vec<_>>>()?,
        }))
    }

    /// Close the connection, flushing everything to disk.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<FileEntry> {
    let created_at: Option<String> = row.get(3)?;
    Ok(FileEntry {
        id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        parent_folder_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        created_at: created_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()),
        kind: EntryKind::File,
        shared_link: row.get(4)?,
        size: None,
    })
}

fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(format!("<{} bytes>", b.len())),
    }
}
