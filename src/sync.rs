//! Mirroring a catalog into a database file stored on Box.
//!
//! The remote file is found by name, downloaded, updated and uploaded again.
//! The search-then-create sequence is not atomic: two sessions syncing the
//! same name at once can both create a file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info};

use crate::error::SyncError;
use crate::fetcher::AuthorizedFetcher;
use crate::models::{FileEntry, ItemCollection, ItemKind, ItemRecord};
use crate::store::{CatalogStore, TABLE_NAME};

/// Default name of the remote database file.
pub const DEFAULT_DB_NAME: &str = "box_files.db";

/// What to do when the remote database already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Upsert into the existing file and upload it as a new version.
    #[default]
    Replace,
    /// Leave the existing file alone and upload a fresh, timestamped copy.
    Snapshot,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub db_name: String,
    /// Folder new database files are uploaded into.
    pub folder_id: String,
    pub mode: SyncMode,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            db_name: DEFAULT_DB_NAME.to_string(),
            folder_id: "0".to_string(),
            mode: SyncMode::Replace,
        }
    }
}

/// Outcome of a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub file_id: String,
    pub file_name: String,
    pub rows_written: usize,
    /// Whether a new remote file was created.
    pub created: bool,
}

pub struct SyncOrchestrator<'a> {
    fetcher: &'a AuthorizedFetcher,
    options: SyncOptions,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(fetcher: &'a AuthorizedFetcher, options: SyncOptions) -> Self {
        Self { fetcher, options }
    }

    /// Write `catalog` into the remote database, creating it if needed.
    ///
    /// Local changes are not rolled back when the upload fails.
    pub async fn sync(&self, catalog: &[FileEntry]) -> Result<SyncReport, SyncError> {
        let results = self.search_remote().await?;
        let existing = results
            .iter()
            .find(|r| r.kind == ItemKind::File && r.name == self.options.db_name);
        debug!(db_name = %self.options.db_name, found = existing.is_some(), "Searched for remote database");

        let workdir = tempfile::tempdir()?;

        match (existing, self.options.mode) {
            (None, _) => {
                let name = self.options.db_name.clone();
                self.create(catalog, &name, workdir.path()).await
            }
            (Some(_), SyncMode::Snapshot) => {
                let taken: Vec<String> = results.iter().map(|r| r.name.clone()).collect();
                let name = snapshot_name(&self.options.db_name, Local::now().naive_local(), &taken);
                self.create(catalog, &name, workdir.path()).await
            }
            (Some(remote), SyncMode::Replace) => {
                self.update(catalog, remote, workdir.path()).await
            }
        }
    }

    /// Search results are fuzzy; callers match names themselves.
    async fn search_remote(&self) -> Result<Vec<ItemRecord>, SyncError> {
        let db_name = &self.options.db_name;
        self.fetcher
            .search(db_name, extension_of(db_name))
            .await
            .map_err(SyncError::Search)
    }

    async fn create(
        &self,
        catalog: &[FileEntry],
        file_name: &str,
        workdir: &Path,
    ) -> Result<SyncReport, SyncError> {
        let local_path = working_copy(workdir);
        let rows_written = write_rows(&local_path, catalog)?;
        let content = fs::read(&local_path)?;

        let uploaded = self
            .fetcher
            .upload_new(&self.options.folder_id, file_name, content)
            .await
            .map_err(SyncError::Upload)?;
        let file_id = uploaded_file_id(uploaded)?;

        info!(file_id = %file_id, file_name, rows_written, "Created remote database");
        Ok(SyncReport {
            file_id,
            file_name: file_name.to_string(),
            rows_written,
            created: true,
        })
    }

    async fn update(
        &self,
        catalog: &[FileEntry],
        remote: &ItemRecord,
        workdir: &Path,
    ) -> Result<SyncReport, SyncError> {
        let content = self
            .fetcher
            .file_content(&remote.id)
            .await
            .map_err(SyncError::Download)?;

        let local_path = working_copy(workdir);
        fs::write(&local_path, &content)?;
        let rows_written = write_rows(&local_path, catalog)?;
        let content = fs::read(&local_path)?;

        let uploaded = self
            .fetcher
            .upload_version(&remote.id, &remote.name, content)
            .await
            .map_err(SyncError::Upload)?;
        let file_id = uploaded_file_id(uploaded)?;

        info!(file_id = %file_id, file_name = %remote.name, rows_written, "Updated remote database");
        Ok(SyncReport {
            file_id,
            file_name: remote.name.clone(),
            rows_written,
            created: false,
        })
    }
}

/// Local path of the database being edited. Remote names never become path segments.
fn working_copy(workdir: &Path) -> PathBuf {
    workdir.join(format!("{}.db", TABLE_NAME))
}

fn write_rows(path: &Path, catalog: &[FileEntry]) -> Result<usize, SyncError> {
    let mut store = CatalogStore::open(path)?;
    let rows = store.upsert_all(catalog)?;
    store.close()?;
    Ok(rows)
}

fn uploaded_file_id(uploaded: ItemCollection) -> Result<String, SyncError> {
    uploaded
        .entries
        .into_iter()
        .next()
        .map(|r| r.id)
        .ok_or(SyncError::UnexpectedUploadResponse)
}

fn extension_of(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("db")
}

/// Name for a timestamped copy of `base`, e.g. `box_files_20240501_093000_01.db`.
///
/// The counter starts at 1 and is bumped until the name is not in `taken`.
pub fn snapshot_name(base: &str, now: NaiveDateTime, taken: &[String]) -> String {
    let stem = base.split('.').next().unwrap_or(base);
    let extension = extension_of(base);
    let timestamp = now.format("%Y%m%d_%H%M%S");

    let mut counter = 1u32;
    loop {
        let candidate = format!("{}_{}_{:02}.{}", stem, timestamp, counter, extension);
        if !taken.iter().any(|name| *name == candidate) {
            return candidate;
        }
        counter += 1;
    }
}
