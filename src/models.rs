//! Data models for Box API responses and the catalog entries built from them.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// Kind of an item in a Box folder listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    File,
    Folder,
    WebLink,
    #[serde(other)]
    Other,
}

/// Reference to a parent folder.
#[derive(Debug, Clone, Deserialize)]
pub struct ParentRef {
    pub id: String,
}

/// Shared link as returned inside a file object.
#[derive(Debug, Clone, Deserialize)]
pub struct SharedLinkInfo {
    pub url: String,
}

/// A file or folder object as returned by the Box API.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<ParentRef>,
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub shared_link: Option<SharedLinkInfo>,
}

/// A page of items from a folder listing, search or upload.
#[derive(Debug, Deserialize)]
pub struct ItemCollection {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub entries: Vec<ItemRecord>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// OAuth2 error body.
#[derive(Debug, Default, Deserialize)]
pub struct TokenErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Whether a catalog entry is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

/// A single entry of a resource catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub parent_folder_id: String,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub kind: EntryKind,
    pub shared_link: Option<String>,
    pub size: Option<u64>,
}

impl FileEntry {
    /// Convert an API record into an entry.
    ///
    /// `listed_in` is the folder the record was listed from and stands in for
    /// a missing `parent`. Records that are neither files nor folders yield
    /// `None`.
    pub fn from_record(record: ItemRecord, listed_in: &str) -> Option<Self> {
        let kind = match record.kind {
            ItemKind::File => EntryKind::File,
            ItemKind::Folder => EntryKind::Folder,
            ItemKind::WebLink | ItemKind::Other => return None,
        };

        Some(Self {
            id: record.id,
            name: record.name,
            parent_folder_id: record
                .parent
                .map(|p| p.id)
                .unwrap_or_else(|| listed_in.to_string()),
            created_at: record.created_at,
            kind,
            shared_link: record.shared_link.map(|l| l.url),
            size: record.size,
        })
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    /// `created_at` in the RFC 3339 form persisted by the store.
    pub fn created_at_rfc3339(&self) -> Option<String> {
        self.created_at.map(|t| t.to_rfc3339())
    }
}

impl std::fmt::Display for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size_str = self
            .size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        let created = self
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(f, "{:<14} {:>10} {:<16} {}", self.id, size_str, created, self.name)?;
        if let Some(link) = &self.shared_link {
            write!(f, "\t{}", link)?;
        }
        Ok(())
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
