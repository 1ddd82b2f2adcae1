//! Recursive folder traversal, extension filtering and shared-link annotation.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::fetcher::AuthorizedFetcher;
use crate::models::{FileEntry, ItemRecord};

/// Marker stored in `shared_link` when creating the link failed.
pub const SHARED_LINK_FAILED: &str = "link-creation-failed";

/// Default limit on folder nesting below the root.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Extensions of the image viewer pages.
pub const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

/// Extensions of the text viewer pages.
pub const TEXT_EXTENSIONS: [&str; 1] = [".txt"];

/// A set of lower-cased file name suffixes, each starting with a dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSet {
    suffixes: Vec<String>,
}

impl ExtensionSet {
    /// Build a set from `jpg`, `.JPG` style values. Empty values are ignored.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut suffixes: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().to_lowercase();
            if ext.is_empty() || ext == "." {
                continue;
            }
            let ext = if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            };
            if !suffixes.contains(&ext) {
                suffixes.push(ext);
            }
        }
        Self { suffixes }
    }

    pub fn images() -> Self {
        Self::new(IMAGE_EXTENSIONS)
    }

    pub fn text() -> Self {
        Self::new(TEXT_EXTENSIONS)
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Case-insensitive suffix match against a file name.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.suffixes.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

/// Keep the entries whose name ends with one of `extensions`, in order.
pub fn filter_by_extension(entries: &[FileEntry], extensions: &ExtensionSet) -> Vec<FileEntry> {
    entries
        .iter()
        .filter(|entry| extensions.matches(&entry.name))
        .cloned()
        .collect()
}

/// Create an open shared link for every entry.
///
/// A failed link does not stop the batch: the entry gets
/// [`SHARED_LINK_FAILED`] instead. Returns the number of failures.
pub async fn annotate_shared_links(fetcher: &AuthorizedFetcher, entries: &mut [FileEntry]) -> usize {
    let mut failures = 0;

    for entry in entries.iter_mut() {
        match fetcher.create_shared_link(&entry.id).await {
            Ok(url) => entry.shared_link = Some(url),
            Err(e) => {
                warn!(file_id = %entry.id, name = %entry.name, error = %e, "Shared link creation failed");
                entry.shared_link = Some(SHARED_LINK_FAILED.to_string());
                failures += 1;
            }
        }
    }

    info!(total = entries.len(), failures, "Annotated shared links");
    failures
}

/// Options for [`ResourceCatalog::build`].
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Fetch full metadata for every file instead of trusting the listing.
    pub fetch_metadata: bool,
    /// Folders nested deeper than this below the root are not expanded.
    pub max_depth: usize,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            fetch_metadata: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// One folder being walked: its remaining items and its depth.
struct Frame {
    folder_id: String,
    pending: VecDeque<ItemRecord>,
    depth: usize,
}

/// Builds the flat list of files reachable from a root folder.
pub struct ResourceCatalog<'a> {
    fetcher: &'a AuthorizedFetcher,
    options: CatalogOptions,
}

impl<'a> ResourceCatalog<'a> {
    pub fn new(fetcher: &'a AuthorizedFetcher, options: CatalogOptions) -> Self {
        Self { fetcher, options }
    }

    /// Walk the tree below `root_folder_id` and return its files.
    ///
    /// Files come out in listing order, with a subfolder's files at the
    /// position of the subfolder. Failing to list the root is an error;
    /// failing to list a subfolder only drops that subtree.
    pub async fn build(&self, root_folder_id: &str) -> Result<Vec<FileEntry>, FetchError> {
        let root_items = self.fetcher.list_folder(root_folder_id).await?;

        let mut visited_folders: HashSet<String> = HashSet::new();
        visited_folders.insert(root_folder_id.to_string());
        let mut seen_files: HashSet<String> = HashSet::new();
        let mut entries = Vec::new();

        let mut stack = vec![Frame {
            folder_id: root_folder_id.to_string(),
            pending: root_items.into(),
            depth: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(record) = frame.pending.pop_front() else {
                stack.pop();
                continue;
            };
            let depth = frame.depth;
            let listed_in = frame.folder_id.clone();

            let Some(entry) = FileEntry::from_record(record, &listed_in) else {
                continue;
            };

            if entry.is_folder() {
                if !visited_folders.insert(entry.id.clone()) {
                    warn!(folder_id = %entry.id, "Folder already visited, skipping");
                    continue;
                }
                if depth + 1 > self.options.max_depth {
                    warn!(folder_id = %entry.id, max_depth = self.options.max_depth, "Folder too deep, skipping");
                    continue;
                }
                match self.fetcher.list_folder(&entry.id).await {
                    Ok(items) => stack.push(Frame {
                        folder_id: entry.id,
                        pending: items.into(),
                        depth: depth + 1,
                    }),
                    Err(e) => {
                        warn!(folder_id = %entry.id, error = %e, "Listing subfolder failed, skipping");
                    }
                }
                continue;
            }

            if !seen_files.insert(entry.id.clone()) {
                debug!(file_id = %entry.id, "Duplicate file entry, skipping");
                continue;
            }

            let entry = if self.options.fetch_metadata {
                self.with_metadata(entry, &listed_in).await
            } else {
                entry
            };
            entries.push(entry);
        }

        info!(root_folder_id, files = entries.len(), "Built catalog");
        Ok(entries)
    }

    async fn with_metadata(&self, entry: FileEntry, listed_in: &str) -> FileEntry {
        match self.fetcher.file_info(&entry.id).await {
            Ok(record) => match FileEntry::from_record(record, listed_in) {
                Some(full) => full,
                None => entry,
            },
            Err(e) => {
                warn!(file_id = %entry.id, error = %e, "Fetching file metadata failed, keeping listing data");
                entry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryKind;

    fn entry(id: &str, name: &str) -> FileEntry {
        FileEntry {
            id: id.to_string(),
            name: name.to_string(),
            parent_folder_id: "0".to_string(),
            created_at: None,
            kind: EntryKind::File,
            shared_link: None,
            size: None,
        }
    }

    #[test]
    fn test_extension_set_normalizes() {
        let set = ExtensionSet::new(["JPG", ".png", " gif ", "", ".png"]);
        assert_eq!(set.suffixes(), &[".jpg", ".png", ".gif"]);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let entries = vec![entry("1", "A.JPG"), entry("2", "b.txt"), entry("3", "c.Png")];
        let filtered = filter_by_extension(&entries, &ExtensionSet::images());
        let names: Vec<&str> = filtered.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A.JPG", "c.Png"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let entries = vec![
            entry("1", "a.jpg"),
            entry("2", "b.txt"),
            entry("3", "notes.txt.bak"),
            entry("4", "c.gif"),
        ];
        let set = ExtensionSet::images();
        let once = filter_by_extension(&entries, &set);
        let twice = filter_by_extension(&once, &set);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_suffix_must_match_end_of_name() {
        let set = ExtensionSet::text();
        assert!(set.matches("readme.TXT"));
        assert!(!set.matches("readme.txt.bak"));
        assert!(!set.matches("txt"));
    }
}
