//! Object store seam.
//!
//! The pipeline needs exactly two operations from its store: a paginated
//! list-by-prefix returning keys with modification times, and a body fetch.
//! `DirStore` is the production implementation over a local directory tree
//! (typically a mounted or synced bucket export). Polling a directory works
//! on network filesystems (SMB, NFS, S3-fuse) where inotify does not.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use thiserror::Error;
use walkdir::WalkDir;

/// Entries returned per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Errors from store listing and fetch calls.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// One listed object: key plus modification time in epoch seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntry {
    pub key: String,
    pub modified_at: f64,
}

/// One page of a listing. `next` is the continuation token for the
/// following page, `None` when the listing is exhausted.
#[derive(Debug, Default)]
pub struct ListPage {
    pub entries: Vec<StoreEntry>,
    pub next: Option<String>,
}

/// Minimal object-store surface consumed by the pipeline.
pub trait ObjectStore {
    /// One page of the listing under `prefix`. `after` is the continuation
    /// token from the previous page (exclusive start key).
    fn list_page(&self, prefix: &str, after: Option<&str>) -> Result<ListPage, StoreError>;

    /// Raw body of one object.
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}

/// Normalize a path to forward slashes so keys compare identically across
/// platforms.
fn normalize_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Directory-backed object store.
///
/// Keys are forward-slash relative paths under `root`. Listing order is
/// lexicographic by key, which keeps continuation tokens stable between
/// pages even if the tree changes mid-listing.
pub struct DirStore {
    root: PathBuf,
    page_size: usize,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(root: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            root: root.into(),
            page_size: page_size.max(1),
        }
    }

    /// Resolve a key to a path under the root, rejecting keys that would
    /// escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(StoreError::InvalidKey(key.to_string())),
            }
        }
        Ok(self.root.join(rel))
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<StoreEntry>, StoreError> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let key = entry
                .path()
                .strip_prefix(&self.root)
                .map(normalize_key)
                .unwrap_or_else(|_| normalize_key(entry.path()));
            if !key.starts_with(prefix) {
                continue;
            }
            let metadata = entry.metadata()?;
            let modified_at = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            entries.push(StoreEntry { key, modified_at });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

impl ObjectStore for DirStore {
    fn list_page(&self, prefix: &str, after: Option<&str>) -> Result<ListPage, StoreError> {
        let all = self.list_all(prefix)?;
        let mut remaining = all
            .into_iter()
            .skip_while(|e| after.is_some_and(|a| e.key.as_str() <= a));

        let entries: Vec<StoreEntry> = remaining.by_ref().take(self.page_size).collect();
        let next = if remaining.next().is_some() {
            entries.last().map(|e| e.key.clone())
        } else {
            None
        };
        Ok(ListPage { entries, next })
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}
