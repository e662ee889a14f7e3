//! Watermark checkpoint persistence.
//!
//! A single file holds the cutoff timestamp of the last successful run.
//! Reads never fail the run: a missing or corrupt checkpoint means "no
//! prior run" and the pipeline starts from epoch zero. Writes are the
//! finalize step of a run and are fatal if they cannot complete, so an
//! advance is never lost silently.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

/// Cutoff timestamp in epoch seconds. Everything with a modification time
/// at or before this value has already been processed.
pub type Watermark = f64;

#[derive(Debug, Error)]
#[error("checkpoint write to '{path}' failed: {source}")]
pub struct CheckpointWriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// File-backed store for the single watermark value.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the persisted watermark, or zero when none exists.
    ///
    /// Unreadable and unparseable checkpoints are treated the same as a
    /// missing one; the next run re-scans from the start rather than
    /// refusing to run.
    pub fn read(&self) -> Watermark {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return 0.0,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Checkpoint unreadable, treating as first run");
                return 0.0;
            }
        };
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => value,
            _ => {
                warn!(path = %self.path.display(), "Checkpoint corrupt, treating as first run");
                0.0
            }
        }
    }

    /// Durably overwrite the watermark.
    ///
    /// Written to a sibling temp file and renamed into place so a crash
    /// mid-write leaves the previous value intact.
    pub fn write(&self, watermark: Watermark) -> Result<(), CheckpointWriteError> {
        self.write_inner(watermark).map_err(|source| CheckpointWriteError {
            path: self.path.clone(),
            source,
        })
    }

    fn write_inner(&self, watermark: Watermark) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        write!(file, "{watermark}")?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_checkpoint_reads_zero() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("last_run"));
        assert_eq!(store.read(), 0.0);
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("last_run"));
        store.write(1724500000.25).unwrap();
        assert_eq!(store.read(), 1724500000.25);
    }

    #[test]
    fn corrupt_checkpoint_reads_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_run");
        fs::write(&path, "not-a-number").unwrap();
        let store = CheckpointStore::new(&path);
        assert_eq!(store.read(), 0.0);
    }

    #[test]
    fn negative_checkpoint_reads_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_run");
        fs::write(&path, "-12.5").unwrap();
        let store = CheckpointStore::new(&path);
        assert_eq!(store.read(), 0.0);
    }

    #[test]
    fn write_overwrites_prior_value() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("last_run"));
        store.write(1000.0).unwrap();
        store.write(2000.0).unwrap();
        assert_eq!(store.read(), 2000.0);
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("state/nested/last_run"));
        store.write(42.0).unwrap();
        assert_eq!(store.read(), 42.0);
    }

    #[test]
    fn write_fails_when_parent_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("state");
        fs::write(&blocker, "file, not dir").unwrap();
        let store = CheckpointStore::new(blocker.join("last_run"));
        assert!(store.write(1.0).is_err());
    }
}
