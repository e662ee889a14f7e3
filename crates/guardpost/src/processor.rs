//! Per-item fetch and decode with isolated failure handling.

use thiserror::Error;

use crate::discovery::Candidate;
use crate::finding::Finding;
use crate::store::{ObjectStore, StoreError};

/// Why one candidate failed. Item errors never abort the run; the
/// orchestrator logs them and moves on. Once the watermark advances past
/// a failed item it is permanently skipped (no retry ledger).
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] StoreError),

    #[error("malformed finding: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fetch one candidate's body and decode it into a finding.
pub fn process(store: &dyn ObjectStore, entry: &Candidate) -> Result<Finding, ItemError> {
    let raw = store.fetch(&entry.key)?;
    let finding = Finding::from_bytes(&raw)?;
    Ok(finding)
}
