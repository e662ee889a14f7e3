//! Run orchestration: Idle -> Scanning -> Finalizing.
//!
//! One invocation is one run. The watermark is read once at run start and
//! written exactly once at run end, set to the run's start time rather than
//! the newest entry's timestamp. That guards against clock skew between the
//! store and this host, at the cost of a small re-scan window each run.
//! Fatal discovery or checkpoint failures leave the watermark untouched so
//! the next run repeats the same window; per-item failures never do.

use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::checkpoint::{CheckpointStore, CheckpointWriteError, Watermark};
use crate::discovery;
use crate::dispatch::{DeliveryOutcome, Dispatcher};
use crate::finding::Alert;
use crate::processor;
use crate::store::{ObjectStore, StoreError};

/// Fatal run failures. Either way the watermark was not advanced past
/// anything unprocessed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] StoreError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointWriteError),
}

/// Per-run accounting, logged at the end of every run and optionally
/// emitted as JSON.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub candidates: usize,
    pub alerts_sent: usize,
    pub fallback_deliveries: usize,
    pub item_errors: usize,
    pub watermark: Watermark,
    pub duration_ms: u64,
}

impl RunReport {
    /// True when every discovered item produced a delivered (or locally
    /// emitted) alert.
    pub fn is_clean(&self) -> bool {
        self.item_errors == 0
    }
}

/// Execute one full pipeline run.
pub fn run_once(
    store: &dyn ObjectStore,
    checkpoint: &CheckpointStore,
    dispatcher: &mut Dispatcher<'_>,
    prefix: &str,
) -> Result<RunReport, PipelineError> {
    let started = Instant::now();
    let run_start: Watermark = Utc::now().timestamp_millis() as f64 / 1000.0;

    let since = checkpoint.read();
    info!(prefix, since, "Starting findings scan");

    // Idle -> Scanning. A listing failure aborts here, before any
    // watermark movement.
    let candidates = discovery::scan(store, prefix, since)?;
    if candidates.is_empty() {
        info!("No new findings detected");
    }

    let mut report = RunReport {
        candidates: candidates.len(),
        watermark: run_start,
        ..Default::default()
    };

    for entry in &candidates {
        info!(key = %entry.key, "Processing finding");
        match processor::process(store, entry) {
            Ok(finding) => {
                let alert = Alert::from_finding(&finding);
                match dispatcher.dispatch(&alert) {
                    DeliveryOutcome::Sent => report.alerts_sent += 1,
                    DeliveryOutcome::Fallback => report.fallback_deliveries += 1,
                }
            }
            Err(err) => {
                error!(key = %entry.key, error = %err, "Skipping finding");
                report.item_errors += 1;
            }
        }
    }

    // Scanning -> Finalizing. Unconditional once the discovered set is
    // exhausted: the watermark advances past failed items too.
    checkpoint.write(run_start)?;

    report.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        candidates = report.candidates,
        sent = report.alerts_sent,
        fallback = report.fallback_deliveries,
        item_errors = report.item_errors,
        watermark = report.watermark,
        duration_ms = report.duration_ms,
        "Run complete"
    );
    Ok(report)
}
