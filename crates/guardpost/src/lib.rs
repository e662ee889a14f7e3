//! Guardpost: incremental security-findings alerting.
//!
//! One run scans an object store prefix for findings written since the
//! last recorded run, turns each into a human-readable alert, and delivers
//! it through the notification channel. The watermark checkpoint advances
//! exactly once per run, after the full discovered set has been attempted,
//! so per-item failures never block progress and fatal scan failures never
//! lose it.
//!
//! Module map:
//! - [`store`]: object store seam (paginated list-by-prefix + fetch)
//! - [`checkpoint`]: the persisted watermark
//! - [`discovery`]: change detection against the watermark
//! - [`processor`]: per-item fetch and decode
//! - [`finding`]: parsed findings and derived alerts
//! - [`dispatch`]: channel delivery with local fallback
//! - [`pipeline`]: the run orchestrator

pub mod checkpoint;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod finding;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod store;
