//! Change detection over the object store listing.
//!
//! One scan walks the full paginated listing under the configured prefix,
//! then keeps the entries modified strictly after the watermark. The full
//! listing must complete: an incomplete walk would break the "processed
//! everything up to the watermark" guarantee, so listing errors abort the
//! run. Entries come back in the store's native listing order; the
//! pipeline needs completeness, not chronological order.

use tracing::debug;

use crate::checkpoint::Watermark;
use crate::store::{ObjectStore, StoreError};

/// A store object discovered as newer than the watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: String,
    pub modified_at: f64,
}

/// List every entry under `prefix` and keep those with
/// `modified_at > since`.
pub fn scan(
    store: &dyn ObjectStore,
    prefix: &str,
    since: Watermark,
) -> Result<Vec<Candidate>, StoreError> {
    let mut all = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let page = store.list_page(prefix, after.as_deref())?;
        all.extend(page.entries);
        match page.next {
            Some(token) => after = Some(token),
            None => break,
        }
    }

    let total = all.len();
    let candidates: Vec<Candidate> = all
        .into_iter()
        .filter(|e| e.modified_at > since)
        .map(|e| Candidate {
            key: e.key,
            modified_at: e.modified_at,
        })
        .collect();

    debug!(prefix, total, new = candidates.len(), since, "Listing complete");
    Ok(candidates)
}
