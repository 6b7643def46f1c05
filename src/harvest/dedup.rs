//! Run-wide URL deduplication.
//!
//! Every download worker must claim a URL here before fetching it. A claim is
//! an atomic check-and-insert: exactly one caller wins a previously unseen
//! URL, every other caller is told to drop it. Entries are never removed, and
//! the set is shared across all categories, so a URL surfacing again under a
//! different breed is still skipped.

use dashmap::DashSet;

/// Process-wide set of source URLs that have already been handed to a worker.
#[derive(Debug, Default)]
pub struct UrlDeduplicator {
    seen: DashSet<String>,
}

impl UrlDeduplicator {
    /// Creates an empty deduplicator for a fresh harvest run.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Atomically claims a URL, returning `true` only for the single caller
    /// that inserted it first. A rejected URL is not retried or re-queued.
    pub fn claim(&self, url: &str) -> bool {
        self.seen.insert(url.to_string())
    }

    /// Number of distinct URLs seen so far this run.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
