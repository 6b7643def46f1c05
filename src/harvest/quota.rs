//! Per-category quota accounting.
//!
//! Each category's running count is seeded from the files already present in
//! its output directory and incremented once per confirmed download. The disk
//! scan is the only cross-run state the harvester keeps; no index file is
//! written. Counters are only advanced by the orchestrator's control loop
//! after a batch has fully completed, so the tracker never sees concurrent
//! writers for the same category.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use parking_lot::RwLock;

/// Running count and target for one category.
#[derive(Debug, Clone, Copy)]
struct CategoryCount {
    count: usize,
    quota: usize,
}

/// Tracks how close each category is to its target image count.
#[derive(Debug, Default)]
pub struct QuotaTracker {
    counts: RwLock<HashMap<String, CategoryCount>>,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self {
            counts: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a category, seeding its count from what is already on disk.
    /// Re-seeding an existing slug resets it.
    pub fn seed(&self, slug: &str, quota: usize, on_disk: usize) {
        self.counts.write().insert(
            slug.to_string(),
            CategoryCount {
                count: on_disk,
                quota,
            },
        );
    }

    /// Records one confirmed successful download for the category.
    pub fn record_success(&self, slug: &str) {
        if let Some(entry) = self.counts.write().get_mut(slug) {
            entry.count += 1;
        }
    }

    /// Current count for the category, zero if it was never seeded.
    pub fn count(&self, slug: &str) -> usize {
        self.counts.read().get(slug).map_or(0, |e| e.count)
    }

    /// Whether the category has reached its quota. Advisory only: a batch
    /// already dispatched to the worker pool runs to completion, so the final
    /// count may overshoot by up to one batch width.
    pub fn is_satisfied(&self, slug: &str) -> bool {
        self.counts
            .read()
            .get(slug)
            .is_some_and(|e| e.count >= e.quota)
    }
}

/// Counts the regular files already present in a category directory. In-flight
/// `.part` leftovers from an interrupted transfer are not progress and are
/// excluded from the count.
pub fn count_existing_files(dir: &Path) -> io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.path().extension().is_some_and(|ext| ext == "part") {
            continue;
        }
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn seeding_and_recording_reach_quota() {
        let tracker = QuotaTracker::new();
        tracker.seed("sphynx", 5, 3);

        assert_eq!(tracker.count("sphynx"), 3);
        assert!(!tracker.is_satisfied("sphynx"));

        tracker.record_success("sphynx");
        tracker.record_success("sphynx");
        assert_eq!(tracker.count("sphynx"), 5);
        assert!(tracker.is_satisfied("sphynx"));

        // Overshoot is tolerated, the count keeps climbing monotonically.
        tracker.record_success("sphynx");
        assert_eq!(tracker.count("sphynx"), 6);
        assert!(tracker.is_satisfied("sphynx"));
    }

    #[test]
    fn seed_from_disk_satisfies_immediately() {
        let tracker = QuotaTracker::new();
        tracker.seed("persian", 200, 200);
        assert!(tracker.is_satisfied("persian"));
    }

    #[test]
    fn unknown_slug_counts_as_zero() {
        let tracker = QuotaTracker::new();
        assert_eq!(tracker.count("missing"), 0);
        assert!(!tracker.is_satisfied("missing"));
        // Recording against an unseeded slug is a no-op rather than a panic.
        tracker.record_success("missing");
        assert_eq!(tracker.count("missing"), 0);
    }

    #[test]
    fn existing_file_count_skips_directories_and_partials() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("b.png"), b"y").unwrap();
        fs::write(dir.path().join("c.jpg.part"), b"truncated").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(count_existing_files(dir.path()).unwrap(), 2);
    }
}
