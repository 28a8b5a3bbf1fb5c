//! # Archive Differ
//!
//! Classifies a fresh scan against the manifest of the previously built cook
//! database. Sizes are compared against the *original* size kept in each
//! entry's side-channel comment, so payloads are never re-read or hashed.

use crate::archive::cookdb::CookManifest;
use crate::common::FileRecord;

use serde::Serialize;
use std::collections::HashSet;

/// Outcome of one diff pass.
///
/// `uncooked` holds every added or changed file in scan order, i.e. every
/// file that needs a (re-)cook this pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
    pub uncooked: Vec<String>,
}

impl DiffResult {
    fn clear(&mut self) {
        self.added.clear();
        self.changed.clear();
        self.deleted.clear();
        self.uncooked.clear();
    }

    /// True when nothing needs cooking or tombstoning.
    pub fn is_clean(&self) -> bool {
        self.uncooked.is_empty() && self.deleted.is_empty()
    }
}

/// Stateless between calls apart from the reused result buffers.
#[derive(Debug, Clone)]
pub struct ArchiveDiffer {
    stamp_epsilon: u64,
    result: DiffResult,
}

impl ArchiveDiffer {
    /// `stamp_epsilon` is the tolerated timestamp difference; it absorbs
    /// filesystem and archive timestamp quantization.
    pub fn new(stamp_epsilon: u64) -> Self {
        Self { stamp_epsilon, result: DiffResult::default() }
    }

    pub fn result(&self) -> &DiffResult {
        &self.result
    }

    /// Compares `now` against `previous`. All four lists are cleared first.
    pub fn diff(&mut self, previous: Option<&CookManifest>, now: &[FileRecord]) -> &DiffResult {
        self.result.clear();

        let Some(previous) = previous else {
            for record in now {
                self.result.added.push(record.path.clone());
                self.result.uncooked.push(record.path.clone());
            }
            return &self.result;
        };

        for record in now {
            let meta = previous
                .find(&record.path)
                .and_then(|entry| entry.original_size.map(|size| (size, entry.stamp)));
            match meta {
                None => {
                    self.result.added.push(record.path.clone());
                    self.result.uncooked.push(record.path.clone());
                }
                Some((old_size, old_stamp)) => {
                    if old_size != record.size || old_stamp.abs_diff(record.stamp) > self.stamp_epsilon {
                        tracing::debug!(
                            path = %record.path,
                            old_size, new_size = record.size, old_stamp, new_stamp = record.stamp,
                            "source changed"
                        );
                        self.result.changed.push(record.path.clone());
                        self.result.uncooked.push(record.path.clone());
                    }
                }
            }
        }

        let current: HashSet<&str> = now.iter().map(|r| r.path.as_str()).collect();
        let mut seen = HashSet::new();
        for entry in previous.entries() {
            if !seen.insert(entry.name.as_str()) {
                continue;
            }
            // Latest version decides: a tombstone hides earlier payloads.
            let Some(latest) = previous.find(&entry.name) else { continue };
            if latest.size == 0 {
                continue;
            }
            if !current.contains(latest.name.as_str()) {
                self.result.deleted.push(latest.name.clone());
            }
        }

        &self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::cookdb::ArchivedEntry;

    fn record(path: &str, size: u64, stamp: u64) -> FileRecord {
        FileRecord { path: path.into(), size, stamp }
    }

    fn archived(name: &str, original: Option<u64>, stamp: u64, size: u64) -> ArchivedEntry {
        ArchivedEntry { name: name.into(), original_size: original, stamp, size }
    }

    #[test]
    fn without_previous_archive_everything_is_added() {
        let mut differ = ArchiveDiffer::new(1);
        let now = vec![record("a.txt", 10, 20240101000000), record("b.txt", 3, 20240101000000)];
        let result = differ.diff(None, &now);
        assert_eq!(result.added, vec!["a.txt", "b.txt"]);
        assert_eq!(result.uncooked, vec!["a.txt", "b.txt"]);
        assert!(result.changed.is_empty() && result.deleted.is_empty());
    }

    #[test]
    fn unchanged_within_stamp_tolerance_is_omitted() {
        let manifest = CookManifest::from_entries(vec![archived("a.txt", Some(10), 20240101000000, 10)]);
        let mut differ = ArchiveDiffer::new(1);
        let result = differ.diff(Some(&manifest), &[record("a.txt", 10, 20240101000001)]);
        assert!(result.is_clean());
    }

    #[test]
    fn size_change_alone_is_detected() {
        let manifest = CookManifest::from_entries(vec![archived("a.txt", Some(10), 20240101000000, 10)]);
        let mut differ = ArchiveDiffer::new(1);
        let result = differ.diff(Some(&manifest), &[record("a.txt", 12, 20240101000000)]);
        assert_eq!(result.changed, vec!["a.txt"]);
        assert_eq!(result.uncooked, vec!["a.txt"]);
    }

    #[test]
    fn stamp_beyond_tolerance_is_changed_and_epsilon_is_configurable() {
        let manifest = CookManifest::from_entries(vec![archived("a.txt", Some(10), 20240101000000, 10)]);
        let now = [record("a.txt", 10, 20240101000005)];
        assert_eq!(ArchiveDiffer::new(1).diff(Some(&manifest), &now).changed, vec!["a.txt"]);
        assert!(ArchiveDiffer::new(10).diff(Some(&manifest), &now).is_clean());
    }

    #[test]
    fn entries_without_metadata_count_as_absent() {
        let manifest = CookManifest::from_entries(vec![archived("a.txt", None, 20240101000000, 10)]);
        let mut differ = ArchiveDiffer::new(1);
        let result = differ.diff(Some(&manifest), &[record("a.txt", 10, 20240101000000)]);
        assert_eq!(result.added, vec!["a.txt"]);
    }

    #[test]
    fn deleted_sources_are_reported_once_and_tombstones_are_ignored() {
        let manifest = CookManifest::from_entries(vec![
            archived("gone.txt", Some(4), 20240101000000, 4),
            archived("gone.txt", Some(4), 20240101000000, 4),
            archived("buried.txt", Some(4), 20240101000000, 4),
            archived("buried.txt", Some(0), 20240101000000, 0),
            archived("kept.txt", Some(1), 20240101000000, 1),
        ]);
        let mut differ = ArchiveDiffer::new(1);
        let result = differ.diff(Some(&manifest), &[record("kept.txt", 1, 20240101000000)]);
        assert_eq!(result.deleted, vec!["gone.txt"]);
        assert!(result.uncooked.is_empty());
    }

    #[test]
    fn lists_are_rebuilt_every_call() {
        let mut differ = ArchiveDiffer::new(1);
        differ.diff(None, &[record("a.txt", 1, 1)]);
        let result = differ.diff(None, &[]);
        assert!(result.added.is_empty());
        assert!(result.uncooked.is_empty());
    }
}
