//! Path-level snapshot diffing.
//!
//! [`snapshot_diff`] decides what must be re-sent to the execution target
//! after an edit. It is pure, deterministic, order-independent, and total:
//! any two snapshots produce a diff, there is no failure mode.

use preview_types::{ContentSnapshot, ModuleSource, SnapshotDiff};

/// Compute the minimal set of path-level changes between two snapshots.
///
/// A path from `next` is included when it is absent from `previous` or when
/// its `code` differs by value. A change of the binary flag alone does not
/// gate inclusion. Paths present in `previous` but absent from `next` yield
/// `code: None` tombstones. Unchanged paths emit nothing.
///
/// An empty `previous` yields a diff equal to `next` in its entirety (full
/// sync).
pub fn snapshot_diff(previous: &ContentSnapshot, next: &ContentSnapshot) -> SnapshotDiff {
    let mut diff = SnapshotDiff::new();

    for (path, source) in next.iter() {
        match previous.get(path) {
            Some(prior) if prior.code == source.code => {}
            _ => diff.insert(path.clone(), source.clone()),
        }
    }

    for (path, _) in previous.iter() {
        if !next.contains(path) {
            diff.insert(path.clone(), ModuleSource::tombstone());
        }
    }

    diff
}

/// Apply a diff to a base snapshot: tombstones delete, everything else upserts.
///
/// `apply_diff(a, snapshot_diff(a, b))` reconstructs exactly the non-deleted
/// entries of `b`.
pub fn apply_diff(base: &ContentSnapshot, diff: &SnapshotDiff) -> ContentSnapshot {
    let mut result = base.clone();
    for (path, change) in diff.iter() {
        if change.is_tombstone() {
            result.remove(path);
        } else {
            result.insert(path.clone(), change.clone());
        }
    }
    result
}
