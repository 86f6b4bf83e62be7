//! Content snapshots and path-level diffs.
//!
//! A [`ContentSnapshot`] is the full mapping of project paths to source
//! content at one instant. A [`SnapshotDiff`] carries only the paths that
//! changed between two snapshots; a `code: None` entry is a tombstone
//! meaning "deleted since the previous snapshot".
//!
//! Snapshots and diffs are created and discarded per execution cycle and
//! never persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source content for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSource {
    /// The source text, or `None` as a deletion tombstone.
    pub code: Option<String>,
    /// Whether the path holds binary content (a URL reference, not text).
    #[serde(default, rename = "isBinary")]
    pub is_binary: bool,
}

impl ModuleSource {
    /// Text content.
    pub fn text(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            is_binary: false,
        }
    }

    /// Binary content (code holds the resource URL).
    pub fn binary(url: impl Into<String>) -> Self {
        Self {
            code: Some(url.into()),
            is_binary: true,
        }
    }

    /// Deletion tombstone.
    pub fn tombstone() -> Self {
        Self {
            code: None,
            is_binary: false,
        }
    }

    /// Whether this entry marks a deletion.
    pub fn is_tombstone(&self) -> bool {
        self.code.is_none()
    }
}

/// Full mapping of absolute project paths to current content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentSnapshot(BTreeMap<String, ModuleSource>);

impl ContentSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace content at a path.
    pub fn insert(&mut self, path: impl Into<String>, source: ModuleSource) {
        self.0.insert(path.into(), source);
    }

    /// Get the content at a path.
    pub fn get(&self, path: &str) -> Option<&ModuleSource> {
        self.0.get(path)
    }

    /// Whether the snapshot has an entry at the path.
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    /// Remove the entry at a path.
    pub fn remove(&mut self, path: &str) -> Option<ModuleSource> {
        self.0.remove(path)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(path, source)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModuleSource)> {
        self.0.iter()
    }

    /// Inject a synthetic manifest entry at `path` unless one already exists.
    ///
    /// Execution requests always carry a manifest; projects without one get
    /// a generated stand-in so the target can resolve the entry point.
    pub fn ensure_manifest(&mut self, path: &str, generated: impl Into<String>) {
        if !self.0.contains_key(path) {
            self.0.insert(path.to_string(), ModuleSource::text(generated));
        }
    }
}

impl FromIterator<(String, ModuleSource)> for ContentSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, ModuleSource)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ContentSnapshot {
    type Item = (String, ModuleSource);
    type IntoIter = std::collections::btree_map::IntoIter<String, ModuleSource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Path-level changes between two snapshots.
///
/// Same entry shape as a snapshot, but carrying only new, changed, or
/// removed paths. Key order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotDiff(BTreeMap<String, ModuleSource>);

impl SnapshotDiff {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change at a path.
    pub fn insert(&mut self, path: impl Into<String>, source: ModuleSource) {
        self.0.insert(path.into(), source);
    }

    /// Get the change at a path.
    pub fn get(&self, path: &str) -> Option<&ModuleSource> {
        self.0.get(path)
    }

    /// Number of changed paths.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(path, change)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModuleSource)> {
        self.0.iter()
    }
}

impl FromIterator<(String, ModuleSource)> for SnapshotDiff {
    fn from_iter<I: IntoIterator<Item = (String, ModuleSource)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for SnapshotDiff {
    type Item = (String, ModuleSource);
    type IntoIter = std::collections::btree_map::IntoIter<String, ModuleSource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_source_serializes_binary_flag_camel_case() {
        let source = ModuleSource::binary("https://cdn.example/logo.png");
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["isBinary"], true);
        assert_eq!(json["code"], "https://cdn.example/logo.png");
    }

    #[test]
    fn tombstone_has_null_code() {
        let json = serde_json::to_value(ModuleSource::tombstone()).unwrap();
        assert!(json["code"].is_null());
        assert!(ModuleSource::tombstone().is_tombstone());
        assert!(!ModuleSource::text("x").is_tombstone());
    }

    #[test]
    fn snapshot_serializes_as_plain_map() {
        let snapshot: ContentSnapshot =
            [("/a.js".to_string(), ModuleSource::text("1"))].into_iter().collect();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["/a.js"]["code"], "1");
    }

    #[test]
    fn ensure_manifest_injects_when_absent() {
        let mut snapshot = ContentSnapshot::new();
        snapshot.insert("/index.js", ModuleSource::text("render()"));
        snapshot.ensure_manifest("/package.json", "{\"main\":\"/index.js\"}");

        assert!(snapshot.contains("/package.json"));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn ensure_manifest_keeps_existing_entry() {
        let mut snapshot = ContentSnapshot::new();
        snapshot.insert("/package.json", ModuleSource::text("{\"name\":\"real\"}"));
        snapshot.ensure_manifest("/package.json", "{\"name\":\"synthetic\"}");

        assert_eq!(
            snapshot.get("/package.json").unwrap().code.as_deref(),
            Some("{\"name\":\"real\"}")
        );
    }

    #[test]
    fn diff_starts_empty() {
        assert!(SnapshotDiff::new().is_empty());
        assert_eq!(SnapshotDiff::new().len(), 0);
    }
}
