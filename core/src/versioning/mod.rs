//! File versions: immutable snapshots of a localisation file's entries, the
//! key-level diff between two of them, and on-disk snapshot storage.

pub mod diff;
pub mod store;

use crate::formats::LocalizationEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub use diff::{
    apply_comparison_results, batch_update_translations, compare_versions,
    entries_needing_review, filter_by_change_type, generate_report, ChangeType, ComparisonEntry,
    ComparisonResult,
};
pub use store::{SnapshotError, SnapshotStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub id: Uuid,
    pub file_path: PathBuf,
    pub game_version: String,
    pub import_date: DateTime<Utc>,
    pub entries: Vec<LocalizationEntry>,
    /// Hash over `key:source` pairs, see [`entries_hash`].
    pub file_hash: String,
    pub file_size: u64,
    #[serde(default)]
    pub notes: String,
}

impl FileVersion {
    /// Snapshot `entries` as they are now. The size is read from disk when
    /// `file_path` exists.
    pub fn capture(
        file_path: impl Into<PathBuf>,
        game_version: &str,
        entries: Vec<LocalizationEntry>,
        notes: &str,
    ) -> Self {
        let file_path = file_path.into();
        let file_size = std::fs::metadata(&file_path)
            .map(|meta| meta.len())
            .unwrap_or(0);
        Self {
            id: Uuid::new_v4(),
            file_hash: entries_hash(&entries),
            file_path,
            game_version: game_version.to_string(),
            import_date: Utc::now(),
            entries,
            file_size,
            notes: notes.to_string(),
        }
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.file_path)
    }

    pub fn reference(&self) -> VersionRef {
        VersionRef {
            id: self.id,
            file_path: self.file_path.clone(),
            game_version: self.game_version.clone(),
            import_date: self.import_date,
            file_hash: self.file_hash.clone(),
            entry_count: self.entries.len(),
        }
    }
}

/// Identifying details of a version, without its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRef {
    pub id: Uuid,
    pub file_path: PathBuf,
    pub game_version: String,
    pub import_date: DateTime<Utc>,
    pub file_hash: String,
    pub entry_count: usize,
}

/// SHA-256 hex of `key:source` pairs joined by `|`.
///
/// Formatting of the raw file does not affect the hash.
pub fn entries_hash(entries: &[LocalizationEntry]) -> String {
    let mut hasher = Sha256::new();
    for (idx, entry) in entries.iter().enumerate() {
        if idx > 0 {
            hasher.update(b"|");
        }
        hasher.update(entry.key.as_bytes());
        hasher.update(b":");
        hasher.update(entry.source_text.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::parse_localization;

    #[test]
    fn hash_ignores_line_formatting() {
        let tidy = parse_localization("l_english:\n key:0 \"Hello\"\n other:0 \"World\"\n");
        let messy = parse_localization("l_english:\n\n    key:1   \"Hello\" # note\nother = \"World\"\n");
        assert_eq!(entries_hash(&tidy), entries_hash(&messy));
    }

    #[test]
    fn hash_tracks_source_and_order() {
        let a = vec![LocalizationEntry::new("a", "1"), LocalizationEntry::new("b", "2")];
        let b = vec![LocalizationEntry::new("b", "2"), LocalizationEntry::new("a", "1")];
        let c = vec![LocalizationEntry::new("a", "1"), LocalizationEntry::new("b", "3")];
        assert_ne!(entries_hash(&a), entries_hash(&b));
        assert_ne!(entries_hash(&a), entries_hash(&c));
        assert_eq!(entries_hash(&a).len(), 64);
    }

    #[test]
    fn hash_ignores_translations() {
        let plain = vec![LocalizationEntry::new("a", "1")];
        let translated = vec![LocalizationEntry::new("a", "1").with_translation("một")];
        assert_eq!(entries_hash(&plain), entries_hash(&translated));
    }

    #[test]
    fn capture_reads_size_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events_l_english.yml");
        std::fs::write(&path, "l_english:\n").unwrap();

        let version = FileVersion::capture(&path, "3.10", vec![], "baseline");
        assert_eq!(version.file_size, 11);
        assert_eq!(version.file_name(), "events_l_english.yml");
        assert_eq!(version.reference().entry_count, 0);

        let missing = FileVersion::capture(dir.path().join("gone.yml"), "3.10", vec![], "");
        assert_eq!(missing.file_size, 0);
        assert_ne!(missing.id, version.id);
    }
}
