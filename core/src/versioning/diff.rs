use super::{FileVersion, VersionRef};
use crate::formats::LocalizationEntry;
use crate::placeholder_validator::validate_entry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

const REPORT_LIST_LIMIT: usize = 20;
const REPORT_RULE: &str = "=================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    New,
    Modified,
    Deleted,
    Unchanged,
}

impl ChangeType {
    pub fn status_message(&self) -> &'static str {
        match self {
            ChangeType::New => "New entry - needs translation",
            ChangeType::Modified => "Source text changed - review translation",
            ChangeType::Deleted => "Deleted in new version",
            ChangeType::Unchanged => "No changes",
        }
    }

    pub fn needs_review(&self) -> bool {
        matches!(self, ChangeType::New | ChangeType::Modified)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonEntry {
    pub key: String,
    pub old_entry: Option<LocalizationEntry>,
    pub new_entry: Option<LocalizationEntry>,
    pub existing_translation: String,
    /// Starts as the carried-over translation; edited during review.
    pub updated_translation: String,
    pub change_type: ChangeType,
    pub is_selected: bool,
    pub status_message: String,
}

impl ComparisonEntry {
    pub fn has_old(&self) -> bool {
        self.old_entry.is_some()
    }

    pub fn has_new(&self) -> bool {
        self.new_entry.is_some()
    }

    pub fn old_source_text(&self) -> &str {
        self.old_entry.as_ref().map_or("", |e| e.source_text.as_str())
    }

    pub fn new_source_text(&self) -> &str {
        self.new_entry.as_ref().map_or("", |e| e.source_text.as_str())
    }

    pub fn needs_review(&self) -> bool {
        self.change_type.needs_review()
    }

    pub fn has_translation(&self) -> bool {
        !self.updated_translation.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub old_version: VersionRef,
    pub new_version: VersionRef,
    /// Sorted by key.
    pub entries: Vec<ComparisonEntry>,
    pub comparison_date: DateTime<Utc>,
}

impl ComparisonResult {
    pub fn count(&self, change_type: ChangeType) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.change_type == change_type)
            .count()
    }

    pub fn new_count(&self) -> usize {
        self.count(ChangeType::New)
    }

    pub fn modified_count(&self) -> usize {
        self.count(ChangeType::Modified)
    }

    pub fn deleted_count(&self) -> usize {
        self.count(ChangeType::Deleted)
    }

    pub fn unchanged_count(&self) -> usize {
        self.count(ChangeType::Unchanged)
    }

    pub fn total_count(&self) -> usize {
        self.entries.len()
    }

    pub fn translated_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.has_translation()).count()
    }

    /// Rows still needing review that have no translation yet.
    pub fn remaining_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.needs_review() && !entry.has_translation())
            .count()
    }
}

/// Classify every key of `old` and `new`.
///
/// Duplicate keys within one version resolve to the last occurrence. New
/// rows never inherit a translation since their text has not been reviewed;
/// deleted rows carry none forward.
pub fn compare_versions(
    old: &FileVersion,
    new: &FileVersion,
    existing_translations: Option<&HashMap<String, String>>,
) -> ComparisonResult {
    let old_map = index_by_key(&old.entries);
    let new_map = index_by_key(&new.entries);
    let keys: BTreeSet<&str> = old_map.keys().chain(new_map.keys()).copied().collect();

    let entries = keys
        .into_iter()
        .map(|key| {
            let old_entry = old_map.get(key).copied();
            let new_entry = new_map.get(key).copied();
            let change_type = match (old_entry, new_entry) {
                (None, _) => ChangeType::New,
                (Some(_), None) => ChangeType::Deleted,
                (Some(before), Some(after)) => {
                    if before.source_text.trim() == after.source_text.trim() {
                        ChangeType::Unchanged
                    } else {
                        ChangeType::Modified
                    }
                }
            };

            let existing = existing_translations
                .and_then(|map| map.get(key))
                .cloned()
                .unwrap_or_default();
            let updated = match change_type {
                ChangeType::Modified | ChangeType::Unchanged => existing.clone(),
                ChangeType::New | ChangeType::Deleted => String::new(),
            };

            ComparisonEntry {
                key: key.to_string(),
                old_entry: old_entry.cloned(),
                new_entry: new_entry.cloned(),
                existing_translation: existing,
                updated_translation: updated,
                change_type,
                is_selected: false,
                status_message: change_type.status_message().to_string(),
            }
        })
        .collect();

    ComparisonResult {
        old_version: old.reference(),
        new_version: new.reference(),
        entries,
        comparison_date: Utc::now(),
    }
}

fn index_by_key(entries: &[LocalizationEntry]) -> HashMap<&str, &LocalizationEntry> {
    entries
        .iter()
        .map(|entry| (entry.key.as_str(), entry))
        .collect()
}

/// Rebuild an entry list from a comparison, in key order, without deleted rows.
pub fn apply_comparison_results(result: &ComparisonResult) -> Vec<LocalizationEntry> {
    result
        .entries
        .iter()
        .filter(|row| row.change_type != ChangeType::Deleted)
        .filter_map(|row| {
            let base = row.new_entry.as_ref().or(row.old_entry.as_ref())?;
            let mut entry = LocalizationEntry {
                translated_text: row.updated_translation.clone(),
                has_placeholder_issues: false,
                ..base.clone()
            };
            validate_entry(&mut entry);
            Some(entry)
        })
        .collect()
}

pub fn filter_by_change_type(
    result: &ComparisonResult,
    change_type: ChangeType,
) -> Vec<&ComparisonEntry> {
    result
        .entries
        .iter()
        .filter(|row| row.change_type == change_type)
        .collect()
}

/// New then Modified rows, each group by key.
pub fn entries_needing_review(result: &ComparisonResult) -> Vec<&ComparisonEntry> {
    let mut rows: Vec<_> = result.entries.iter().filter(|row| row.needs_review()).collect();
    rows.sort_by(|a, b| a.change_type.cmp(&b.change_type).then_with(|| a.key.cmp(&b.key)));
    rows
}

/// Fill blank translations of selected rows that need review.
///
/// `translate` returns `None` to leave a row alone. Returns how many rows changed.
pub fn batch_update_translations<F>(result: &mut ComparisonResult, mut translate: F) -> usize
where
    F: FnMut(&ComparisonEntry) -> Option<String>,
{
    let mut updated = 0;
    for row in result
        .entries
        .iter_mut()
        .filter(|row| row.is_selected && row.needs_review() && !row.has_translation())
    {
        if let Some(text) = translate(row).filter(|text| !text.trim().is_empty()) {
            row.updated_translation = text;
            updated += 1;
        }
    }
    updated
}

pub fn generate_report(result: &ComparisonResult) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, result);
    out
}

fn write_report(out: &mut String, result: &ComparisonResult) -> std::fmt::Result {
    writeln!(out, "{REPORT_RULE}")?;
    writeln!(out, "FILE COMPARISON REPORT")?;
    writeln!(out, "{REPORT_RULE}")?;
    writeln!(out)?;
    writeln!(
        out,
        "Old Version: {} ({})",
        result.old_version.game_version,
        result.old_version.import_date.format("%Y-%m-%d")
    )?;
    writeln!(
        out,
        "New Version: {} ({})",
        result.new_version.game_version,
        result.new_version.import_date.format("%Y-%m-%d")
    )?;
    writeln!(
        out,
        "Comparison Date: {}",
        result.comparison_date.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out)?;
    writeln!(out, "SUMMARY:")?;
    writeln!(out, "  New Entries:       {:>5}", result.new_count())?;
    writeln!(out, "  Modified Entries:  {:>5}", result.modified_count())?;
    writeln!(out, "  Deleted Entries:   {:>5}", result.deleted_count())?;
    writeln!(out, "  Unchanged Entries: {:>5}", result.unchanged_count())?;
    writeln!(out, "  Total:             {:>5}", result.total_count())?;
    writeln!(out)?;
    writeln!(out, "TRANSLATION PROGRESS:")?;
    writeln!(out, "  Translated:        {:>5}", result.translated_count())?;
    writeln!(out, "  Remaining:         {:>5}", result.remaining_count())?;
    writeln!(out)?;

    for (change_type, title) in [
        (ChangeType::New, "NEW ENTRIES:"),
        (ChangeType::Modified, "MODIFIED ENTRIES:"),
        (ChangeType::Deleted, "DELETED ENTRIES:"),
    ] {
        let rows = filter_by_change_type(result, change_type);
        if rows.is_empty() {
            continue;
        }
        writeln!(out, "{title}")?;
        for row in rows.iter().take(REPORT_LIST_LIMIT) {
            match change_type {
                ChangeType::Modified => {
                    writeln!(out, "  - {}:", row.key)?;
                    writeln!(out, "    OLD: \"{}\"", row.old_source_text())?;
                    writeln!(out, "    NEW: \"{}\"", row.new_source_text())?;
                }
                ChangeType::Deleted => {
                    writeln!(out, "  - {}: \"{}\"", row.key, row.old_source_text())?
                }
                _ => writeln!(out, "  - {}: \"{}\"", row.key, row.new_source_text())?,
            }
        }
        if rows.len() > REPORT_LIST_LIMIT {
            writeln!(out, "  ... and {} more", rows.len() - REPORT_LIST_LIMIT)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{REPORT_RULE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(label: &str, entries: &[(&str, &str)]) -> FileVersion {
        FileVersion::capture(
            "events_l_english.yml",
            label,
            entries
                .iter()
                .map(|(key, source)| LocalizationEntry::new(*key, *source))
                .collect(),
            "",
        )
    }

    fn sample() -> ComparisonResult {
        let old = version("1.0", &[("k1", "Hello {0}"), ("k2", "Bye")]);
        let new = version("1.1", &[("k1", "Hello {0} there"), ("k3", "New")]);
        compare_versions(&old, &new, None)
    }

    #[test]
    fn classifies_new_modified_deleted() {
        let result = sample();
        let kinds: Vec<_> = result
            .entries
            .iter()
            .map(|row| (row.key.as_str(), row.change_type))
            .collect();
        assert_eq!(
            kinds,
            [
                ("k1", ChangeType::Modified),
                ("k2", ChangeType::Deleted),
                ("k3", ChangeType::New)
            ]
        );
        assert_eq!(result.unchanged_count(), 0);
        assert_eq!(result.total_count(), 3);
    }

    #[test]
    fn counts_sum_to_total() {
        let old = version("1", &[("a", "x"), ("b", "y"), ("c", " z "), ("d", "w")]);
        let new = version("2", &[("b", "y2"), ("c", "z"), ("d", "w"), ("e", "v"), ("f", "u")]);
        let result = compare_versions(&old, &new, None);

        let sum = result.new_count()
            + result.modified_count()
            + result.deleted_count()
            + result.unchanged_count();
        assert_eq!(sum, result.total_count());
        assert_eq!(result.total_count(), 6);
        assert_eq!(result.unchanged_count(), 2);
        for row in &result.entries {
            assert!(row.has_old() || row.has_new());
        }
    }

    #[test]
    fn merge_skips_deleted_and_uses_new_source() {
        let merged = apply_comparison_results(&sample());
        let keys: Vec<_> = merged.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["k1", "k3"]);
        assert_eq!(merged[0].source_text, "Hello {0} there");
    }

    #[test]
    fn seeds_translations_except_for_new_rows() {
        let old = version("1", &[("same", "Same"), ("edit", "Old"), ("gone", "Gone")]);
        let new = version("2", &[("same", "Same"), ("edit", "New"), ("fresh", "Fresh")]);
        let existing: HashMap<String, String> = [
            ("same", "Giống"),
            ("edit", "Cũ"),
            ("gone", "Mất"),
            ("fresh", "stale"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let result = compare_versions(&old, &new, Some(&existing));
        let row = |key: &str| result.entries.iter().find(|r| r.key == key).unwrap();

        assert_eq!(row("same").updated_translation, "Giống");
        assert_eq!(row("edit").updated_translation, "Cũ");
        assert_eq!(row("fresh").updated_translation, "");
        assert_eq!(row("fresh").existing_translation, "stale");
        assert_eq!(row("gone").updated_translation, "");
        assert_eq!(row("edit").status_message, "Source text changed - review translation");

        let merged = apply_comparison_results(&result);
        let same = merged.iter().find(|e| e.key == "same").unwrap();
        assert_eq!(same.translated_text, "Giống");
        assert_eq!(result.translated_count(), 2);
        assert_eq!(result.remaining_count(), 1);
    }

    #[test]
    fn duplicate_keys_use_last_occurrence() {
        let old = version("1", &[("a", "first"), ("a", "second")]);
        let new = version("2", &[("a", "second")]);
        let result = compare_versions(&old, &new, None);
        assert_eq!(result.total_count(), 1);
        assert_eq!(result.entries[0].change_type, ChangeType::Unchanged);
    }

    #[test]
    fn review_order_puts_new_first() {
        let old = version("1", &[("a", "1"), ("c", "3")]);
        let new = version("2", &[("a", "one"), ("b", "2"), ("c", "three"), ("d", "4")]);
        let result = compare_versions(&old, &new, None);
        let keys: Vec<_> = entries_needing_review(&result)
            .iter()
            .map(|row| row.key.as_str())
            .collect();
        assert_eq!(keys, ["b", "d", "a", "c"]);
    }

    #[test]
    fn batch_update_only_touches_selected_blank_rows() {
        let mut result = sample();
        for row in &mut result.entries {
            row.is_selected = row.key != "k1";
        }
        let updated = batch_update_translations(&mut result, |row| {
            Some(format!("T:{}", row.new_source_text()))
        });

        assert_eq!(updated, 1);
        assert_eq!(result.entries[2].updated_translation, "T:New");
        assert_eq!(result.entries[0].updated_translation, "");
        assert_eq!(result.entries[1].updated_translation, "");
    }

    #[test]
    fn report_lists_changes() {
        let report = generate_report(&sample());
        assert!(report.contains("FILE COMPARISON REPORT"));
        assert!(report.contains("Old Version: 1.0"));
        assert!(report.contains(&format!("  New Entries:       {:>5}", 1)));
        assert!(report.contains("  - k3: \"New\""));
        assert!(report.contains("    OLD: \"Hello {0}\""));
        assert!(report.contains("DELETED ENTRIES:\n  - k2: \"Bye\""));
        assert!(!report.contains("... and"));
    }

    #[test]
    fn report_truncates_long_lists() {
        let old = version("1", &[]);
        let keys: Vec<String> = (0..25).map(|i| format!("key{i:02}")).collect();
        let entries: Vec<(&str, &str)> = keys.iter().map(|k| (k.as_str(), "x")).collect();
        let new = version("2", &entries);

        let report = generate_report(&compare_versions(&old, &new, None));
        assert!(report.contains("  ... and 5 more"));
        assert!(!report.contains("key24"));
    }
}
