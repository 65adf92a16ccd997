/// Placeholder validation for Paradox localisation values.
///
/// Recognised tokens are compared by exact text, so `%s` and `%d` are distinct
/// and two `{0}` occurrences only balance against two `{0}` occurrences.
use crate::config::TranslationConfig;
use crate::formats::LocalizationEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Positional braces, printf, scripted variables with and without brackets,
// bracket script calls, angle-bracket tags.
pub(crate) static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\{\d+\}|%[sd]|\$[A-Z_]+\[[^\]]+\]|\$[A-Za-z_][\w.|]*\$|\[[A-Za-z_][^\[\]\r\n]*\]|<[^>]+>",
    )
    .expect("valid placeholder regex")
});

pub type PlaceholderCounts = BTreeMap<String, usize>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub source_placeholders: PlaceholderCounts,
    pub target_placeholders: PlaceholderCounts,
}

impl PlaceholderValidationResult {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

pub fn extract_placeholders(text: &str) -> PlaceholderCounts {
    let mut counts = PlaceholderCounts::new();
    for m in PLACEHOLDER_REGEX.find_iter(text) {
        *counts.entry(m.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

pub fn validate_placeholders(source: &str, target: &str) -> PlaceholderValidationResult {
    let source_placeholders = extract_placeholders(source);
    let mut result = PlaceholderValidationResult {
        source_placeholders,
        ..PlaceholderValidationResult::default()
    };

    if target.trim().is_empty() {
        result.warnings.push("Target text is empty".to_string());
        result.is_valid = true;
        return result;
    }

    result.target_placeholders = extract_placeholders(target);

    for (token, &expected) in &result.source_placeholders {
        match result.target_placeholders.get(token) {
            None => result
                .errors
                .push(format!("Missing placeholder '{token}' in target text")),
            Some(&actual) if actual != expected => result.errors.push(format!(
                "Placeholder '{token}' count mismatch: source has {expected}, target has {actual}"
            )),
            Some(_) => {}
        }
    }

    for token in result.target_placeholders.keys() {
        if !result.source_placeholders.contains_key(token) {
            result
                .errors
                .push(format!("Extra placeholder '{token}' in target text"));
        }
    }

    if has_unescaped_quote(target) {
        result
            .warnings
            .push("Target text contains unescaped quotes".to_string());
    }

    result.is_valid = result.errors.is_empty();
    result
}

fn has_unescaped_quote(text: &str) -> bool {
    let mut prev = None;
    for ch in text.chars() {
        if ch == '"' && prev != Some('\\') {
            return true;
        }
        prev = Some(ch);
    }
    false
}

/// Validate one entry and record the outcome on it.
///
/// Untranslated entries have nothing to compare yet and are never flagged.
pub fn validate_entry(entry: &mut LocalizationEntry) -> PlaceholderValidationResult {
    let result = validate_placeholders(&entry.source_text, &entry.translated_text);
    entry.has_placeholder_issues = entry.is_translated() && !result.is_valid;
    result
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryIssue {
    pub key: String,
    pub line_number: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationAudit {
    pub checked: usize,
    pub issues: Vec<EntryIssue>,
}

impl ValidationAudit {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Whether a save should be refused under the given policy.
    pub fn blocks_save(&self, config: &TranslationConfig) -> bool {
        config.treat_placeholder_mismatch_as_error && !self.is_clean()
    }

    pub fn issue_keys(&self) -> Vec<String> {
        self.issues.iter().map(|issue| issue.key.clone()).collect()
    }
}

/// Validate every translated entry before a save.
pub fn audit_entries(entries: &mut [LocalizationEntry]) -> ValidationAudit {
    let mut audit = ValidationAudit::default();
    for entry in entries.iter_mut() {
        let result = validate_entry(entry);
        if !entry.is_translated() {
            continue;
        }
        audit.checked += 1;
        if entry.has_placeholder_issues {
            audit.issues.push(EntryIssue {
                key: entry.key.clone(),
                line_number: entry.line_number,
                errors: result.errors,
            });
        }
    }
    audit
}
