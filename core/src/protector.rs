//! Masks placeholder tokens with inert sentinels around a machine translation
//! call, then restores them.

use crate::placeholder_validator::PLACEHOLDER_REGEX;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeMap;

static SENTINEL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__PH_\d+__").expect("valid sentinel regex"));

pub fn sentinel(index: usize) -> String {
    format!("__PH_{index}__")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedText {
    pub masked: String,
    /// Sentinel to original token text.
    pub mapping: BTreeMap<String, String>,
}

impl MaskedText {
    pub fn has_placeholders(&self) -> bool {
        !self.mapping.is_empty()
    }

    pub fn unmask(&self, translated: &str) -> String {
        unmask_placeholders(translated, &self.mapping)
    }

    /// Sentinels that the translated text no longer contains.
    pub fn missing_sentinels(&self, translated: &str) -> Vec<String> {
        self.mapping
            .keys()
            .filter(|sentinel| !translated.contains(sentinel.as_str()))
            .cloned()
            .collect()
    }
}

/// Replace every placeholder with `__PH_i__`.
///
/// Matches are numbered from the right, so the last token in the text is
/// `__PH_0__`. Replacing right to left keeps earlier offsets valid. When the
/// text already contains sentinel-shaped words, numbering starts above the
/// largest of them.
pub fn mask_placeholders(text: &str) -> MaskedText {
    let matches: Vec<_> = PLACEHOLDER_REGEX.find_iter(text).collect();
    if matches.is_empty() {
        return MaskedText {
            masked: text.to_string(),
            mapping: BTreeMap::new(),
        };
    }

    let base = first_free_index(text);
    let mut masked = text.to_string();
    let mut mapping = BTreeMap::new();
    for (index, m) in matches.iter().rev().enumerate() {
        let marker = sentinel(base.saturating_add(index));
        masked.replace_range(m.range(), &marker);
        mapping.insert(marker, m.as_str().to_string());
    }

    MaskedText { masked, mapping }
}

fn first_free_index(text: &str) -> usize {
    SENTINEL_REGEX
        .find_iter(text)
        .filter_map(|m| m.as_str()[5..m.as_str().len() - 2].parse::<usize>().ok())
        .max()
        .map_or(0, |highest| highest.saturating_add(1))
}

/// Swap sentinels back for their tokens in a single pass.
///
/// Sentinels absent from `mapping` are left as they are.
pub fn unmask_placeholders(text: &str, mapping: &BTreeMap<String, String>) -> String {
    if mapping.is_empty() {
        return text.to_string();
    }
    SENTINEL_REGEX
        .replace_all(text, |caps: &Captures| {
            let marker = &caps[0];
            mapping
                .get(marker)
                .cloned()
                .unwrap_or_else(|| marker.to_string())
        })
        .into_owned()
}
