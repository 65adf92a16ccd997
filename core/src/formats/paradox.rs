//! Line grammar of Paradox `.yml` localisation files.
//!
//! ```text
//! l_english:
//!  event.1.t:0 "A \"quoted\" title"
//!  # comment
//! ```
//!
//! Lines that fit none of header, comment, blank or entry are dropped so a
//! single stray line cannot abort loading a large game file.

use super::{LocalizationDocument, LocalizationEntry};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_HEADER: &str = "l_english:";

// Any line opening with `l_<name>:` switches the language context, whatever follows.
static HEADER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^l_(\w+):").expect("valid header regex"));

// The value group accepts escaped characters and stops at the first bare quote.
// The regex crate matches in linear time, so the alternation cannot backtrack.
static ENTRY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^([^#\s:=]+)\s*[:=]\s*(\d+)?\s*"((?:[^"\\]|\\.)*)""#)
        .expect("valid entry regex")
});

pub fn parse_localization(text: &str) -> Vec<LocalizationEntry> {
    parse_document(text).entries
}

pub fn parse_document(text: &str) -> LocalizationDocument {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut document = LocalizationDocument::default();
    let mut skipped = 0usize;

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(caps) = HEADER_REGEX.captures(trimmed) {
            if document.header.is_none() {
                document.header = Some(format!("l_{}:", &caps[1]));
                document.language = Some(caps[1].to_string());
            }
            continue;
        }

        match ENTRY_REGEX.captures(trimmed) {
            Some(caps) => document.entries.push(LocalizationEntry {
                key: caps[1].to_string(),
                source_text: unescape_value(&caps[3]),
                raw_line_before: line.to_string(),
                line_number: idx + 1,
                ..LocalizationEntry::default()
            }),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("skipped {skipped} unrecognised localisation line(s)");
    }
    document
}

/// Render entries under one header. Untranslated entries fall back to source text.
pub fn serialize_localization(entries: &[LocalizationEntry], header: &str) -> String {
    let mut out = String::with_capacity(entries.len() * 48 + 16);
    out.push_str(&normalize_header(header));
    out.push_str("\n\n");
    for entry in entries {
        out.push_str(&entry.key);
        out.push_str(":0 \"");
        out.push_str(&escape_value(entry.output_text()));
        out.push_str("\"\n");
    }
    out
}

pub fn header_for_language(language: &str) -> String {
    let language = language.trim().trim_start_matches("l_").trim_end_matches(':');
    if language.is_empty() {
        DEFAULT_HEADER.to_string()
    } else {
        format!("l_{language}:")
    }
}

pub fn language_from_header(header: &str) -> Option<String> {
    HEADER_REGEX
        .captures(header.trim())
        .map(|caps| caps[1].to_string())
}

fn normalize_header(header: &str) -> String {
    let trimmed = header.trim();
    if trimmed.is_empty() {
        DEFAULT_HEADER.to_string()
    } else if trimmed.ends_with(':') {
        trimmed.to_string()
    } else {
        format!("{trimmed}:")
    }
}

/// Read a quoted value: `\"` is a quote and `\\` a backslash. Any other
/// backslash sequence, such as the game's `\n`, is kept as written.
pub(crate) fn unescape_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '"' || next == '\\' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

/// Inverse of [`unescape_value`]. Quotes are always escaped; a backslash is
/// doubled only where it would otherwise pair with the next character or the
/// closing quote.
pub(crate) fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => {
                if matches!(chars.peek(), None | Some('"') | Some('\\')) {
                    out.push_str("\\\\");
                } else {
                    out.push('\\');
                }
            }
            _ => out.push(ch),
        }
    }
    out
}
