/// Paradox localisation documents: entry model and file-level load/save.
pub mod paradox;

use crate::backup::{write_with_backup, BackupError, WriteOutcome};
use crate::encoding::{encode_text, read_text_file, FileMetadata, Newline};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub use paradox::{
    header_for_language, language_from_header, parse_document, parse_localization,
    serialize_localization,
};

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("background write task failed: {0}")]
    Task(String),
}

/// One translatable line of a localisation file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationEntry {
    pub key: String,
    pub source_text: String,
    #[serde(default)]
    pub translated_text: String,
    /// Exact line the entry was parsed from.
    #[serde(default)]
    pub raw_line_before: String,
    /// Reserved for formatting that follows the entry; empty after parsing.
    #[serde(default)]
    pub raw_line_after: String,
    #[serde(default)]
    pub has_placeholder_issues: bool,
    /// 1-based; zero for entries that did not come from a file.
    #[serde(default)]
    pub line_number: usize,
}

impl LocalizationEntry {
    pub fn new(key: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source_text: source_text.into(),
            ..Self::default()
        }
    }

    pub fn with_translation(mut self, translated: impl Into<String>) -> Self {
        self.translated_text = translated.into();
        self
    }

    pub fn is_translated(&self) -> bool {
        !self.translated_text.trim().is_empty()
    }

    /// Text written on save: the translation, or the source when untranslated.
    pub fn output_text(&self) -> &str {
        if self.is_translated() {
            &self.translated_text
        } else {
            &self.source_text
        }
    }
}

/// Parsed file: first header seen plus the ordered entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationDocument {
    pub header: Option<String>,
    pub language: Option<String>,
    pub entries: Vec<LocalizationEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub metadata: FileMetadata,
    pub create_backup: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        // Paradox titles only pick up localisation files saved as UTF-8 with BOM.
        Self {
            metadata: FileMetadata {
                has_bom: true,
                newline: Newline::Lf,
            },
            create_backup: true,
        }
    }
}

pub async fn load_document(
    path: &Path,
) -> Result<(LocalizationDocument, FileMetadata), FormatError> {
    let (text, metadata) = read_text_file(path).await?;
    Ok((parse_document(&text), metadata))
}

pub async fn save_document(
    path: &Path,
    header: &str,
    entries: &[LocalizationEntry],
    options: SaveOptions,
) -> Result<WriteOutcome, FormatError> {
    let text = serialize_localization(entries, header);
    let bytes = encode_text(&text, &options.metadata);
    let target = path.to_path_buf();

    tokio::task::spawn_blocking(move || write_with_backup(&target, &bytes, options.create_backup))
        .await
        .map_err(|err| FormatError::Task(err.to_string()))?
        .map_err(FormatError::from)
}
