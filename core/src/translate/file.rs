use super::{BatchProgress, BatchSummary, TranslationOrchestrator};
use crate::formats::{load_document, save_document, SaveOptions};
use crate::placeholder_validator::{audit_entries, EntryIssue};
use crate::profiles::{GameProfile, GameType};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct FileTranslationRequest {
    pub input: PathBuf,
    /// Defaults to the game profile's localised path next to `input`.
    pub output: Option<PathBuf>,
    pub source_lang: String,
    pub target_lang: String,
    pub game: GameType,
}

impl FileTranslationRequest {
    pub fn new(input: impl Into<PathBuf>, source_lang: &str, target_lang: &str) -> Self {
        Self {
            input: input.into(),
            output: None,
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            game: GameType::Generic,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTranslationReport {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub total_entries: usize,
    pub summary: BatchSummary,
    pub failed_keys: Vec<String>,
    pub placeholder_issues: Vec<EntryIssue>,
    pub backup_path: Option<PathBuf>,
    pub saved: bool,
    pub cancelled: bool,
}

/// Load, translate, check and save one localisation file.
///
/// Nothing is written when the batch is cancelled or when placeholder
/// mismatches block the save under the configured policy.
pub async fn translate_file<P>(
    orchestrator: &TranslationOrchestrator,
    request: &FileTranslationRequest,
    progress: P,
    cancel: &CancellationToken,
) -> Result<FileTranslationReport>
where
    P: FnMut(BatchProgress),
{
    let (mut document, metadata) = load_document(&request.input)
        .await
        .with_context(|| format!("failed to read {}", request.input.display()))?;

    let profile = GameProfile::for_game(request.game);
    let output_path = match &request.output {
        Some(path) => path.clone(),
        None => profile.output_path(&request.input, &request.source_lang, &request.target_lang),
    };

    let results = orchestrator
        .translate_batch(
            &mut document.entries,
            &request.source_lang,
            &request.target_lang,
            progress,
            cancel,
        )
        .await;

    let failed_keys = document
        .entries
        .iter()
        .zip(&results)
        .filter(|(_, result)| !result.success)
        .map(|(entry, _)| entry.key.clone())
        .collect();

    let mut report = FileTranslationReport {
        input_path: request.input.clone(),
        output_path,
        total_entries: document.entries.len(),
        summary: BatchSummary::from_results(&results),
        failed_keys,
        placeholder_issues: Vec::new(),
        backup_path: None,
        saved: false,
        cancelled: cancel.is_cancelled(),
    };

    if report.cancelled {
        info!("{} left unsaved after cancellation", request.input.display());
        return Ok(report);
    }

    let audit = audit_entries(&mut document.entries);
    let blocked = audit.blocks_save(orchestrator.config());
    report.placeholder_issues = audit.issues;
    if blocked {
        warn!(
            "not saving {}: {} entries have placeholder mismatches",
            report.output_path.display(),
            report.placeholder_issues.len()
        );
        return Ok(report);
    }

    let header = profile.header_for(&request.target_lang);
    let options = SaveOptions {
        metadata,
        create_backup: orchestrator.config().create_backup_before_save,
    };
    let outcome = save_document(&report.output_path, &header, &document.entries, options)
        .await
        .with_context(|| format!("failed to write {}", report.output_path.display()))?;

    report.backup_path = outcome.backup_path;
    report.saved = true;
    Ok(report)
}
