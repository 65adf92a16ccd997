//! Translation orchestration: concurrency limit, masking, retries, batches.

pub mod file;

use crate::ai::{backend_for, run_with_retry, RetryPolicy, TranslationBackend, TranslationError};
use crate::config::TranslationConfig;
use crate::formats::LocalizationEntry;
use crate::memory::TranslationMemory;
use crate::placeholder_validator::validate_entry;
use crate::protector::mask_placeholders;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

pub use file::{translate_file, FileTranslationReport, FileTranslationRequest};

pub const MEMORY_ENGINE_LABEL: &str = "Translation Memory";

/// The caller cancelled; no result is recorded for the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("translation cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub success: bool,
    pub translated_text: String,
    pub error_message: Option<String>,
    pub source_language: String,
    pub target_language: String,
    pub duration: Duration,
    pub engine: String,
    /// Entry already had a translation and was left alone.
    pub skipped: bool,
}

impl TranslationResult {
    fn succeeded(text: String, source: &str, target: &str, engine: &str, started: Instant) -> Self {
        Self {
            success: true,
            translated_text: text,
            error_message: None,
            source_language: source.to_string(),
            target_language: target.to_string(),
            duration: started.elapsed(),
            engine: engine.to_string(),
            skipped: false,
        }
    }

    fn failed(message: String, source: &str, target: &str, engine: &str, started: Instant) -> Self {
        Self {
            success: false,
            translated_text: String::new(),
            error_message: Some(message),
            source_language: source.to_string(),
            target_language: target.to_string(),
            duration: started.elapsed(),
            engine: engine.to_string(),
            skipped: false,
        }
    }

    fn already_translated(entry: &LocalizationEntry, source: &str, target: &str) -> Self {
        Self {
            success: true,
            translated_text: entry.translated_text.clone(),
            error_message: None,
            source_language: source.to_string(),
            target_language: target.to_string(),
            duration: Duration::ZERO,
            engine: String::new(),
            skipped: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub progress_pct: f32,
}

impl BatchProgress {
    pub fn new(completed: usize, total: usize) -> Self {
        let progress_pct = if total == 0 {
            100.0
        } else {
            completed as f32 * 100.0 / total as f32
        };
        Self {
            completed,
            total,
            progress_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[TranslationResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, result| {
            if result.skipped {
                acc.skipped += 1;
            } else if result.success {
                acc.succeeded += 1;
            } else {
                acc.failed += 1;
            }
            acc
        })
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

pub struct TranslationOrchestrator {
    backend: Arc<dyn TranslationBackend>,
    config: TranslationConfig,
    limiter: Semaphore,
    retry: RetryPolicy,
    memory: Option<Arc<TranslationMemory>>,
}

impl TranslationOrchestrator {
    /// Build with the backend `config` selects.
    pub fn new(config: TranslationConfig) -> Result<Self, TranslationError> {
        let backend = backend_for(&config)?;
        Ok(Self::with_backend(backend, config))
    }

    pub fn with_backend(backend: Arc<dyn TranslationBackend>, config: TranslationConfig) -> Self {
        Self {
            limiter: Semaphore::new(config.max_concurrency()),
            backend,
            config,
            retry: RetryPolicy::default(),
            memory: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_memory(mut self, memory: Arc<TranslationMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn engine_label(&self) -> &'static str {
        self.backend.name(&self.config)
    }

    /// Translate one string.
    ///
    /// Failures come back as a result with `success == false`; only
    /// cancellation is returned as an error.
    pub async fn translate_one(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult, Cancelled> {
        let started = Instant::now();
        let engine = self.engine_label();

        if text.trim().is_empty() {
            return Ok(TranslationResult::succeeded(
                text.to_string(),
                source_lang,
                target_lang,
                engine,
                started,
            ));
        }

        if let Some(hit) = self
            .memory
            .as_ref()
            .and_then(|memory| memory.lookup(text, target_lang))
        {
            return Ok(TranslationResult::succeeded(
                hit,
                source_lang,
                target_lang,
                MEMORY_ENGINE_LABEL,
                started,
            ));
        }

        let permit = tokio::select! {
            _ = cancel.cancelled() => return Err(Cancelled),
            permit = self.limiter.acquire() => permit.map_err(|_| Cancelled)?,
        };

        let masked = mask_placeholders(text);
        let backend = &self.backend;
        let config = &self.config;
        let payload = masked.masked.as_str();
        let outcome = run_with_retry(&self.retry, config.request_timeout(), cancel, |token| {
            async move {
                backend
                    .translate(payload, source_lang, target_lang, config, &token)
                    .await
            }
        })
        .await;
        drop(permit);

        match outcome {
            Ok(raw) => {
                let missing = masked.missing_sentinels(&raw);
                if !missing.is_empty() {
                    warn!("{engine} dropped placeholder sentinels {missing:?}");
                }
                let translated = masked.unmask(&raw);
                if let Some(memory) = &self.memory {
                    if translated != text {
                        memory.store(text, target_lang, &translated);
                    }
                }
                Ok(TranslationResult::succeeded(
                    translated,
                    source_lang,
                    target_lang,
                    engine,
                    started,
                ))
            }
            Err(TranslationError::Cancelled) => Err(Cancelled),
            Err(err) => {
                debug!("translation failed: {err}");
                Ok(TranslationResult::failed(
                    err.to_string(),
                    source_lang,
                    target_lang,
                    engine,
                    started,
                ))
            }
        }
    }

    /// Translate entries one after another, in order.
    ///
    /// Already translated entries are skipped unless the config asks to
    /// overwrite them. `progress` fires after every entry. On cancellation the
    /// remaining entries are left untouched and the results so far returned.
    pub async fn translate_batch<P>(
        &self,
        entries: &mut [LocalizationEntry],
        source_lang: &str,
        target_lang: &str,
        mut progress: P,
        cancel: &CancellationToken,
    ) -> Vec<TranslationResult>
    where
        P: FnMut(BatchProgress),
    {
        let total = entries.len();
        let mut results = Vec::with_capacity(total);

        for (index, entry) in entries.iter_mut().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            let result = if entry.is_translated() && !self.config.overwrite_existing_translations {
                TranslationResult::already_translated(entry, source_lang, target_lang)
            } else {
                match self
                    .translate_one(&entry.source_text, source_lang, target_lang, cancel)
                    .await
                {
                    Ok(result) => {
                        if result.success {
                            entry.translated_text = result.translated_text.clone();
                            validate_entry(entry);
                        }
                        result
                    }
                    Err(Cancelled) => break,
                }
            };

            results.push(result);
            progress(BatchProgress::new(index + 1, total));
        }

        if let Some(memory) = &self.memory {
            let memory = Arc::clone(memory);
            if let Err(err) = tokio::task::spawn_blocking(move || memory.flush()).await {
                warn!("translation memory flush task failed: {err}");
            }
        }

        let summary = BatchSummary::from_results(&results);
        info!(
            "batch finished: {} translated, {} failed, {} skipped, {} of {total} processed{}",
            summary.succeeded,
            summary.failed,
            summary.skipped,
            summary.processed(),
            if cancel.is_cancelled() { " (cancelled)" } else { "" }
        );
        results
    }
}
