//! Translation backends.
//!
//! A backend turns one already-masked string into the target language. The
//! local backend echoes its input and is used while AI translation is off;
//! [`RemoteTranslator`] talks to one of the HTTP engines named by
//! [`TranslationConfig::selected_engine`].

pub mod engines;
pub mod retry;

use crate::config::TranslationConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use engines::{EngineEndpoints, RemoteTranslator};
pub use retry::{run_with_retry, RetryPolicy};

pub const LOCAL_ENGINE_LABEL: &str = "Local";

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("AI translation is disabled")]
    Disabled,
    #[error("unsupported translation engine: {0}")]
    UnsupportedEngine(String),
    #[error("{engine} API key is not configured")]
    MissingApiKey { engine: &'static str },
    #[error("{engine} request failed with status {status}: {body}")]
    Http {
        engine: &'static str,
        status: StatusCode,
        body: String,
        retry_after: Option<Duration>,
    },
    #[error("{engine} request failed: {message}")]
    Network { engine: &'static str, message: String },
    #[error("unexpected {engine} response: {reason}")]
    InvalidResponse { engine: &'static str, reason: String },
    #[error("{0} could not produce a confident translation")]
    EngineRefused(&'static str),
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("translation cancelled")]
    Cancelled,
    #[error("translation failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<TranslationError>,
    },
}

impl TranslationError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TranslationError::Http { .. }
            | TranslationError::Network { .. }
            | TranslationError::InvalidResponse { .. }
            | TranslationError::EngineRefused(_)
            | TranslationError::Timeout(_) => true,
            TranslationError::Disabled
            | TranslationError::UnsupportedEngine(_)
            | TranslationError::MissingApiKey { .. }
            | TranslationError::Cancelled
            | TranslationError::RetriesExhausted { .. } => false,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TranslationError::Disabled
                | TranslationError::UnsupportedEngine(_)
                | TranslationError::MissingApiKey { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TranslationError::Cancelled)
    }

    pub(crate) fn retry_hint(&self) -> Option<Duration> {
        match self {
            TranslationError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Google,
    DeepL,
    Gemini,
}

impl EngineKind {
    pub fn label(&self) -> &'static str {
        match self {
            EngineKind::Google => "Google Translate",
            EngineKind::DeepL => "DeepL",
            EngineKind::Gemini => "Gemini",
        }
    }
}

impl FromStr for EngineKind {
    type Err = TranslationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_lowercase().as_str() {
            "google" | "google translate" => Ok(EngineKind::Google),
            "deepl" => Ok(EngineKind::DeepL),
            "gemini" | "openai" | "openai-gemini" => Ok(EngineKind::Gemini),
            _ => Err(TranslationError::UnsupportedEngine(name.to_string())),
        }
    }
}

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Label recorded on translation results.
    fn name(&self, config: &TranslationConfig) -> &'static str;

    /// Translate `text`. `cancel` fires on caller cancellation or when the
    /// current attempt runs out of time.
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        config: &TranslationConfig,
        cancel: &CancellationToken,
    ) -> Result<String, TranslationError>;
}

/// Passthrough used while AI translation is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTranslator;

#[async_trait]
impl TranslationBackend for LocalTranslator {
    fn name(&self, _config: &TranslationConfig) -> &'static str {
        LOCAL_ENGINE_LABEL
    }

    async fn translate(
        &self,
        text: &str,
        _source_lang: &str,
        _target_lang: &str,
        _config: &TranslationConfig,
        _cancel: &CancellationToken,
    ) -> Result<String, TranslationError> {
        Ok(text.to_string())
    }
}

/// Pick the backend for `config`.
pub fn backend_for(
    config: &TranslationConfig,
) -> Result<Arc<dyn TranslationBackend>, TranslationError> {
    if config.enable_ai {
        Ok(Arc::new(RemoteTranslator::new()?))
    } else {
        Ok(Arc::new(LocalTranslator))
    }
}

pub(crate) fn normalize_api_key(key: &str) -> Option<&str> {
    let trimmed = key.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_engine_names_case_insensitively() {
        assert_eq!("Google".parse::<EngineKind>().unwrap(), EngineKind::Google);
        assert_eq!("DEEPL".parse::<EngineKind>().unwrap(), EngineKind::DeepL);
        assert_eq!(" gemini ".parse::<EngineKind>().unwrap(), EngineKind::Gemini);
        assert_eq!("OpenAI-Gemini".parse::<EngineKind>().unwrap(), EngineKind::Gemini);
        assert!(matches!(
            "babelfish".parse::<EngineKind>(),
            Err(TranslationError::UnsupportedEngine(name)) if name == "babelfish"
        ));
    }

    #[test]
    fn classifies_errors() {
        let server = TranslationError::Http {
            engine: "DeepL",
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
            retry_after: None,
        };
        let unauthorized = TranslationError::Http {
            engine: "DeepL",
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
            retry_after: None,
        };
        assert!(server.is_transient());
        assert!(unauthorized.is_transient());
        assert!(!unauthorized.is_configuration());
        assert!(TranslationError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!TranslationError::Cancelled.is_transient());
        assert!(TranslationError::MissingApiKey { engine: "Gemini" }.is_configuration());
        assert!(!TranslationError::MissingApiKey { engine: "Gemini" }.is_transient());
    }

    #[test]
    fn exhausted_error_names_cause() {
        let err = TranslationError::RetriesExhausted {
            attempts: 3,
            source: Box::new(TranslationError::EngineRefused("Gemini")),
        };
        assert_eq!(
            err.to_string(),
            "translation failed after 3 attempts: Gemini could not produce a confident translation"
        );
    }

    #[test]
    fn local_backend_echoes_input() {
        let config = TranslationConfig::default();
        let backend = backend_for(&config).unwrap();
        let out = tokio_test::block_on(backend.translate(
            "Hello {0}",
            "en",
            "vi",
            &config,
            &CancellationToken::new(),
        ))
        .unwrap();
        assert_eq!(out, "Hello {0}");
        assert_eq!(backend.name(&config), LOCAL_ENGINE_LABEL);
    }
}
