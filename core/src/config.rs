/// Configuration consumed by the translation pipeline
use crate::ai::{EngineKind, TranslationError};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

const CONFIG_FILE_NAME: &str = "translation_config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationConfig {
    pub google_api_key: String,
    pub gemini_api_key: String,
    pub gemini_endpoint: String,
    pub deepl_api_key: String,
    /// Engine name, matched case-insensitively.
    pub selected_engine: String,
    pub max_concurrent_requests: usize,
    /// Per-attempt bound; zero disables it.
    pub timeout_seconds: u64,
    pub overwrite_existing_translations: bool,
    pub treat_placeholder_mismatch_as_error: bool,
    pub create_backup_before_save: bool,
    pub enable_ai: bool,
    pub source_language: String,
    pub target_language: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            google_api_key: String::new(),
            gemini_api_key: String::new(),
            gemini_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            deepl_api_key: String::new(),
            selected_engine: "Google".to_string(),
            max_concurrent_requests: 5,
            timeout_seconds: 30,
            overwrite_existing_translations: false,
            treat_placeholder_mismatch_as_error: true,
            create_backup_before_save: true,
            enable_ai: false,
            source_language: "en".to_string(),
            target_language: "vi".to_string(),
        }
    }
}

impl TranslationConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load from `path`, falling back to defaults when the file is missing or unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("using default translation config, {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(crate::APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn engine(&self) -> Result<EngineKind, TranslationError> {
        self.selected_engine.parse()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrent_requests.max(1)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    pub fn api_key(&self, engine: EngineKind) -> &str {
        match engine {
            EngineKind::Google => &self.google_api_key,
            EngineKind::DeepL => &self.deepl_api_key,
            EngineKind::Gemini => &self.gemini_api_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TranslationConfig::default();
        assert_eq!(config.selected_engine, "Google");
        assert_eq!(config.max_concurrent_requests, 5);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert!(!config.overwrite_existing_translations);
        assert!(config.treat_placeholder_mismatch_as_error);
        assert!(config.create_backup_before_save);
        assert!(!config.enable_ai);
        assert_eq!(config.gemini_endpoint, DEFAULT_GEMINI_ENDPOINT);
    }

    #[test]
    fn test_json_uses_camel_case_and_defaults() {
        let config =
            TranslationConfig::from_json(r#"{"selectedEngine":"deepl","maxConcurrentRequests":0}"#)
                .unwrap();
        assert_eq!(config.engine().unwrap(), EngineKind::DeepL);
        assert_eq!(config.max_concurrency(), 1);
        assert_eq!(config.source_language, "en");

        let json = config.to_json().unwrap();
        assert!(json.contains("\"treatPlaceholderMismatchAsError\""));
        assert_eq!(TranslationConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_zero_timeout_disables_bound() {
        let config = TranslationConfig {
            timeout_seconds: 0,
            ..TranslationConfig::default()
        };
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings").join("config.json");
        assert_eq!(TranslationConfig::load_or_default(&path), TranslationConfig::default());

        let config = TranslationConfig {
            enable_ai: true,
            google_api_key: "k".into(),
            ..TranslationConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(TranslationConfig::load_or_default(&path), config);

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(TranslationConfig::load_or_default(&path), TranslationConfig::default());
    }

    #[test]
    fn test_api_key_per_engine() {
        let config = TranslationConfig {
            google_api_key: "g".into(),
            deepl_api_key: "d".into(),
            gemini_api_key: "m".into(),
            ..TranslationConfig::default()
        };
        assert_eq!(config.api_key(EngineKind::Google), "g");
        assert_eq!(config.api_key(EngineKind::DeepL), "d");
        assert_eq!(config.api_key(EngineKind::Gemini), "m");
    }
}
