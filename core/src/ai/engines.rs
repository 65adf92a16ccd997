//! HTTP adapters for the remote translation engines.

use super::retry::{parse_gemini_retry_delay, parse_retry_after};
use super::{normalize_api_key, EngineKind, TranslationBackend, TranslationError};
use crate::config::{TranslationConfig, DEFAULT_GEMINI_ENDPOINT};
use async_trait::async_trait;
use log::debug;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

pub const GOOGLE_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";
pub const DEEPL_ENDPOINT: &str = "https://api-free.deepl.com/v2/translate";

/// Reply the generative engine is told to give when it cannot translate.
pub const REFUSAL_SENTINEL: &str = "TRANSLATION_ERROR";

const GEMINI_TEMPERATURE: f32 = 0.1;
const GEMINI_MAX_OUTPUT_TOKENS: u32 = 1000;

#[derive(Debug, Clone)]
pub struct EngineEndpoints {
    pub google: String,
    pub deepl: String,
    /// Takes precedence over `TranslationConfig::gemini_endpoint` when set.
    pub gemini: Option<String>,
}

impl Default for EngineEndpoints {
    fn default() -> Self {
        Self {
            google: GOOGLE_ENDPOINT.to_string(),
            deepl: DEEPL_ENDPOINT.to_string(),
            gemini: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteTranslator {
    client: Client,
    endpoints: EngineEndpoints,
}

impl RemoteTranslator {
    pub fn new() -> Result<Self, TranslationError> {
        Self::with_endpoints(EngineEndpoints::default())
    }

    pub fn with_endpoints(endpoints: EngineEndpoints) -> Result<Self, TranslationError> {
        let client = Client::builder()
            .user_agent(concat!("paradox-translator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| TranslationError::Network {
                engine: "HTTP client",
                message: err.to_string(),
            })?;
        Ok(Self { client, endpoints })
    }

    fn gemini_endpoint<'a>(&'a self, config: &'a TranslationConfig) -> &'a str {
        let configured = config.gemini_endpoint.trim();
        match self.endpoints.gemini.as_deref() {
            Some(endpoint) => endpoint,
            None if configured.is_empty() => DEFAULT_GEMINI_ENDPOINT,
            None => configured,
        }
    }

    fn build_request(
        &self,
        engine: EngineKind,
        api_key: &str,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        config: &TranslationConfig,
    ) -> RequestBuilder {
        match engine {
            EngineKind::Google => self
                .client
                .post(&self.endpoints.google)
                .bearer_auth(api_key)
                .json(&serde_json::json!({
                    "q": text,
                    "source": source_lang,
                    "target": target_lang,
                    "format": "text",
                })),
            EngineKind::DeepL => self
                .client
                .post(&self.endpoints.deepl)
                .header("Authorization", format!("DeepL-Auth-Key {api_key}"))
                .form(&[
                    ("text", text.to_string()),
                    ("source_lang", source_lang.to_uppercase()),
                    ("target_lang", target_lang.to_uppercase()),
                ]),
            EngineKind::Gemini => self
                .client
                .post(self.gemini_endpoint(config))
                .header("x-goog-api-key", api_key)
                .json(&serde_json::json!({
                    "contents": [
                        { "parts": [ { "text": build_prompt(text, source_lang, target_lang) } ] }
                    ],
                    "generationConfig": {
                        "temperature": GEMINI_TEMPERATURE,
                        "maxOutputTokens": GEMINI_MAX_OUTPUT_TOKENS,
                    },
                })),
        }
    }

    async fn send(
        &self,
        engine: EngineKind,
        request: RequestBuilder,
    ) -> Result<String, TranslationError> {
        let network = |err: reqwest::Error| TranslationError::Network {
            engine: engine.label(),
            message: err.to_string(),
        };

        let response = request.send().await.map_err(network)?;
        let status = response.status();
        let header_hint = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_retry_after(value, SystemTime::now()));
        let body = response.text().await.map_err(network)?;

        if !status.is_success() {
            let retry_after = header_hint.or_else(|| gemini_retry_hint(&body));
            return Err(TranslationError::Http {
                engine: engine.label(),
                status,
                body,
                retry_after,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl TranslationBackend for RemoteTranslator {
    fn name(&self, config: &TranslationConfig) -> &'static str {
        config
            .engine()
            .map(|engine| engine.label())
            .unwrap_or("Unknown")
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        config: &TranslationConfig,
        cancel: &CancellationToken,
    ) -> Result<String, TranslationError> {
        if !config.enable_ai {
            return Err(TranslationError::Disabled);
        }
        let engine = config.engine()?;
        let api_key = normalize_api_key(config.api_key(engine)).ok_or(
            TranslationError::MissingApiKey {
                engine: engine.label(),
            },
        )?;

        debug!("sending {} chars to {}", text.chars().count(), engine.label());
        let request = self.build_request(engine, api_key, text, source_lang, target_lang, config);
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
            body = self.send(engine, request) => body?,
        };

        match engine {
            EngineKind::Google => parse_google_response(&body),
            EngineKind::DeepL => parse_deepl_response(&body),
            EngineKind::Gemini => parse_gemini_response(&body),
        }
    }
}

pub fn build_prompt(text: &str, source_lang: &str, target_lang: &str) -> String {
    format!(
        "You are a professional translator for Paradox Interactive game localisation.\n\
         Translate the following text from {source_lang} to {target_lang}.\n\n\
         Rules:\n\
         1. Translate naturally while preserving the exact meaning.\n\
         2. Keep ALL placeholders unchanged, for example __PH_0__, {{0}}, %s, %d, $VAR$, $NAME[x]$, [Root.GetName], <b>.\n\
         3. Keep every placeholder in the same casing and do not add or remove any.\n\
         4. Output ONLY the translated text, without quotes or explanations.\n\
         5. Do not copy the source text when unsure; respond with exactly {REFUSAL_SENTINEL} instead.\n\n\
         Text to translate:\n{text}\n\nYour translation:"
    )
}

#[derive(Debug, Default, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    data: Option<GoogleData>,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleData {
    #[serde(default)]
    translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
struct GoogleTranslation {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeepLResponse {
    #[serde(default)]
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    choices: Vec<ChoiceFallback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceFallback {
    text: Option<String>,
}

fn invalid(engine: EngineKind, reason: impl Into<String>) -> TranslationError {
    TranslationError::InvalidResponse {
        engine: engine.label(),
        reason: reason.into(),
    }
}

pub(crate) fn parse_google_response(body: &str) -> Result<String, TranslationError> {
    let parsed: GoogleResponse =
        serde_json::from_str(body).map_err(|err| invalid(EngineKind::Google, err.to_string()))?;
    parsed
        .data
        .and_then(|data| data.translations.into_iter().next())
        .and_then(|translation| translation.translated_text)
        .ok_or_else(|| invalid(EngineKind::Google, "missing data.translations[0].translatedText"))
}

pub(crate) fn parse_deepl_response(body: &str) -> Result<String, TranslationError> {
    let parsed: DeepLResponse =
        serde_json::from_str(body).map_err(|err| invalid(EngineKind::DeepL, err.to_string()))?;
    parsed
        .translations
        .into_iter()
        .next()
        .and_then(|translation| translation.text)
        .ok_or_else(|| invalid(EngineKind::DeepL, "missing translations[0].text"))
}

pub(crate) fn parse_gemini_response(body: &str) -> Result<String, TranslationError> {
    let parsed: GeminiResponse =
        serde_json::from_str(body).map_err(|err| invalid(EngineKind::Gemini, err.to_string()))?;

    let candidate_text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text);
    let text = candidate_text
        .or_else(|| parsed.choices.into_iter().next().and_then(|choice| choice.text))
        .ok_or_else(|| invalid(EngineKind::Gemini, "missing candidates[0].content.parts[0].text"))?;

    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case(REFUSAL_SENTINEL) {
        return Err(TranslationError::EngineRefused(EngineKind::Gemini.label()));
    }
    Ok(trimmed.to_string())
}

/// `error.details[].retryDelay` from a Gemini quota error body.
fn gemini_retry_hint(body: &str) -> Option<Duration> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/details")?
        .as_array()?
        .iter()
        .filter_map(|detail| detail.get("retryDelay").and_then(Value::as_str))
        .find_map(parse_gemini_retry_delay)
}
