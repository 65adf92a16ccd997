//! Remote engines against a mocked HTTP server.

use paradox_translator_core::ai::{EngineEndpoints, RemoteTranslator, RetryPolicy};
use paradox_translator_core::{TranslationConfig, TranslationOrchestrator};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{any, body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn quick_retries() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(5), 3)
}

fn orchestrator(server: &MockServer, config: TranslationConfig) -> TranslationOrchestrator {
    let endpoints = EngineEndpoints {
        google: format!("{}/google", server.uri()),
        deepl: format!("{}/deepl", server.uri()),
        gemini: Some(format!("{}/gemini", server.uri())),
    };
    let backend = RemoteTranslator::with_endpoints(endpoints).unwrap();
    TranslationOrchestrator::with_backend(Arc::new(backend), config).with_retry_policy(quick_retries())
}

fn ai_config(engine: &str) -> TranslationConfig {
    TranslationConfig {
        enable_ai: true,
        selected_engine: engine.to_string(),
        google_api_key: "google-key".to_string(),
        deepl_api_key: "deepl-key".to_string(),
        gemini_api_key: "gemini-key".to_string(),
        timeout_seconds: 5,
        ..TranslationConfig::default()
    }
}

#[tokio::test]
async fn google_translates_with_masked_placeholders() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/google"))
        .and(header("authorization", "Bearer google-key"))
        .and(body_partial_json(json!({
            "q": "Hello __PH_0__",
            "source": "en",
            "target": "vi",
            "format": "text",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "translations": [ { "translatedText": "Xin chào __PH_0__" } ] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = orchestrator(&server, ai_config("Google"))
        .translate_one("Hello $NAME$", "en", "vi", &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.translated_text, "Xin chào $NAME$");
    assert_eq!(result.engine, "Google Translate");
}

#[tokio::test]
async fn deepl_sends_form_with_uppercase_languages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/deepl"))
        .and(header("authorization", "DeepL-Auth-Key deepl-key"))
        .and(body_string_contains("target_lang=VI"))
        .and(body_string_contains("source_lang=EN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translations": [ { "text": "Chào" } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = orchestrator(&server, ai_config("deepl"))
        .translate_one("Hi", "en", "vi", &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.translated_text, "Chào");
    assert_eq!(result.engine, "DeepL");
}

#[tokio::test]
async fn gemini_reads_first_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gemini"))
        .and(header("x-goog-api-key", "gemini-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "maxOutputTokens": 1000 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [ { "content": { "parts": [ { "text": "  Bonjour\n" } ] } } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = orchestrator(&server, ai_config("Gemini"))
        .translate_one("Hello", "en", "fr", &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.translated_text, "Bonjour");
}

#[tokio::test]
async fn missing_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TranslationConfig {
        google_api_key: "   ".to_string(),
        ..ai_config("Google")
    };
    let result = orchestrator(&server, config)
        .translate_one("Hello", "en", "vi", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("Google Translate API key is not configured")
    );
}

#[tokio::test]
async fn unsupported_engine_is_reported() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = orchestrator(&server, ai_config("Babelfish"))
        .translate_one("Hello", "en", "vi", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result
        .error_message
        .unwrap()
        .contains("unsupported translation engine"));
}

#[tokio::test]
async fn server_errors_are_retried_three_times() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/google"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(3)
        .mount(&server)
        .await;

    let result = orchestrator(&server, ai_config("Google"))
        .translate_one("Hello", "en", "vi", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    let message = result.error_message.unwrap();
    assert!(message.contains("after 3 attempts"), "{message}");
    assert!(message.contains("503"), "{message}");
}

#[tokio::test]
async fn client_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/deepl"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(3)
        .mount(&server)
        .await;

    let result = orchestrator(&server, ai_config("DeepL"))
        .translate_one("Hello", "en", "vi", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    let message = result.error_message.unwrap();
    assert!(message.contains("after 3 attempts"), "{message}");
    assert!(message.contains("403"), "{message}");
}

#[tokio::test]
async fn gemini_refusal_is_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gemini"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [ { "content": { "parts": [ { "text": "TRANSLATION_ERROR" } ] } } ]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let result = orchestrator(&server, ai_config("Gemini"))
        .translate_one("Hello", "en", "vi", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result
        .error_message
        .unwrap()
        .contains("could not produce a confident translation"));
}

#[tokio::test]
async fn slow_responses_time_out_per_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/google"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({ "data": { "translations": [ { "translatedText": "late" } ] } })),
        )
        .mount(&server)
        .await;

    let config = TranslationConfig {
        timeout_seconds: 1,
        ..ai_config("Google")
    };
    let orchestrator = orchestrator(&server, config)
        .with_retry_policy(RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(1), 1));
    let result = orchestrator
        .translate_one("Hello", "en", "vi", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.error_message.unwrap().contains("timed out"));
}
