//! Reasoning service tests against a wiremock server
//!
//! Covers both HTTP backends and the advisor's fallback on every failure
//! shape (non-2xx, empty reply, malformed body, slow server).

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sensei::hint::service::{OllamaService, OpenRouterService};
use sensei::hint::{
    HintAdvisor, HintContext, HintSource, ReasoningService, DIAGNOSIS_UNAVAILABLE,
    FALLBACK_SUGGESTIONS,
};

// =============================================================================
// HELPERS
// =============================================================================

fn ollama(server: &MockServer) -> Arc<dyn ReasoningService> {
    Arc::new(OllamaService::new(Some(&server.uri()), "test-model").unwrap())
}

fn openrouter(server: &MockServer) -> Arc<dyn ReasoningService> {
    Arc::new(OpenRouterService::new(Some(&server.uri()), Some("sk-test"), "test-model").unwrap())
}

fn ctx() -> HintContext {
    HintContext {
        kata_name: "two-sum".to_string(),
        ..Default::default()
    }
}

fn assert_fallback(suggestions: &[String]) {
    let expected: Vec<String> = FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect();
    assert_eq!(suggestions, expected.as_slice());
}

// =============================================================================
// OLLAMA
// =============================================================================

#[tokio::test]
async fn test_ollama_chat_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "test-model", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "- Check the empty list case\n- Print the index map" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let advisor = HintAdvisor::new(ollama(&server));
    let block = advisor.build_hint("why does it fail?", &ctx()).await;

    assert_eq!(block.source, HintSource::Service);
    assert_eq!(
        block.suggestions,
        vec!["Check the empty list case", "Print the index map"]
    );
    assert_eq!(block.question, "why does it fail?");
}

#[tokio::test]
async fn test_ollama_server_error_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let err = ollama(&server).complete("sys", "user").await.unwrap_err();
    assert!(err.to_string().contains("500"));

    let block = HintAdvisor::new(ollama(&server))
        .build_hint("stuck", &ctx())
        .await;
    assert_eq!(block.source, HintSource::Fallback);
    assert_fallback(&block.suggestions);
    assert_eq!(block.question, "stuck");
}

#[tokio::test]
async fn test_ollama_empty_reply_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "   " }
        })))
        .mount(&server)
        .await;

    let block = HintAdvisor::new(ollama(&server))
        .build_hint("stuck", &ctx())
        .await;
    assert_eq!(block.source, HintSource::Fallback);
    assert_fallback(&block.suggestions);
}

#[tokio::test]
async fn test_ollama_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": { "content": "too late" } }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let advisor = HintAdvisor::new(ollama(&server)).with_timeout(Duration::from_millis(200));
    let block = advisor.build_hint("stuck", &ctx()).await;
    assert_eq!(block.source, HintSource::Fallback);
}

// =============================================================================
// OPENROUTER
// =============================================================================

#[tokio::test]
async fn test_openrouter_sends_bearer_and_reads_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "1. Re-read your question\n* Guard against None" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let block = HintAdvisor::new(openrouter(&server))
        .build_hint("None crashes", &ctx())
        .await;

    assert_eq!(block.source, HintSource::Service);
    assert!(block
        .suggestions
        .iter()
        .all(|s| !s.to_lowercase().contains("re-read your question")));
    assert!(block.suggestions.iter().any(|s| s == "Guard against None"));
}

#[tokio::test]
async fn test_openrouter_malformed_body_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = openrouter(&server).complete("sys", "user").await.unwrap_err();
    assert!(err.to_string().contains("Invalid response format"));
}

#[test]
fn test_openrouter_requires_key() {
    let err = OpenRouterService::new(None, None, "m").err().unwrap();
    assert!(err.to_string().contains("SENSEI_API_KEY"));
}

// =============================================================================
// DIAGNOSIS
// =============================================================================

#[tokio::test]
async fn test_diagnosis_sends_output_tail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("AssertionError: 5 != 4"))
        .and(body_string_contains("Kata: sum"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "content": "add() returns a + b + 1." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = format!("HEAD-MARKER\n{}\nAssertionError: 5 != 4", "x".repeat(3000));
    let diagnosis = HintAdvisor::new(ollama(&server)).diagnose("sum", &output).await;

    assert_eq!(diagnosis.source, HintSource::Service);
    assert_eq!(diagnosis.text, "add() returns a + b + 1.");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(!body.contains("HEAD-MARKER"));
}

#[tokio::test]
async fn test_diagnosis_server_error_uses_fixed_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let diagnosis = HintAdvisor::new(ollama(&server)).diagnose("sum", "boom").await;
    assert_eq!(diagnosis.source, HintSource::Fallback);
    assert_eq!(diagnosis.text, DIAGNOSIS_UNAVAILABLE);
}
