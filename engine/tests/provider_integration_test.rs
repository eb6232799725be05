//! Integration tests for the LLM providers
//!
//! Validates request shaping and response parsing against mock HTTP
//! servers, including the native JSON-output modes used for structured
//! query synthesis.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use askdb_engine::config::{GeminiConfig, OpenAIConfig};
use askdb_engine::llm::gemini::GeminiProvider;
use askdb_engine::llm::ollama::OllamaProvider;
use askdb_engine::llm::openai::OpenAIProvider;
use askdb_engine::llm::{LlmError, LlmProvider, Message};

fn gemini_provider(server: &MockServer) -> GeminiProvider {
    std::env::set_var("GEMINI_API_KEY", "test-key");
    GeminiProvider::new(GeminiConfig {
        base_url: server.uri(),
        model: "gemini-1.5-pro".to_string(),
    })
}

fn openai_provider(server: &MockServer) -> OpenAIProvider {
    std::env::set_var("OPENAI_API_KEY", "test-key");
    OpenAIProvider::new(OpenAIConfig {
        base_url: server.uri(),
        model: "gpt-4o-mini".to_string(),
    })
}

fn gemini_text_response(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{"text": text}]
            }
        }]
    })
}

fn openai_text_response(text: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": text
            }
        }]
    })
}

#[tokio::test]
async fn test_gemini_structured_query_requests_json_mode() {
    let server = MockServer::start().await;

    // Only a request that constrains the output to JSON matches
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-pro:generateContent"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_text_response(
            r#"{"query": "SELECT count(*) FROM customers", "top_k": 5}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let provider = gemini_provider(&server);
    let plan = provider
        .generate_query(&[Message::system("sys"), Message::user("Question: how many?")])
        .await
        .unwrap();

    assert_eq!(plan.query, "SELECT count(*) FROM customers");
    assert_eq!(plan.top_k, 5);
}

#[tokio::test]
async fn test_gemini_free_text_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-pro:generateContent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_text_response("There are 3 customers.")),
        )
        .mount(&server)
        .await;

    let provider = gemini_provider(&server);
    let answer = provider.complete(&[Message::user("rephrase this")]).await.unwrap();

    assert_eq!(answer, "There are 3 customers.");
}

#[tokio::test]
async fn test_gemini_auth_failure_maps_to_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let provider = gemini_provider(&server);
    let result = provider.complete(&[Message::user("hi")]).await;

    assert!(matches!(result, Err(LlmError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_openai_structured_query_requests_json_object() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_text_response(
            r#"{"query": "SELECT name FROM customers LIMIT 10"}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let provider = openai_provider(&server);
    let plan = provider
        .generate_query(&[Message::user("Question: who are the customers?")])
        .await
        .unwrap();

    assert_eq!(plan.query, "SELECT name FROM customers LIMIT 10");
    assert_eq!(plan.top_k, 10);
}

#[tokio::test]
async fn test_openai_nonconforming_structured_output_fails_cleanly() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_text_response(
            r#"{"explanation": "I cannot write SQL for that"}"#,
        )))
        .mount(&server)
        .await;

    let provider = openai_provider(&server);
    let result = provider.generate_query(&[Message::user("Question: ?")]).await;

    assert!(matches!(result, Err(LlmError::ParseError(_))));
}

#[tokio::test]
async fn test_openai_rate_limit_maps_to_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let provider = openai_provider(&server);
    let result = provider.complete(&[Message::user("hi")]).await;

    assert!(matches!(result, Err(LlmError::RateLimitExceeded)));
}

#[tokio::test]
async fn test_ollama_structured_query_uses_json_format() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"format": "json"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1:8b",
            "message": {
                "role": "assistant",
                "content": r#"{"query": "SELECT count(*) FROM orders", "top_k": 3}"#
            },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri(), "llama3.1:8b");
    let plan = provider
        .generate_query(&[Message::user("Question: how many orders?")])
        .await
        .unwrap();

    assert_eq!(plan.query, "SELECT count(*) FROM orders");
    assert_eq!(plan.top_k, 3);
}

#[tokio::test]
async fn test_ollama_free_text_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1:8b",
            "message": {
                "role": "assistant",
                "content": "There are 2 orders."
            },
            "done": true
        })))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri(), "llama3.1:8b");
    let answer = provider.complete(&[Message::user("rephrase")]).await.unwrap();

    assert_eq!(answer, "There are 2 orders.");
}

#[tokio::test]
async fn test_ollama_server_error_maps_to_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri(), "llama3.1:8b");
    let result = provider.complete(&[Message::user("hi")]).await;

    assert!(matches!(result, Err(LlmError::ProviderUnavailable(_))));
}
