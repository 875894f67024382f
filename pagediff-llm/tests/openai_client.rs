mod common;

use pagediff_common::PageDiffError;
use pagediff_llm::comparator::Comparator;
use pagediff_llm::openai::OpenAiClient;
use pagediff_llm::traits::LlmClient;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn responses_body(text: &str) -> serde_json::Value {
    json!({
        "id": "resp_123",
        "status": "completed",
        "model": "gpt-4o-mini-2024-07-18",
        "output": [
            { "type": "reasoning", "content": [] },
            {
                "type": "message",
                "content": [
                    { "type": "output_text", "text": text }
                ]
            }
        ],
        "usage": { "total_tokens": 42 }
    })
}

fn client_for(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(
        "sk-test".to_string(),
        "gpt-4o-mini".to_string(),
        &format!("{}/v1", server.uri()),
    )
    .expect("client builds")
}

#[tokio::test]
async fn generate_posts_responses_request() {
    common::init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "input": "compare these",
            "instructions": "be strict",
            "max_output_tokens": 64
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(responses_body("97\nclose")))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client_for(&server)
        .generate("compare these", Some("be strict"), Some(64), Some(0.3))
        .await
        .expect("generate succeeds");

    assert_eq!(resp.text, "97\nclose");
    assert_eq!(resp.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
    assert_eq!(resp.tokens_used, Some(42));
}

#[tokio::test]
async fn empty_output_is_an_oracle_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_empty",
            "status": "incomplete",
            "model": "gpt-4o-mini",
            "output": []
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate("x", None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PageDiffError::Oracle(ref m) if m.contains("resp_empty")));
}

#[tokio::test]
async fn rejected_credential_is_an_oracle_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided" }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate("x", None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PageDiffError::Oracle(ref m) if m.contains("Incorrect API key")));
}

#[tokio::test]
async fn comparator_over_http_parses_verdict() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(body_partial_json(json!({ "temperature": 0.3 })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(responses_body("91\nPage B lists an extra contact email.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let comparator = Comparator::new(Arc::new(client_for(&server)));
    let verdict = comparator
        .compare("Contact us at the office.", "Contact us at the office or by email.")
        .await;

    assert_eq!(verdict.score, 91);
    assert_eq!(verdict.analysis, "Page B lists an extra contact email.");
}

#[tokio::test]
async fn comparator_server_failure_scores_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "context_length_exceeded" }
        })))
        .mount(&server)
        .await;

    let verdict = Comparator::new(Arc::new(client_for(&server)))
        .compare("alpha", "beta")
        .await;

    assert_eq!(verdict.score, 0);
    assert!(verdict.analysis.starts_with("Error in comparison:"));
    assert!(verdict.analysis.contains("context_length_exceeded"));
}
