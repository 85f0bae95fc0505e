use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mailsorter::classifier::{
    Category, ChatCompletionsClient, ClassificationError, CompletionClient, CompletionRequest,
    Credential, EmailClassifier,
};
use mailsorter::config::ClassifierConfig;
use mailsorter::email::RawEmail;

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "gen-1",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }
        ]
    })
}

fn client_for(server: &MockServer, timeout: Duration) -> ChatCompletionsClient {
    ChatCompletionsClient::new(&format!("{}/api/v1/", server.uri()), timeout).unwrap()
}

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "test-model".to_string(),
        system: "Answer with one word".to_string(),
        user: "From: a\nSubject: b".to_string(),
        temperature: 0.0,
        max_tokens: 10,
    }
}

fn credential() -> Credential {
    Credential::new("sk-test").unwrap()
}

#[tokio::test]
async fn test_sends_bearer_and_completion_settings() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "temperature": 0.0,
            "max_tokens": 10,
            "messages": [
                { "role": "system", "content": "Answer with one word" },
                { "role": "user", "content": "From: a\nSubject: b" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Social")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let text = client.complete(&request(), &credential()).await.unwrap();

    assert_eq!(text, "Social");
}

#[tokio::test]
async fn test_non_success_status_is_endpoint_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limit exceeded"))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client.complete(&request(), &credential()).await.unwrap_err();

    match err {
        ClassificationError::Endpoint { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limit exceeded");
        }
        other => panic!("expected endpoint error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_garbage_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client.complete(&request(), &credential()).await.unwrap_err();

    assert!(matches!(err, ClassificationError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_no_choices_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client.complete(&request(), &credential()).await.unwrap_err();

    assert!(matches!(err, ClassificationError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_null_content_is_empty_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "role": "assistant", "content": null } } ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let text = client.complete(&request(), &credential()).await.unwrap();

    assert_eq!(text, "");
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("Spam"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_millis(100));
    let err = client.complete(&request(), &credential()).await.unwrap_err();

    assert!(matches!(err, ClassificationError::Timeout(d) if d == Duration::from_millis(100)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    // Rien n'écoute sur le port 9 de l'interface loopback
    let client = ChatCompletionsClient::new("http://127.0.0.1:9/v1", Duration::from_secs(5)).unwrap();
    let err = client.complete(&request(), &credential()).await.unwrap_err();

    assert!(matches!(err, ClassificationError::Transport(_)));
}

#[tokio::test]
async fn test_classifier_end_to_end_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "nvidia/nemotron-nano-12b-2-vl:free" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("  Important!!  ")))
        .expect(1)
        .mount(&server)
        .await;

    let classifier = EmailClassifier::new(
        client_for(&server, Duration::from_secs(5)),
        &ClassifierConfig::default(),
    );
    let email = RawEmail::new(
        "m-1",
        "Your flight is tomorrow",
        "Airline <no-reply@airline.example>",
        "Tue, 14 Oct 2025 09:30:00 +0000",
        "Check in now",
        "",
    );

    let category = classifier.classify(&email, &credential()).await.unwrap();
    assert_eq!(category, Category::Important);
}
