use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mailsorter::classifier::{
    BatchClassifier, Category, ChatCompletionsClient, Credential, EmailClassifier, Pacer,
};
use mailsorter::config::ClassifierConfig;
use mailsorter::email::JsonFileSource;
use mailsorter::email_processor::EmailProcessor;
use mailsorter::store::{export_csv, CategoryFilter, ResultStore};

fn completion(content: &str) -> serde_json::Value {
    json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
}

fn write_inbox(dir: &std::path::Path) -> std::path::PathBuf {
    let inbox = json!([
        { "id": "a1", "subject": "Flash sale: 70% off", "from": "Shop <deals@shop.example>",
          "date": "Mon, 13 Oct 2025 08:00:00 +0000", "snippet": "Everything must go", "body": "" },
        { "id": "b2", "subject": "Dinner on Friday?", "from": "Sam <sam@example.com>",
          "date": "Mon, 13 Oct 2025 09:00:00 +0000", "snippet": "", "body": "Are you around on Friday evening?" },
        { "id": "c3", "subject": "You won a prize", "from": "Lottery <win@scam.example>",
          "date": "Mon, 13 Oct 2025 10:00:00 +0000", "snippet": "Claim now", "body": "" }
    ]);
    let path = dir.join("inbox.json");
    std::fs::write(&path, serde_json::to_vec(&inbox).unwrap()).unwrap();
    path
}

async fn processor_for(
    server: &MockServer,
    input: std::path::PathBuf,
) -> EmailProcessor<ChatCompletionsClient> {
    let mut config = ClassifierConfig::default();
    config.base_url = format!("{}/v1", server.uri());
    config.pacing_ms = 1;

    let client = ChatCompletionsClient::new(&config.base_url, Duration::from_secs(5)).unwrap();
    let batch = BatchClassifier::new(
        EmailClassifier::new(client, &config),
        Pacer::fixed(config.pacing()),
    );

    EmailProcessor::from_parts(
        Box::new(JsonFileSource::new(input)),
        batch,
        Credential::new("sk-test").unwrap(),
    )
}

#[tokio::test]
async fn test_pipeline_classifies_stores_and_exports() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Flash sale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Promotions")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Dinner on Friday"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Social")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("You won a prize"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let store = ResultStore::new(dir.path().join("data"));
    let processor = processor_for(&server, write_inbox(dir.path()))
        .await
        .with_store(ResultStore::new(dir.path().join("data")));

    let run = processor
        .process_emails(15, &CancellationToken::new())
        .await
        .unwrap();

    let categories: Vec<(&str, Category)> = run.emails.iter().map(|e| (e.id(), e.category)).collect();
    assert_eq!(
        categories,
        vec![
            ("a1", Category::Promotions),
            ("b2", Category::Social),
            ("c3", Category::General),
        ]
    );
    assert_eq!(run.failures, 1);
    assert!(run.source.starts_with("file:"));

    let stored = store.load().unwrap().expect("results should be stored");
    assert_eq!(stored, run);

    let only_social: CategoryFilter = "social".parse().unwrap();
    let shown: Vec<_> = only_social.apply(&stored.emails).into_iter().cloned().collect();
    let csv_path = dir.path().join("social.csv");
    assert_eq!(export_csv(&shown, &csv_path).unwrap(), 1);
    assert!(std::fs::read_to_string(&csv_path).unwrap().contains("Dinner on Friday?"));
}

#[tokio::test]
async fn test_pipeline_respects_limit() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Spam")))
        .expect(2)
        .mount(&server)
        .await;

    let processor = processor_for(&server, write_inbox(dir.path())).await;
    let run = processor
        .process_emails(2, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.emails.len(), 2);
    assert_eq!(run.summary.count(Category::Spam), 2);
}

#[tokio::test]
async fn test_missing_input_is_the_only_surfaced_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Spam")))
        .expect(0)
        .mount(&server)
        .await;

    let processor = processor_for(&server, dir.path().join("missing.json")).await;
    let result = processor.process_emails(15, &CancellationToken::new()).await;

    assert!(result.is_err());
}
