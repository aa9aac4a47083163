//! End-to-end tests for a quiz session over HTTP.
//!
//! A real server is bound to a free port and driven with reqwest. The
//! extraction gateway is an in-process stub, so no extraction service is
//! needed.

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use quiz_core::{
    create_router, AppState, Config, Document, ExtractionGateway, ExtractionRequest,
    ExtractionResult, RawQuestion,
};
use serde_json::{json, Value};

/// Path to the fixtures directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Finds an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Gateway that returns the same records for every document.
struct CannedGateway(Vec<RawQuestion>);

impl ExtractionGateway for CannedGateway {
    fn extract<'a>(&'a self, request: &'a ExtractionRequest) -> BoxFuture<'a, ExtractionResult> {
        assert_eq!(request.mime_type, "application/pdf");
        let records = self.0.clone();
        async move { Ok(records) }.boxed()
    }
}

/// Three questions, one of them invalid and dropped during validation.
fn canned_records() -> Vec<RawQuestion> {
    vec![
        RawQuestion::new("What is 2+2?", ["3", "4", "5"], "4"),
        RawQuestion::new("Too few options", ["Only"], "Only"),
        RawQuestion::new(
            "Which planet is known as the Red Planet?",
            ["Venus", "Mars", "Jupiter", "Saturn"],
            "Mars",
        ),
    ]
}

/// Starts a server for `state` and returns its base URL.
async fn start_server(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}/api"), handle)
}

async fn post(client: &reqwest::Client, url: String) -> Value {
    client
        .post(url)
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Response should be JSON")
}

async fn select(client: &reqwest::Client, base: &str, option: &str) -> Value {
    client
        .post(format!("{base}/select"))
        .json(&json!({ "option": option }))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Response should be JSON")
}

async fn session(client: &reqwest::Client, base: &str) -> Value {
    client
        .get(format!("{base}/session"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Response should be JSON")
}

async fn upload(client: &reqwest::Client, base: &str, content_type: &str, name: &str) -> Value {
    let bytes = std::fs::read(fixture_path().join("sample.pdf")).expect("Fixture missing");
    client
        .post(format!("{base}/document?name={name}"))
        .header("Content-Type", content_type)
        .body(bytes)
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Response should be JSON")
}

/// Polls the session until it leaves `extracting`.
async fn wait_until_extracted(client: &reqwest::Client, base: &str) -> Value {
    for _ in 0..50 {
        let view = session(client, base).await;
        if view["phase"] != "extracting" {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Extraction did not finish");
}

#[test]
fn test_sample_config_loads() {
    let config =
        Config::load_from_file(&fixture_path().join("pdfquiz.json")).expect("Failed to load");

    assert_eq!(config.extraction.endpoint, "http://127.0.0.1:8080/extract");
    assert_eq!(config.extraction.api_key_env, "PDFQUIZ_FIXTURE_KEY");
    assert_eq!(config.extraction.timeout_secs, 30);
    assert_eq!(config.max_document_size, 1_048_576);
    assert_eq!(config.server.port, 3100);
}

#[test]
fn test_sample_pdf_loads() {
    let document =
        Document::load(fixture_path().join("sample.pdf"), 1024 * 1024).expect("Failed to load");

    assert!(document.is_pdf());
    assert_eq!(document.display_name(), "sample.pdf");
    assert!(document.bytes().starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_full_quiz_over_http() {
    let state = AppState::new(
        Config::default(),
        Arc::new(CannedGateway(canned_records())),
    );
    let (base, handle) = start_server(state).await;
    let client = reqwest::Client::new();

    // Awaiting document
    let view = session(&client, &base).await;
    assert_eq!(view["phase"], "awaiting_document");

    // Wrong type is refused
    let view = upload(&client, &base, "text/plain", "sample.txt").await;
    assert_eq!(view["error"]["code"], "invalid_document_type");
    assert!(view.get("documentName").is_none());

    // PDF is accepted and clears the error
    let view = upload(&client, &base, "application/pdf", "sample.pdf").await;
    assert_eq!(view["documentName"], "sample.pdf");
    assert!(view.get("error").is_none());

    // Generate
    let view = post(&client, format!("{base}/generate")).await;
    assert_eq!(view["phase"], "extracting");

    let view = wait_until_extracted(&client, &base).await;
    assert_eq!(view["phase"], "answering");
    assert_eq!(view["questionCount"], 2);
    assert_eq!(view["currentIndex"], 0);
    assert_eq!(view["question"]["prompt"], "What is 2+2?");
    assert!(view.get("correctOption").is_none());

    // Question 1: change mind, then answer correctly
    select(&client, &base, "3").await;
    let view = select(&client, &base, "4").await;
    assert_eq!(view["pendingSelection"], "4");

    let view = post(&client, format!("{base}/submit")).await;
    assert_eq!(view["answerStatus"], "correct");
    assert_eq!(view["correctOption"], "4");
    assert_eq!(view["score"], 1);

    // Locked after submit
    let view = select(&client, &base, "5").await;
    assert_eq!(view["pendingSelection"], "4");

    // Question 2: answer incorrectly
    let view = post(&client, format!("{base}/advance")).await;
    assert_eq!(view["currentIndex"], 1);
    assert_eq!(view["answerStatus"], "unanswered");

    select(&client, &base, "Venus").await;
    let view = post(&client, format!("{base}/submit")).await;
    assert_eq!(view["answerStatus"], "incorrect");
    assert_eq!(view["correctOption"], "Mars");
    assert_eq!(view["score"], 1);

    // Summary
    let view = post(&client, format!("{base}/advance")).await;
    assert_eq!(view["phase"], "summary");
    assert_eq!(view["score"], 1);
    assert_eq!(view["questionCount"], 2);
    assert!(view["durationSecs"].is_i64());

    // Restart
    let view = post(&client, format!("{base}/restart")).await;
    assert_eq!(view["phase"], "awaiting_document");
    assert_eq!(view["score"], 0);
    assert!(view.get("documentName").is_none());

    handle.abort();
}

#[tokio::test]
async fn test_empty_extraction_over_http() {
    let state = AppState::new(
        Config::default(),
        Arc::new(CannedGateway(vec![RawQuestion::new(
            "Unanswerable",
            ["A", "B"],
            "C",
        )])),
    );
    let (base, handle) = start_server(state).await;
    let client = reqwest::Client::new();

    upload(&client, &base, "application/pdf", "sample.pdf").await;
    post(&client, format!("{base}/generate")).await;

    let view = wait_until_extracted(&client, &base).await;
    assert_eq!(view["phase"], "awaiting_document");
    assert_eq!(view["error"]["code"], "empty_result");
    assert_eq!(
        view["error"]["message"],
        "No recognizable questions were found in this document."
    );

    // A new document clears the error
    let view = upload(&client, &base, "application/pdf", "other.pdf").await;
    assert!(view.get("error").is_none());

    handle.abort();
}

#[tokio::test]
async fn test_triggers_out_of_phase_are_ignored() {
    let state = AppState::new(
        Config::default(),
        Arc::new(CannedGateway(canned_records())),
    );
    let (base, handle) = start_server(state).await;
    let client = reqwest::Client::new();

    for trigger in ["submit", "advance", "restart", "cancel"] {
        let response = client
            .post(format!("{base}/{trigger}"))
            .send()
            .await
            .expect("Request failed");
        assert!(response.status().is_success(), "{trigger} should succeed");

        let view: Value = response.json().await.expect("Response should be JSON");
        assert_eq!(view["phase"], "awaiting_document", "{trigger}");
        assert!(view.get("error").is_none(), "{trigger}");
    }

    let view = select(&client, &base, "4").await;
    assert!(view.get("pendingSelection").is_none());

    handle.abort();
}
