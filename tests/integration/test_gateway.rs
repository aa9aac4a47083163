//! Tests for the HTTP extraction gateway against a mock extraction service.
//!
//! The mock is a small axum app bound to a free port. Each route plays one
//! kind of service behaviour.

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use quiz_core::{
    extract_with_timeout, Document, ExtractionError, ExtractionGateway, ExtractionRequest, Phase,
    Session,
};
use quiz_extract::HttpExtractionGateway;

const QUESTIONS_JSON: &str = r#"[
    {"question": "What is 2+2?", "options": ["3", "4", "5"], "answer": "4"},
    {"question": "Capital of Italy?", "options": ["Rome", "Milan"], "answer": "Rome"},
    {"question": "Broken", "options": ["A", "B"], "answer": "Z"}
]"#;

/// What the mock saw in the last request to `/ok`.
#[derive(Debug, Default, Clone)]
struct Captured {
    content_type: String,
    body: String,
}

type Shared = Arc<Mutex<Option<Captured>>>;

/// Finds an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

async fn handle_ok(State(shared): State<Shared>, headers: HeaderMap, body: Bytes) -> String {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    *shared.lock().expect("lock poisoned") = Some(Captured {
        content_type,
        body: String::from_utf8_lossy(&body).to_string(),
    });
    format!("```json\n{QUESTIONS_JSON}\n```")
}

async fn handle_wrapped() -> String {
    format!(r#"{{"questions": {QUESTIONS_JSON}}}"#)
}

async fn handle_fail() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "overloaded")
}

async fn handle_garbage() -> &'static str {
    "Sorry, I could not read that document."
}

async fn handle_empty() -> &'static str {
    "[]"
}

async fn handle_slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(10)).await;
    "[]"
}

async fn handle_auth(headers: HeaderMap) -> (StatusCode, String) {
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some("Bearer secret") => (StatusCode::OK, QUESTIONS_JSON.to_string()),
        _ => (StatusCode::UNAUTHORIZED, "missing token".to_string()),
    }
}

/// Starts the mock extraction service and returns its base URL.
async fn start_mock_service() -> (String, Shared, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");
    let shared = Shared::default();

    let router = Router::new()
        .route("/ok", post(handle_ok))
        .route("/wrapped", post(handle_wrapped))
        .route("/fail", post(handle_fail))
        .route("/garbage", post(handle_garbage))
        .route("/empty", post(handle_empty))
        .route("/slow", post(handle_slow))
        .route("/auth", post(handle_auth))
        .with_state(Arc::clone(&shared));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}"), shared, handle)
}

fn gateway(base: &str, route: &str) -> HttpExtractionGateway {
    HttpExtractionGateway::new(&format!("{base}/{route}")).expect("Valid endpoint")
}

fn request() -> ExtractionRequest {
    ExtractionRequest::for_document(Document::new(
        b"%PDF-1.4 mock".to_vec(),
        "application/pdf",
        "sample.pdf",
    ))
}

#[tokio::test]
async fn test_fenced_response_is_parsed() {
    let (base, shared, handle) = start_mock_service().await;

    let records = gateway(&base, "ok")
        .extract(&request())
        .await
        .expect("Extraction should succeed");

    // Shape checks only; the invalid third record is dropped later.
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].question, "What is 2+2?");
    assert_eq!(records[1].options, vec!["Rome", "Milan"]);

    let captured = shared
        .lock()
        .expect("lock poisoned")
        .clone()
        .expect("Mock should have seen a request");
    assert!(captured.content_type.starts_with("multipart/form-data"));
    assert!(captured.body.contains(r#"name="document""#));
    assert!(captured.body.contains(r#"filename="sample.pdf""#));
    assert!(captured.body.contains("application/pdf"));
    assert!(captured.body.contains("%PDF-1.4 mock"));
    assert!(captured.body.contains(r#"name="schema""#));
    assert!(captured.body.contains(r#""minItems":2"#));

    handle.abort();
}

#[tokio::test]
async fn test_wrapped_response_is_parsed() {
    let (base, _, handle) = start_mock_service().await;

    let records = gateway(&base, "wrapped")
        .extract(&request())
        .await
        .expect("Extraction should succeed");
    assert_eq!(records.len(), 3);

    handle.abort();
}

#[tokio::test]
async fn test_error_status_is_gateway_error() {
    let (base, _, handle) = start_mock_service().await;

    let err = gateway(&base, "fail")
        .extract(&request())
        .await
        .expect_err("Extraction should fail");

    assert_eq!(
        err,
        ExtractionError::Gateway {
            status: 503,
            body: "overloaded".to_string(),
        }
    );

    handle.abort();
}

#[tokio::test]
async fn test_non_json_is_malformed_response() {
    let (base, _, handle) = start_mock_service().await;

    let err = gateway(&base, "garbage")
        .extract(&request())
        .await
        .expect_err("Extraction should fail");

    assert!(matches!(err, ExtractionError::MalformedResponse(_)));

    handle.abort();
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let (base, _, handle) = start_mock_service().await;

    let err = gateway(&base, "auth")
        .extract(&request())
        .await
        .expect_err("Unauthenticated request should fail");
    assert!(matches!(err, ExtractionError::Gateway { status: 401, .. }));

    let records = gateway(&base, "auth")
        .with_api_key("secret")
        .extract(&request())
        .await
        .expect("Authenticated request should succeed");
    assert_eq!(records.len(), 3);

    handle.abort();
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let (base, _, handle) = start_mock_service().await;

    let result = extract_with_timeout(
        &gateway(&base, "slow"),
        &request(),
        Duration::from_millis(200),
    )
    .await;

    assert!(matches!(result, Err(ExtractionError::Timeout { .. })));

    handle.abort();
}

#[tokio::test]
async fn test_session_generates_through_http_gateway() {
    let (base, _, handle) = start_mock_service().await;
    let gateway = gateway(&base, "ok");

    let mut session = Session::new();
    session.select_document(Document::new(
        b"%PDF-1.4".to_vec(),
        "application/pdf",
        "sample.pdf",
    ));

    assert!(session.generate(&gateway, Duration::from_secs(5)).await);
    assert_eq!(session.phase(), Phase::Answering);
    // The record whose answer is not an option is dropped
    assert_eq!(session.question_count(), 2);

    handle.abort();
}

#[tokio::test]
async fn test_session_recovers_from_gateway_failures() {
    let (base, _, handle) = start_mock_service().await;

    for (route, code) in [
        ("fail", "extraction_failure"),
        ("garbage", "extraction_failure"),
        ("empty", "empty_result"),
    ] {
        let mut session = Session::new();
        session.select_document(Document::new(
            b"%PDF-1.4".to_vec(),
            "application/pdf",
            "sample.pdf",
        ));

        assert!(
            !session
                .generate(&gateway(&base, route), Duration::from_secs(5))
                .await
        );
        assert_eq!(session.phase(), Phase::AwaitingDocument, "{route}");
        assert_eq!(session.error().map(|e| e.code()), Some(code), "{route}");
        assert!(session.document().is_none(), "{route}");
    }

    handle.abort();
}
