//! HTTP adapter for a single local quiz session.
//!
//! Every endpoint applies one trigger to the shared [`Session`] and answers
//! with the resulting [`SessionView`]. Triggers the session rejects are not
//! errors: the view simply comes back unchanged.
//!
//! # Endpoints
//!
//! - `GET /api/session` - Current session view
//! - `POST /api/document?name=<name>` - Select a document (raw body, declared type from `Content-Type`)
//! - `POST /api/generate` - Start question extraction for the stored document
//! - `POST /api/cancel` - Cancel the running extraction
//! - `POST /api/select` - Tentatively select an option (`{"option": "..."}`)
//! - `POST /api/submit` - Submit the pending selection
//! - `POST /api/advance` - Move to the next question or the summary
//! - `POST /api/restart` - Start over from the summary
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quiz_core::{create_router, AppState, Config, ExtractionGateway};
//!
//! # async fn example(gateway: Arc<dyn ExtractionGateway>) {
//! let state = AppState::new(Config::default(), gateway);
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use crate::document::Document;
use crate::gateway::{extract_with_timeout, ExtractionGateway};
use crate::session::{ExtractionTicket, Session, SessionView};
use crate::Config;

/// Display name used when an upload carries no `name` parameter.
const DEFAULT_UPLOAD_NAME: &str = "document";

// ============================================================================
// Request Types
// ============================================================================

/// Request body for the select endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectRequest {
    /// Text of the option to select.
    pub option: String,
}

/// Query parameters for the document endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
struct DocumentParams {
    name: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Configuration, used for the extraction timeout and upload limit.
    pub config: Config,
    /// The quiz session driven by the endpoints.
    pub session: Arc<Mutex<Session>>,
    /// Gateway that runs extractions.
    pub gateway: Arc<dyn ExtractionGateway>,
    /// The background extraction task, if one is running.
    ///
    /// Locked after `session` whenever both are held.
    running: Arc<Mutex<Option<RunningExtraction>>>,
}

/// A spawned extraction task and the ticket it delivers to.
#[derive(Debug)]
struct RunningExtraction {
    ticket: u64,
    handle: AbortHandle,
}

impl AppState {
    /// Creates a new `AppState` with a fresh session.
    #[must_use]
    pub fn new(config: Config, gateway: Arc<dyn ExtractionGateway>) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(Session::new())),
            gateway,
            running: Arc::new(Mutex::new(None)),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all session endpoints.
///
/// The router carries:
/// - All routes under `/api`
/// - A request body limit of `maxDocumentSize`
/// - CORS middleware allowing any origin, for local front-ends
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = usize::try_from(state.config.max_document_size).unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route("/session", get(handle_session))
        .route("/document", post(handle_document))
        .route("/generate", post(handle_generate))
        .route("/cancel", post(handle_cancel))
        .route("/select", post(handle_select))
        .route("/submit", post(handle_submit))
        .route("/advance", post(handle_advance))
        .route("/restart", post(handle_restart));

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/session`.
async fn handle_session(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let session = state.session.lock().await;
    Json(session.view())
}

/// Handler for `POST /api/document`.
///
/// The body is the document itself; its declared type is the request's
/// `Content-Type`, or empty if absent.
async fn handle_document(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DocumentParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<SessionView> {
    let declared_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let name = params
        .name
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());

    info!(
        name = %name,
        declared_type,
        size_bytes = body.len(),
        "Received document"
    );

    let document = Document::new(body.to_vec(), declared_type, name);
    let mut session = state.session.lock().await;
    session.select_document(document);
    Json(session.view())
}

/// Handler for `POST /api/generate`.
///
/// Moves the session to `Extracting` and runs the extraction in the
/// background; the view returned reflects the extracting phase.
async fn handle_generate(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let mut session = state.session.lock().await;
    let Some(ticket) = session.request_generation() else {
        return Json(session.view());
    };
    let view = session.view();

    // Register the task before releasing the session lock.
    let mut running = state.running.lock().await;
    let id = ticket.id;
    let task = tokio::spawn(run_extraction(Arc::clone(&state), ticket));
    if let Some(previous) = running.replace(RunningExtraction {
        ticket: id,
        handle: task.abort_handle(),
    }) {
        previous.handle.abort();
    }
    drop(running);
    drop(session);

    Json(view)
}

/// Handler for `POST /api/cancel`.
///
/// Moves the session back to `AwaitingDocument` and aborts the background
/// gateway call.
async fn handle_cancel(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let mut session = state.session.lock().await;
    let ticket = session.in_flight_ticket();

    if session.cancel_extraction() {
        let mut running = state.running.lock().await;
        if running.as_ref().map(|r| r.ticket) == ticket {
            if let Some(task) = running.take() {
                task.handle.abort();
                info!(ticket = task.ticket, "Aborted extraction task");
            }
        }
    }

    Json(session.view())
}

/// Handler for `POST /api/select`.
async fn handle_select(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectRequest>,
) -> Json<SessionView> {
    let mut session = state.session.lock().await;
    session.select_option(&request.option);
    Json(session.view())
}

/// Handler for `POST /api/submit`.
async fn handle_submit(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let mut session = state.session.lock().await;
    session.submit_answer();
    Json(session.view())
}

/// Handler for `POST /api/advance`.
async fn handle_advance(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let mut session = state.session.lock().await;
    session.advance();
    Json(session.view())
}

/// Handler for `POST /api/restart`.
async fn handle_restart(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let mut session = state.session.lock().await;
    session.restart();
    Json(session.view())
}

/// Runs one extraction and delivers its outcome to the session.
///
/// The session lock is not held while the gateway works, so the user can
/// cancel; a cancelled ticket's late outcome is then ignored.
async fn run_extraction(state: Arc<AppState>, ticket: ExtractionTicket) {
    let timeout = state.config.extraction.timeout();
    let outcome = extract_with_timeout(state.gateway.as_ref(), &ticket.request, timeout).await;

    let mut session = state.session.lock().await;
    let applied = session.complete_extraction(ticket.id, outcome);
    debug!(
        ticket = ticket.id,
        applied,
        phase = %session.phase(),
        "Extraction outcome delivered"
    );

    let mut running = state.running.lock().await;
    if running.as_ref().is_some_and(|r| r.ticket == ticket.id) {
        *running = None;
    }
}

// ============================================================================
// Tests
// ============================================================================
