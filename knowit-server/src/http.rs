//! KnowIt HTTP API
//!
//! Axum-based HTTP server that hosts chat sessions for the widget and the
//! admin document listing.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions build a `ChatRequest`, dispatch it
//! through the router and map the envelope onto an HTTP status, so they can be
//! tested without axum dispatch machinery.
//!
//! Endpoints:
//! - GET    /health                                   - liveness + open session count
//! - GET    /version                                  - server version info
//! - GET    /languages                                - supported languages
//! - POST   /resolve                                  - stateless question → answer
//! - POST   /sessions                                 - open a chat session
//! - GET    /sessions/:id                             - session snapshot
//! - DELETE /sessions/:id                             - close a session
//! - POST   /sessions/:id/messages                    - submit a question
//! - PUT    /sessions/:id/language                    - switch language
//! - POST   /sessions/:id/voice                       - toggle voice recording
//! - POST   /sessions/:id/messages/:message_id/speak  - read a reply aloud
//! - GET    /admin/uploads                            - list registered documents
//! - POST   /admin/uploads                            - register a document

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use knowit_core::config::HttpConfig;
use knowit_core::protocol::{ChatRequest, ChatResponse, PROTOCOL};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::state::AppState;

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/languages", get(languages_handler))
        .route("/resolve", post(resolve_handler))
        .route("/sessions", post(open_session_handler))
        .route(
            "/sessions/:id",
            get(get_session_handler).delete(close_session_handler),
        )
        .route("/sessions/:id/messages", post(send_message_handler))
        .route("/sessions/:id/language", put(set_language_handler))
        .route("/sessions/:id/voice", post(toggle_voice_handler))
        .route(
            "/sessions/:id/messages/:message_id/speak",
            post(speak_handler),
        )
        .route(
            "/admin/uploads",
            get(list_uploads_handler).post(register_upload_handler),
        )
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<AppState>,
    http: &HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", http.host, http.port);
    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("KnowIt HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub text: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OpenSessionRequest {
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetLanguageRequest {
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUploadRequest {
    pub file_name: Option<String>,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub async fn health_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "sessions": state.sessions.len().await,
            "knowledge_entries": state.knowledge.entry_count(),
        }),
    )
}

/// Inner version - returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL,
    })
}

pub async fn languages_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    dispatch(ChatRequest::Languages, state, StatusCode::OK).await
}

pub async fn resolve_inner(state: &AppState, req: ResolveRequest) -> (StatusCode, serde_json::Value) {
    let text = match req.text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return bad_request("text field is required"),
    };
    let request = ChatRequest::Resolve {
        text,
        language: req.language,
    };
    dispatch(request, state, StatusCode::OK).await
}

pub async fn open_session_inner(
    state: &AppState,
    req: OpenSessionRequest,
) -> (StatusCode, serde_json::Value) {
    let request = ChatRequest::OpenSession {
        language: req.language,
    };
    dispatch(request, state, StatusCode::CREATED).await
}

pub async fn get_session_inner(state: &AppState, session_id: Uuid) -> (StatusCode, serde_json::Value) {
    dispatch(ChatRequest::GetSession { session_id }, state, StatusCode::OK).await
}

pub async fn close_session_inner(
    state: &AppState,
    session_id: Uuid,
) -> (StatusCode, serde_json::Value) {
    dispatch(ChatRequest::CloseSession { session_id }, state, StatusCode::OK).await
}

/// Accepted, not answered: the reply is appended after the typing delay.
pub async fn send_message_inner(
    state: &AppState,
    session_id: Uuid,
    req: SendMessageRequest,
) -> (StatusCode, serde_json::Value) {
    let request = ChatRequest::SendMessage {
        session_id,
        text: req.text.unwrap_or_default(),
    };
    dispatch(request, state, StatusCode::ACCEPTED).await
}

pub async fn set_language_inner(
    state: &AppState,
    session_id: Uuid,
    req: SetLanguageRequest,
) -> (StatusCode, serde_json::Value) {
    let request = ChatRequest::SetLanguage {
        session_id,
        language: req.language,
    };
    dispatch(request, state, StatusCode::OK).await
}

pub async fn toggle_voice_inner(
    state: &AppState,
    session_id: Uuid,
) -> (StatusCode, serde_json::Value) {
    dispatch(ChatRequest::ToggleVoice { session_id }, state, StatusCode::OK).await
}

pub async fn speak_inner(
    state: &AppState,
    session_id: Uuid,
    message_id: Uuid,
) -> (StatusCode, serde_json::Value) {
    let request = ChatRequest::Speak {
        session_id,
        message_id,
    };
    dispatch(request, state, StatusCode::OK).await
}

pub async fn list_uploads_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    dispatch(ChatRequest::ListUploads, state, StatusCode::OK).await
}

pub async fn register_upload_inner(
    state: &AppState,
    req: RegisterUploadRequest,
) -> (StatusCode, serde_json::Value) {
    let request = ChatRequest::RegisterUpload {
        file_name: req.file_name.unwrap_or_default(),
        size_bytes: req.size_bytes,
        content_type: req.content_type,
    };
    dispatch(request, state, StatusCode::CREATED).await
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn languages_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = languages_inner(&state).await;
    (status, Json(body))
}

pub async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveRequest>,
) -> impl IntoResponse {
    let (status, body) = resolve_inner(&state, req).await;
    (status, Json(body))
}

pub async fn open_session_handler(
    State(state): State<Arc<AppState>>,
    req: Option<Json<OpenSessionRequest>>,
) -> impl IntoResponse {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let (status, body) = open_session_inner(&state, req).await;
    (status, Json(body))
}

pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = get_session_inner(&state, id).await;
    (status, Json(body))
}

pub async fn close_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = close_session_inner(&state, id).await;
    (status, Json(body))
}

pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> impl IntoResponse {
    let (status, body) = send_message_inner(&state, id, req).await;
    (status, Json(body))
}

pub async fn set_language_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetLanguageRequest>,
) -> impl IntoResponse {
    let (status, body) = set_language_inner(&state, id, req).await;
    (status, Json(body))
}

pub async fn toggle_voice_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = toggle_voice_inner(&state, id).await;
    (status, Json(body))
}

pub async fn speak_handler(
    State(state): State<Arc<AppState>>,
    Path((id, message_id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    let (status, body) = speak_inner(&state, id, message_id).await;
    (status, Json(body))
}

pub async fn list_uploads_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = list_uploads_inner(&state).await;
    (status, Json(body))
}

pub async fn register_upload_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUploadRequest>,
) -> impl IntoResponse {
    let (status, body) = register_upload_inner(&state, req).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

async fn dispatch(
    request: ChatRequest,
    state: &AppState,
    success: StatusCode,
) -> (StatusCode, serde_json::Value) {
    let response = crate::router::handle_request(request, state).await;
    match response_to_http(response) {
        Ok(data) => (success, data),
        Err((status, e)) => (status, error_json(e)),
    }
}

/// Convert a `ChatResponse` envelope into an HTTP body value, or a status and error string.
pub fn response_to_http(
    response: ChatResponse,
) -> std::result::Result<serde_json::Value, (StatusCode, String)> {
    let status = match response.status.as_str() {
        "ok" => return Ok(response.data.unwrap_or(serde_json::json!({}))),
        "not_found" => StatusCode::NOT_FOUND,
        "invalid" => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Err((
        status,
        response.error.unwrap_or_else(|| "unknown error".to_string()),
    ))
}

fn bad_request(msg: &str) -> (StatusCode, serde_json::Value) {
    (StatusCode::BAD_REQUEST, error_json(msg.to_string()))
}

fn error_json(msg: String) -> serde_json::Value {
    serde_json::to_value(ErrorResponse::new(msg)).unwrap_or_else(|_| serde_json::json!({}))
}

// ============================================================================
// Unit Tests - call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use knowit_core::speech::SilentSpeech;
    use knowit_core::{KnowItConfig, KnowledgeBase, SpeechHost};

    fn make_state() -> AppState {
        let speech = Arc::new(SilentSpeech);
        AppState::new(
            KnowItConfig::default(),
            KnowledgeBase::builtin().unwrap(),
            SpeechHost {
                synthesizer: speech.clone(),
                capture: speech,
            },
        )
    }

    // ========================================================================
    // TEST 1: version_inner is pure and returns correct fields
    // ========================================================================
    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "knowit/1", "protocol must be knowit/1");
    }

    // ========================================================================
    // TEST 2: response_to_http - ok response extracts data
    // ========================================================================
    #[test]
    fn test_response_to_http_ok() {
        let resp = ChatResponse::ok(serde_json::json!({"count": 0}));
        let data = response_to_http(resp).unwrap();
        assert_eq!(data["count"], 0);
    }

    // ========================================================================
    // TEST 3: response_to_http - failure statuses map to HTTP codes
    // ========================================================================
    #[test]
    fn test_response_to_http_statuses() {
        let (status, msg) = response_to_http(ChatResponse::not_found("gone")).unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(msg, "gone");

        let (status, _) = response_to_http(ChatResponse::invalid("bad")).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = response_to_http(ChatResponse::err("boom")).unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    // ========================================================================
    // TEST 4: response_to_http - error with no message returns fallback
    // ========================================================================
    #[test]
    fn test_response_to_http_error_no_message() {
        let mut resp = ChatResponse::err("x");
        resp.error = None;
        let (_, msg) = response_to_http(resp).unwrap_err();
        assert_eq!(msg, "unknown error");
    }

    // ========================================================================
    // TEST 5: health_inner reports sessions and version
    // ========================================================================
    #[tokio::test]
    async fn test_health_inner_ok() {
        let state = make_state();
        state.sessions.open(None).await;
        let (status, body) = health_inner(&state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sessions"], 1);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    // ========================================================================
    // TEST 6: resolve_inner - missing or blank text returns 400
    // ========================================================================
    #[tokio::test]
    async fn test_resolve_inner_requires_text() {
        let state = make_state();
        for text in [None, Some("   ".to_string())] {
            let (status, body) = resolve_inner(
                &state,
                ResolveRequest {
                    text,
                    language: None,
                },
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["status"], "error");
        }
    }

    // ========================================================================
    // TEST 7: send_message_inner - 202 for a question, 400 for blank text
    // ========================================================================
    #[tokio::test]
    async fn test_send_message_inner() {
        let state = make_state();
        let (status, body) = open_session_inner(&state, OpenSessionRequest::default()).await;
        assert_eq!(status, StatusCode::CREATED);
        let id: Uuid = serde_json::from_value(body["id"].clone()).unwrap();

        let (status, body) = send_message_inner(
            &state,
            id,
            SendMessageRequest {
                text: Some("exam dates".to_string()),
            },
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["origin"], "user");
        assert_eq!(body["text"], "exam dates");

        let (status, _) = send_message_inner(&state, id, SendMessageRequest { text: None }).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // ========================================================================
    // TEST 8: unknown session returns 404 on every session route
    // ========================================================================
    #[tokio::test]
    async fn test_unknown_session_routes_404() {
        let state = make_state();
        let id = Uuid::new_v4();
        assert_eq!(get_session_inner(&state, id).await.0, StatusCode::NOT_FOUND);
        assert_eq!(close_session_inner(&state, id).await.0, StatusCode::NOT_FOUND);
        assert_eq!(toggle_voice_inner(&state, id).await.0, StatusCode::NOT_FOUND);
        assert_eq!(
            speak_inner(&state, id, Uuid::new_v4()).await.0,
            StatusCode::NOT_FOUND
        );
    }

    // ========================================================================
    // TEST 9: register_upload_inner - 201 then listed
    // ========================================================================
    #[tokio::test]
    async fn test_register_upload_inner() {
        let state = make_state();
        let (status, body) = register_upload_inner(
            &state,
            RegisterUploadRequest {
                file_name: Some("prospectus.pdf".to_string()),
                size_bytes: Some(10),
                content_type: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["file_name"], "prospectus.pdf");

        let (status, body) = list_uploads_inner(&state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);

        let (status, _) = register_upload_inner(
            &state,
            RegisterUploadRequest {
                file_name: None,
                size_bytes: None,
                content_type: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
