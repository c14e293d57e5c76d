//! HTTP integration tests for the KnowIt REST API
//!
//! Drives the full Axum router with `oneshot` requests against an in-memory
//! state built from the built-in knowledge table.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use knowit_core::speech::SilentSpeech;
use knowit_core::{KnowItConfig, KnowledgeBase, Language, SpeechHost};
use knowit_server::http::build_router;
use knowit_server::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn make_state(reply_delay_ms: u64) -> Arc<AppState> {
    let mut config = KnowItConfig::default();
    config.chat.reply_delay_ms = reply_delay_ms;
    let speech = Arc::new(SilentSpeech);
    Arc::new(AppState::new(
        config,
        KnowledgeBase::builtin().expect("built-in knowledge"),
        SpeechHost {
            synthesizer: speech.clone(),
            capture: speech,
        },
    ))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Poll the session until it holds `count` messages.
async fn wait_for_messages(app: &Router, id: &str, count: usize) -> Value {
    for _ in 0..200 {
        let (_, body) = call(app, "GET", &format!("/sessions/{}", id), None).await;
        if body["messages"].as_array().map(Vec::len) == Some(count) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {} never reached {} messages", id, count);
}

// ===========================================================================
// TEST 1: GET /version and /health
// ===========================================================================
#[tokio::test]
async fn test_version_and_health() {
    let app = build_router(make_state(0));

    let (status, body) = call(&app, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["protocol"], "knowit/1");

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sessions"], 0);
}

// ===========================================================================
// TEST 2: GET /languages lists the seven supported codes
// ===========================================================================
#[tokio::test]
async fn test_languages() {
    let app = build_router(make_state(0));
    let (status, body) = call(&app, "GET", "/languages", None).await;
    assert_eq!(status, StatusCode::OK);

    let codes: Vec<&str> = body["languages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["en", "hi", "mr", "ta", "te", "raj", "gu"]);
}

// ===========================================================================
// TEST 3: POST /resolve - fee deadline, nonsense, unsupported language
// ===========================================================================
#[tokio::test]
async fn test_resolve_scenarios() {
    let state = make_state(0);
    let app = build_router(state.clone());

    let (status, body) = call(
        &app,
        "POST",
        "/resolve",
        Some(json!({"text": "fee payment deadline", "language": "en"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], true);
    assert_eq!(
        body["answer"].as_str(),
        state.knowledge.resolve("fee payment deadline", Language::En).answer()
    );

    let (_, body) = call(
        &app,
        "POST",
        "/resolve",
        Some(json!({"text": "xyzzy nonsense query", "language": "en"})),
    )
    .await;
    assert_eq!(body["matched"], false);
    let answer = body["answer"].as_str().unwrap().to_string();
    let pool = state.knowledge.fallback_pool(Language::En);
    assert_eq!(pool.len(), 5);
    assert!(pool.contains(&answer));

    let (_, body) = call(
        &app,
        "POST",
        "/resolve",
        Some(json!({"text": "hostel", "language": "fr"})),
    )
    .await;
    assert_eq!(body["language"], "en");
    assert_eq!(body["topic"], "hostel");

    let (status, _) = call(&app, "POST", "/resolve", Some(json!({"text": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// TEST 4: full session flow - open, ask, receive delayed reply, close
// ===========================================================================
#[tokio::test]
async fn test_session_flow() {
    let app = build_router(make_state(20));

    let (status, body) = call(&app, "POST", "/sessions", Some(json!({"language": "hi"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["language"], "hi");
    assert_eq!(body["assistant_name"], "KnowIt");
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["language"], "en");
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        "POST",
        &format!("/sessions/{}/messages", id),
        Some(json!({"text": "छात्रवृत्ति के बारे में बताइए"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["origin"], "user");
    assert_eq!(body["language"], "hi");

    let body = wait_for_messages(&app, &id, 3).await;
    let reply = &body["messages"][2];
    assert_eq!(reply["origin"], "assistant");
    assert_eq!(reply["language"], "hi");
    assert!(reply["text"].as_str().unwrap().contains("छात्रवृत्ति"));
    assert_eq!(body["typing"], false);

    let reply_id = reply["id"].as_str().unwrap();
    let (status, body) = call(
        &app,
        "POST",
        &format!("/sessions/{}/messages/{}/speak", id, reply_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["speech_tag"], "hi-IN");

    let (status, _) = call(&app, "DELETE", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "GET", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// TEST 5: closing a session before the delay elapses drops the reply
// ===========================================================================
#[tokio::test]
async fn test_close_before_reply() {
    let state = make_state(200);
    let app = build_router(state.clone());

    let (_, body) = call(&app, "POST", "/sessions", Some(json!({}))).await;
    let id = body["id"].as_str().unwrap().to_string();
    call(
        &app,
        "POST",
        &format!("/sessions/{}/messages", id),
        Some(json!({"text": "library"})),
    )
    .await;

    let (status, _) = call(&app, "DELETE", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(state.sessions.len().await, 0);
}

// ===========================================================================
// TEST 6: language switch, voice toggle and validation errors
// ===========================================================================
#[tokio::test]
async fn test_language_voice_and_errors() {
    let app = build_router(make_state(0));
    let (_, body) = call(&app, "POST", "/sessions", Some(json!({"language": "te"}))).await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        "PUT",
        &format!("/sessions/{}/language", id),
        Some(json!({"language": "fr"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["language"], "en");
    assert_eq!(body["degraded"], true);

    let (status, body) = call(&app, "POST", &format!("/sessions/{}/voice", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recording"], true);
    assert_eq!(body["notice"]["title"], "Voice recording started");

    let (status, _) = call(
        &app,
        "POST",
        &format!("/sessions/{}/messages", id),
        Some(json!({"text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app, "GET", &format!("/sessions/{}", id), None).await;
    let first = body["messages"][0]["id"].as_str().unwrap().to_string();
    let (status, _) = call(
        &app,
        "POST",
        &format!("/sessions/{}/messages", id),
        Some(json!({"text": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (_, body) = call(&app, "GET", &format!("/sessions/{}", id), None).await;
    let user_id = body["messages"][1]["id"].as_str().unwrap().to_string();
    assert_ne!(first, user_id);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/sessions/{}/messages/{}/speak", id, user_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// TEST 7: admin uploads are listed in order
// ===========================================================================
#[tokio::test]
async fn test_admin_uploads() {
    let app = build_router(make_state(0));

    for name in ["handbook.pdf", "fee-structure.xlsx"] {
        let (status, body) = call(
            &app,
            "POST",
            "/admin/uploads",
            Some(json!({"file_name": name, "size_bytes": 1024})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["file_name"], name);
    }

    let (status, body) = call(&app, "GET", "/admin/uploads", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["documents"][0]["file_name"], "handbook.pdf");
    assert_eq!(body["documents"][1]["file_name"], "fee-structure.xlsx");
}
