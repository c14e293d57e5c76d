use knowit_core::protocol::{ChatRequest, ChatResponse, PROTOCOL};
use knowit_core::{Language, ReplySource};

use crate::state::AppState;
use crate::subsystems::chat::ChatError;

pub async fn handle_request(request: ChatRequest, state: &AppState) -> ChatResponse {
    match request {
        ChatRequest::Languages => ChatResponse::ok(languages_json()),
        ChatRequest::Resolve { text, language } => handle_resolve(&text, language.as_deref(), state),
        ChatRequest::OpenSession { language } => {
            let snapshot = state.sessions.open(language.as_deref()).await;
            to_response(Ok(snapshot))
        }
        ChatRequest::GetSession { session_id } => {
            to_response(state.sessions.snapshot(session_id).await)
        }
        ChatRequest::CloseSession { session_id } => match state.sessions.close(session_id).await {
            Ok(()) => ChatResponse::ok(serde_json::json!({"closed": true, "id": session_id})),
            Err(e) => error_response(e),
        },
        ChatRequest::SendMessage { session_id, text } => {
            to_response(state.sessions.send(session_id, &text).await)
        }
        ChatRequest::SetLanguage { session_id, language } => {
            match state.sessions.set_language(session_id, &language).await {
                Ok(applied) => ChatResponse::ok(serde_json::json!({
                    "language": applied,
                    "requested": language,
                    "degraded": Language::parse(&language).is_none(),
                })),
                Err(e) => error_response(e),
            }
        }
        ChatRequest::ToggleVoice { session_id } => {
            match state.sessions.toggle_voice(session_id).await {
                Ok((recording, notice)) => ChatResponse::ok(serde_json::json!({
                    "recording": recording,
                    "notice": notice,
                })),
                Err(e) => error_response(e),
            }
        }
        ChatRequest::Speak { session_id, message_id } => {
            match state.sessions.speak(session_id, message_id).await {
                Ok(message) => ChatResponse::ok(serde_json::json!({
                    "spoken": true,
                    "id": message.id,
                    "speech_tag": message.language.speech_tag(),
                })),
                Err(e) => error_response(e),
            }
        }
        ChatRequest::ListUploads => {
            let documents = state.uploads.list().await;
            ChatResponse::ok(serde_json::json!({
                "count": documents.len(),
                "documents": documents,
            }))
        }
        ChatRequest::RegisterUpload {
            file_name,
            size_bytes,
            content_type,
        } => to_response(state.uploads.register(&file_name, size_bytes, content_type).await),
    }
}

/// Stateless question → answer; unmatched questions get a fallback acknowledgement.
fn handle_resolve(text: &str, language: Option<&str>, state: &AppState) -> ChatResponse {
    if text.trim().is_empty() {
        return ChatResponse::invalid("text field is required");
    }
    let language = language.map(Language::from_code).unwrap_or_default();
    let reply = state
        .knowledge
        .reply(text, language, &mut rand::thread_rng());

    let topic = match &reply.source {
        ReplySource::Knowledge { topic } => Some(topic.clone()),
        ReplySource::Fallback => None,
    };
    ChatResponse::ok(serde_json::json!({
        "matched": topic.is_some(),
        "topic": topic,
        "answer": reply.text,
        "language": language,
    }))
}

pub fn languages_json() -> serde_json::Value {
    let languages: Vec<serde_json::Value> = Language::ALL
        .iter()
        .map(|l| {
            serde_json::json!({
                "code": l.code(),
                "name": l.display_name(),
                "speech_tag": l.speech_tag(),
                "default": *l == Language::DEFAULT,
            })
        })
        .collect();
    serde_json::json!({
        "languages": languages,
        "default": Language::DEFAULT,
        "protocol": PROTOCOL,
    })
}

fn to_response<T: serde::Serialize>(result: Result<T, ChatError>) -> ChatResponse {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(data) => ChatResponse::ok(data),
            Err(e) => ChatResponse::err(format!("Serialization error: {}", e)),
        },
        Err(e) => error_response(e),
    }
}

pub fn error_response(error: ChatError) -> ChatResponse {
    match error {
        ChatError::SessionNotFound(_) | ChatError::MessageNotFound(_) => {
            ChatResponse::not_found(error.to_string())
        }
        ChatError::EmptyMessage | ChatError::NotSpeakable | ChatError::InvalidUpload(_) => {
            ChatResponse::invalid(error.to_string())
        }
    }
}
