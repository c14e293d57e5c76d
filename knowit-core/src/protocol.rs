use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PROTOCOL: &str = "knowit/1";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatRequest {
    Languages,
    Resolve {
        text: String,
        #[serde(default)]
        language: Option<String>,
    },
    OpenSession {
        #[serde(default)]
        language: Option<String>,
    },
    GetSession {
        session_id: Uuid,
    },
    CloseSession {
        session_id: Uuid,
    },
    SendMessage {
        session_id: Uuid,
        text: String,
    },
    SetLanguage {
        session_id: Uuid,
        language: String,
    },
    ToggleVoice {
        session_id: Uuid,
    },
    Speak {
        session_id: Uuid,
        message_id: Uuid,
    },
    ListUploads,
    RegisterUpload {
        file_name: String,
        #[serde(default)]
        size_bytes: Option<u64>,
        #[serde(default)]
        content_type: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatResponse {
    /// `ok`, `not_found`, `invalid` or `error`
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub version: String,
}

impl ChatResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self::failure("error", msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::failure("not_found", msg)
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::failure("invalid", msg)
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn failure(status: &str, msg: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            data: None,
            error: Some(msg.into()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
