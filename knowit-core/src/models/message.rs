use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Position in the owning transcript.
    pub seq: u64,
    pub text: String,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
    pub language: Language,
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }
}

/// Append-only, ordered message log of one chat session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_seq: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, text: impl Into<String>, origin: Origin, language: Language) -> &Message {
        let message = Message {
            id: Uuid::new_v4(),
            seq: self.next_seq,
            text: text.into(),
            origin,
            created_at: Utc::now(),
            language,
        };
        self.next_seq += 1;
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn get(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
