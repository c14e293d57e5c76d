//! In-memory state of one chat session.
//!
//! The session owns its transcript. Two producers append to it: the
//! submission path (`submit`) and the delayed reply path (`complete`). Replies
//! that arrive after `dispose` are dropped.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Language, Message, Origin, Transcript};

pub const DEFAULT_ASSISTANT_NAME: &str = "KnowIt";

/// A reply owed to a submitted user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub session_id: Uuid,
    pub input: String,
    /// Language active when the question was asked.
    pub language: Language,
}

#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    assistant_name: String,
    language: Language,
    transcript: Transcript,
    pending: usize,
    recording: bool,
    disposed: bool,
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub assistant_name: String,
    pub language: Language,
    pub typing: bool,
    pub recording: bool,
    pub messages: Vec<Message>,
}

impl ChatSession {
    /// The welcome message is tagged with the default language; its text is configured in English.
    pub fn new(language: Language, welcome: &str) -> Self {
        let mut transcript = Transcript::new();
        if !welcome.trim().is_empty() {
            transcript.append(welcome, Origin::Assistant, Language::DEFAULT);
        }
        Self {
            id: Uuid::new_v4(),
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            language,
            transcript,
            pending: 0,
            recording: false,
            disposed: false,
        }
    }

    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn assistant_name(&self) -> &str {
        &self.assistant_name
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_typing(&self) -> bool {
        self.pending > 0
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Append a user message. Blank input is ignored and yields `None`.
    pub fn submit(&mut self, text: &str) -> Option<(Message, PendingReply)> {
        if self.disposed || text.trim().is_empty() {
            return None;
        }
        let message = self.transcript.append(text, Origin::User, self.language).clone();
        self.pending += 1;
        Some((
            message,
            PendingReply {
                session_id: self.id,
                input: text.to_string(),
                language: self.language,
            },
        ))
    }

    /// Append the reply for `ticket`. Returns `None` once the session is disposed.
    pub fn complete(&mut self, ticket: &PendingReply, reply_text: &str) -> Option<Message> {
        if self.disposed || ticket.session_id != self.id {
            return None;
        }
        self.pending = self.pending.saturating_sub(1);
        Some(
            self.transcript
                .append(reply_text, Origin::Assistant, ticket.language)
                .clone(),
        )
    }

    /// Switch language; unknown codes select the default.
    pub fn set_language(&mut self, code: &str) -> Language {
        self.language = Language::from_code(code);
        self.language
    }

    pub fn toggle_recording(&mut self) -> bool {
        self.recording = !self.recording;
        self.recording
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
        self.pending = 0;
        self.recording = false;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            assistant_name: self.assistant_name.clone(),
            language: self.language,
            typing: self.is_typing(),
            recording: self.recording,
            messages: self.transcript.messages().to_vec(),
        }
    }
}
