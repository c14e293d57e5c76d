//! Chat session hosting
//!
//! Sessions live in memory for as long as the client keeps them open. Each
//! accepted question spawns a reply task that waits out the configured
//! "typing" delay, resolves the question against the knowledge base and
//! appends the answer. Closing a session cancels its token, so a reply that
//! is still waiting is never applied to a disposed session.
//!
//! Clients that vanish without closing their session are handled by the idle
//! sweep (`run_idle_sweep`), which closes sessions nobody has touched for
//! `chat.session_idle_secs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use knowit_core::config::ChatConfig;
use knowit_core::{
    ChatSession, KnowledgeBase, Language, Message, PendingReply, Reply, SessionSnapshot, SpeechHost,
    VoiceNotice,
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Message not found: {0}")]
    MessageNotFound(Uuid),

    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Only assistant messages can be spoken")]
    NotSpeakable,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
}

struct SessionSlot {
    state: Mutex<ChatSession>,
    cancel: CancellationToken,
    last_active: Mutex<Instant>,
}

impl SessionSlot {
    async fn touch(&self) {
        *self.last_active.lock().await = Instant::now();
    }

    async fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_active.lock().await)
    }
}

struct RegistryInner {
    sessions: RwLock<HashMap<Uuid, Arc<SessionSlot>>>,
    knowledge: Arc<KnowledgeBase>,
    speech: SpeechHost,
    reply_delay: Duration,
    welcome: String,
    assistant_name: String,
}

/// All open chat sessions. Cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(knowledge: Arc<KnowledgeBase>, speech: SpeechHost, chat: &ChatConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
                knowledge,
                speech,
                reply_delay: Duration::from_millis(chat.reply_delay_ms),
                welcome: chat.welcome_message.clone(),
                assistant_name: chat.assistant_name.clone(),
            }),
        }
    }

    pub async fn open(&self, language: Option<&str>) -> SessionSnapshot {
        let language = language.map(Language::from_code).unwrap_or_default();
        let session = ChatSession::new(language, &self.inner.welcome)
            .with_assistant_name(self.inner.assistant_name.as_str());
        let id = session.id();
        let snapshot = session.snapshot();

        let slot = Arc::new(SessionSlot {
            state: Mutex::new(session),
            cancel: CancellationToken::new(),
            last_active: Mutex::new(Instant::now()),
        });
        self.inner.sessions.write().await.insert(id, slot);
        tracing::info!(session = %id, language = %language, "chat session opened");
        snapshot
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<SessionSnapshot, ChatError> {
        let slot = self.slot(id).await?;
        let session = slot.state.lock().await;
        Ok(session.snapshot())
    }

    /// Dispose the session and drop any reply still waiting on the delay.
    pub async fn close(&self, id: Uuid) -> Result<(), ChatError> {
        let slot = self
            .inner
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(ChatError::SessionNotFound(id))?;
        slot.cancel.cancel();
        slot.state.lock().await.dispose();
        tracing::info!(session = %id, "chat session closed");
        Ok(())
    }

    /// Append the user's message and schedule the reply.
    pub async fn send(&self, id: Uuid, text: &str) -> Result<Message, ChatError> {
        let slot = self.slot(id).await?;
        self.submit_to(id, slot, text).await
    }

    /// A `close` may land between the slot lookup and the lock; the session
    /// then reads as gone, not as an empty message.
    async fn submit_to(
        &self,
        id: Uuid,
        slot: Arc<SessionSlot>,
        text: &str,
    ) -> Result<Message, ChatError> {
        let (message, ticket) = {
            let mut session = slot.state.lock().await;
            if session.is_disposed() {
                return Err(ChatError::SessionNotFound(id));
            }
            session.submit(text).ok_or(ChatError::EmptyMessage)?
        };

        tracing::debug!(session = %id, language = %ticket.language, "question accepted");
        self.spawn_reply(slot, ticket);
        Ok(message)
    }

    pub async fn set_language(&self, id: Uuid, code: &str) -> Result<Language, ChatError> {
        let slot = self.slot(id).await?;
        let language = slot.state.lock().await.set_language(code);
        tracing::debug!(session = %id, requested = code, applied = %language, "language changed");
        Ok(language)
    }

    pub async fn toggle_voice(&self, id: Uuid) -> Result<(bool, VoiceNotice), ChatError> {
        let slot = self.slot(id).await?;
        let recording = slot.state.lock().await.toggle_recording();
        self.inner.speech.capture.set_recording(recording);
        Ok((recording, VoiceNotice::for_state(recording)))
    }

    /// Hand an assistant message to the host synthesizer.
    pub async fn speak(&self, id: Uuid, message_id: Uuid) -> Result<Message, ChatError> {
        let slot = self.slot(id).await?;
        let message = {
            let session = slot.state.lock().await;
            session
                .transcript()
                .get(message_id)
                .cloned()
                .ok_or(ChatError::MessageNotFound(message_id))?
        };
        if message.is_user() {
            return Err(ChatError::NotSpeakable);
        }
        self.inner
            .speech
            .synthesizer
            .speak(&message.text, message.language.speech_tag());
        Ok(message)
    }

    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every session; used on server shutdown.
    pub async fn close_all(&self) {
        let slots: Vec<Arc<SessionSlot>> = self
            .inner
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, slot)| slot)
            .collect();
        for slot in &slots {
            slot.cancel.cancel();
            slot.state.lock().await.dispose();
        }
        if !slots.is_empty() {
            tracing::info!("Closed {} chat sessions", slots.len());
        }
    }

    /// Close every session idle for at least `idle`. Returns how many were closed.
    pub async fn sweep_idle(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut stale = Vec::new();
        {
            let sessions = self.inner.sessions.read().await;
            for (id, slot) in sessions.iter() {
                if slot.idle_for(now).await >= idle {
                    stale.push(*id);
                }
            }
        }

        let mut closed = 0;
        for id in stale {
            // Already closed by the client in the meantime.
            if self.close(id).await.is_ok() {
                closed += 1;
            }
        }
        closed
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.inner.knowledge
    }

    /// Look up a session; every lookup counts as client activity.
    async fn slot(&self, id: Uuid) -> Result<Arc<SessionSlot>, ChatError> {
        let slot = self
            .inner
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ChatError::SessionNotFound(id))?;
        slot.touch().await;
        Ok(slot)
    }

    fn spawn_reply(&self, slot: Arc<SessionSlot>, ticket: PendingReply) {
        let knowledge = self.inner.knowledge.clone();
        let delay = self.inner.reply_delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = slot.cancel.cancelled() => {
                    tracing::debug!(session = %ticket.session_id, "pending reply dropped: session closed");
                }
                _ = tokio::time::sleep(delay) => {
                    let reply = compose_reply(&knowledge, &ticket);
                    let mut session = slot.state.lock().await;
                    match session.complete(&ticket, &reply.text) {
                        Some(message) => tracing::debug!(
                            session = %ticket.session_id,
                            seq = message.seq,
                            source = ?reply.source,
                            "reply appended"
                        ),
                        None => tracing::debug!(
                            session = %ticket.session_id,
                            "reply discarded: session disposed"
                        ),
                    }
                }
            }
        });
    }
}

/// Called from main.rs to close abandoned sessions until shutdown.
pub async fn run_idle_sweep(
    registry: SessionRegistry,
    idle: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let interval = idle.min(Duration::from_secs(60));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!("Idle session sweep started (idle limit: {}s)", idle.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let closed = registry.sweep_idle(idle).await;
                if closed > 0 {
                    tracing::info!("Closed {} idle chat sessions", closed);
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Idle session sweep shutting down");
                break;
            }
        }
    }
}

fn compose_reply(knowledge: &KnowledgeBase, ticket: &PendingReply) -> Reply {
    knowledge.reply(&ticket.input, ticket.language, &mut rand::thread_rng())
}
