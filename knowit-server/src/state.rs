use std::sync::Arc;

use knowit_core::{create_speech_host, KnowItConfig, KnowItError, KnowledgeBase, SpeechHost};

use crate::subsystems::chat::SessionRegistry;
use crate::subsystems::uploads::UploadRegistry;

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub config: KnowItConfig,
    pub knowledge: Arc<KnowledgeBase>,
    pub sessions: SessionRegistry,
    pub uploads: UploadRegistry,
}

impl AppState {
    pub fn new(config: KnowItConfig, knowledge: KnowledgeBase, speech: SpeechHost) -> Self {
        let knowledge = Arc::new(knowledge);
        let sessions = SessionRegistry::new(knowledge.clone(), speech, &config.chat);
        Self {
            config,
            knowledge,
            sessions,
            uploads: UploadRegistry::new(),
        }
    }

    /// Load the knowledge table and speech backend named by `config`.
    pub fn from_config(config: KnowItConfig) -> Result<Self, KnowItError> {
        let knowledge = KnowledgeBase::load(config.knowledge.path.as_deref())?;
        let speech = create_speech_host(&config.speech)?;
        tracing::info!(
            "Knowledge base ready: {} entries, speech backend '{}'",
            knowledge.entry_count(),
            speech.synthesizer.name()
        );
        Ok(Self::new(config, knowledge, speech))
    }
}
