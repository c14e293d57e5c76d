pub mod config;
pub mod error;
pub mod knowledge;
pub mod models;
pub mod protocol;
pub mod session;
pub mod speech;

pub use config::KnowItConfig;
pub use error::KnowItError;
pub use knowledge::{KnowledgeBase, KnowledgeEntry, Reply, ReplySource, Resolution};
pub use models::{Language, Message, Origin, Transcript, UploadedDocument};
pub use session::{ChatSession, PendingReply, SessionSnapshot};
pub use speech::{create_speech_host, SpeechHost, SpeechSynthesizer, VoiceCapture, VoiceNotice};
