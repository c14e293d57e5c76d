//! Host speech capabilities.
//!
//! KnowIt never synthesizes or recognizes speech itself. Text to be read out
//! is handed to a [`SpeechSynthesizer`] together with a locale tag, and the
//! microphone toggle is forwarded to a [`VoiceCapture`]. Both calls are
//! fire-and-forget: the host owns voices, playback queues and failures.

use std::sync::Arc;

use serde::Serialize;

use crate::config::SpeechConfig;
use crate::error::KnowItError;

pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str, speech_tag: &str);

    /// Backend name for logging.
    fn name(&self) -> &str;
}

pub trait VoiceCapture: Send + Sync {
    fn set_recording(&self, recording: bool);
}

/// Toast-style notice shown when recording is toggled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceNotice {
    pub title: &'static str,
    pub description: &'static str,
}

impl VoiceNotice {
    pub fn for_state(recording: bool) -> Self {
        if recording {
            Self {
                title: "Voice recording started",
                description: "Speak now, I'm listening...",
            }
        } else {
            Self {
                title: "Voice recording stopped",
                description: "Processing your message...",
            }
        }
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Emits a tracing event per call.
#[derive(Debug, Default)]
pub struct LogSpeech;

impl SpeechSynthesizer for LogSpeech {
    fn speak(&self, text: &str, speech_tag: &str) {
        tracing::info!(lang = speech_tag, chars = text.chars().count(), "speech synthesis requested");
    }

    fn name(&self) -> &str {
        "log"
    }
}

impl VoiceCapture for LogSpeech {
    fn set_recording(&self, recording: bool) {
        tracing::info!(recording, "voice capture toggled");
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct SilentSpeech;

impl SpeechSynthesizer for SilentSpeech {
    fn speak(&self, _text: &str, _speech_tag: &str) {}

    fn name(&self) -> &str {
        "none"
    }
}

impl VoiceCapture for SilentSpeech {
    fn set_recording(&self, _recording: bool) {}
}

/// Both host capabilities, as selected by `speech.backend`.
#[derive(Clone)]
pub struct SpeechHost {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub capture: Arc<dyn VoiceCapture>,
}

impl std::fmt::Debug for SpeechHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechHost")
            .field("synthesizer", &self.synthesizer.name())
            .finish()
    }
}

pub fn create_speech_host(config: &SpeechConfig) -> Result<SpeechHost, KnowItError> {
    match config.backend.as_str() {
        "log" => {
            let backend = Arc::new(LogSpeech);
            Ok(SpeechHost {
                synthesizer: backend.clone(),
                capture: backend,
            })
        }
        "none" => {
            let backend = Arc::new(SilentSpeech);
            Ok(SpeechHost {
                synthesizer: backend.clone(),
                capture: backend,
            })
        }
        other => Err(KnowItError::Speech(format!("unknown speech backend '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_backends() {
        let host = create_speech_host(&SpeechConfig::default()).unwrap();
        assert_eq!(host.synthesizer.name(), "log");

        let host = create_speech_host(&SpeechConfig {
            backend: "none".to_string(),
        })
        .unwrap();
        assert_eq!(host.synthesizer.name(), "none");
        host.synthesizer.speak("ignored", "en-US");
        host.capture.set_recording(true);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = create_speech_host(&SpeechConfig {
            backend: "espeak".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, KnowItError::Speech(_)));
        assert!(err.to_string().contains("espeak"));
    }

    #[test]
    fn test_voice_notice_text() {
        assert_eq!(VoiceNotice::for_state(true).title, "Voice recording started");
        assert_eq!(VoiceNotice::for_state(false).description, "Processing your message...");
    }
}
