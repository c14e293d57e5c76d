use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KnowItConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    /// Artificial "typing" delay before a reply is appended.
    pub reply_delay_ms: u64,
    /// Shown as the speaker of assistant messages.
    pub assistant_name: String,
    pub welcome_message: String,
    /// Sessions with no client activity for this long are closed. 0 disables the sweep.
    pub session_idle_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reply_delay_ms: 1500,
            assistant_name: "KnowIt".to_string(),
            welcome_message: "Hello! I'm KnowIt, your AI student support assistant. \
                I can help you with fees, timetables, scholarships, exams, and more. \
                How can I help you today?"
                .to_string(),
            session_idle_secs: 1800,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KnowledgeConfig {
    /// Override file for the built-in knowledge table. `~` and `$VAR` are expanded.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    /// `log` or `none`
    pub backend: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            backend: "log".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8780,
        }
    }
}

impl KnowItConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }

    pub fn reply_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.chat.reply_delay_ms)
    }

    pub fn session_idle(&self) -> Option<std::time::Duration> {
        match self.chat.session_idle_secs {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs)),
        }
    }
}
