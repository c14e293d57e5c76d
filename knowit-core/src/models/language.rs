use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported chat languages. Anything else degrades to [`Language::DEFAULT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Hi,
    Mr,
    Ta,
    Te,
    Raj,
    Gu,
}

impl Language {
    pub const DEFAULT: Language = Language::En;

    /// Display order of the language picker.
    pub const ALL: [Language; 7] = [
        Language::En,
        Language::Hi,
        Language::Mr,
        Language::Ta,
        Language::Te,
        Language::Raj,
        Language::Gu,
    ];

    /// Strict lookup; `None` for unsupported codes.
    pub fn parse(code: &str) -> Option<Language> {
        let code = code.trim().to_ascii_lowercase();
        Language::ALL.into_iter().find(|l| l.code() == code)
    }

    /// Lenient lookup used at every user-facing boundary.
    pub fn from_code(code: &str) -> Language {
        Language::parse(code).unwrap_or(Language::DEFAULT)
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Mr => "mr",
            Language::Ta => "ta",
            Language::Te => "te",
            Language::Raj => "raj",
            Language::Gu => "gu",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Hi => "हिंदी (Hindi)",
            Language::Mr => "मराठी (Marathi)",
            Language::Ta => "தமிழ் (Tamil)",
            Language::Te => "తెలుగు (Telugu)",
            Language::Raj => "राजस्थानी (Rajasthani)",
            Language::Gu => "ગુજરાતી (Gujarati)",
        }
    }

    /// Locale tag handed to the host speech synthesizer.
    pub fn speech_tag(self) -> &'static str {
        match self {
            Language::En => "en-US",
            Language::Hi => "hi-IN",
            Language::Mr => "mr-IN",
            Language::Ta => "ta-IN",
            Language::Te => "te-IN",
            Language::Raj => "raj-IN",
            Language::Gu => "gu-IN",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::DEFAULT
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
