//! Knowledge base for KnowIt - static per-language answers plus fallback pools
//!
//! The table is loaded once (built-in TOML compiled into the binary, or an
//! override file) and never mutated afterwards, so it is shared behind an `Arc`
//! without any locking.
//!
//! Matching is deliberately plain: a question matches an entry when any of the
//! entry's triggers is contained in the lowercased question. Entries are tried
//! in table order and the first hit wins.

use std::collections::HashMap;
use std::path::Path;

use config::{Config, File, FileFormat};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::KnowItError;
use crate::models::Language;

/// Built-in knowledge table.
pub const BUILTIN_KNOWLEDGE: &str = include_str!("../data/knowledge.toml");

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeEntry {
    pub topic: String,
    /// Lowercased at load time.
    pub triggers: Vec<String>,
    pub answer: String,
}

impl KnowledgeEntry {
    fn matches(&self, lowered_input: &str) -> bool {
        self.triggers.iter().any(|t| lowered_input.contains(t.as_str()))
    }
}

/// Outcome of [`KnowledgeBase::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Matched(&'a KnowledgeEntry),
    NoMatch,
}

impl<'a> Resolution<'a> {
    pub fn answer(&self) -> Option<&'a str> {
        match self {
            Resolution::Matched(entry) => Some(entry.answer.as_str()),
            Resolution::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Resolution::Matched(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplySource {
    Knowledge { topic: String },
    Fallback,
}

/// Text to post back to the student, with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

// On-disk shape: `[[entries.<code>]]` tables and a `[fallback]` table of arrays.
#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    #[serde(default)]
    entries: HashMap<String, Vec<EntryDef>>,
    #[serde(default)]
    fallback: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct EntryDef {
    topic: String,
    triggers: Vec<String>,
    answer: String,
}

// ============================================================================
// KnowledgeBase
// ============================================================================

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: HashMap<Language, Vec<KnowledgeEntry>>,
    fallback: HashMap<Language, Vec<String>>,
}

impl KnowledgeBase {
    /// Parse the compiled-in table.
    pub fn builtin() -> Result<Self, KnowItError> {
        Self::from_toml_str(BUILTIN_KNOWLEDGE)
    }

    /// Load the override file when one is configured, otherwise the built-in table.
    pub fn load(path: Option<&str>) -> Result<Self, KnowItError> {
        match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => {
                let expanded = shellexpand::full(p)
                    .map_err(|e| KnowItError::Knowledge(format!("cannot expand path {}: {}", p, e)))?;
                Self::from_file(Path::new(expanded.as_ref()))
            }
            None => Self::builtin(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, KnowItError> {
        let contents = std::fs::read_to_string(path)?;
        let kb = Self::from_toml_str(&contents)?;
        tracing::info!(
            "Loaded knowledge file {}: {} entries across {} languages",
            path.display(),
            kb.entry_count(),
            kb.entries.len()
        );
        Ok(kb)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, KnowItError> {
        let file: KnowledgeFile = Config::builder()
            .add_source(File::from_str(s, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Self::from_parts(file)
    }

    fn from_parts(file: KnowledgeFile) -> Result<Self, KnowItError> {
        let mut entries = HashMap::new();
        for (code, defs) in file.entries {
            let language = supported(&code)?;
            let mut table = Vec::with_capacity(defs.len());
            for def in defs {
                table.push(validate_entry(language, def)?);
            }
            entries.insert(language, table);
        }

        let mut fallback = HashMap::new();
        for (code, pool) in file.fallback {
            let language = supported(&code)?;
            let pool: Vec<String> = pool.into_iter().filter(|s| !s.trim().is_empty()).collect();
            if !pool.is_empty() {
                fallback.insert(language, pool);
            }
        }

        if !fallback.contains_key(&Language::DEFAULT) {
            return Err(KnowItError::Knowledge(format!(
                "fallback pool for default language '{}' is missing or empty",
                Language::DEFAULT
            )));
        }

        Ok(Self { entries, fallback })
    }

    /// Match `input` against the table for `language`.
    ///
    /// A language without a table of its own is answered from the default
    /// language's table. Blank input never matches.
    pub fn resolve(&self, input: &str, language: Language) -> Resolution<'_> {
        let lowered = input.trim().to_lowercase();
        if lowered.is_empty() {
            return Resolution::NoMatch;
        }
        self.table(language)
            .iter()
            .find(|entry| entry.matches(&lowered))
            .map_or(Resolution::NoMatch, Resolution::Matched)
    }

    /// [`resolve`](Self::resolve) with a raw language code; unknown codes use the default.
    pub fn resolve_code(&self, input: &str, code: &str) -> Resolution<'_> {
        self.resolve(input, Language::from_code(code))
    }

    /// Uniform pick from the language's pool, or the default pool when it has none.
    pub fn fallback<R: Rng + ?Sized>(&self, language: Language, rng: &mut R) -> &str {
        self.fallback_pool(language)
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn fallback_pool(&self, language: Language) -> &[String] {
        self.fallback
            .get(&language)
            .or_else(|| self.fallback.get(&Language::DEFAULT))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolve, and substitute a fallback acknowledgement on no match.
    pub fn reply<R: Rng + ?Sized>(&self, input: &str, language: Language, rng: &mut R) -> Reply {
        match self.resolve(input, language) {
            Resolution::Matched(entry) => Reply {
                text: entry.answer.clone(),
                source: ReplySource::Knowledge {
                    topic: entry.topic.clone(),
                },
            },
            Resolution::NoMatch => Reply {
                text: self.fallback(language, rng).to_string(),
                source: ReplySource::Fallback,
            },
        }
    }

    pub fn entries(&self, language: Language) -> &[KnowledgeEntry] {
        self.entries.get(&language).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    fn table(&self, language: Language) -> &[KnowledgeEntry] {
        self.entries
            .get(&language)
            .or_else(|| self.entries.get(&Language::DEFAULT))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn supported(code: &str) -> Result<Language, KnowItError> {
    Language::parse(code)
        .ok_or_else(|| KnowItError::Knowledge(format!("unsupported language code '{}'", code)))
}

fn validate_entry(language: Language, def: EntryDef) -> Result<KnowledgeEntry, KnowItError> {
    if def.answer.trim().is_empty() {
        return Err(KnowItError::Knowledge(format!(
            "entry '{}' ({}) has an empty answer",
            def.topic, language
        )));
    }
    // An empty trigger would be contained in every question.
    if def.triggers.iter().any(|t| t.trim().is_empty()) || def.triggers.is_empty() {
        return Err(KnowItError::Knowledge(format!(
            "entry '{}' ({}) needs at least one non-blank trigger",
            def.topic, language
        )));
    }
    Ok(KnowledgeEntry {
        topic: def.topic,
        triggers: def.triggers.iter().map(|t| t.to_lowercase()).collect(),
        answer: def.answer,
    })
}
