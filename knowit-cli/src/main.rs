//! knowit-cli - terminal client for the KnowIt student support chat service
//!
//! Talks to a running `knowit-server` over its HTTP API.
//!
//! # Subcommands
//! - `ask <text> [-l <lang>] [--json]` - one-shot question, no session
//! - `chat [-l <lang>]`                 - interactive session with typing delay
//! - `languages`                        - list supported languages
//! - `status`                           - show server health
//! - `upload <path>...`                 - register documents with the admin panel
//! - `uploads`                          - list registered documents

use std::io::{BufRead, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8780";
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "knowit-cli",
    version,
    about = "KnowIt multilingual student support assistant"
)]
struct Cli {
    /// KnowIt HTTP server URL (overrides KNOWIT_HTTP_URL env var)
    #[arg(long, env = "KNOWIT_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask a single question without opening a session
    Ask {
        /// Question text
        text: String,

        /// Language code (en, hi, mr, ta, te, raj, gu)
        #[arg(short, long, default_value = "en")]
        language: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive chat session
    Chat {
        /// Initial language code
        #[arg(short, long, default_value = "en")]
        language: String,
    },

    /// List supported languages
    Languages,

    /// Show KnowIt server status
    Status,

    /// Register documents with the admin panel (metadata only)
    Upload {
        /// Files to register
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// List documents registered with the admin panel
    Uploads,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ResolveView {
    pub matched: bool,
    pub topic: Option<String>,
    pub answer: String,
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub seq: u64,
    pub text: String,
    pub origin: String,
    pub created_at: DateTime<Utc>,
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionView {
    pub id: String,
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    pub language: String,
    pub typing: bool,
    pub recording: bool,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Deserialize)]
pub struct UploadView {
    pub file_name: String,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

fn default_assistant_name() -> String {
    "KnowIt".to_string()
}

// ============================================================================
// Formatting helpers
// ============================================================================

/// One transcript line: `[HH:MM] <assistant>: text` or `[HH:MM] You: text`.
pub fn format_message(msg: &MessageView, assistant: &str) -> String {
    let time = msg.created_at.with_timezone(&Local).format("%H:%M");
    let speaker = if msg.origin == "assistant" { assistant } else { "You" };
    format!("[{}] {}: {}", time, speaker, msg.text)
}

/// Assistant messages newer than `after_seq`, in transcript order.
pub fn new_replies(messages: &[MessageView], after_seq: u64) -> Vec<&MessageView> {
    messages
        .iter()
        .filter(|m| m.seq > after_seq && m.origin == "assistant")
        .collect()
}

/// Best-effort MIME type from the file extension.
pub fn guess_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => return None,
    };
    Some(mime)
}

pub fn format_size(bytes: Option<u64>) -> String {
    match bytes {
        None => "?".to_string(),
        Some(b) if b < 1024 => format!("{} B", b),
        Some(b) if b < 1024 * 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        Some(b) => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
    }
}

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput {
    Say(String),
    Language(String),
    Voice,
    Speak,
    Quit,
    Help,
    Empty,
}

pub fn parse_chat_input(line: &str) -> ChatInput {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ChatInput::Say(line.to_string());
    };
    let mut parts = command.split_whitespace();
    match parts.next().unwrap_or("") {
        "quit" | "exit" | "q" => ChatInput::Quit,
        "voice" | "mic" => ChatInput::Voice,
        "speak" => ChatInput::Speak,
        "lang" | "language" => match parts.next() {
            Some(code) => ChatInput::Language(code.to_string()),
            None => ChatInput::Help,
        },
        _ => ChatInput::Help,
    }
}

// ============================================================================
// HTTP client
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
}

impl Api {
    fn new(server: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> anyhow::Result<serde_json::Value> {
        let resp = req.send()?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        if !status.is_success() {
            let msg = body["error"].as_str().unwrap_or("request failed");
            anyhow::bail!("server returned HTTP {}: {}", status, msg);
        }
        Ok(body)
    }

    fn get(&self, path: &str) -> anyhow::Result<serde_json::Value> {
        self.send(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str, body: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        self.send(self.client.post(self.url(path)).json(&body))
    }

    fn put(&self, path: &str, body: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        self.send(self.client.put(self.url(path)).json(&body))
    }

    fn delete(&self, path: &str) -> anyhow::Result<serde_json::Value> {
        self.send(self.client.delete(self.url(path)))
    }

    fn session(&self, id: &str) -> anyhow::Result<SessionView> {
        Ok(serde_json::from_value(self.get(&format!("/sessions/{}", id))?)?)
    }
}

// ============================================================================
// Commands
// ============================================================================

fn do_ask(api: &Api, text: &str, language: &str, json_output: bool) -> anyhow::Result<()> {
    let body = api.post(
        "/resolve",
        serde_json::json!({ "text": text, "language": language }),
    )?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let view: ResolveView = serde_json::from_value(body)?;
    println!("{}", view.answer);
    match view.topic {
        Some(topic) if view.matched => eprintln!("({} · {})", view.language, topic),
        _ => eprintln!("({} · no match)", view.language),
    }
    Ok(())
}

fn do_languages(api: &Api) -> anyhow::Result<()> {
    let body = api.get("/languages")?;
    let languages = body["languages"].as_array().cloned().unwrap_or_default();
    for lang in languages {
        let marker = if lang["default"].as_bool().unwrap_or(false) { "*" } else { " " };
        println!(
            "{} {:<4} {:<24} {}",
            marker,
            lang["code"].as_str().unwrap_or("?"),
            lang["name"].as_str().unwrap_or("?"),
            lang["speech_tag"].as_str().unwrap_or("?"),
        );
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(api: &Api) -> anyhow::Result<()> {
    let url = api.url("/health");
    match api.client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("KnowIt server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Sessions:      {}", body["sessions"].as_u64().unwrap_or(0));
            println!("Knowledge:     {} entries", body["knowledge_entries"].as_u64().unwrap_or(0));
        }
        Ok(r) => {
            eprintln!("knowit-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("knowit-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn do_upload(api: &Api, paths: &[String]) -> anyhow::Result<()> {
    for raw in paths {
        let path = Path::new(raw);
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => {
                eprintln!("knowit-cli: skipping {}: not a file name", raw);
                continue;
            }
        };
        let size_bytes = std::fs::metadata(path).ok().map(|m| m.len());
        let body = api.post(
            "/admin/uploads",
            serde_json::json!({
                "file_name": file_name,
                "size_bytes": size_bytes,
                "content_type": guess_content_type(path),
            }),
        )?;
        println!(
            "Registered {} ({})",
            body["file_name"].as_str().unwrap_or(&file_name),
            format_size(size_bytes)
        );
    }
    Ok(())
}

fn do_uploads(api: &Api) -> anyhow::Result<()> {
    let body = api.get("/admin/uploads")?;
    let documents: Vec<UploadView> = serde_json::from_value(body["documents"].clone())?;
    if documents.is_empty() {
        eprintln!("No documents uploaded yet");
        return Ok(());
    }
    for doc in documents {
        println!(
            "{}  {:<40} {:>10}  {}",
            doc.uploaded_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            doc.file_name,
            format_size(doc.size_bytes),
            doc.content_type.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Poll the session until an assistant reply newer than `after_seq` lands.
fn wait_for_reply(
    api: &Api,
    id: &str,
    assistant: &str,
    after_seq: u64,
) -> anyhow::Result<Vec<MessageView>> {
    let started = Instant::now();
    let mut shown_typing = false;
    loop {
        let session = api.session(id)?;
        let replies: Vec<MessageView> = new_replies(&session.messages, after_seq)
            .into_iter()
            .cloned()
            .collect();
        if !replies.is_empty() && !session.typing {
            if shown_typing {
                eprint!("\r                    \r");
            }
            return Ok(replies);
        }
        if session.typing && !shown_typing {
            eprint!("{} is typing...", assistant);
            shown_typing = true;
        }
        if started.elapsed() > REPLY_TIMEOUT {
            anyhow::bail!("timed out waiting for a reply");
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn do_chat(api: &Api, language: &str) -> anyhow::Result<()> {
    let opened = api.post("/sessions", serde_json::json!({ "language": language }))?;
    let session: SessionView = serde_json::from_value(opened)?;
    let id = session.id.clone();

    let assistant = session.assistant_name.clone();
    println!(
        "{} chat ({}). Commands: /lang CODE, /voice, /speak, /quit",
        assistant, session.language
    );
    for msg in &session.messages {
        println!("{}", format_message(msg, &assistant));
    }

    let mut last_seq = session.messages.last().map(|m| m.seq).unwrap_or(0);
    let mut last_reply = session
        .messages
        .iter()
        .rev()
        .find(|m| m.origin == "assistant")
        .map(|m| m.id.clone());

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;

        match parse_chat_input(&line) {
            ChatInput::Empty => {}
            ChatInput::Quit => break,
            ChatInput::Help => {
                println!("Commands: /lang CODE, /voice, /speak, /quit");
            }
            ChatInput::Language(code) => {
                let body = api.put(
                    &format!("/sessions/{}/language", id),
                    serde_json::json!({ "language": code }),
                )?;
                let applied = body["language"].as_str().unwrap_or("en");
                if body["degraded"].as_bool().unwrap_or(false) {
                    println!("Unsupported language '{}', using {}", code, applied);
                } else {
                    println!("Language set to {}", applied);
                }
            }
            ChatInput::Voice => {
                let body = api.post(&format!("/sessions/{}/voice", id), serde_json::json!({}))?;
                println!(
                    "{}: {}",
                    body["notice"]["title"].as_str().unwrap_or("Voice"),
                    body["notice"]["description"].as_str().unwrap_or("")
                );
            }
            ChatInput::Speak => match &last_reply {
                Some(message_id) => {
                    let body = api.post(
                        &format!("/sessions/{}/messages/{}/speak", id, message_id),
                        serde_json::json!({}),
                    )?;
                    println!("Speaking ({})", body["speech_tag"].as_str().unwrap_or("?"));
                }
                None => println!("Nothing to speak yet"),
            },
            ChatInput::Say(text) => {
                let sent = api.post(
                    &format!("/sessions/{}/messages", id),
                    serde_json::json!({ "text": text }),
                )?;
                let sent: MessageView = serde_json::from_value(sent)?;
                last_seq = last_seq.max(sent.seq);
                for reply in wait_for_reply(api, &id, &assistant, last_seq)? {
                    println!("{}", format_message(&reply, &assistant));
                    last_seq = last_seq.max(reply.seq);
                    last_reply = Some(reply.id.clone());
                }
            }
        }
    }

    api.delete(&format!("/sessions/{}", id))?;
    println!("Session closed");
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let api = match Api::new(&cli.server) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("knowit-cli: failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Ask { text, language, json } => do_ask(&api, &text, &language, json),
        Commands::Chat { language } => do_chat(&api, &language),
        Commands::Languages => do_languages(&api),
        Commands::Status => do_status(&api),
        Commands::Upload { paths } => do_upload(&api, &paths),
        Commands::Uploads => do_uploads(&api),
    };

    if let Err(e) = result {
        eprintln!("knowit-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
