use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::segment::segment;

/// Bump when the stored shape changes; snapshots with any other version are
/// discarded on load.
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat turn. `raw` keeps the original model output including any
/// thinking markup; `visible` and `thinking` are derived from it once, at
/// construction. For user messages `raw == visible` always holds.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub raw: String,
    pub visible: String,
    pub thinking: String,
    pub thinking_visible: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            role: Role::User,
            visible: text.clone(),
            raw: text,
            thinking: String::new(),
            thinking_visible: false,
        }
    }

    pub fn assistant(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parts = segment(&raw);
        Self {
            role: Role::Assistant,
            raw,
            visible: parts.visible,
            thinking: parts.thinking,
            thinking_visible: false,
        }
    }

    pub fn has_thinking(&self) -> bool {
        !self.thinking.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    role: Role,
    text: String,
}

/// The on-disk shape: a flat list of `{role, text}` pairs behind a schema
/// tag. Assistant entries store the raw annotated text so thinking content
/// survives reloads.
#[derive(Serialize, Deserialize)]
struct HistorySnapshot {
    version: u32,
    messages: Vec<StoredMessage>,
}

/// Storage port for chat history. Loading is infallible by policy: any
/// unreadable or mismatched snapshot resets to an empty history.
pub trait HistoryStore {
    fn load(&self) -> Vec<ChatMessage>;
    fn save(&self, messages: &[ChatMessage]) -> Result<()>;
    fn clear(&self);
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_snapshot(&self) -> Result<HistorySnapshot> {
        let content = fs::read_to_string(&self.path)?;
        let snapshot: HistorySnapshot = serde_json::from_str(&content)?;
        if snapshot.version != SCHEMA_VERSION {
            anyhow::bail!(
                "history schema version {} (expected {})",
                snapshot.version,
                SCHEMA_VERSION
            );
        }
        Ok(snapshot)
    }
}

impl HistoryStore for FileStore {
    fn load(&self) -> Vec<ChatMessage> {
        if !self.path.exists() {
            return Vec::new();
        }

        match self.read_snapshot() {
            Ok(snapshot) => snapshot
                .messages
                .into_iter()
                .map(|msg| match msg.role {
                    Role::User => ChatMessage::user(msg.text),
                    Role::Assistant => ChatMessage::assistant(msg.text),
                })
                .collect(),
            Err(err) => {
                tracing::warn!(%err, path = %self.path.display(), "discarding corrupt chat history");
                let _ = fs::remove_file(&self.path);
                Vec::new()
            }
        }
    }

    fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        let snapshot = HistorySnapshot {
            version: SCHEMA_VERSION,
            messages: messages
                .iter()
                .map(|msg| StoredMessage {
                    role: msg.role,
                    text: msg.raw.clone(),
                })
                .collect(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing chat history to {}", self.path.display()))
    }

    fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}
