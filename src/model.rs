//! Conversation data model: attachments, messages and conversations

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ChatError, Result};

/// Produce a fresh unique identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

impl Author {
    /// Label shown next to a message
    pub fn label<'a>(&self, bot_name: &'a str) -> &'a str {
        match self {
            Author::User => "You",
            Author::Assistant => bot_name,
        }
    }
}

/// Opaque handle to the bytes behind an attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentRef {
    /// A file on disk
    Path(PathBuf),
    /// Bytes held in memory (pasted or dropped content)
    Bytes(Arc<[u8]>),
}

/// A file bound to a message, or staged for the next one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub content_ref: ContentRef,
}

impl Attachment {
    /// Size formatted for display, e.g. `12.4 KB`
    pub fn display_size(&self) -> String {
        const KB: f64 = 1024.0;
        const MB: f64 = KB * 1024.0;

        let size = self.byte_size as f64;
        if size >= MB {
            format!("{:.1} MB", size / MB)
        } else if size >= KB {
            format!("{:.1} KB", size / KB)
        } else {
            format!("{} B", self.byte_size)
        }
    }
}

/// An immutable entry in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub body: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Build a message, rejecting one with an empty body and no attachments
    pub fn new(
        author: Author,
        body: impl Into<String>,
        attachments: Vec<Attachment>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let body = body.into();
        if body.is_empty() && attachments.is_empty() {
            return Err(ChatError::EmptySubmission);
        }

        Ok(Self {
            id: new_id(),
            body,
            author,
            created_at,
            attachments,
        })
    }

    pub fn user(
        body: impl Into<String>,
        attachments: Vec<Attachment>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        Self::new(Author::User, body, attachments, created_at)
    }

    pub fn assistant(body: impl Into<String>, created_at: DateTime<Utc>) -> Result<Self> {
        Self::new(Author::Assistant, body, Vec::new(), created_at)
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Local wall-clock time, e.g. `3:07 PM`
    pub fn display_time(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%-I:%M %p")
            .to_string()
    }
}

/// A titled, append-only history of messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub(crate) fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Title for display; an empty derived title falls back to `placeholder`
    pub fn display_title<'a>(&'a self, placeholder: &'a str) -> &'a str {
        if self.title.trim().is_empty() {
            placeholder
        } else {
            &self.title
        }
    }

    /// Short date of the last update, e.g. `Mar 4`
    pub fn display_date(&self) -> String {
        self.updated_at
            .with_timezone(&Local)
            .format("%b %-d")
            .to_string()
    }
}

/// Title taken from the first message body: at most `max_chars` characters,
/// followed by `marker` when the body was longer.
pub fn derive_title(body: &str, max_chars: usize, marker: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}{}", head, marker)
    } else {
        head
    }
}
