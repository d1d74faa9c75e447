//! Error types shared by the chat core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the conversation store, the attachment registry and the
/// submission workflow.
#[derive(Error, Debug)]
pub enum ChatError {
    /// A conversation or attachment id that does not exist
    #[error("{entity} not found: '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// Submission with neither text nor attachments
    #[error("message needs text or at least one attachment")]
    EmptySubmission,

    /// Staging would break the configured attachment policy
    #[error("attachment limit exceeded: {reason}")]
    AttachmentLimit { reason: String },

    /// A reply is already pending for this conversation
    #[error("conversation '{id}' is still waiting for a reply")]
    ConversationBusy { id: String },

    /// The response generator rejected the request
    #[error("response generator failed: {0}")]
    Generator(String),

    /// A file could not be inspected while staging it
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChatError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conversation_not_found(id: impl Into<String>) -> Self {
        Self::not_found("conversation", id)
    }

    pub fn generator(message: impl Into<String>) -> Self {
        Self::Generator(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error is an expected, user-recoverable condition rather
    /// than a wiring mistake.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ChatError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
