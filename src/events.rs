use crate::model::Author;

/// Notifications published by a chat session to its observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A conversation was added to the store
    ConversationCreated { conversation_id: String },

    /// The active conversation changed
    ActiveChanged { conversation_id: String },

    /// A message was appended to a conversation
    MessageAppended {
        conversation_id: String,
        message_id: String,
        author: Author,
    },

    /// Files were staged for the next message
    AttachmentsStaged { attachment_ids: Vec<String> },

    /// A staged file was removed before sending
    AttachmentRemoved { attachment_id: String },

    /// A conversation started or stopped waiting for a reply
    LoadingChanged {
        conversation_id: String,
        loading: bool,
    },

    /// The response generator failed; no reply was appended
    ReplyFailed {
        conversation_id: String,
        error: String,
    },
}
