//! Justice Bot: a terminal chat client for a legal-information assistant.
//!
//! [`ChatSession`] owns all state: the [`ConversationStore`], the staged
//! attachments and the replies in flight. The terminal UI under [`ui`] only
//! reads from it and forwards user actions.

pub mod app;
pub mod attachments;
pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod model;
pub mod store;
pub mod ui;
pub mod workflow;

pub use attachments::{AttachmentPolicy, AttachmentRegistry, FileSource, PathFileSource, RawFile};
pub use config::Config;
pub use error::{ChatError, Result};
pub use events::SessionEvent;
pub use generator::{CannedResponder, FnResponder, ResponseGenerator};
pub use model::{Attachment, Author, ContentRef, Conversation, Message};
pub use store::{ConversationStore, TitleRule};
pub use workflow::{ChatSession, ReplyOutcome, SubmissionState, SubmitOutcome};
