//! Conversation UI components for chat interface

pub mod commands;
pub mod composer;
pub mod history;
pub mod indicator;
pub mod manager;

pub use commands::{get_help_text, parse_slash_command, ParsedCommand, SlashCommand};
pub use composer::{ComposerResult, ComposerView, ConversationComposer};
pub use history::HistoryView;
pub use indicator::ThinkingIndicator;
pub use manager::{ConversationAction, ConversationManager};
