//! In-memory conversation store

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{ChatError, Result};
use crate::model::{derive_title, Conversation, Message};

/// How conversation titles are produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRule {
    /// Title of a conversation with no messages yet
    pub placeholder: String,
    /// Characters of the first message kept in the title
    pub max_chars: usize,
    /// Appended when the first message was longer than `max_chars`
    pub marker: String,
}

impl Default for TitleRule {
    fn default() -> Self {
        Self {
            placeholder: "New Chat".to_string(),
            max_chars: 30,
            marker: "...".to_string(),
        }
    }
}

/// Owns every conversation of the session and the active selection.
///
/// All history changes go through [`ConversationStore::append_message`].
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: HashMap<String, Conversation>,
    insertion_order: Vec<String>,
    active_id: Option<String>,
    title_rule: TitleRule,
    last_stamp: Option<DateTime<Utc>>,
}

impl ConversationStore {
    pub fn new(title_rule: TitleRule) -> Self {
        Self {
            title_rule,
            ..Default::default()
        }
    }

    /// Current instant, strictly later than any instant handed out before
    pub fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    /// Create an empty conversation. The active selection is left alone.
    pub fn create_conversation(&mut self) -> String {
        let now = self.stamp();
        let conversation = Conversation::new(self.title_rule.placeholder.clone(), now);
        let id = conversation.id.clone();

        debug!(conversation_id = %id, "Created conversation");
        self.insertion_order.push(id.clone());
        self.conversations.insert(id.clone(), conversation);
        id
    }

    pub fn set_active(&mut self, id: &str) -> Result<()> {
        if !self.conversations.contains_key(id) {
            return Err(ChatError::conversation_not_found(id));
        }
        debug!(conversation_id = %id, "Activated conversation");
        self.active_id = Some(id.to_string());
        Ok(())
    }

    /// Append a message, deriving the title from it if it is the first one
    pub fn append_message(&mut self, conversation_id: &str, message: Message) -> Result<()> {
        let now = self.stamp();
        let rule = &self.title_rule;
        let conversation = self
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| ChatError::conversation_not_found(conversation_id))?;

        if conversation.messages.is_empty() {
            conversation.title = derive_title(&message.body, rule.max_chars, &rule.marker);
        }

        debug!(
            conversation_id,
            message_id = %message.id,
            author = ?message.author,
            "Appended message"
        );
        conversation.messages.push(message);
        conversation.updated_at = now;
        Ok(())
    }

    /// Conversations, most recently updated first. Equal timestamps keep
    /// creation order.
    pub fn list(&self) -> Vec<&Conversation> {
        let mut conversations: Vec<&Conversation> = self
            .insertion_order
            .iter()
            .filter_map(|id| self.conversations.get(id))
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations
    }

    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.get(conversation_id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn title_rule(&self) -> &TitleRule {
        &self.title_rule
    }

    /// Make sure a conversation exists and one is active. Returns the id of
    /// the conversation created, if any.
    pub fn bootstrap(&mut self) -> Result<Option<String>> {
        if !self.is_empty() {
            if self.active().is_none() {
                if let Some(latest) = self.list().first().map(|c| c.id.clone()) {
                    self.set_active(&latest)?;
                }
            }
            return Ok(None);
        }

        let id = self.create_conversation();
        self.set_active(&id)?;
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Author;

    fn message(store: &mut ConversationStore, author: Author, body: &str) -> Message {
        let now = store.stamp();
        Message::new(author, body, Vec::new(), now).unwrap()
    }

    #[test]
    fn create_does_not_activate() {
        let mut store = ConversationStore::default();
        let id = store.create_conversation();

        assert!(store.active_id().is_none());
        let conversation = store.get(&id).unwrap();
        assert_eq!(conversation.title, "New Chat");
        assert!(conversation.is_empty());
        assert_eq!(conversation.created_at, conversation.updated_at);
    }

    #[test]
    fn set_active_rejects_unknown_id() {
        let mut store = ConversationStore::default();
        let err = store.set_active("nope").unwrap_err();
        assert!(matches!(err, ChatError::NotFound { entity: "conversation", .. }));
    }

    #[test]
    fn append_to_unknown_conversation_fails() {
        let mut store = ConversationStore::default();
        let msg = message(&mut store, Author::User, "hello");
        assert!(store.append_message("nope", msg).is_err());
    }

    #[test]
    fn title_is_derived_once_from_first_message() {
        let mut store = ConversationStore::default();
        let id = store.create_conversation();

        let first = message(&mut store, Author::User, "What are my tenant rights?");
        store.append_message(&id, first).unwrap();
        let reply = message(&mut store, Author::Assistant, "A much longer reply that would change things");
        store.append_message(&id, reply).unwrap();
        let follow_up = message(&mut store, Author::User, "Another question");
        store.append_message(&id, follow_up).unwrap();

        let conversation = store.get(&id).unwrap();
        assert_eq!(conversation.title, "What are my tenant rights?");
        assert_eq!(conversation.message_count(), 3);
    }

    #[test]
    fn long_first_message_title_is_truncated() {
        let mut store = ConversationStore::default();
        let id = store.create_conversation();
        let body = "x".repeat(50);
        let msg = message(&mut store, Author::User, &body);
        store.append_message(&id, msg).unwrap();

        assert_eq!(store.get(&id).unwrap().title, format!("{}...", "x".repeat(30)));
    }

    #[test]
    fn append_advances_updated_at() {
        let mut store = ConversationStore::default();
        let id = store.create_conversation();
        let created = store.get(&id).unwrap().created_at;

        let msg = message(&mut store, Author::User, "hi");
        store.append_message(&id, msg).unwrap();

        let conversation = store.get(&id).unwrap();
        assert!(conversation.updated_at > created);
        assert_eq!(conversation.created_at, created);
    }

    #[test]
    fn list_orders_by_most_recent_update() {
        let mut store = ConversationStore::default();
        let oldest = store.create_conversation();
        let middle = store.create_conversation();
        let newest = store.create_conversation();

        let ids: Vec<&str> = store.list().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![newest.as_str(), middle.as_str(), oldest.as_str()]);

        let msg = message(&mut store, Author::User, "bump");
        store.append_message(&oldest, msg).unwrap();

        let ids: Vec<&str> = store.list().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![oldest.as_str(), newest.as_str(), middle.as_str()]);
    }

    #[test]
    fn bootstrap_creates_and_activates_once() {
        let mut store = ConversationStore::default();

        let created = store.bootstrap().unwrap();
        assert!(created.is_some());
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_id(), created.as_deref());

        assert_eq!(store.bootstrap().unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stamps_are_strictly_increasing() {
        let mut store = ConversationStore::default();
        let a = store.stamp();
        let b = store.stamp();
        let c = store.stamp();
        assert!(a < b && b < c);
    }
}
