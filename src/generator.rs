//! Pluggable response generation

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::time::Duration;

use crate::error::{ChatError, Result};
use crate::model::Message;

/// Delay before the canned reply is returned
pub const DEFAULT_DELAY_MS: u64 = 1500;

/// Reply sent when no real inference backend is plugged in
pub const DEFAULT_REPLY: &str = "Thank you for your question. As a Justice Bot, I'm here to assist with legal information. Please note that my responses are for informational purposes only and should not be considered legal advice. For specific legal concerns, I recommend consulting with a qualified attorney.";

/// Produces the assistant's reply for a conversation history
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, history: &[Message]) -> Result<String>;
}

/// Answers every question with the same text after a fixed delay
#[derive(Debug, Clone)]
pub struct CannedResponder {
    delay: Duration,
    reply: String,
}

impl CannedResponder {
    pub fn new(delay: Duration, reply: impl Into<String>) -> Self {
        Self {
            delay,
            reply: reply.into(),
        }
    }
}

impl Default for CannedResponder {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DELAY_MS), DEFAULT_REPLY)
    }
}

#[async_trait]
impl ResponseGenerator for CannedResponder {
    async fn generate(&self, history: &[Message]) -> Result<String> {
        if history.is_empty() {
            return Err(ChatError::generator("empty conversation history"));
        }
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }
}

/// Adapts an async closure into a [`ResponseGenerator`]
pub struct FnResponder<F> {
    respond: F,
}

impl<F> FnResponder<F>
where
    F: Fn(Vec<Message>) -> BoxFuture<'static, Result<String>> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

#[async_trait]
impl<F> ResponseGenerator for FnResponder<F>
where
    F: Fn(Vec<Message>) -> BoxFuture<'static, Result<String>> + Send + Sync,
{
    async fn generate(&self, history: &[Message]) -> Result<String> {
        (self.respond)(history.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::FutureExt;

    fn history() -> Vec<Message> {
        vec![Message::user("Can I break my lease?", Vec::new(), Utc::now()).unwrap()]
    }

    #[tokio::test(start_paused = true)]
    async fn canned_reply_arrives_after_delay() {
        let responder = CannedResponder::default();
        let started = tokio::time::Instant::now();

        let reply = responder.generate(&history()).await.unwrap();

        assert_eq!(reply, DEFAULT_REPLY);
        assert!(started.elapsed() >= Duration::from_millis(DEFAULT_DELAY_MS));
    }

    #[tokio::test]
    async fn canned_responder_refuses_empty_history() {
        let responder = CannedResponder::new(Duration::ZERO, "ok");
        assert!(responder.generate(&[]).await.is_err());
    }

    #[tokio::test]
    async fn closure_sees_full_history() {
        let responder = FnResponder::new(|history: Vec<Message>| {
            async move { Ok::<_, ChatError>(format!("{} message(s)", history.len())) }.boxed()
        });

        assert_eq!(responder.generate(&history()).await.unwrap(), "1 message(s)");
    }
}
