//! Submission workflow: validate, append the user message, ask the response
//! generator, append its reply.
//!
//! The generator runs on a spawned task. Its result travels back over a
//! channel tagged with the conversation it was requested for, and is applied
//! by whoever owns the [`ChatSession`] (see [`ChatSession::process_replies`]).
//! Store mutations therefore never leave the owner's thread of control.

use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::attachments::{AttachmentRegistry, FileSource, RawFile};
use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::events::SessionEvent;
use crate::generator::ResponseGenerator;
use crate::model::{Attachment, Author, Message};
use crate::store::ConversationStore;

const EVENT_CAPACITY: usize = 256;

/// Where the most recent submission is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Validating,
    Sending,
    AwaitingResponse,
    Failed,
}

/// What happened to a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The user message was appended and a reply was requested
    Sent {
        conversation_id: String,
        message_id: String,
    },
    /// Nothing to send: no text and no staged attachments
    Rejected,
    /// There was no active conversation; one was created and activated.
    /// The draft and staged files are kept for the user to resubmit.
    Bootstrapped { conversation_id: String },
}

/// Result of a generator run, addressed to the conversation it was for
#[derive(Debug)]
struct PendingReply {
    conversation_id: String,
    result: Result<String>,
}

/// A reply that has been applied to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Appended {
        conversation_id: String,
        message_id: String,
    },
    Failed {
        conversation_id: String,
        error: String,
    },
}

/// Owns the conversation store, the staged attachments and the in-flight
/// replies for one chat session
pub struct ChatSession {
    store: ConversationStore,
    registry: AttachmentRegistry,
    generator: Arc<dyn ResponseGenerator>,
    pending: HashSet<String>,
    state: SubmissionState,
    loading_tx: watch::Sender<bool>,
    events_tx: broadcast::Sender<SessionEvent>,
    reply_tx: mpsc::UnboundedSender<PendingReply>,
    reply_rx: mpsc::UnboundedReceiver<PendingReply>,
}

impl ChatSession {
    pub fn new(
        store: ConversationStore,
        registry: AttachmentRegistry,
        generator: Arc<dyn ResponseGenerator>,
    ) -> Self {
        let (loading_tx, _) = watch::channel(false);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        Self {
            store,
            registry,
            generator,
            pending: HashSet::new(),
            state: SubmissionState::Idle,
            loading_tx,
            events_tx,
            reply_tx,
            reply_rx,
        }
    }

    /// Session with the configured title rule, attachment policy and canned
    /// responder
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ConversationStore::new(config.title_rule()),
            AttachmentRegistry::new(config.attachment_policy()),
            Arc::new(config.responder()),
        )
    }

    /// Replace the response generator used by later submissions
    pub fn with_generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn registry(&self) -> &AttachmentRegistry {
        &self.registry
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Watch the global loading flag
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// True while any conversation is waiting for a reply
    pub fn is_loading(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_loading_for(&self, conversation_id: &str) -> bool {
        self.pending.contains(conversation_id)
    }

    /// Ensure a conversation exists and is active
    pub fn bootstrap(&mut self) -> Result<Option<String>> {
        let created = self.store.bootstrap()?;
        if let Some(id) = &created {
            info!(conversation_id = %id, "Bootstrapped first conversation");
            self.emit(SessionEvent::ConversationCreated {
                conversation_id: id.clone(),
            });
            self.emit(SessionEvent::ActiveChanged {
                conversation_id: id.clone(),
            });
        }
        Ok(created)
    }

    /// Create a conversation and make it active
    pub fn new_conversation(&mut self) -> Result<String> {
        let id = self.store.create_conversation();
        self.emit(SessionEvent::ConversationCreated {
            conversation_id: id.clone(),
        });
        self.select(&id)?;
        Ok(id)
    }

    pub fn select(&mut self, conversation_id: &str) -> Result<()> {
        self.store.set_active(conversation_id)?;
        self.emit(SessionEvent::ActiveChanged {
            conversation_id: conversation_id.to_string(),
        });
        Ok(())
    }

    pub fn stage(&mut self, source: &dyn FileSource) -> Result<Vec<Attachment>> {
        let staged = self.registry.stage_from(source)?;
        self.emit_staged(&staged);
        Ok(staged)
    }

    pub fn stage_files(&mut self, files: Vec<RawFile>) -> Result<Vec<Attachment>> {
        let staged = self.registry.stage(files)?;
        self.emit_staged(&staged);
        Ok(staged)
    }

    pub fn unstage(&mut self, attachment_id: &str) -> Option<Attachment> {
        let removed = self.registry.unstage(attachment_id)?;
        self.emit(SessionEvent::AttachmentRemoved {
            attachment_id: removed.id.clone(),
        });
        Some(removed)
    }

    /// Submit to whichever conversation is active
    pub fn submit_active(&mut self, text: &str) -> Result<SubmitOutcome> {
        let active = self.store.active_id().map(str::to_string);
        self.submit(text, active.as_deref())
    }

    /// Submit `text` plus the staged attachments to `conversation_id`.
    ///
    /// Must be called from within a tokio runtime; the reply is produced on a
    /// spawned task.
    pub fn submit(&mut self, text: &str, conversation_id: Option<&str>) -> Result<SubmitOutcome> {
        self.transition(SubmissionState::Validating);

        let body = text.trim();
        if body.is_empty() && self.registry.is_empty() {
            debug!("Rejected empty submission");
            self.settle();
            return Ok(SubmitOutcome::Rejected);
        }

        let Some(conversation_id) = conversation_id else {
            self.settle();
            let conversation_id = self.new_conversation()?;
            info!(conversation_id = %conversation_id, "No active conversation; created one");
            return Ok(SubmitOutcome::Bootstrapped { conversation_id });
        };

        if self.store.get(conversation_id).is_none() {
            self.settle();
            return Err(ChatError::conversation_not_found(conversation_id));
        }
        if self.is_loading_for(conversation_id) {
            self.settle();
            return Err(ChatError::ConversationBusy {
                id: conversation_id.to_string(),
            });
        }

        self.transition(SubmissionState::Sending);
        let attachments = self.registry.drain();
        let stamp = self.store.stamp();
        let message = Message::user(body, attachments, stamp)?;
        let message_id = message.id.clone();
        self.store.append_message(conversation_id, message)?;
        self.emit(SessionEvent::MessageAppended {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.clone(),
            author: Author::User,
        });

        self.transition(SubmissionState::AwaitingResponse);
        self.set_loading(conversation_id, true);
        self.spawn_reply(conversation_id)?;

        Ok(SubmitOutcome::Sent {
            conversation_id: conversation_id.to_string(),
            message_id,
        })
    }

    /// Apply every reply that has already arrived. Never blocks.
    pub fn process_replies(&mut self) -> Vec<ReplyOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(reply) = self.reply_rx.try_recv() {
            outcomes.push(self.apply_reply(reply));
        }
        outcomes
    }

    /// Wait for the next reply and apply it. Returns `None` when nothing is
    /// in flight.
    pub async fn next_reply(&mut self) -> Option<ReplyOutcome> {
        if self.pending.is_empty() {
            return None;
        }
        let reply = self.reply_rx.recv().await?;
        Some(self.apply_reply(reply))
    }

    /// Plain-text rendering of a conversation
    pub fn transcript(&self, conversation_id: &str, bot_name: &str) -> Result<String> {
        let conversation = self
            .store
            .get(conversation_id)
            .ok_or_else(|| ChatError::conversation_not_found(conversation_id))?;
        let placeholder = &self.store.title_rule().placeholder;

        let mut out = String::new();
        let _ = writeln!(out, "# {}", conversation.display_title(placeholder));
        for message in &conversation.messages {
            let _ = writeln!(
                out,
                "\n{} ({})",
                message.author.label(bot_name),
                message.display_time()
            );
            if !message.body.is_empty() {
                let _ = writeln!(out, "{}", message.body);
            }
            if message.has_attachments() {
                let _ = writeln!(out, "Uploaded files:");
                for attachment in &message.attachments {
                    let _ = writeln!(
                        out,
                        "  - {} ({})",
                        attachment.name,
                        attachment.display_size()
                    );
                }
            }
        }
        Ok(out)
    }

    fn spawn_reply(&self, conversation_id: &str) -> Result<()> {
        let history = self
            .store
            .get(conversation_id)
            .map(|c| c.messages.clone())
            .ok_or_else(|| ChatError::conversation_not_found(conversation_id))?;
        let generator = Arc::clone(&self.generator);
        let reply_tx = self.reply_tx.clone();
        let conversation_id = conversation_id.to_string();

        debug!(conversation_id = %conversation_id, messages = history.len(), "Requesting reply");
        tokio::spawn(async move {
            // A panicking generator still has to release the conversation
            let result = AssertUnwindSafe(generator.generate(&history))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    error!(conversation_id = %conversation_id, "Response generator panicked");
                    Err(ChatError::generator(panic_message(panic.as_ref())))
                });
            if reply_tx
                .send(PendingReply {
                    conversation_id,
                    result,
                })
                .is_err()
            {
                debug!("Session dropped before reply arrived");
            }
        });
        Ok(())
    }

    fn apply_reply(&mut self, reply: PendingReply) -> ReplyOutcome {
        let PendingReply {
            conversation_id,
            result,
        } = reply;

        let outcome = match result.and_then(|text| {
            let stamp = self.store.stamp();
            Message::assistant(text, stamp)
                .map_err(|_| ChatError::generator("generator returned an empty reply"))
        }) {
            Ok(message) => {
                let message_id = message.id.clone();
                match self.store.append_message(&conversation_id, message) {
                    Ok(()) => {
                        self.emit(SessionEvent::MessageAppended {
                            conversation_id: conversation_id.clone(),
                            message_id: message_id.clone(),
                            author: Author::Assistant,
                        });
                        ReplyOutcome::Appended {
                            conversation_id: conversation_id.clone(),
                            message_id,
                        }
                    }
                    Err(e) => {
                        error!(conversation_id = %conversation_id, error = %e, "Could not append reply");
                        self.fail(&conversation_id, e)
                    }
                }
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Response generation failed");
                self.fail(&conversation_id, e)
            }
        };

        self.set_loading(&conversation_id, false);
        self.settle();
        outcome
    }

    fn fail(&mut self, conversation_id: &str, error: ChatError) -> ReplyOutcome {
        self.transition(SubmissionState::Failed);
        let error = error.to_string();
        self.emit(SessionEvent::ReplyFailed {
            conversation_id: conversation_id.to_string(),
            error: error.clone(),
        });
        ReplyOutcome::Failed {
            conversation_id: conversation_id.to_string(),
            error,
        }
    }

    fn set_loading(&mut self, conversation_id: &str, loading: bool) {
        let changed = if loading {
            self.pending.insert(conversation_id.to_string())
        } else {
            self.pending.remove(conversation_id)
        };
        if changed {
            self.emit(SessionEvent::LoadingChanged {
                conversation_id: conversation_id.to_string(),
                loading,
            });
        }
        self.loading_tx.send_replace(!self.pending.is_empty());
    }

    /// Back to idle unless other replies are still outstanding
    fn settle(&mut self) {
        let next = if self.pending.is_empty() {
            SubmissionState::Idle
        } else {
            SubmissionState::AwaitingResponse
        };
        self.transition(next);
    }

    fn transition(&mut self, next: SubmissionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Submission state");
            self.state = next;
        }
    }

    fn emit_staged(&self, staged: &[Attachment]) {
        if staged.is_empty() {
            return;
        }
        self.emit(SessionEvent::AttachmentsStaged {
            attachment_ids: staged.iter().map(|a| a.id.clone()).collect(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("generator panicked: {}", detail)
}
