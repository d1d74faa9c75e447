use futures::FutureExt;
use justice_bot::{
    Author, CannedResponder, ChatError, ChatSession, Config, FnResponder, Message, RawFile,
    ReplyOutcome, SessionEvent, SubmitOutcome,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

fn session_with_delay(delay: Duration) -> ChatSession {
    let mut config = Config::default();
    config.responder.delay_ms = delay.as_millis() as u64;
    ChatSession::from_config(&config)
}

/// Generator that only answers once the returned sender fires
fn gated_session() -> (ChatSession, oneshot::Sender<String>) {
    let (tx, rx) = oneshot::channel::<String>();
    let gate = Arc::new(Mutex::new(Some(rx)));
    let generator = FnResponder::new(move |_history: Vec<Message>| {
        let rx = gate.lock().unwrap().take();
        async move {
            match rx {
                Some(rx) => rx.await.map_err(|_| ChatError::generator("gate dropped")),
                None => Err(ChatError::generator("gate already used")),
            }
        }
        .boxed()
    });
    let session = session_with_delay(Duration::ZERO).with_generator(Arc::new(generator));
    (session, tx)
}

#[tokio::test]
async fn bootstrap_yields_one_empty_active_chat() {
    let mut session = session_with_delay(Duration::ZERO);
    assert!(session.store().is_empty());
    assert!(session.store().active_id().is_none());

    session.bootstrap().unwrap();

    assert_eq!(session.store().len(), 1);
    let active = session.store().active().unwrap();
    assert_eq!(active.title, "New Chat");
    assert!(active.messages.is_empty());

    session.bootstrap().unwrap();
    assert_eq!(session.store().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn tenant_rights_question_gets_canned_reply() {
    let mut session = session_with_delay(Duration::from_millis(1500));
    session.bootstrap().unwrap();
    let loading = session.subscribe_loading();

    let outcome = session.submit_active("What are my tenant rights?").unwrap();
    let SubmitOutcome::Sent { conversation_id, .. } = outcome else {
        panic!("submission was not sent: {:?}", outcome);
    };

    let conversation = session.store().get(&conversation_id).unwrap();
    assert_eq!(conversation.title, "What are my tenant rights?");
    assert_eq!(conversation.message_count(), 1);
    assert!(*loading.borrow());

    // Nothing arrives before the delay has elapsed
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(session.process_replies().is_empty());
    assert!(session.is_loading());

    let reply = session.next_reply().await.unwrap();
    assert!(matches!(reply, ReplyOutcome::Appended { .. }));

    let conversation = session.store().get(&conversation_id).unwrap();
    assert_eq!(conversation.message_count(), 2);
    assert_eq!(conversation.messages[1].author, Author::Assistant);
    assert!(conversation.messages[1].body.contains("not be considered legal advice"));
    assert!(!*loading.borrow());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn fifty_character_question_gets_truncated_title() {
    let mut session = session_with_delay(Duration::ZERO);
    session.bootstrap().unwrap();
    let question = "My landlord refuses to return the security deposit";
    assert_eq!(question.chars().count(), 50);

    session.submit_active(question).unwrap();
    session.next_reply().await.unwrap();

    let title = &session.store().active().unwrap().title;
    assert_eq!(title, &format!("{}...", &question[..30]));
}

#[tokio::test]
async fn reply_lands_in_the_conversation_it_was_asked_in() {
    let (mut session, gate) = gated_session();
    session.bootstrap().unwrap();
    let first = session.store().active_id().unwrap().to_string();

    session.submit_active("Is my contract void?").unwrap();
    assert!(session.is_loading_for(&first));

    let second = session.new_conversation().unwrap();
    assert_eq!(session.store().active_id(), Some(second.as_str()));
    assert!(!session.is_loading_for(&second));

    gate.send("It depends on the terms.".to_string()).unwrap();
    let reply = session.next_reply().await.unwrap();

    assert_eq!(
        reply,
        ReplyOutcome::Appended {
            conversation_id: first.clone(),
            message_id: session.store().get(&first).unwrap().messages[1].id.clone(),
        }
    );
    assert_eq!(session.store().get(&first).unwrap().message_count(), 2);
    assert!(session.store().get(&second).unwrap().is_empty());
    assert_eq!(session.store().active_id(), Some(second.as_str()));
}

#[tokio::test]
async fn other_conversations_can_submit_while_one_waits() {
    let (mut session, _gate) = gated_session();
    session.bootstrap().unwrap();
    session.submit_active("first question").unwrap();

    let second = session.new_conversation().unwrap();
    session = session.with_generator(Arc::new(CannedResponder::new(Duration::ZERO, "ok")));
    let outcome = session.submit(" second question ", Some(second.as_str())).unwrap();

    assert!(matches!(outcome, SubmitOutcome::Sent { .. }));
    assert!(session.is_loading());
    assert_eq!(session.store().get(&second).unwrap().messages[0].body, "second question");
}

#[tokio::test]
async fn list_moves_updated_chat_to_front() {
    let mut session = session_with_delay(Duration::ZERO);
    session.bootstrap().unwrap();
    let oldest = session.store().active_id().unwrap().to_string();
    let newer = session.new_conversation().unwrap();

    let order: Vec<String> = session.store().list().iter().map(|c| c.id.clone()).collect();
    assert_eq!(order, vec![newer.clone(), oldest.clone()]);

    session.submit("bump", Some(oldest.as_str())).unwrap();
    let order: Vec<String> = session.store().list().iter().map(|c| c.id.clone()).collect();
    assert_eq!(order, vec![oldest.clone(), newer.clone()]);

    session.next_reply().await.unwrap();
    assert_eq!(session.store().list()[0].id, oldest);
}

#[tokio::test]
async fn staged_files_do_not_leak_into_the_next_message() {
    let mut session = session_with_delay(Duration::ZERO);
    session.bootstrap().unwrap();
    let mut events = session.subscribe_events();

    session
        .stage_files(vec![RawFile::from_bytes("lease.pdf", vec![0u8; 64])])
        .unwrap();
    session.submit_active("").unwrap();
    session.next_reply().await.unwrap();

    session.submit_active("follow-up").unwrap();
    session.next_reply().await.unwrap();

    let messages = &session.store().active().unwrap().messages;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].attachments.len(), 1);
    assert!(messages[0].body.is_empty());
    assert!(messages[2].attachments.is_empty());

    let mut staged_events = 0;
    let mut appended = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::AttachmentsStaged { attachment_ids } => {
                staged_events += 1;
                assert_eq!(attachment_ids.len(), 1);
            }
            SessionEvent::MessageAppended { .. } => appended += 1,
            _ => {}
        }
    }
    assert_eq!(staged_events, 1);
    assert_eq!(appended, 4);
}

#[tokio::test]
async fn empty_submission_leaves_store_untouched() {
    let mut session = session_with_delay(Duration::ZERO);
    session.bootstrap().unwrap();
    let before = session.store().active().unwrap().clone();

    assert_eq!(session.submit_active("  ").unwrap(), SubmitOutcome::Rejected);

    let after = session.store().active().unwrap();
    assert_eq!(after, &before);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn messages_only_grow() {
    let mut session = session_with_delay(Duration::ZERO);
    session.bootstrap().unwrap();
    let mut last_len = 0;

    for question in ["one", "", "two", "three"] {
        let _ = session.submit_active(question);
        session.next_reply().await;
        let len = session.store().active().unwrap().message_count();
        assert!(len >= last_len);
        last_len = len;
    }
    assert_eq!(last_len, 6);
}
