// Session startup and history synchronization tests

mod common;
use common::{drain, msg, session_with, toasts, FakeBackend};

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use chatline::{SessionEvent, TokenStore, UnreadState};

#[tokio::test]
async fn test_history_is_displayed_oldest_first_with_unread_target() {
    let backend = Arc::new(
        FakeBackend::new().with_history(vec![msg(5, true, false), msg(4, false, true)]),
    );
    let (session, mut events) = session_with(backend.clone(), None);

    session.fetch_history(true).await.unwrap();

    let ids: Vec<_> = session.messages().await.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![4, 5]);
    assert_eq!(
        session.unread().await,
        UnreadState { count: 1, earliest_inbound_id: 5 }
    );

    let events = drain(&mut events);
    assert!(events.contains(&SessionEvent::MessagesChanged));
    // Unread content on first load: leave the scroll position alone
    assert!(!events
        .iter()
        .any(|e| matches!(e, SessionEvent::ScrollToBottom { .. })));
}

#[tokio::test]
async fn test_first_load_without_unread_jumps_to_bottom() {
    let backend = Arc::new(FakeBackend::new().with_history(vec![msg(2, true, true), msg(1, false, true)]));
    let (session, mut events) = session_with(backend, None);

    session.fetch_history(true).await.unwrap();

    assert!(drain(&mut events).contains(&SessionEvent::ScrollToBottom { smooth: false }));
}

#[tokio::test]
async fn test_greeting_requested_only_until_first_fetch() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_greeting(vec![msg(100, false, false)])
            .with_history(vec![msg(1, true, true)]),
    );
    let (session, _events) = session_with(backend.clone(), None);

    session.fetch_history(true).await.unwrap();
    session.fetch_history(false).await.unwrap();
    session.fetch_history(false).await.unwrap();

    assert_eq!(*backend.history_flags.lock().unwrap(), vec![true, false, false]);

    let greetings = session.greetings().await;
    assert_eq!(greetings.len(), 1);
    assert!(greetings[0].is_reply);
    assert!(greetings[0].is_view);
    // Greetings never leak into the message stream
    assert!(session.messages().await.iter().all(|m| m.id != 100));
}

#[tokio::test]
async fn test_failed_first_fetch_keeps_requesting_greeting() {
    let backend = Arc::new(FakeBackend::new());
    backend.fail_history.store(true, Ordering::SeqCst);
    let (session, _events) = session_with(backend.clone(), None);

    assert!(session.fetch_history(true).await.is_err());
    backend.fail_history.store(false, Ordering::SeqCst);
    session.fetch_history(false).await.unwrap();

    assert_eq!(*backend.history_flags.lock().unwrap(), vec![true, true]);
}

#[tokio::test]
async fn test_start_logs_in_persists_token_and_polls() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::at(dir.path().join("session.json"));
    let backend = Arc::new(FakeBackend::new().with_history(vec![msg(1, true, true)]));
    let (session, mut events) = session_with(backend.clone(), Some(store.clone()));

    assert!(session.is_loading());
    session.start().await;
    assert!(!session.is_loading());

    assert_eq!(backend.logins.load(Ordering::SeqCst), 1);
    assert_eq!(store.load().unwrap().as_deref(), Some("session-token-1"));
    assert_eq!(session.keywords().await, vec!["Where is my order?", "Refunds"]);
    assert!(toasts(&drain(&mut events)).is_empty());

    // New server message shows up through polling alone
    backend.set_history(vec![msg(2, true, false), msg(1, true, true)]);
    sleep(Duration::from_millis(300)).await;

    let ids: Vec<_> = session.messages().await.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(session.unread().await.earliest_inbound_id, 2);
    assert!(backend.history_fetches() >= 3);

    session.close();
}

#[tokio::test]
async fn test_stored_token_skips_login() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::at(dir.path().join("session.json"));
    store.save("restored-token").unwrap();

    let backend = Arc::new(FakeBackend::new());
    let (session, _events) = session_with(backend.clone(), Some(store));

    session.start().await;

    assert_eq!(backend.logins.load(Ordering::SeqCst), 0);
    assert_eq!(*backend.token.lock().unwrap(), "restored-token");
    session.close();
}

#[tokio::test]
async fn test_startup_failures_toast_but_do_not_block() {
    let backend = Arc::new(FakeBackend::new().with_history(vec![msg(1, true, true)]));
    backend.fail_login.store(true, Ordering::SeqCst);
    backend.fail_keywords.store(true, Ordering::SeqCst);
    let (session, mut events) = session_with(backend.clone(), None);

    session.start().await;

    assert!(!session.is_loading());
    assert_eq!(toasts(&drain(&mut events)).len(), 2);
    assert_eq!(session.messages().await.len(), 1);
    session.close();
}

#[tokio::test]
async fn test_poll_failures_are_swallowed() {
    let backend = Arc::new(FakeBackend::new().with_history(vec![msg(1, true, true)]));
    let (session, mut events) = session_with(backend.clone(), None);
    session.start().await;
    drain(&mut events);

    backend.fail_history.store(true, Ordering::SeqCst);
    let before = backend.history_fetches();
    sleep(Duration::from_millis(250)).await;

    // Still polling, never toasting, previous list intact
    assert!(backend.history_fetches() > before);
    assert!(toasts(&drain(&mut events)).is_empty());
    assert_eq!(session.messages().await.len(), 1);

    backend.fail_history.store(false, Ordering::SeqCst);
    backend.set_history(vec![msg(2, false, true), msg(1, true, true)]);
    sleep(Duration::from_millis(250)).await;
    assert_eq!(session.messages().await.len(), 2);

    session.close();
}

#[tokio::test]
async fn test_second_start_is_ignored() {
    let backend = Arc::new(FakeBackend::new().with_history(vec![msg(1, true, true)]));
    let (session, _events) = session_with(backend.clone(), None);

    session.start().await;
    session.start().await;

    assert_eq!(backend.logins.load(Ordering::SeqCst), 1);
    assert_eq!(
        backend.history_flags.lock().unwrap().iter().filter(|flag| **flag).count(),
        1
    );

    session.close();
    sleep(Duration::from_millis(60)).await;
    let after_close = backend.history_fetches();
    sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.history_fetches(), after_close);
}

#[tokio::test]
async fn test_polling_stops_after_close() {
    let backend = Arc::new(FakeBackend::new());
    let (session, _events) = session_with(backend.clone(), None);
    session.start().await;
    sleep(Duration::from_millis(150)).await;

    session.close();
    assert!(session.is_closed());
    sleep(Duration::from_millis(60)).await;
    let after_close = backend.history_fetches();

    sleep(Duration::from_millis(250)).await;
    assert_eq!(backend.history_fetches(), after_close);
}
