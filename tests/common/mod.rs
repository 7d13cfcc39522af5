// Common test utilities for integration tests
// A scripted in-memory backend and helpers for draining session events.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use log::LevelFilter;
use tokio::sync::{mpsc, Semaphore};

use chatline::{
    ChatBackend, ChatConfig, ChatError, ChatResult, ChatSession, HistoryPage, Message, MessageId,
    SessionEvent, TokenStore, UploadCredentials,
};

static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

pub const PERMANENT_URL: &str = "https://cdn.example.com/chat/uploaded.png";

pub fn msg(id: MessageId, is_reply: bool, is_view: bool) -> Message {
    Message {
        id,
        content: Some(format!("message {}", id)),
        image_url: None,
        is_reply,
        is_view,
        create_time: 1_700_000_000 + id,
        title: None,
    }
}

fn rejected(what: &str) -> ChatError {
    ChatError::Application(format!("{} rejected by test backend", what))
}

/// Backend double. Server history is newest first, as on the wire.
pub struct FakeBackend {
    pub history: Mutex<Vec<Message>>,
    pub greeting: Mutex<Vec<Message>>,
    pub keywords: Vec<String>,
    pub login_token: String,

    pub fail_login: AtomicBool,
    pub fail_keywords: AtomicBool,
    pub fail_history: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_read: AtomicBool,
    pub fail_upload: AtomicBool,

    pub token: Mutex<String>,
    pub logins: AtomicUsize,
    pub history_flags: Mutex<Vec<bool>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub read_ids: Mutex<Vec<MessageId>>,
    pub sign_requests: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(String, usize)>>,

    /// Sends wait for a permit; tests can hold them to observe pending state.
    send_gate: Semaphore,
}

impl FakeBackend {
    pub fn new() -> Self {
        FakeBackend {
            history: Mutex::new(Vec::new()),
            greeting: Mutex::new(Vec::new()),
            keywords: vec!["Where is my order?".to_string(), "Refunds".to_string()],
            login_token: "session-token-1".to_string(),
            fail_login: AtomicBool::new(false),
            fail_keywords: AtomicBool::new(false),
            fail_history: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            fail_read: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
            token: Mutex::new(String::new()),
            logins: AtomicUsize::new(0),
            history_flags: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            read_ids: Mutex::new(Vec::new()),
            sign_requests: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            send_gate: Semaphore::new(Semaphore::MAX_PERMITS),
        }
    }

    pub fn with_history(self, history: Vec<Message>) -> Self {
        *self.history.lock().unwrap() = history;
        self
    }

    pub fn with_greeting(self, greeting: Vec<Message>) -> Self {
        *self.greeting.lock().unwrap() = greeting;
        self
    }

    /// Sends block until `release_sends` is called.
    pub fn with_held_sends(mut self) -> Self {
        self.send_gate = Semaphore::new(0);
        self
    }

    pub fn release_sends(&self, count: usize) {
        self.send_gate.add_permits(count);
    }

    pub fn history_fetches(&self) -> usize {
        self.history_flags.lock().unwrap().len()
    }

    pub fn set_history(&self, history: Vec<Message>) {
        *self.history.lock().unwrap() = history;
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn login(&self, _phone: &str, temporary_token: &str) -> ChatResult<String> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.fail_login.load(Ordering::SeqCst) || temporary_token.is_empty() {
            return Err(rejected("login"));
        }
        self.set_token(&self.login_token);
        Ok(self.login_token.clone())
    }

    fn set_token(&self, token: &str) {
        *self.token.lock().unwrap() = token.to_string();
    }

    async fn fetch_history(&self, is_greeting: bool) -> ChatResult<HistoryPage> {
        self.history_flags.lock().unwrap().push(is_greeting);
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(rejected("history"));
        }
        Ok(HistoryPage {
            greeting: if is_greeting {
                self.greeting.lock().unwrap().clone()
            } else {
                Vec::new()
            },
            messages: self.history.lock().unwrap().clone(),
        })
    }

    async fn fetch_keywords(&self) -> ChatResult<Vec<String>> {
        if self.fail_keywords.load(Ordering::SeqCst) {
            return Err(rejected("keywords"));
        }
        Ok(self.keywords.clone())
    }

    async fn send_chat(&self, content: &str, image_url: &str) -> ChatResult<()> {
        if let Ok(permit) = self.send_gate.acquire().await {
            permit.forget();
        }
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(rejected("send"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((content.to_string(), image_url.to_string()));
        Ok(())
    }

    async fn mark_read(&self, id: MessageId) -> ChatResult<()> {
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(rejected("read"));
        }
        self.read_ids.lock().unwrap().push(id);
        Ok(())
    }

    async fn request_upload_credentials(&self, extension: &str) -> ChatResult<UploadCredentials> {
        self.sign_requests.lock().unwrap().push(extension.to_string());
        Ok(UploadCredentials {
            upload_url: "https://bucket.example.com".to_string(),
            url: PERMANENT_URL.to_string(),
            key: format!("chat/uploaded.{}", extension),
            access_key_id: "AKID".to_string(),
            policy: "policy".to_string(),
            signature: "signature".to_string(),
        })
    }

    async fn upload_file(
        &self,
        _credentials: &UploadCredentials,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ChatResult<()> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(ChatError::Upload(reqwest::StatusCode::FORBIDDEN));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes.len()));
        Ok(())
    }
}

/// Config with a short poll interval so polling tests run quickly.
pub fn test_config() -> ChatConfig {
    ChatConfig::new("http://chat.test", "test-key")
        .with_login("13800000000", "temp-token")
        .with_poll_interval(Duration::from_millis(50))
}

pub fn session_with(
    backend: Arc<FakeBackend>,
    token_store: Option<TokenStore>,
) -> (ChatSession, mpsc::Receiver<SessionEvent>) {
    setup_logging();
    ChatSession::new(backend, test_config(), token_store)
}

/// Everything currently queued, without waiting.
pub fn drain(events: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn toasts(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Toast(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}
