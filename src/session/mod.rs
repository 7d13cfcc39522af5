// Chat session for chatline
// Owns the backend handle, the shared display state and the polling task.
// Submodules add the synchronizer, read tracking and the outbox to ChatSession.

use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;

use crate::api::ChatBackend;
use crate::config::ChatConfig;
use crate::models::{DeliveryState, Message, MessageId, UnreadState};
use crate::token_store::TokenStore;

pub mod outbox;
pub mod read_tracking;
pub mod sync;

pub use read_tracking::ReadTracker;
pub use sync::{reconcile, Reconciled};

const EVENT_BUFFER: usize = 100;

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Toast(String),
    ScrollToBottom { smooth: bool },
    MessagesChanged,
    UnreadChanged(UnreadState),
    ClearInput,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    /// Oldest first.
    pub messages: Vec<Message>,
    /// Captured once on the first load, never merged with `messages`.
    pub greetings: Vec<Message>,
    /// Delivery overlay for messages sent from this device.
    pub delivery: HashMap<MessageId, DeliveryState>,
    pub unread: UnreadState,
    /// At least one history fetch has completed.
    pub has_fetched: bool,
}

impl ChatState {
    pub fn delivery_of(&self, id: MessageId) -> DeliveryState {
        self.delivery.get(&id).copied().unwrap_or_default()
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Move a displayed message out of `Pending`. Returns false if nothing changed.
    pub fn settle(&mut self, id: MessageId, outcome: DeliveryState) -> bool {
        if self.message(id).is_none() {
            return false;
        }
        if self.delivery_of(id) != DeliveryState::Pending {
            return false;
        }
        match outcome {
            DeliveryState::Confirmed => {
                self.delivery.remove(&id);
            }
            other => {
                self.delivery.insert(id, other);
            }
        }
        true
    }
}

#[derive(Clone)]
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    config: ChatConfig,
    token_store: Option<TokenStore>,
    state: Arc<TokioMutex<ChatState>>,
    tracker: Arc<TokioMutex<ReadTracker>>,
    keywords: Arc<TokioMutex<Vec<String>>>,
    events: mpsc::Sender<SessionEvent>,
    loading: Arc<AtomicBool>,
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    poller: Arc<StdMutex<Option<JoinHandle<()>>>>,
    last_local_id: Arc<AtomicI64>,
}

impl ChatSession {
    /// Create a session and the receiver for its events.
    ///
    /// Events are delivered best-effort. Once the receiver is `EVENT_BUFFER` (100)
    /// events behind, further events, toasts included, are dropped and logged
    /// rather than stalling the session. Keep the receiver drained.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        config: ChatConfig,
        token_store: Option<TokenStore>,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events, events_rx) = mpsc::channel(EVENT_BUFFER);

        (Self {
            backend,
            config,
            token_store,
            state: Arc::new(TokioMutex::new(ChatState::default())),
            tracker: Arc::new(TokioMutex::new(ReadTracker::default())),
            keywords: Arc::new(TokioMutex::new(Vec::new())),
            events,
            loading: Arc::new(AtomicBool::new(true)),
            started: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            poller: Arc::new(StdMutex::new(None)),
            last_local_id: Arc::new(AtomicI64::new(0)),
        }, events_rx)
    }

    /// Authenticate, load keywords, fetch the first page of history and begin polling.
    ///
    /// Failures along the way are reported as toasts or logged; the session always
    /// reaches the polling state. Only the first call does anything.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Chat session already started");
            return;
        }
        info!("Starting chat session against {}", self.config.base_url);
        self.loading.store(true, Ordering::SeqCst);

        self.authenticate().await;
        self.load_keywords().await;

        if let Err(e) = self.fetch_history(true).await {
            warn!("Initial history fetch failed: {}", e);
        }

        self.loading.store(false, Ordering::SeqCst);
        self.spawn_polling();
        info!("Chat session ready");
    }

    /// Stop polling. Requests already in flight run to completion, but their results are dropped.
    pub fn close(&self) {
        self.stopped.store(true, Ordering::SeqCst);

        let handle = match self.poller.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.abort();
        }
        info!("Chat session closed");
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> ChatState {
        self.state.lock().await.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    pub async fn greetings(&self) -> Vec<Message> {
        self.state.lock().await.greetings.clone()
    }

    pub async fn unread(&self) -> UnreadState {
        self.state.lock().await.unread
    }

    pub async fn delivery_state(&self, id: MessageId) -> DeliveryState {
        self.state.lock().await.delivery_of(id)
    }

    pub async fn keywords(&self) -> Vec<String> {
        self.keywords.lock().await.clone()
    }

    async fn authenticate(&self) {
        if let Some(store) = &self.token_store {
            match store.load() {
                Ok(Some(token)) => {
                    info!("Reusing stored session token");
                    self.backend.set_token(&token);
                    return;
                }
                Ok(None) => debug!("No stored session token, logging in"),
                Err(e) => warn!("Ignoring unreadable token store {}: {}", store.path().display(), e),
            }
        }

        match self
            .backend
            .login(&self.config.phone, &self.config.temporary_token)
            .await
        {
            Ok(token) => {
                if let Some(store) = &self.token_store {
                    if let Err(e) = store.save(&token) {
                        warn!("Failed to persist session token: {}", e);
                    }
                }
            }
            Err(e) => {
                warn!("Login failed: {}", e);
                self.toast(e.to_string());
            }
        }
    }

    async fn load_keywords(&self) {
        match self.backend.fetch_keywords().await {
            Ok(keywords) => {
                debug!("Loaded {} keyword suggestions", keywords.len());
                *self.keywords.lock().await = keywords;
            }
            Err(e) => {
                warn!("Failed to load keywords: {}", e);
                self.toast(e.to_string());
            }
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(SessionEvent::Toast(text))) => {
                warn!("Event receiver is full, dropped toast: {}", text);
            }
            Err(e) => debug!("Dropped session event: {}", e),
        }
    }

    pub(crate) fn toast(&self, message: String) {
        self.emit(SessionEvent::Toast(message));
    }

    /// Millisecond timestamp, strictly increasing within this session.
    pub(crate) fn next_local_id(&self) -> MessageId {
        let now = Utc::now().timestamp_millis();
        match self
            .last_local_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        {
            Ok(previous) | Err(previous) => now.max(previous + 1),
        }
    }
}
