// History synchronization
// Pull-based: every poll replaces the displayed list with the server's view.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use tokio::time::{interval, MissedTickBehavior};

use super::{ChatSession, ChatState, SessionEvent};
use crate::error::ChatResult;
use crate::models::{HistoryPage, MessageId, UnreadState};

/// Result of folding one history page into the previous state.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub state: ChatState,
    /// Jump to the newest message without animation.
    pub scroll_to_bottom: bool,
}

/// Fold a newest-first history page into the previous state.
///
/// The displayed list is replaced wholesale, oldest first. Unread counts every
/// unread entry in the page; the read target is the earliest unread inbound one.
pub fn reconcile(prev: &ChatState, page: HistoryPage, is_initial: bool) -> Reconciled {
    let mut unread = UnreadState::default();
    let mut messages = Vec::with_capacity(page.messages.len());

    for message in page.messages {
        if message.is_unread() {
            unread.count += 1;
            if message.is_inbound() {
                // Later in a newest-first page means earlier in time
                unread.earliest_inbound_id = message.id;
            }
        }
        messages.push(message);
    }
    messages.reverse();

    let greetings = if is_initial {
        page.greeting
            .into_iter()
            .map(|mut greeting| {
                greeting.is_reply = true;
                greeting.is_view = true;
                greeting
            })
            .collect()
    } else {
        prev.greetings.clone()
    };

    let displayed: HashSet<MessageId> = messages.iter().map(|m| m.id).collect();
    let delivery = prev
        .delivery
        .iter()
        .filter(|(id, _)| displayed.contains(id))
        .map(|(id, state)| (*id, *state))
        .collect();

    let scroll_to_bottom = is_initial && unread.is_empty();

    Reconciled {
        state: ChatState {
            messages,
            greetings,
            delivery,
            unread,
            has_fetched: true,
        },
        scroll_to_bottom,
    }
}

impl ChatSession {
    /// Fetch history and replace the displayed list with it.
    ///
    /// The greeting section is requested until one fetch has completed.
    pub async fn fetch_history(&self, is_initial: bool) -> ChatResult<()> {
        let is_greeting = !self.state.lock().await.has_fetched;
        let page = self.backend.fetch_history(is_greeting).await?;

        if self.is_closed() {
            debug!("Discarding history that arrived after close");
            return Ok(());
        }

        let (reconciled, unread) = {
            let mut state = self.state.lock().await;
            let reconciled = reconcile(&state, page, is_initial);
            *state = reconciled.state.clone();
            (reconciled, state.unread)
        };

        self.tracker.lock().await.observe(&reconciled.state.messages);

        self.emit(SessionEvent::MessagesChanged);
        self.emit(SessionEvent::UnreadChanged(unread));
        if reconciled.scroll_to_bottom {
            self.emit(SessionEvent::ScrollToBottom { smooth: false });
        }

        debug!(
            "History synced: {} messages, {} unread",
            reconciled.state.messages.len(),
            unread.count
        );
        Ok(())
    }

    /// Re-fetch on a fixed cadence until `close`. Each tick fetches in its own
    /// task, so a slow response can overlap the next tick; the last to resolve wins.
    pub(crate) fn spawn_polling(&self) {
        if self.is_closed() {
            return;
        }

        let session = self.clone();
        let period = self.config.poll_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // first tick completes immediately

            loop {
                ticker.tick().await;
                if session.stopped.load(Ordering::SeqCst) {
                    break;
                }

                let poll = session.clone();
                tokio::spawn(async move {
                    if let Err(e) = poll.fetch_history(false).await {
                        warn!("History poll failed: {}", e);
                    }
                });
            }
            debug!("Polling loop exited");
        });

        info!("Polling history every {:?}", period);
        let previous = match self.poller.lock() {
            Ok(mut guard) => guard.replace(handle),
            Err(poisoned) => poisoned.into_inner().replace(handle),
        };
        if let Some(previous) = previous {
            debug!("Replacing running polling loop");
            previous.abort();
        }
    }
}
