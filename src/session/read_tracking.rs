// Read receipts
// Visibility- and scroll-driven read confirmations.

use log::{debug, info, warn};
use std::collections::HashSet;

use super::{ChatSession, SessionEvent};
use crate::models::{Message, MessageId, UnreadState};

/// Fraction of a message that must be on screen before it counts as seen.
pub const VISIBILITY_THRESHOLD: f32 = 0.5;
/// Distance from the bottom of the scroll region, in px, that counts as "at the bottom".
pub const BOTTOM_PROXIMITY_PX: f64 = 80.0;

/// Which inbound unread messages are still being watched.
///
/// Each message is observed until it first becomes visible, then released for good.
#[derive(Debug, Default)]
pub struct ReadTracker {
    observed: HashSet<MessageId>,
    released: HashSet<MessageId>,
}

impl ReadTracker {
    /// Sync observations with the displayed list.
    pub fn observe(&mut self, messages: &[Message]) {
        let displayed: HashSet<MessageId> = messages.iter().map(|m| m.id).collect();
        self.observed.retain(|id| displayed.contains(id));

        for message in messages.iter().filter(|m| m.awaits_read()) {
            if !self.released.contains(&message.id) {
                self.observed.insert(message.id);
            }
        }
    }

    pub fn is_observed(&self, id: MessageId) -> bool {
        self.observed.contains(&id)
    }

    /// Returns the id to confirm the first time an observed message is visible enough.
    pub fn visibility_changed(&mut self, id: MessageId, visible_ratio: f32) -> Option<MessageId> {
        if visible_ratio < VISIBILITY_THRESHOLD || !self.observed.remove(&id) {
            return None;
        }
        self.released.insert(id);
        Some(id)
    }
}

/// Near the bottom with a pending read target: confirm it.
pub fn scroll_read_target(distance_from_bottom: f64, unread: &UnreadState) -> Option<MessageId> {
    if distance_from_bottom < BOTTOM_PROXIMITY_PX {
        unread.read_target()
    } else {
        None
    }
}

impl ChatSession {
    /// Report how much of message `id` is on screen.
    pub async fn message_visible(&self, id: MessageId, visible_ratio: f32) {
        let target = self.tracker.lock().await.visibility_changed(id, visible_ratio);
        if let Some(id) = target {
            debug!("Message {} became visible", id);
            self.mark_read(id).await;
        }
    }

    /// Report the scroll region's distance from the bottom, in px.
    pub async fn scrolled(&self, distance_from_bottom: f64) {
        let unread = self.state.lock().await.unread;
        if let Some(id) = scroll_read_target(distance_from_bottom, &unread) {
            debug!("Scrolled to bottom with unread target {}", id);
            self.mark_read(id).await;
        }
    }

    /// Confirm `id` as read. Any success clears all unread state, whichever id was confirmed.
    /// Failures are logged only.
    pub async fn mark_read(&self, id: MessageId) {
        match self.backend.mark_read(id).await {
            Ok(()) => {
                let unread = {
                    let mut state = self.state.lock().await;
                    state.unread.clear();
                    state.unread
                };
                info!("Read confirmed at message {}", id);
                self.emit(SessionEvent::UnreadChanged(unread));
            }
            Err(e) => warn!("Read confirmation for message {} failed: {}", id, e),
        }
    }
}
