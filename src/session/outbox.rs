// Outgoing messages
// Optimistic local entries that settle to confirmed or failed.

use chrono::Utc;
use log::{debug, error, info, warn};
use std::path::Path;

use super::{ChatSession, SessionEvent};
use crate::error::{ChatError, ChatResult};
use crate::models::{DeliveryState, Message, MessageId};

/// Preview URL for a local image. It points straight at the file, so there is
/// nothing to release once the upload settles.
fn local_preview_url(path: &Path) -> String {
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

impl ChatSession {
    /// Send a text message. Returns the optimistic message's id, or `None` when
    /// there was nothing to send.
    pub async fn send_text(&self, content: &str) -> Option<MessageId> {
        self.send_message(content, "").await
    }

    /// Send an image. Returns the id of the preview entry, or `None` when the
    /// file was rejected before anything was displayed.
    pub async fn send_image(&self, path: &Path) -> Option<MessageId> {
        let size = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                self.toast(ChatError::Io(e).to_string());
                return None;
            }
        };

        if size > self.config.max_image_bytes {
            let err = ChatError::Validation(format!(
                "Image must be {} MiB or smaller",
                self.config.max_image_bytes as f64 / (1024.0 * 1024.0)
            ));
            warn!("Rejected {} ({} bytes): {}", path.display(), size, err);
            self.toast(err.to_string());
            return None;
        }

        let id = self.enqueue(None, Some(local_preview_url(path))).await;

        // The preview entry stays Pending until the image is registered
        let outcome = match self.upload_image(path).await {
            Ok(permanent_url) => {
                if let Some(message) = self.state.lock().await.message_mut(id) {
                    message.image_url = Some(permanent_url.clone());
                }
                self.emit(SessionEvent::MessagesChanged);
                self.backend.send_chat("", &permanent_url).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                info!("Image message {} delivered", id);
                self.settle(id, DeliveryState::Confirmed).await;
            }
            Err(e) => {
                error!("Image message {} failed: {}", id, e);
                self.settle(id, DeliveryState::Failed).await;
                self.toast(e.to_string());
            }
        }

        Some(id)
    }

    async fn send_message(&self, content: &str, image_url: &str) -> Option<MessageId> {
        if content.trim().is_empty() && image_url.is_empty() {
            debug!("Ignoring empty send");
            return None;
        }

        let id = self
            .enqueue(Some(content.to_string()), Some(image_url.to_string()))
            .await;
        self.emit(SessionEvent::ClearInput);

        match self.backend.send_chat(content, image_url).await {
            Ok(()) => {
                info!("Message {} delivered", id);
                self.settle(id, DeliveryState::Confirmed).await;
            }
            Err(e) => {
                error!("Message {} failed to send: {}", id, e);
                self.settle(id, DeliveryState::Failed).await;
                self.toast(e.to_string());
            }
        }

        Some(id)
    }

    /// Append a pending outbound message and bring it into view.
    async fn enqueue(&self, content: Option<String>, image_url: Option<String>) -> MessageId {
        let id = self.next_local_id();
        let message = Message::outgoing(id, content, image_url, Utc::now().timestamp());

        {
            let mut state = self.state.lock().await;
            state.messages.push(message);
            state.delivery.insert(id, DeliveryState::Pending);
        }

        self.emit(SessionEvent::MessagesChanged);
        self.emit(SessionEvent::ScrollToBottom { smooth: true });
        id
    }

    async fn settle(&self, id: MessageId, outcome: DeliveryState) {
        let changed = self.state.lock().await.settle(id, outcome);
        if changed {
            self.emit(SessionEvent::MessagesChanged);
        } else {
            debug!("Message {} no longer pending, {:?} not applied", id, outcome);
        }
    }

    /// Sign, then upload; returns the permanent URL.
    async fn upload_image(&self, path: &Path) -> ChatResult<String> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image");

        let bytes = tokio::fs::read(path).await?;
        let credentials = self.backend.request_upload_credentials(extension).await?;
        self.backend
            .upload_file(&credentials, file_name, bytes)
            .await?;

        Ok(credentials.url)
    }
}
