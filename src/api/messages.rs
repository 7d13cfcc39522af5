use log::debug;
use reqwest::Method;
use serde::de::IgnoredAny;
use serde_json::json;

use super::{endpoints, ChatClient};
use crate::error::ChatResult;
use crate::models::MessageId;

impl ChatClient {
    pub async fn send_chat(&self, content: &str, image_url: &str) -> ChatResult<()> {
        let request = self
            .session_request(Method::POST, endpoints::SEND_CHAT)
            .json(&json!({ "content": content, "image_url": image_url }));
        let _: IgnoredAny = self.execute(endpoints::SEND_CHAT, request).await?;
        Ok(())
    }

    /// Confirm that the user has seen message `id`.
    pub async fn mark_read(&self, id: MessageId) -> ChatResult<()> {
        debug!("Confirming read up to message {}", id);
        let request = self
            .session_request(Method::POST, endpoints::CHAT_READ)
            .json(&json!({ "id": id }));
        let _: IgnoredAny = self.execute(endpoints::CHAT_READ, request).await?;
        Ok(())
    }
}
