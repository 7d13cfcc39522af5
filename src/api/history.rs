use log::debug;
use reqwest::Method;

use super::{endpoints, ChatClient};
use crate::error::ChatResult;
use crate::models::{flatten_keywords, HistoryPage, HistoryPayload, KeywordModel};

impl ChatClient {
    /// Fetch the current chat record, newest first.
    ///
    /// `is_greeting` asks the server to include the greeting section.
    pub async fn fetch_history(&self, is_greeting: bool) -> ChatResult<HistoryPage> {
        let request = self
            .session_request(Method::GET, endpoints::CHAT_RECORD)
            .query(&[("is_greeting", is_greeting)]);
        let payload: Option<HistoryPayload> = self.execute(endpoints::CHAT_RECORD, request).await?;

        let page = payload.map(HistoryPage::from).unwrap_or_default();
        debug!(
            "Fetched {} messages and {} greetings",
            page.messages.len(),
            page.greeting.len()
        );
        Ok(page)
    }

    /// Keyword suggestions across all chat models, in server order.
    pub async fn fetch_keywords(&self) -> ChatResult<Vec<String>> {
        let request = self.session_request(Method::GET, endpoints::CHAT_MODEL);
        let models: Option<Vec<KeywordModel>> = self.execute(endpoints::CHAT_MODEL, request).await?;
        Ok(flatten_keywords(&models.unwrap_or_default()))
    }
}
