// Chat backend client for chatline
// Entry point for all REST traffic; one submodule per endpoint family.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Arc, RwLock};

use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::models::{HistoryPage, MessageId, UploadCredentials};

pub mod auth;
pub mod history;
pub mod messages;
pub mod upload;

pub mod endpoints {
    pub const LOGIN: &str = "/user/login";
    pub const CHAT_RECORD: &str = "/chat/chat-record";
    pub const CHAT_MODEL: &str = "/chat/chat-model";
    pub const SEND_CHAT: &str = "/chat/send-chat";
    pub const CHAT_READ: &str = "/chat/chat-read";
    pub const UPLOAD_SIGN: &str = "/oss/oss-sign-new";
}

pub const API_KEY_HEADER: &str = "api-key";
const SUCCESS_CODE: i64 = 200;

/// The `{code, msg, data}` wrapper every response uses.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn into_data<T: DeserializeOwned>(self) -> ChatResult<T> {
        if self.code != SUCCESS_CODE {
            return Err(ChatError::Application(self.msg));
        }
        Ok(serde_json::from_value(self.data)?)
    }
}

/// Everything the session needs from the backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Exchange the temporary token for a session token. The backend adopts it on success.
    async fn login(&self, phone: &str, temporary_token: &str) -> ChatResult<String>;
    fn set_token(&self, token: &str);
    async fn fetch_history(&self, is_greeting: bool) -> ChatResult<HistoryPage>;
    async fn fetch_keywords(&self) -> ChatResult<Vec<String>>;
    async fn send_chat(&self, content: &str, image_url: &str) -> ChatResult<()>;
    async fn mark_read(&self, id: MessageId) -> ChatResult<()>;
    async fn request_upload_credentials(&self, extension: &str) -> ChatResult<UploadCredentials>;
    async fn upload_file(
        &self,
        credentials: &UploadCredentials,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ChatResult<()>;
}

#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    api_key: String,
    token: Arc<RwLock<String>>, // Empty until login
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: &ChatConfig) -> ChatResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            token: Arc::new(RwLock::new(String::new())),
            http,
        })
    }

    pub fn set_token(&self, token: &str) {
        match self.token.write() {
            Ok(mut current) => *current = token.to_string(),
            Err(poisoned) => *poisoned.into_inner() = token.to_string(),
        }
    }

    pub fn token(&self) -> String {
        match self.token.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Request carrying the JSON content type, the given bearer credential and the API key.
    pub fn authorized(&self, method: Method, endpoint: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(endpoint))
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, bearer)
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// Same as `authorized`, using the current session token.
    pub fn session_request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let token = self.token();
        self.authorized(method, endpoint, &token)
    }

    /// Send a request and unwrap its envelope.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> ChatResult<T> {
        debug!("-> {}", endpoint);
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!("{} answered with HTTP {}", endpoint, status);
            return Err(ChatError::Transport {
                endpoint: endpoint.to_string(),
                status,
            });
        }

        let body = response.bytes().await?;
        let envelope: Envelope = serde_json::from_slice(&body)?;
        debug!("<- {} code={}", endpoint, envelope.code);

        envelope.into_data().map_err(|e| {
            if let ChatError::Application(msg) = &e {
                warn!("{} rejected: {}", endpoint, msg);
            }
            e
        })
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn login(&self, phone: &str, temporary_token: &str) -> ChatResult<String> {
        ChatClient::login(self, phone, temporary_token).await
    }

    fn set_token(&self, token: &str) {
        ChatClient::set_token(self, token)
    }

    async fn fetch_history(&self, is_greeting: bool) -> ChatResult<HistoryPage> {
        ChatClient::fetch_history(self, is_greeting).await
    }

    async fn fetch_keywords(&self) -> ChatResult<Vec<String>> {
        ChatClient::fetch_keywords(self).await
    }

    async fn send_chat(&self, content: &str, image_url: &str) -> ChatResult<()> {
        ChatClient::send_chat(self, content, image_url).await
    }

    async fn mark_read(&self, id: MessageId) -> ChatResult<()> {
        ChatClient::mark_read(self, id).await
    }

    async fn request_upload_credentials(&self, extension: &str) -> ChatResult<UploadCredentials> {
        ChatClient::request_upload_credentials(self, extension).await
    }

    async fn upload_file(
        &self,
        credentials: &UploadCredentials,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ChatResult<()> {
        ChatClient::upload_file(self, credentials, file_name, bytes).await
    }
}
