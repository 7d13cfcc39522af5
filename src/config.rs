use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// 2 MiB
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: String,
    pub phone: String,
    /// Bearer credential used only for the initial login.
    pub temporary_token: String,
    pub poll_interval: Duration,
    pub max_image_bytes: u64,
    pub request_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            base_url: String::new(),
            api_key: String::new(),
            phone: String::new(),
            temporary_token: String::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ChatConfig {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        ChatConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            ..Default::default()
        }
    }

    pub fn with_login(mut self, phone: &str, temporary_token: &str) -> Self {
        self.phone = phone.to_string();
        self.temporary_token = temporary_token.to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_image_bytes(mut self, bytes: u64) -> Self {
        self.max_image_bytes = bytes;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
