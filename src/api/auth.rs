use log::info;
use reqwest::Method;
use serde_json::json;

use super::{endpoints, ChatClient};
use crate::error::ChatResult;
use crate::models::LoginResponse;

impl ChatClient {
    /// Log in with the temporary token as bearer; no session exists yet.
    ///
    /// The returned session token is adopted for every later request.
    pub async fn login(&self, phone: &str, temporary_token: &str) -> ChatResult<String> {
        info!("Logging in as {}", phone);

        let request = self
            .authorized(Method::POST, endpoints::LOGIN, temporary_token)
            .json(&json!({ "phone": phone }));
        let response: LoginResponse = self.execute(endpoints::LOGIN, request).await?;

        self.set_token(&response.token);
        info!("Login succeeded for {}", phone);
        Ok(response.token)
    }
}
