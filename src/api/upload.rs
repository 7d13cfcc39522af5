// Direct-to-storage image uploads
// The server signs an upload descriptor, then the file goes straight to storage.

use log::{debug, error, info};
use reqwest::multipart::{Form, Part};
use reqwest::Method;

use super::{endpoints, ChatClient};
use crate::error::{ChatError, ChatResult};
use crate::models::UploadCredentials;

/// Multipart form in the field layout the storage provider expects.
pub fn signed_form(credentials: &UploadCredentials, file_name: &str, bytes: Vec<u8>) -> Form {
    Form::new()
        .text("key", credentials.key.clone())
        .text("OSSAccessKeyId", credentials.access_key_id.clone())
        .text("policy", credentials.policy.clone())
        .text("Signature", credentials.signature.clone())
        .part("file", Part::bytes(bytes).file_name(file_name.to_string()))
}

impl ChatClient {
    pub async fn request_upload_credentials(&self, extension: &str) -> ChatResult<UploadCredentials> {
        debug!("Requesting upload signature for .{} file", extension);
        let request = self
            .session_request(Method::GET, endpoints::UPLOAD_SIGN)
            .query(&[("suffix", extension)]);
        self.execute(endpoints::UPLOAD_SIGN, request).await
    }

    /// Upload without the JSON content type or auth headers; the signature authorizes it.
    /// No retry.
    pub async fn upload_file(
        &self,
        credentials: &UploadCredentials,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ChatResult<()> {
        let size = bytes.len();
        let form = signed_form(credentials, file_name, bytes);

        let response = self
            .http
            .post(&credentials.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Upload of {} failed: {}", file_name, status);
            return Err(ChatError::Upload(status));
        }

        info!("Uploaded {} ({} bytes) to {}", file_name, size, credentials.url);
        Ok(())
    }
}
