//! Moonshot (Kimi) backend
//!
//! Kimi does not take inline images here. The file is uploaded for
//! extraction and the model reasons over the extracted content.

use crate::chat::{read_success, transport_error, ChatClient, ChatRequest, Message, MessageContent};
use crate::{client_for, required_key};
use async_trait::async_trait;
use lookout_core::{AnalysisError, Analyzer, ConfigError, VendorSettings};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.moonshot.cn/v1";
pub const DEFAULT_MODEL: &str = "moonshot-v1-auto";
const TEMPERATURE: f32 = 0.3;

#[derive(Deserialize)]
struct FileObject {
    id: String,
}

pub struct KimiAnalyzer {
    client: ChatClient,
    model: String,
}

impl KimiAnalyzer {
    pub fn new(client: ChatClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_settings(vendor: &VendorSettings, timeout: Duration) -> Result<Self, ConfigError> {
        let api_key = required_key(vendor, "kimi")?;
        let client = client_for(vendor, DEFAULT_BASE_URL, api_key, timeout)?;
        Ok(Self::new(client, vendor.model.as_deref().unwrap_or(DEFAULT_MODEL)))
    }

    /// Upload the image for extraction, returning the file id
    async fn upload(&self, image: &Path) -> Result<String, AnalysisError> {
        let bytes = tokio::fs::read(image).await?;
        let file_name = image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let form = Form::new()
            .text("purpose", "file-extract")
            .part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .http()
            .post(self.client.url("files"))
            .bearer_auth(self.client.api_key())
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_success(response).await?;
        let file: FileObject = serde_json::from_str(&body)
            .map_err(|e| AnalysisError::malformed(format!("unexpected upload response: {}", e)))?;
        Ok(file.id)
    }

    async fn file_content(&self, file_id: &str) -> Result<String, AnalysisError> {
        let response = self
            .client
            .http()
            .get(self.client.url(&format!("files/{}/content", file_id)))
            .bearer_auth(self.client.api_key())
            .send()
            .await
            .map_err(transport_error)?;

        read_success(response).await
    }

    fn build_request(&self, file_content: &str, prompt: &str, rules: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(rules),
                Message::system(file_content),
                Message::user(MessageContent::Text(prompt.to_string())),
            ],
            stream: false,
            temperature: Some(TEMPERATURE),
        }
    }
}

#[async_trait]
impl Analyzer for KimiAnalyzer {
    fn name(&self) -> &str {
        "kimi"
    }

    async fn analyze(&self, image: &Path, prompt: &str, rules: &str) -> Result<String, AnalysisError> {
        let file_id = self.upload(image).await?;
        let content = self.file_content(&file_id).await?;
        debug!(
            image = %image.display(),
            file_id = %file_id,
            extracted_len = content.len(),
            "Extracted file content from kimi"
        );

        let request = self.build_request(&content, prompt, rules);
        self.client.complete(&request).await
    }
}
