//! DeepSeek chat-completions backend
//!
//! Sends a small thumbnail inline; the prompt and rules share one text part.

use crate::chat::{ChatClient, ChatRequest, Message, MessageContent, MessagePart};
use crate::encode::{encode_thumbnail, EncodedImage};
use crate::{client_for, required_key};
use async_trait::async_trait;
use lookout_core::{AnalysisError, Analyzer, ConfigError, VendorSettings};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 40;

pub struct DeepseekAnalyzer {
    client: ChatClient,
    model: String,
    thumbnail_size: u32,
}

impl DeepseekAnalyzer {
    pub fn new(client: ChatClient, model: impl Into<String>, thumbnail_size: u32) -> Self {
        Self {
            client,
            model: model.into(),
            thumbnail_size,
        }
    }

    pub fn from_settings(vendor: &VendorSettings, timeout: Duration) -> Result<Self, ConfigError> {
        let api_key = required_key(vendor, "deepseek")?;
        let client = client_for(vendor, DEFAULT_BASE_URL, api_key, timeout)?;
        Ok(Self::new(
            client,
            vendor.model.as_deref().unwrap_or(DEFAULT_MODEL),
            vendor.thumbnail_size.unwrap_or(DEFAULT_THUMBNAIL_SIZE),
        ))
    }

    fn build_request(&self, image: &EncodedImage, prompt: &str, rules: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(MessageContent::Parts(vec![
                MessagePart::text(format!("{}\n{}", prompt, rules)),
                MessagePart::image(image.data_url()),
            ]))],
            stream: false,
            temperature: None,
        }
    }
}

#[async_trait]
impl Analyzer for DeepseekAnalyzer {
    fn name(&self) -> &str {
        "deepseek"
    }

    async fn analyze(&self, image: &Path, prompt: &str, rules: &str) -> Result<String, AnalysisError> {
        let encoded = encode_thumbnail(image, self.thumbnail_size).await?;
        debug!(
            image = %image.display(),
            base64_len = encoded.base64.len(),
            "Encoded thumbnail for deepseek"
        );

        let request = self.build_request(&encoded, prompt, rules);
        self.client.complete(&request).await
    }
}
