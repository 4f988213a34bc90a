//! Qwen-VL backend (DashScope OpenAI-compatible mode)
//!
//! Sends the full image; prompt and rules travel as separate text parts.

use crate::chat::{ChatClient, ChatRequest, Message, MessageContent, MessagePart};
use crate::encode::{encode_file, EncodedImage};
use crate::{client_for, required_key};
use async_trait::async_trait;
use lookout_core::{AnalysisError, Analyzer, ConfigError, VendorSettings};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_MODEL: &str = "qwen-vl-plus";

pub struct QwenAnalyzer {
    client: ChatClient,
    model: String,
}

impl QwenAnalyzer {
    pub fn new(client: ChatClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_settings(vendor: &VendorSettings, timeout: Duration) -> Result<Self, ConfigError> {
        let api_key = required_key(vendor, "qwen")?;
        let client = client_for(vendor, DEFAULT_BASE_URL, api_key, timeout)?;
        Ok(Self::new(client, vendor.model.as_deref().unwrap_or(DEFAULT_MODEL)))
    }

    fn build_request(&self, image: &EncodedImage, prompt: &str, rules: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(MessageContent::Parts(vec![
                MessagePart::text(prompt),
                MessagePart::text(rules),
                MessagePart::image(image.data_url()),
            ]))],
            stream: false,
            temperature: None,
        }
    }
}

#[async_trait]
impl Analyzer for QwenAnalyzer {
    fn name(&self) -> &str {
        "qwen"
    }

    async fn analyze(&self, image: &Path, prompt: &str, rules: &str) -> Result<String, AnalysisError> {
        let encoded = encode_file(image).await?;
        debug!(
            image = %image.display(),
            base64_len = encoded.base64.len(),
            "Encoded image for qwen"
        );

        let request = self.build_request(&encoded, prompt, rules);
        self.client.complete(&request).await
    }
}
