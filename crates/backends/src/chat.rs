//! Minimal client for OpenAI-compatible chat-completions endpoints

use lookout_core::AnalysisError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(content: MessageContent) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<MessagePart>),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum MessagePart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        MessagePart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatFullResponse {
    choices: Vec<FullChoice>,
}

#[derive(Deserialize)]
struct FullChoice {
    message: FullMessage,
}

#[derive(Deserialize)]
struct FullMessage {
    content: Option<String>,
}

/// HTTP client bound to one vendor's base URL and key
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self::with_http(http, base_url, api_key))
    }

    pub fn with_http(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Send a non-streaming completion and return the first choice's text
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, AnalysisError> {
        let response = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_success(response).await?;
        let full: ChatFullResponse = serde_json::from_str(&body)
            .map_err(|e| AnalysisError::malformed(format!("unexpected completion body: {}", e)))?;

        full.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| AnalysisError::malformed("completion has no choices"))
    }
}

/// Read the body of a response, turning error statuses into typed errors
pub async fn read_success(response: reqwest::Response) -> Result<String, AnalysisError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(status_error(status, &body))
    }
}

/// Map a non-success HTTP status onto an error kind
pub fn status_error(status: StatusCode, body: &str) -> AnalysisError {
    let message = format!("API error (status {}): {}", status, body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnalysisError::auth(message),
        StatusCode::TOO_MANY_REQUESTS => AnalysisError::rate_limited(message),
        s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => AnalysisError::network(message),
        _ => AnalysisError::malformed(message),
    }
}

/// Map a reqwest failure onto an error kind
pub fn transport_error(err: reqwest::Error) -> AnalysisError {
    if err.is_decode() {
        AnalysisError::malformed(format!("HTTP body could not be decoded: {}", err))
    } else {
        AnalysisError::network(format!("HTTP request failed: {}", err))
    }
}
