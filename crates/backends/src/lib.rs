//! Analyzer backends for Lookout
//!
//! This crate provides:
//! - `template`: offline analyzer recording prompt and rules only
//! - `deepseek`, `qwen`: chat-completions with an inline base64 image
//! - `kimi`: file-extract upload followed by a chat completion
//!
//! All remote backends speak the OpenAI-compatible wire format (`chat`).

pub mod chat;
pub mod deepseek;
pub mod encode;
pub mod kimi;
pub mod qwen;
pub mod template;

pub use deepseek::DeepseekAnalyzer;
pub use kimi::KimiAnalyzer;
pub use qwen::QwenAnalyzer;
pub use template::TemplateAnalyzer;

use chat::ChatClient;
use lookout_core::{Analyzer, BackendKind, ConfigError, Retrying, Settings, VendorSettings};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Base delay between retries; attempt `n` waits `n` times this
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Build the analyzer selected by `[Backend] kind`
pub fn build_analyzer(settings: &Settings) -> Result<Arc<dyn Analyzer>, ConfigError> {
    let backend = &settings.backend;
    let timeout = backend.request_timeout();

    let analyzer: Arc<dyn Analyzer> = match backend.kind {
        BackendKind::Template => Arc::new(TemplateAnalyzer),
        BackendKind::Deepseek => Arc::new(DeepseekAnalyzer::from_settings(&settings.deepseek, timeout)?),
        BackendKind::Qwen => Arc::new(QwenAnalyzer::from_settings(&settings.qwen, timeout)?),
        BackendKind::Kimi => Arc::new(KimiAnalyzer::from_settings(&settings.kimi, timeout)?),
    };

    info!(
        backend = analyzer.name(),
        timeout_secs = backend.request_timeout_secs,
        retries = backend.retries,
        "Analyzer ready"
    );

    if backend.retries > 0 {
        Ok(Arc::new(Retrying::new(analyzer, backend.retries, RETRY_BACKOFF)))
    } else {
        Ok(analyzer)
    }
}

pub(crate) fn required_key<'a>(vendor: &'a VendorSettings, name: &str) -> Result<&'a str, ConfigError> {
    vendor
        .api_key()
        .ok_or_else(|| ConfigError::Invalid(format!("[{}] api_key is not set", name)))
}

pub(crate) fn client_for(
    vendor: &VendorSettings,
    default_base_url: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<ChatClient, ConfigError> {
    let base_url = vendor.base_url.as_deref().unwrap_or(default_base_url);
    ChatClient::new(base_url, api_key, timeout).map_err(|e| ConfigError::Invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_build_template() {
        let analyzer = build_analyzer(&Settings::default()).unwrap();
        assert_eq!(analyzer.name(), "template");
    }

    #[test]
    fn test_selected_vendor_is_built() {
        let settings = Settings::from_ini_str("[Backend]\nkind = kimi\nretries = 2\n[Kimi]\napi_key = sk-test\n").unwrap();
        let analyzer = build_analyzer(&settings).unwrap();
        assert_eq!(analyzer.name(), "kimi");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let mut settings = Settings::default();
        settings.backend.kind = BackendKind::Qwen;

        let err = build_analyzer(&settings).err().unwrap();
        assert!(err.to_string().contains("[qwen] api_key"));
    }
}
