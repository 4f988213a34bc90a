//! Offline analyzer that only records the instructions used

use async_trait::async_trait;
use lookout_core::{AnalysisError, Analyzer};
use std::path::Path;
use tracing::debug;

/// Accepts every readable image and contributes no text of its own
///
/// The log line then carries just the timestamp, prompt and rules, which is
/// useful for dry runs and for checking the watcher without API keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateAnalyzer;

#[async_trait]
impl Analyzer for TemplateAnalyzer {
    fn name(&self) -> &str {
        "template"
    }

    async fn analyze(&self, image: &Path, prompt: &str, rules: &str) -> Result<String, AnalysisError> {
        debug!(image = %image.display(), prompt, rules, "Template analysis");
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_empty_analysis() {
        let result = TemplateAnalyzer
            .analyze(Path::new("data/cat.jpg"), "describe", "be concise")
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(TemplateAnalyzer.name(), "template");
    }
}
