//! The analysis seam
//!
//! An `Analyzer` turns an image plus instructions into text. Backends live in
//! the `backends` crate; the dispatcher only sees this trait.

use crate::error::AnalysisError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Produces a textual analysis of an image
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Short backend name used in diagnostics
    fn name(&self) -> &str;

    /// Analyze `image` following `prompt` and `rules`
    ///
    /// Returns the model's answer. An empty string means the backend has
    /// nothing to add beyond the prompt and rules themselves.
    async fn analyze(&self, image: &Path, prompt: &str, rules: &str) -> Result<String, AnalysisError>;
}

/// Retries transient failures of another analyzer with linear backoff
pub struct Retrying {
    inner: Arc<dyn Analyzer>,
    retries: u32,
    backoff: Duration,
}

impl Retrying {
    pub fn new(inner: Arc<dyn Analyzer>, retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            retries,
            backoff,
        }
    }
}

#[async_trait]
impl Analyzer for Retrying {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn analyze(&self, image: &Path, prompt: &str, rules: &str) -> Result<String, AnalysisError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.analyze(image, prompt, rules).await {
                Err(err) if err.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        backend = self.inner.name(),
                        image = %image.display(),
                        attempt,
                        error = %err,
                        "Analysis failed, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                result => return result,
            }
        }
    }
}
