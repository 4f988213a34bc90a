//! Shared fixtures for watcher integration tests

use async_trait::async_trait;
use journal::{ResultLog, LOG_FILE_NAME};
use lookout_core::{AnalysisError, Analyzer, WatchConfig};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use watcher::{DispatchOptions, Dispatcher};

/// Analyzer replaying scripted results, then answering with an empty string
#[derive(Default)]
pub struct ScriptedAnalyzer {
    script: Mutex<VecDeque<Result<String, AnalysisError>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
}

impl ScriptedAnalyzer {
    pub fn new(script: Vec<Result<String, AnalysisError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, image: &Path, _prompt: &str, _rules: &str) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(image.to_path_buf());
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| Ok(String::new()))
    }
}

pub fn config(prompt: &str, rules: &str) -> WatchConfig {
    WatchConfig {
        prompt: prompt.to_string(),
        rules: rules.to_string(),
    }
}

pub fn dispatcher(config: WatchConfig, analyzer: Arc<dyn Analyzer>) -> Dispatcher {
    Dispatcher::new(
        config,
        analyzer,
        Arc::new(ResultLog::new()),
        DispatchOptions {
            max_in_flight: 4,
            prune_interval: None,
        },
    )
}

/// Lines of `log.txt` in `folder`, empty if it does not exist
pub fn log_lines(folder: &Path) -> Vec<String> {
    std::fs::read_to_string(folder.join(LOG_FILE_NAME))
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Poll until `folder` has at least `count` log lines or `timeout` passes
pub async fn wait_for_lines(folder: &Path, count: usize, timeout: Duration) -> Vec<String> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let lines = log_lines(folder);
        if lines.len() >= count || tokio::time::Instant::now() >= deadline {
            return lines;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Formatted tracing output collected for assertions
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install as the subscriber for the current thread until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
