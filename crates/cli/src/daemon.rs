//! Daemon lifecycle
//!
//! Load the template, build the analyzer, watch the root and dispatch until a
//! stop signal arrives, then drain in-flight analyses.

use crate::Cli;
use anyhow::{Context, Result};
use journal::ResultLog;
use lookout_core::settings::CONFIG_FILE_NAME;
use lookout_core::{BackendKind, Settings};
use owo_colors::OwoColorize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use watcher::{Dispatcher, DrainReport, ImageWatcher};

/// What the daemon watches and how it is configured
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
    pub backend: Option<BackendKind>,
}

impl DaemonOptions {
    /// Template path: explicit `--config`, else `<root>/Analysis_Template.ini`
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.root.join(CONFIG_FILE_NAME))
    }
}

impl From<Cli> for DaemonOptions {
    fn from(cli: Cli) -> Self {
        Self {
            root: cli.root,
            config: cli.config,
            backend: cli.backend,
        }
    }
}

/// Load settings and apply the backend override
pub fn load_settings(options: &DaemonOptions) -> Result<Settings> {
    let path = options.config_path();
    let mut settings = Settings::load(&path)
        .with_context(|| format!("Failed to load config: {}", path.display()))?;

    if let Some(kind) = options.backend {
        settings.backend.kind = kind;
        settings
            .validate()
            .with_context(|| format!("Backend '{}' cannot be used", kind))?;
    }

    Ok(settings)
}

/// Run until Ctrl-C or SIGTERM
pub async fn run(options: &DaemonOptions) -> Result<DrainReport> {
    run_until(options, shutdown_signal()).await
}

/// Run until `shutdown` resolves
pub async fn run_until<F>(options: &DaemonOptions, shutdown: F) -> Result<DrainReport>
where
    F: Future<Output = ()>,
{
    let settings = load_settings(options)?;
    let analyzer = backends::build_analyzer(&settings).context("Failed to set up analyzer")?;

    anyhow::ensure!(
        options.root.is_dir(),
        "Watch root does not exist or is not a directory: {}",
        options.root.display()
    );

    let (image_watcher, events) = ImageWatcher::start(&options.root, settings.watcher.queue_capacity)?;
    let mut dispatcher = Dispatcher::new(
        settings.analysis.clone(),
        analyzer,
        Arc::new(ResultLog::new()),
        (&settings.watcher).into(),
    );

    print_banner(image_watcher.root(), &settings);

    dispatcher.run(events, shutdown).await;

    // Stop notifications before waiting on what is already running
    drop(image_watcher);
    let report = dispatcher.drain(settings.watcher.drain_timeout()).await;

    info!(
        completed = report.completed,
        aborted = report.aborted,
        "Lookout stopped"
    );
    Ok(report)
}

fn print_banner(root: &Path, settings: &Settings) {
    println!("{} {}", "Lookout".bold(), "watching for image changes".dimmed());
    println!("  Root:     {}", root.display().to_string().cyan());
    println!("  Backend:  {}", settings.backend.kind.to_string().yellow());
    println!("  Prompt:   {}", settings.analysis.prompt);
    println!("  Rules:    {}", settings.analysis.rules);
    println!("  {}", "Press Ctrl-C to stop".dimmed());
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
