//! Dispatch of accepted changes to analysis tasks
//!
//! Every accepted event becomes its own task: analyze the image, then append
//! one line to `log.txt` in the image's folder. Tasks run concurrently up to a
//! permit limit; failures are logged and never stop the loop.

use crate::debounce::{ChangeDebouncer, ModificationEvent};
use journal::{AnalysisRecord, ResultLog};
use lookout_core::{Analyzer, WatchConfig};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Dispatcher limits
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Maximum analyses running at once
    pub max_in_flight: usize,
    /// How often closed debounce windows are evicted
    pub prune_interval: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            prune_interval: Some(Duration::from_secs(60)),
        }
    }
}

/// How a single dispatch task ended
///
/// Details are reported through tracing where the failure happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Line appended to the folder's log
    Logged,
    /// Analyzer failed; nothing was written
    AnalysisFailed,
    /// Analysis succeeded but the log could not be written
    LogFailed,
}

/// Counters for the lifetime of a dispatcher
#[derive(Debug, Default)]
pub struct DispatchStats {
    received: AtomicU64,
    accepted: AtomicU64,
    logged: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub logged: u64,
    pub failed: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            logged: self.logged.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Result of waiting for in-flight tasks at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks that finished within the timeout
    pub completed: usize,
    /// Tasks cancelled when the timeout expired
    pub aborted: usize,
}

/// Routes debounced events to analysis tasks
pub struct Dispatcher {
    config: Arc<WatchConfig>,
    analyzer: Arc<dyn Analyzer>,
    log: Arc<ResultLog>,
    debouncer: Arc<ChangeDebouncer>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<DispatchOutcome>,
    stats: Arc<DispatchStats>,
    prune_interval: Option<Duration>,
    /// Latest instant handed to the debouncer; bounds safe pruning
    last_observed: Option<Instant>,
}

impl Dispatcher {
    pub fn new(
        config: WatchConfig,
        analyzer: Arc<dyn Analyzer>,
        log: Arc<ResultLog>,
        options: DispatchOptions,
    ) -> Self {
        Self::with_debouncer(config, analyzer, log, Arc::new(ChangeDebouncer::new()), options)
    }

    pub fn with_debouncer(
        config: WatchConfig,
        analyzer: Arc<dyn Analyzer>,
        log: Arc<ResultLog>,
        debouncer: Arc<ChangeDebouncer>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            config: Arc::new(config),
            analyzer,
            log,
            debouncer,
            permits: Arc::new(Semaphore::new(options.max_in_flight.max(1))),
            tasks: JoinSet::new(),
            stats: Arc::new(DispatchStats::default()),
            prune_interval: options.prune_interval,
            last_observed: None,
        }
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    pub fn debouncer(&self) -> &ChangeDebouncer {
        &self.debouncer
    }

    /// Tasks spawned and not yet reaped
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Debounce an event and, if accepted, start its analysis task
    ///
    /// Waits for a free permit when `max_in_flight` tasks are already running.
    /// Returns whether the event was accepted.
    pub async fn submit(&mut self, event: ModificationEvent) -> bool {
        if !self.admit(&event) {
            return false;
        }

        match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => {
                self.spawn(event, permit);
                true
            }
            Err(_) => {
                warn!(path = %event.path.display(), "Dispatcher closed, change not analyzed");
                false
            }
        }
    }

    /// Count the event and run it through the debouncer
    fn admit(&mut self, event: &ModificationEvent) -> bool {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        self.last_observed = Some(match self.last_observed {
            Some(last) => last.max(event.observed_at),
            None => event.observed_at,
        });

        if !self.debouncer.accept(event) {
            debug!(path = %event.path.display(), "Change debounced");
            return false;
        }
        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn spawn(&mut self, event: ModificationEvent, permit: OwnedSemaphorePermit) {
        let folder = event.folder();
        let image = event.path;
        let config = Arc::clone(&self.config);
        let analyzer = Arc::clone(&self.analyzer);
        let log = Arc::clone(&self.log);
        let stats = Arc::clone(&self.stats);

        self.tasks.spawn(async move {
            let outcome = process(image, folder, config, analyzer, log).await;
            match outcome {
                DispatchOutcome::Logged => stats.logged.fetch_add(1, Ordering::Relaxed),
                DispatchOutcome::AnalysisFailed | DispatchOutcome::LogFailed => {
                    stats.failed.fetch_add(1, Ordering::Relaxed)
                }
            };
            drop(permit);
            outcome
        });
    }

    /// Process events until the channel closes or `shutdown` resolves
    ///
    /// Finished tasks are reaped as they complete. Shutdown is honored even
    /// while waiting for a free permit; that pending change is not analyzed.
    /// In-flight tasks are left running; call [`Dispatcher::drain`] afterwards.
    pub async fn run<F>(&mut self, mut events: mpsc::Receiver<ModificationEvent>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut prune_timer = self.prune_interval.map(|period| {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        info!(
            window_secs = self.debouncer.window().as_secs(),
            max_in_flight = self.permits.available_permits(),
            "Dispatcher started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting changes");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        if !self.admit(&event) {
                            continue;
                        }
                        tokio::select! {
                            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                                Ok(permit) => self.spawn(event, permit),
                                Err(_) => {
                                    warn!(path = %event.path.display(), "Dispatcher closed, change not analyzed");
                                    break;
                                }
                            },
                            _ = &mut shutdown => {
                                info!(
                                    path = %event.path.display(),
                                    "Shutdown requested while all analyses were busy, change not analyzed"
                                );
                                break;
                            }
                        }
                    }
                    None => {
                        info!("Watch channel closed");
                        break;
                    }
                },
                Some(finished) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.reap(finished);
                }
                _ = tick(&mut prune_timer) => {
                    self.prune();
                }
            }
        }
    }

    /// Wait up to `timeout` for in-flight tasks, then abort the rest
    pub async fn drain(mut self, timeout: Duration) -> DrainReport {
        let pending = self.tasks.len();
        if pending > 0 {
            info!("Waiting for {} in-flight analyses", pending);
        }

        let mut report = DrainReport::default();
        let finished = tokio::time::timeout(timeout, async {
            while let Some(finished) = self.tasks.join_next().await {
                self.reap(finished);
                report.completed += 1;
            }
        })
        .await;

        if finished.is_err() {
            report.aborted = self.tasks.len();
            warn!("Drain timed out, aborting {} analyses", report.aborted);
            self.tasks.shutdown().await;
        }

        let stats = self.stats.snapshot();
        info!(
            received = stats.received,
            accepted = stats.accepted,
            logged = stats.logged,
            failed = stats.failed,
            "Dispatcher stopped"
        );
        report
    }

    fn reap(&mut self, finished: Result<DispatchOutcome, JoinError>) {
        if let Err(err) = finished {
            if err.is_panic() {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!("Dispatch task panicked: {}", err);
            }
        }
    }

    fn prune(&mut self) {
        // Queued events are never older than the last one seen
        if let Some(horizon) = self.last_observed {
            let removed = self.debouncer.prune(horizon);
            if removed > 0 {
                debug!("Evicted {} stale debounce entries", removed);
            }
        }
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Analyze one image and append its result line
async fn process(
    image: PathBuf,
    folder: PathBuf,
    config: Arc<WatchConfig>,
    analyzer: Arc<dyn Analyzer>,
    log: Arc<ResultLog>,
) -> DispatchOutcome {
    debug!(image = %image.display(), backend = analyzer.name(), "Analyzing image");

    let analysis = match analyzer.analyze(&image, &config.prompt, &config.rules).await {
        Ok(analysis) => analysis,
        Err(err) => {
            warn!(
                image = %image.display(),
                backend = analyzer.name(),
                kind = %err.kind(),
                "Analysis failed, nothing logged: {}",
                err.message()
            );
            return DispatchOutcome::AnalysisFailed;
        }
    };

    let line = AnalysisRecord::now(&config.prompt, &config.rules, &analysis).to_line();
    let appended = tokio::task::spawn_blocking(move || log.append(&folder, &line)).await;

    match appended {
        Ok(Ok(path)) => {
            info!(image = %image.display(), log = %path.display(), "Analysis logged");
            DispatchOutcome::Logged
        }
        Ok(Err(err)) => {
            error!(image = %image.display(), "{:#}", err);
            DispatchOutcome::LogFailed
        }
        Err(err) => {
            error!(image = %image.display(), "Log writer task failed: {}", err);
            DispatchOutcome::LogFailed
        }
    }
}
