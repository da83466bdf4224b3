//! Download engine split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Task creation, queries and the pending list
//! - [`control`] - Pause, resume and cancel
//! - [`lifecycle`] - Startup recovery and shutdown
//! - [`queue_processor`] - The control loop: sweep finished runners, admit pending tasks
//! - [`task_runner`] - Drives a single task through one fetch

mod control;
mod lifecycle;
mod queue;
mod queue_processor;
mod task_runner;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::extractor::ExtractorRegistry;
use crate::hub::{ListenerId, NotificationHub, Subscription};
use crate::types::{Status, TaskId, TaskRecord};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub(crate) use task_runner::StopReason;

/// Control surface shared between the engine and one bound runner
pub(crate) struct RunnerControl {
    /// Cancels the in-flight fetch
    pub(crate) cancel: CancellationToken,
    /// Why the runner was asked to stop, if it was
    stop_reason: std::sync::Mutex<Option<StopReason>>,
    /// Latest in-memory record, written only by the runner
    snapshot: watch::Sender<TaskRecord>,
    /// Final status once the runner has finished
    done: watch::Sender<Option<Status>>,
}

impl RunnerControl {
    pub(crate) fn new(record: TaskRecord) -> Self {
        Self {
            cancel: CancellationToken::new(),
            stop_reason: std::sync::Mutex::new(None),
            snapshot: watch::channel(record).0,
            done: watch::channel(None).0,
        }
    }

    /// Ask the runner to stop; a cancel request is never downgraded
    pub(crate) fn request_stop(&self, reason: StopReason) {
        if let Ok(mut current) = self.stop_reason.lock() {
            if *current != Some(StopReason::Cancel) {
                *current = Some(reason);
            }
        }
        self.cancel.cancel();
    }

    pub(crate) fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason.lock().ok().and_then(|r| *r)
    }

    pub(crate) fn snapshot(&self) -> TaskRecord {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn publish_snapshot(&self, record: &TaskRecord) {
        self.snapshot.send_replace(record.clone());
    }

    pub(crate) fn finish(&self, status: Status) {
        self.done.send_replace(Some(status));
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.borrow().is_some()
    }

    /// Wait until the runner reports its final status, bounded by `timeout`
    pub(crate) async fn wait_done(&self, timeout: std::time::Duration) -> Option<Status> {
        let mut rx = self.done.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|s| s.is_some())).await {
            Ok(Ok(status)) => *status,
            _ => None,
        }
    }
}

/// A runner bound to a task id
pub(crate) struct ActiveRunner {
    pub(crate) control: Arc<RunnerControl>,
    /// Aborts the runner itself (the supervisor then records the outcome)
    pub(crate) abort: tokio::task::AbortHandle,
    /// Supervisor wrapping the runner
    pub(crate) supervisor: tokio::task::JoinHandle<()>,
}

impl ActiveRunner {
    pub(crate) fn is_finished(&self) -> bool {
        self.control.is_done() || self.supervisor.is_finished()
    }
}

/// Pending list and active-runner registry
#[derive(Default)]
pub(crate) struct QueueInner {
    pub(crate) pending: VecDeque<TaskId>,
    pub(crate) active: HashMap<TaskId, ActiveRunner>,
    /// Set while `stop` winds the engine down; new work is refused meanwhile
    pub(crate) stopping: bool,
}

impl QueueInner {
    /// Drop finished runners from the active set, returning how many were removed
    pub(crate) fn sweep(&mut self) -> usize {
        let before = self.active.len();
        self.active.retain(|id, runner| {
            let finished = runner.is_finished();
            if finished {
                tracing::debug!(task_id = id.0, "runner finished, slot freed");
            }
            !finished
        });
        before - self.active.len()
    }

    /// Remove `id` from the pending list, returning whether it was queued
    pub(crate) fn remove_pending(&mut self, id: TaskId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|queued| *queued != id);
        self.pending.len() != before
    }

    /// Number of runners still running
    pub(crate) fn running(&self) -> usize {
        self.active.values().filter(|r| !r.is_finished()).count()
    }

    /// Control handle of the runner bound to `id`, if it is still running
    pub(crate) fn bound(&self, id: TaskId) -> Option<Arc<RunnerControl>> {
        self.active
            .get(&id)
            .filter(|runner| !runner.is_finished())
            .map(|runner| runner.control.clone())
    }
}

/// Queue and runner state management
#[derive(Clone, Default)]
pub(crate) struct QueueState {
    /// Pending list and active set behind one lock; runners never take it
    pub(crate) inner: Arc<tokio::sync::Mutex<QueueInner>>,
}

/// Handle to the running control loop
pub(crate) struct ControlLoop {
    pub(crate) shutdown: CancellationToken,
    pub(crate) handle: tokio::task::JoinHandle<()>,
}

/// Media download engine (cloneable - all fields are Arc-wrapped)
///
/// ```no_run
/// use media_dl::{Config, DownloadOptions, MediaDownloader};
///
/// # async fn example() -> media_dl::Result<()> {
/// let downloader = MediaDownloader::new(Config::default()).await?;
/// downloader.start().await?;
///
/// let id = downloader
///     .create("https://youtu.be/dQw4w9WgXcQ", DownloadOptions::default())
///     .await?;
/// println!("task {id}: {:?}", downloader.get(id).await?.status);
///
/// downloader.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MediaDownloader {
    /// Database instance for persistence
    /// Public for integration tests to inspect records
    pub db: Arc<Database>,
    pub(crate) hub: Arc<NotificationHub>,
    pub(crate) extractors: Arc<ExtractorRegistry>,
    pub(crate) config: Arc<Config>,
    pub(crate) queue_state: QueueState,
    pub(crate) control_loop: Arc<tokio::sync::Mutex<Option<ControlLoop>>>,
    pub(crate) started_at: std::time::Instant,
}

impl MediaDownloader {
    /// Open the database, build the default extractor registry and create the hub
    ///
    /// The engine does not admit work until [`start`](Self::start) is called.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.download.output_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create output directory '{}': {}",
                        config.download.output_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;
        let extractors = ExtractorRegistry::default_registry(&config.extractor)?;
        let hub = NotificationHub::new(config.hub.listener_buffer);

        tracing::info!(
            extractors = extractors.len(),
            max_concurrent = config.download.max_concurrent_downloads,
            "media downloader initialized"
        );

        Self::with_services(config, Arc::new(db), extractors, Arc::new(hub))
    }

    /// Build an engine from already constructed services
    pub fn with_services(
        config: Config,
        db: Arc<Database>,
        extractors: ExtractorRegistry,
        hub: Arc<NotificationHub>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            db,
            hub,
            extractors: Arc::new(extractors),
            config: Arc::new(config),
            queue_state: QueueState::default(),
            control_loop: Arc::new(tokio::sync::Mutex::new(None)),
            started_at: std::time::Instant::now(),
        })
    }

    /// Register a listener for progress and status events
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    /// Remove a listener; returns false if it was already gone
    pub fn unsubscribe(&self, listener: ListenerId) -> bool {
        self.hub.unsubscribe(listener)
    }

    /// Shared notification hub
    pub fn hub(&self) -> Arc<NotificationHub> {
        self.hub.clone()
    }

    /// Extractor registry used for dispatch
    pub fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Time since this engine was constructed
    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
