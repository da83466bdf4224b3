//! Task runner: drives one task from admission to its next resting state.
//!
//! Split into focused submodules:
//! - [`context`] - Shared services and persist/notify helpers
//! - [`progress`] - Folding samples into monotonic progress
//! - [`finalization`] - Final status and artifact cleanup
//!
//! Every run starts the fetch from scratch. The runner owns the in-memory record while it
//! is bound; the engine only reads published snapshots.

mod context;
mod finalization;
mod progress;


pub(crate) use context::TaskContext;

use crate::db::TaskUpdate;
use crate::error::{FetchError, Result};
use crate::extractor::{FetchOutcome, FetchRequest, FetchSignal, ProgressSink};
use crate::types::{Event, Progress, Status, TaskRecord};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Why a runner was asked to stop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StopReason {
    /// Caller paused the task
    Pause,
    /// Caller cancelled the task
    Cancel,
    /// Engine is stopping; the task is parked for the next start
    Shutdown,
}

/// Spawn a supervised runner for `record`
///
/// Returns the runner's abort handle and the supervisor's join handle. The supervisor turns
/// a panicking or aborted runner into a final status and always signals completion.
pub(crate) fn spawn_runner(
    ctx: TaskContext,
    record: TaskRecord,
) -> (tokio::task::AbortHandle, tokio::task::JoinHandle<()>) {
    let runner = tokio::spawn(run_task(ctx.clone(), record));
    let abort = runner.abort_handle();

    let supervisor = tokio::spawn(async move {
        let status = match runner.await {
            Ok(status) => status,
            Err(e) => recover(&ctx, e).await,
        };
        ctx.control.finish(status);
    });

    (abort, supervisor)
}

/// Record an outcome for a runner that never returned
async fn recover(ctx: &TaskContext, err: tokio::task::JoinError) -> Status {
    let mut record = ctx.control.snapshot();
    let stop = ctx.control.stop_reason();

    let next = if err.is_panic() {
        tracing::error!(task_id = ctx.id.0, "task runner panicked");
        Status::Failed
    } else {
        tracing::warn!(task_id = ctx.id.0, reason = ?stop, "task runner aborted");
        finalization::resolve_status(false, stop.or(Some(StopReason::Shutdown)))
    };

    if !ctx.transition(&mut record, next) {
        return record.status;
    }

    match next {
        Status::Failed => {
            record.error = Some("task runner panicked".to_string());
            record.completed_at = Some(chrono::Utc::now());
        }
        Status::Cancelled => {
            finalization::discard_artifact(ctx, &mut record).await;
            record.completed_at = Some(chrono::Utc::now());
        }
        _ => {}
    }

    ctx.commit(&record).await;
    record.status
}

/// Run one fetch for `record`, which the scheduler admitted from `Pending`
pub(crate) async fn run_task(ctx: TaskContext, mut record: TaskRecord) -> Status {
    let id = ctx.id;

    // A previous attempt's partial output is useless once the fetch restarts
    if let Some(stale) = record.output_path.take() {
        if let Err(e) = crate::utils::remove_artifact(&stale).await {
            tracing::warn!(task_id = id.0, error = %e, "failed to remove stale partial artifact");
        }
    }

    if !ctx.transition(&mut record, Status::Active) {
        return record.status;
    }
    record.progress = Progress::default();
    record.error = None;
    record.completed_at = None;
    if record.started_at.is_none() {
        record.started_at = Some(chrono::Utc::now());
    }
    ctx.commit(&record).await;

    tracing::info!(
        task_id = id.0,
        url = %ctx.url,
        extractor = ctx.extractor.name(),
        "task started"
    );

    let output_dir = record
        .options
        .output_dir
        .clone()
        .unwrap_or_else(|| ctx.config.download.output_dir.clone());
    let request = FetchRequest {
        task_id: id,
        url: ctx.url.clone(),
        options: record.options.clone(),
        output_dir,
    };

    let (sink, mut signals) = ProgressSink::channel(ctx.config.download.progress_buffer);
    let result = drive_fetch(&ctx, &mut record, request, sink, &mut signals).await;

    // Samples sent before the fetch returned still belong to this run
    while let Ok(signal) = signals.try_recv() {
        apply_signal(&ctx, &mut record, signal).await;
    }

    finalization::finalize(&ctx, record, result).await
}

/// Poll the fetch while draining its samples
///
/// After a stop request the fetch gets `cancel_timeout` to acknowledge; after that it is
/// dropped. A fetch that reports nothing for `fetch_timeout` fails.
async fn drive_fetch(
    ctx: &TaskContext,
    record: &mut TaskRecord,
    request: FetchRequest,
    sink: ProgressSink,
    signals: &mut mpsc::Receiver<FetchSignal>,
) -> Result<FetchOutcome> {
    let cancel_timeout = ctx.config.scheduler.cancel_timeout;
    let idle_timeout = ctx.config.download.fetch_timeout;

    let fetch = ctx
        .extractor
        .execute_fetch(request, sink, ctx.control.cancel.clone());
    tokio::pin!(fetch);

    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    let mut stop_deadline: Option<Instant> = None;
    let mut signals_open = true;

    loop {
        tokio::select! {
            biased;

            result = &mut fetch => return result,

            signal = signals.recv(), if signals_open => match signal {
                Some(signal) => {
                    apply_signal(ctx, record, signal).await;
                    idle.as_mut().reset(Instant::now() + idle_timeout);
                }
                None => signals_open = false,
            },

            _ = ctx.control.cancel.cancelled(), if stop_deadline.is_none() => {
                tracing::debug!(task_id = ctx.id.0, "stop requested, waiting for fetch");
                stop_deadline = Some(Instant::now() + cancel_timeout);
            }

            _ = tokio::time::sleep_until(stop_deadline.unwrap_or_else(Instant::now)),
                if stop_deadline.is_some() =>
            {
                tracing::warn!(
                    task_id = ctx.id.0,
                    timeout_ms = cancel_timeout.as_millis() as u64,
                    "fetch ignored cancellation, dropping it"
                );
                return Err(FetchError::Cancelled.into());
            }

            _ = &mut idle, if stop_deadline.is_none() => {
                tracing::warn!(
                    task_id = ctx.id.0,
                    timeout_secs = idle_timeout.as_secs(),
                    "fetch reported nothing, giving up"
                );
                return Err(FetchError::Timeout {
                    seconds: idle_timeout.as_secs(),
                }
                .into());
            }
        }
    }
}

async fn apply_signal(ctx: &TaskContext, record: &mut TaskRecord, signal: FetchSignal) {
    match signal {
        FetchSignal::Progress(sample) => {
            progress::apply_sample(&mut record.progress, &sample);
            tracing::debug!(
                task_id = ctx.id.0,
                bytes_done = record.progress.bytes_done,
                percentage = record.progress.percentage,
                "progress"
            );
            ctx.control.publish_snapshot(record);
            ctx.persist(TaskUpdate {
                progress: Some(record.progress.clone()),
                ..TaskUpdate::default()
            })
            .await;
            ctx.notify(Event::Progress {
                task_id: ctx.id,
                progress: record.progress.clone(),
            });
        }
        FetchSignal::Destination(path) => {
            tracing::debug!(task_id = ctx.id.0, path = %path.display(), "destination resolved");
            record.output_path = Some(path.clone());
            ctx.control.publish_snapshot(record);
            ctx.persist(TaskUpdate {
                output_path: Some(Some(path)),
                ..TaskUpdate::default()
            })
            .await;
        }
    }
}
