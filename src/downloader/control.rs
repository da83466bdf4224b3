//! Pause, resume and cancel.
//!
//! Requests for a bound task are routed to its runner and wait for it to settle; anything
//! else is applied to the persisted record while the queue lock is held, so the control
//! loop cannot admit the task halfway through.

use crate::db::TaskUpdate;
use crate::error::{Error, Result};
use crate::types::{Event, Status, TaskId};
use crate::utils::remove_artifact;
use std::sync::Arc;
use std::time::Duration;

use super::queue::invalid_state;
use super::{MediaDownloader, RunnerControl, StopReason};

/// Extra wait on top of `cancel_timeout` for the runner to record its final state
const SETTLE_GRACE: Duration = Duration::from_millis(500);

impl MediaDownloader {
    /// Pause a task
    ///
    /// An active task is stopped cooperatively and keeps its progress; a queued task leaves
    /// the pending list. Pausing a paused task is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids, `InvalidState` for terminal tasks.
    pub async fn pause(&self, id: TaskId) -> Result<()> {
        let mut inner = self.queue_state.inner.lock().await;
        inner.sweep();

        if let Some(control) = inner.bound(id) {
            drop(inner);
            tracing::info!(task_id = id.0, "pausing active task");
            self.stop_runner(id, &control, StopReason::Pause).await;
            return Ok(());
        }

        let record = self.load_record(id).await?;
        match record.status {
            Status::Paused => Ok(()),
            // Active without a runner only happens before startup recovery
            Status::Pending | Status::Active => {
                inner.remove_pending(id);
                self.db
                    .update_task(
                        id,
                        &TaskUpdate {
                            status: Some(Status::Paused),
                            ..TaskUpdate::default()
                        },
                    )
                    .await?;
                self.hub.publish(Event::Status {
                    task_id: id,
                    status: Status::Paused,
                    error: None,
                });
                drop(inner);

                tracing::info!(task_id = id.0, "paused queued task");
                Ok(())
            }
            other => Err(invalid_state(id, "pause", other)),
        }
    }

    /// Resume a paused task by appending it to the pending list
    ///
    /// The fetch restarts from scratch once the task is admitted. Resuming a pending task is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids, `InvalidState` for active and terminal tasks,
    /// `ShuttingDown` while the engine is stopping.
    pub async fn resume(&self, id: TaskId) -> Result<()> {
        let mut inner = self.queue_state.inner.lock().await;
        inner.sweep();

        if inner.bound(id).is_some() {
            return Err(invalid_state(id, "resume", Status::Active));
        }
        if inner.stopping {
            return Err(Error::ShuttingDown);
        }

        let record = self.load_record(id).await?;
        match record.status {
            Status::Pending => Ok(()),
            Status::Paused => {
                self.db
                    .update_task(
                        id,
                        &TaskUpdate {
                            status: Some(Status::Pending),
                            ..TaskUpdate::default()
                        },
                    )
                    .await?;
                if !inner.pending.contains(&id) {
                    inner.pending.push_back(id);
                }
                self.hub.publish(Event::Status {
                    task_id: id,
                    status: Status::Pending,
                    error: None,
                });
                drop(inner);

                tracing::info!(task_id = id.0, "resumed task");
                Ok(())
            }
            other => Err(invalid_state(id, "resume", other)),
        }
    }

    /// Cancel a task, deleting any partial artifact
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids, `InvalidState` if the task already reached a terminal
    /// state.
    pub async fn cancel(&self, id: TaskId) -> Result<()> {
        let mut inner = self.queue_state.inner.lock().await;
        inner.sweep();

        if let Some(control) = inner.bound(id) {
            drop(inner);
            tracing::info!(task_id = id.0, "cancelling active task");
            self.stop_runner(id, &control, StopReason::Cancel).await;
            return Ok(());
        }

        let record = self.load_record(id).await?;
        if record.status.is_terminal() {
            return Err(invalid_state(id, "cancel", record.status));
        }

        inner.remove_pending(id);
        if let Some(path) = &record.output_path {
            match remove_artifact(path).await {
                Ok(removed) => {
                    tracing::debug!(task_id = id.0, removed, "cleaned up partial artifact")
                }
                Err(e) => tracing::warn!(
                    task_id = id.0,
                    path = %path.display(),
                    error = %e,
                    "failed to remove partial artifact"
                ),
            }
        }

        self.db
            .update_task(
                id,
                &TaskUpdate {
                    status: Some(Status::Cancelled),
                    output_path: Some(None),
                    completed_at: Some(Some(chrono::Utc::now())),
                    ..TaskUpdate::default()
                },
            )
            .await?;
        self.hub.publish(Event::Status {
            task_id: id,
            status: Status::Cancelled,
            error: None,
        });
        drop(inner);

        tracing::info!(task_id = id.0, previous = %record.status, "task cancelled");
        Ok(())
    }

    /// Signal a runner and wait for it to settle, bounded by `cancel_timeout` plus a grace
    async fn stop_runner(&self, id: TaskId, control: &Arc<RunnerControl>, reason: StopReason) {
        control.request_stop(reason);
        let wait = self.config.scheduler.cancel_timeout + SETTLE_GRACE;
        match control.wait_done(wait).await {
            Some(status) => tracing::debug!(task_id = id.0, %status, "runner settled"),
            None => tracing::warn!(
                task_id = id.0,
                wait_ms = wait.as_millis() as u64,
                "runner did not settle in time"
            ),
        }
    }
}
