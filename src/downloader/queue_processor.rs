//! Control loop: frees finished runner slots and admits pending tasks.

use crate::error::{Error, Result};
use crate::types::{Status, TaskId};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::task_runner::{TaskContext, spawn_runner};
use super::{ActiveRunner, MediaDownloader, QueueInner, RunnerControl};

impl MediaDownloader {
    /// Spawn the control loop
    ///
    /// Each tick sweeps finished runners, then admits pending tasks while fewer than
    /// `max_concurrent_downloads` runners are bound. A failed or panicking tick is logged and
    /// the next one runs after `error_backoff`.
    pub(crate) fn spawn_control_loop(
        &self,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();

        tokio::spawn(async move {
            let tick_interval = downloader.config.scheduler.tick_interval;
            let error_backoff = downloader.config.scheduler.error_backoff;

            loop {
                let delay = match AssertUnwindSafe(downloader.tick()).catch_unwind().await {
                    Ok(Ok(())) => tick_interval,
                    Ok(Err(e)) => {
                        tracing::error!(error = %e, "scheduler tick failed");
                        error_backoff
                    }
                    Err(_) => {
                        tracing::error!("scheduler tick panicked");
                        error_backoff
                    }
                };

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            tracing::debug!("control loop stopped");
        })
    }

    /// One scheduling pass
    pub(crate) async fn tick(&self) -> Result<()> {
        let mut inner = self.queue_state.inner.lock().await;
        let freed = inner.sweep();
        if freed > 0 {
            tracing::debug!(freed, "swept finished runners");
        }
        self.admit(&mut inner).await
    }

    /// Bind runners to pending tasks until the concurrency limit is reached
    async fn admit(&self, inner: &mut QueueInner) -> Result<()> {
        let limit = self.config.download.max_concurrent_downloads;

        while inner.active.len() < limit {
            let Some(id) = inner.pending.pop_front() else {
                break;
            };

            if let Err(e) = self.admit_one(inner, id).await {
                // Keep the task at the head so it is retried after the backoff
                inner.pending.push_front(id);
                return Err(Error::Scheduler(format!("Failed to admit task {}: {}", id, e)));
            }
        }

        Ok(())
    }

    async fn admit_one(&self, inner: &mut QueueInner, id: TaskId) -> Result<()> {
        if inner.active.contains_key(&id) {
            tracing::debug!(task_id = id.0, "task already bound, skipping");
            return Ok(());
        }

        let Some(row) = self.db.get_task(id).await? else {
            tracing::warn!(task_id = id.0, "queued task no longer exists");
            return Ok(());
        };
        let record = crate::types::TaskRecord::try_from(row)?;

        if record.status != Status::Pending {
            tracing::debug!(task_id = id.0, status = %record.status, "stale queue entry, skipping");
            return Ok(());
        }

        let Some((url, extractor)) = self.extractors.find(&record.url) else {
            tracing::error!(
                task_id = id.0,
                url = %record.url,
                "no extractor accepts queued task, cancelling it"
            );
            self.db
                .update_task(
                    id,
                    &crate::db::TaskUpdate {
                        status: Some(Status::Cancelled),
                        completed_at: Some(Some(chrono::Utc::now())),
                        ..Default::default()
                    },
                )
                .await?;
            self.hub.publish(crate::types::Event::Status {
                task_id: id,
                status: Status::Cancelled,
                error: None,
            });
            return Ok(());
        };

        let control = Arc::new(RunnerControl::new(record.clone()));
        let ctx = TaskContext {
            id,
            url,
            db: self.db.clone(),
            hub: self.hub.clone(),
            extractor,
            config: self.config.clone(),
            control: control.clone(),
        };

        tracing::debug!(task_id = id.0, active = inner.active.len() + 1, "admitting task");
        let (abort, supervisor) = spawn_runner(ctx, record);
        inner.active.insert(
            id,
            ActiveRunner {
                control,
                abort,
                supervisor,
            },
        );

        Ok(())
    }
}
