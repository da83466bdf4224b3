//! Startup recovery and shutdown coordination.

use crate::error::Result;
use crate::types::{Status, TaskId};
use tokio_util::sync::CancellationToken;

use super::{ControlLoop, MediaDownloader, StopReason};

impl MediaDownloader {
    /// Recover unfinished work and start the control loop
    ///
    /// Tasks left `Active` by a crash and tasks that were `Paused` go back to `Pending`; all
    /// pending tasks are then queued oldest first. Calling `start` on a running engine is a
    /// no-op.
    pub async fn start(&self) -> Result<()> {
        let mut control_loop = self.control_loop.lock().await;
        if control_loop.is_some() {
            tracing::debug!("engine already running");
            return Ok(());
        }

        if self.db.was_unclean_shutdown().await? {
            tracing::warn!("previous session did not shut down cleanly, recovering interrupted tasks");
        }
        self.db.set_clean_start().await?;

        let queued = {
            let mut inner = self.queue_state.inner.lock().await;

            let crashed = self.db.reset_status(Status::Active, Status::Pending).await?;
            let parked = self.db.reset_status(Status::Paused, Status::Pending).await?;
            if crashed > 0 || parked > 0 {
                tracing::info!(crashed, parked, "reset unfinished tasks to pending");
            }

            for row in self.db.tasks_with_status(Status::Pending).await? {
                let id = TaskId(row.id);
                if !inner.pending.contains(&id) && !inner.active.contains_key(&id) {
                    inner.pending.push_back(id);
                }
            }
            inner.pending.len()
        };

        let shutdown = CancellationToken::new();
        let handle = self.spawn_control_loop(shutdown.clone());
        *control_loop = Some(ControlLoop { shutdown, handle });

        tracing::info!(
            queued,
            max_concurrent = self.config.download.max_concurrent_downloads,
            "engine started"
        );
        Ok(())
    }

    /// Whether the control loop is running
    pub async fn is_running(&self) -> bool {
        self.control_loop.lock().await.is_some()
    }

    /// Halt admission, park every active task as `Paused` and wait for runners to settle
    ///
    /// Runners still busy after `stop_timeout` are aborted. Parked tasks are picked up again by
    /// the next [`start`](Self::start). Until `stop` returns, `create`, `resume` and `retry`
    /// fail with `Error::ShuttingDown`.
    pub async fn stop(&self) -> Result<()> {
        let Some(control_loop) = self.control_loop.lock().await.take() else {
            tracing::debug!("engine not running");
            return Ok(());
        };

        tracing::info!("stopping engine");
        self.queue_state.inner.lock().await.stopping = true;
        let result = self.wind_down(control_loop).await;
        self.queue_state.inner.lock().await.stopping = false;
        result
    }

    /// Stop the control loop, then every runner it left behind
    async fn wind_down(&self, control_loop: ControlLoop) -> Result<()> {
        control_loop.shutdown.cancel();
        if let Err(e) = control_loop.handle.await {
            tracing::warn!(error = %e, "control loop ended abnormally");
        }

        let runners: Vec<_> = {
            let mut inner = self.queue_state.inner.lock().await;
            inner.pending.clear();
            inner.active.drain().collect()
        };

        for (id, runner) in &runners {
            tracing::debug!(task_id = id.0, "signalling runner to stop");
            runner.control.request_stop(StopReason::Shutdown);
        }

        let stop_timeout = self.config.scheduler.stop_timeout;
        let deadline = tokio::time::Instant::now() + stop_timeout;
        let mut abandoned = 0usize;

        for (id, runner) in runners {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if runner.control.wait_done(remaining).await.is_some() {
                continue;
            }

            abandoned += 1;
            tracing::warn!(task_id = id.0, "runner did not stop in time, aborting it");
            runner.abort.abort();
            // The supervisor records the aborted run as paused
            let grace = self.config.scheduler.cancel_timeout;
            if tokio::time::timeout(grace, runner.supervisor).await.is_err() {
                tracing::warn!(task_id = id.0, "supervisor did not finish after abort");
            }
        }

        if let Err(e) = self.db.set_clean_shutdown().await {
            tracing::error!(error = %e, "failed to mark clean shutdown");
            return Err(e);
        }

        tracing::info!(abandoned, "engine stopped");
        Ok(())
    }
}
