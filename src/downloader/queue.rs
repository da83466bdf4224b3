//! Task creation, queries and the pending list.

use crate::db::{NewTask, TaskUpdate};
use crate::error::{Error, FetchError, Result, TaskError};
use crate::types::{
    DownloadOptions, Event, MediaFormat, MediaInfo, Progress, Status, StatusSnapshot, TaskId,
    TaskPage, TaskRecord, UrlValidation, VideoQuality,
};

use super::MediaDownloader;

/// Largest page `list` will return
pub const MAX_PAGE_SIZE: u32 = 500;

impl MediaDownloader {
    /// Create a task for `url` and queue it
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedResource` when no extractor accepts the URL and
    /// `Error::ShuttingDown` while [`stop`](Self::stop) is in progress; nothing is persisted
    /// in either case.
    pub async fn create(&self, url: &str, options: DownloadOptions) -> Result<TaskId> {
        let (parsed, extractor) = self
            .extractors
            .find(url)
            .ok_or_else(|| Error::UnsupportedResource(url.to_string()))?;
        if self.queue_state.inner.lock().await.stopping {
            return Err(Error::ShuttingDown);
        }

        let id = self
            .db
            .insert_task(&NewTask {
                url: parsed.to_string(),
                platform: Some(extractor.platform()),
                options,
            })
            .await?;

        tracing::info!(
            task_id = id.0,
            url = %parsed,
            platform = %extractor.platform(),
            "task created"
        );

        self.hub.publish(Event::Status {
            task_id: id,
            status: Status::Pending,
            error: None,
        });
        self.enqueue(id).await;

        Ok(id)
    }

    /// Append `id` to the tail of the pending list
    ///
    /// No-op if the task is already queued or bound to a runner.
    pub async fn enqueue(&self, id: TaskId) {
        let mut inner = self.queue_state.inner.lock().await;
        if inner.pending.contains(&id) || inner.bound(id).is_some() {
            tracing::debug!(task_id = id.0, "task already queued or active");
            return;
        }
        inner.pending.push_back(id);
    }

    /// Task ids waiting for admission, head first
    pub async fn pending_ids(&self) -> Vec<TaskId> {
        let inner = self.queue_state.inner.lock().await;
        inner.pending.iter().copied().collect()
    }

    /// Number of runners currently bound
    pub async fn active_count(&self) -> usize {
        self.queue_state.inner.lock().await.running()
    }

    /// Get one task
    ///
    /// A bound task is read from its runner's in-memory snapshot.
    pub async fn get(&self, id: TaskId) -> Result<TaskRecord> {
        let bound = {
            let inner = self.queue_state.inner.lock().await;
            inner.bound(id)
        };
        if let Some(control) = bound {
            return Ok(control.snapshot());
        }

        self.load_record(id).await
    }

    /// Current progress of one task
    pub async fn progress(&self, id: TaskId) -> Result<Progress> {
        Ok(self.get(id).await?.progress)
    }

    /// One page of tasks, newest first
    ///
    /// `page` is 1-based (0 is treated as 1); `per_page` is clamped to 1..=500.
    pub async fn list(
        &self,
        status: Option<Status>,
        page: u32,
        per_page: u32,
    ) -> Result<TaskPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let offset = u64::from(page - 1) * u64::from(per_page);

        let rows = self.db.query_tasks(status, per_page, offset).await?;
        let total = self.db.count_tasks(status).await?;

        let inner = self.queue_state.inner.lock().await;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let record = TaskRecord::try_from(row)?;
            match inner.bound(record.id) {
                Some(control) => tasks.push(control.snapshot()),
                None => tasks.push(record),
            }
        }

        Ok(TaskPage {
            tasks,
            total,
            page,
            per_page,
            has_next: offset + u64::from(per_page) < total,
            has_prev: page > 1,
        })
    }

    /// Aggregate counts across all tasks
    ///
    /// `active` counts bound runners. Every other unfinished task is `queued`, including an
    /// `Active` row left by a crash that startup recovery has not reset yet.
    pub async fn status_snapshot(&self) -> Result<StatusSnapshot> {
        let counts = self.db.count_by_status().await?;
        let count = |status: Status| counts.get(&status).copied().unwrap_or(0);
        let active = self.active_count().await as u64;

        let total: u64 = counts.values().sum();
        let completed = count(Status::Completed);
        let failed = count(Status::Failed);
        let cancelled = count(Status::Cancelled);
        let unfinished = total - completed - failed - cancelled;

        Ok(StatusSnapshot {
            active: active.min(unfinished),
            queued: unfinished.saturating_sub(active),
            completed,
            failed,
            cancelled,
            total,
        })
    }

    /// Check whether a URL would be accepted by `create`
    pub fn validate(&self, url: &str) -> UrlValidation {
        match url::Url::parse(url.trim()) {
            Err(e) => UrlValidation {
                url: url.to_string(),
                is_valid: false,
                platform: None,
                error: Some(format!("Invalid URL: {e}")),
            },
            Ok(parsed) => match self.extractors.detect_platform(&parsed) {
                Some(platform) => UrlValidation {
                    url: url.to_string(),
                    is_valid: true,
                    platform: Some(platform),
                    error: None,
                },
                None => UrlValidation {
                    url: url.to_string(),
                    is_valid: false,
                    platform: None,
                    error: Some("No extractor supports this URL".to_string()),
                },
            },
        }
    }

    /// Describe `url` and its available formats without creating a task
    ///
    /// Bounded by `fetch_timeout`.
    ///
    /// # Errors
    ///
    /// `UnsupportedResource` when no extractor accepts the URL; a fetch error when the
    /// extractor cannot describe it.
    pub async fn metadata(&self, url: &str) -> Result<MediaInfo> {
        let (parsed, extractor) = self
            .extractors
            .find(url)
            .ok_or_else(|| Error::UnsupportedResource(url.to_string()))?;

        let limit = self.config.download.fetch_timeout;
        match tokio::time::timeout(limit, extractor.extract_info(&parsed)).await {
            Ok(Ok(info)) => Ok(info),
            Ok(Err(e)) => {
                tracing::warn!(
                    url = %parsed,
                    extractor = extractor.name(),
                    error = %e,
                    "failed to describe URL"
                );
                Err(e)
            }
            Err(_) => Err(FetchError::Timeout {
                seconds: limit.as_secs(),
            }
            .into()),
        }
    }

    /// Formats of `url` eligible under `quality`, or all of them when no quality is given
    ///
    /// # Errors
    ///
    /// As for [`metadata`](Self::metadata).
    pub async fn formats(
        &self,
        url: &str,
        quality: Option<VideoQuality>,
    ) -> Result<Vec<MediaFormat>> {
        let formats = self.metadata(url).await?.formats;
        Ok(match quality {
            Some(quality) => formats.into_iter().filter(|f| f.fits(quality)).collect(),
            None => formats,
        })
    }

    /// Put a failed or cancelled task back in the queue
    ///
    /// Progress, error and completion time are cleared; the task is appended to the tail.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the task is `Failed` or `Cancelled`.
    pub async fn retry(&self, id: TaskId) -> Result<()> {
        let mut inner = self.queue_state.inner.lock().await;
        inner.sweep();

        if inner.stopping {
            return Err(Error::ShuttingDown);
        }

        let record = self.load_record(id).await?;
        if inner.bound(id).is_some()
            || !matches!(record.status, Status::Failed | Status::Cancelled)
        {
            return Err(invalid_state(id, "retry", record.status));
        }

        self.db
            .update_task(
                id,
                &TaskUpdate {
                    status: Some(Status::Pending),
                    progress: Some(Progress::default()),
                    error: Some(None),
                    completed_at: Some(None),
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

        tracing::info!(task_id = id.0, previous = %record.status, "task re-queued for retry");
        Ok(())
    }

    /// Read a record straight from the database
    pub(crate) async fn load_record(&self, id: TaskId) -> Result<TaskRecord> {
        let row = self
            .db
            .get_task(id)
            .await?
            .ok_or(Error::Task(TaskError::NotFound { id: id.0 }))?;
        TaskRecord::try_from(row)
    }
}

pub(crate) fn invalid_state(id: TaskId, operation: &str, current: Status) -> Error {
    Error::Task(TaskError::InvalidState {
        id: id.0,
        operation: operation.to_string(),
        current_state: current.to_string(),
    })
}
