//! Database layer for media-dl
//!
//! Handles SQLite persistence for task records and runtime state.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: database lifecycle, schema migrations
//! - [`tasks`]: task record CRUD and aggregate queries
//! - [`state`]: runtime state (clean shutdown tracking)

use crate::error::Error;
use crate::types::{
    DownloadOptions, MediaMetadata, Platform, Progress, Status, TaskId, TaskRecord,
};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod migrations;
mod state;
mod tasks;

/// New task to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Resource locator
    pub url: String,
    /// Platform of the extractor that accepted the URL
    pub platform: Option<Platform>,
    /// Caller preferences
    pub options: DownloadOptions,
}

/// Task row as stored in SQLite
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Unique database ID
    pub id: i64,
    /// Resource locator
    pub url: String,
    /// Platform name
    pub platform: Option<String>,
    /// Status code (see [`Status::to_i32`])
    pub status: i32,
    /// Percentage complete
    pub percentage: f64,
    /// Bytes fetched
    pub bytes_done: i64,
    /// Total bytes when known
    pub bytes_total: Option<i64>,
    /// Transfer rate in bytes per second
    pub rate: Option<f64>,
    /// Estimated seconds remaining
    pub eta: Option<i64>,
    /// JSON-encoded [`DownloadOptions`]
    pub options: String,
    /// Resolved destination
    pub output_path: Option<String>,
    /// Media title
    pub title: Option<String>,
    /// Media duration in seconds
    pub duration: Option<i64>,
    /// Thumbnail URL
    pub thumbnail_url: Option<String>,
    /// Failure reason
    pub error_message: Option<String>,
    /// Unix timestamp when the task was created
    pub created_at: i64,
    /// Unix timestamp when the task was first admitted
    pub started_at: Option<i64>,
    /// Unix timestamp when the task reached a terminal state
    pub completed_at: Option<i64>,
}

impl TryFrom<TaskRow> for TaskRecord {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let options: DownloadOptions = serde_json::from_str(&row.options)?;

        Ok(TaskRecord {
            id: TaskId(row.id),
            url: row.url,
            platform: row.platform.and_then(|p| p.parse().ok()),
            status: Status::from_i32(row.status),
            progress: Progress {
                bytes_done: row.bytes_done.max(0) as u64,
                bytes_total: row.bytes_total.map(|b| b.max(0) as u64),
                percentage: row.percentage,
                rate: row.rate,
                eta: row.eta.map(|e| e.max(0) as u64),
            },
            options,
            output_path: row.output_path.map(PathBuf::from),
            metadata: MediaMetadata {
                title: row.title,
                duration: row.duration.map(|d| d.max(0) as u64),
                thumbnail_url: row.thumbnail_url,
            },
            error: row.error_message,
            created_at: from_timestamp(row.created_at),
            started_at: row.started_at.map(from_timestamp),
            completed_at: row.completed_at.map(from_timestamp),
        })
    }
}

fn from_timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

/// Partial update of a task row; `None` fields are left untouched
///
/// Nullable columns use `Option<Option<_>>`: `Some(None)` writes NULL.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    /// New status
    pub status: Option<Status>,
    /// Replace all progress columns
    pub progress: Option<Progress>,
    /// Resolved destination
    pub output_path: Option<Option<PathBuf>>,
    /// Replace metadata columns
    pub metadata: Option<MediaMetadata>,
    /// Failure reason
    pub error: Option<Option<String>>,
    /// First admission time
    pub started_at: Option<Option<DateTime<Utc>>>,
    /// Terminal transition time
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl TaskUpdate {
    /// Whether the update would change nothing
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_none()
            && self.output_path.is_none()
            && self.metadata.is_none()
            && self.error.is_none()
            && self.started_at.is_none()
            && self.completed_at.is_none()
    }

    /// Full snapshot of the mutable fields of `record`
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            status: Some(record.status),
            progress: Some(record.progress.clone()),
            output_path: Some(record.output_path.clone()),
            metadata: Some(record.metadata.clone()),
            error: Some(record.error.clone()),
            started_at: Some(record.started_at),
            completed_at: Some(record.completed_at),
        }
    }
}

/// Database handle for media-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
