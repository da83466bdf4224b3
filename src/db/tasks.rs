//! Task record CRUD and aggregate queries.

use crate::error::DatabaseError;
use crate::types::{Status, TaskId};
use crate::{Error, Result};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;

use super::{Database, NewTask, TaskRow, TaskUpdate};

const TASK_COLUMNS: &str = r#"
    id, url, platform, status, percentage, bytes_done, bytes_total, rate, eta,
    options, output_path, title, duration, thumbnail_url, error_message,
    created_at, started_at, completed_at
"#;

impl Database {
    /// Insert a new task in `Pending` and return its id
    pub async fn insert_task(&self, task: &NewTask) -> Result<TaskId> {
        let now = chrono::Utc::now().timestamp();
        let options = serde_json::to_string(&task.options)?;

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (url, platform, status, percentage, bytes_done, options, created_at)
            VALUES (?, ?, ?, 0.0, 0, ?, ?)
            "#,
        )
        .bind(&task.url)
        .bind(task.platform.map(|p| p.as_str()))
        .bind(Status::Pending.to_i32())
        .bind(options)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert task: {}",
                e
            )))
        })?;

        Ok(TaskId(result.last_insert_rowid()))
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<Option<TaskRow>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?");
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get task: {}",
                    e
                )))
            })?;

        Ok(row)
    }

    /// Apply a partial update
    ///
    /// Returns `DatabaseError::NotFound` when no row has this id.
    pub async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET ");
        {
            let mut set = builder.separated(", ");

            if let Some(status) = update.status {
                set.push("status = ").push_bind_unseparated(status.to_i32());
            }
            if let Some(progress) = &update.progress {
                set.push("percentage = ")
                    .push_bind_unseparated(progress.percentage);
                set.push("bytes_done = ")
                    .push_bind_unseparated(progress.bytes_done as i64);
                set.push("bytes_total = ")
                    .push_bind_unseparated(progress.bytes_total.map(|b| b as i64));
                set.push("rate = ").push_bind_unseparated(progress.rate);
                set.push("eta = ")
                    .push_bind_unseparated(progress.eta.map(|e| e as i64));
            }
            if let Some(output_path) = &update.output_path {
                set.push("output_path = ").push_bind_unseparated(
                    output_path
                        .as_ref()
                        .map(|p| p.to_string_lossy().into_owned()),
                );
            }
            if let Some(metadata) = &update.metadata {
                set.push("title = ")
                    .push_bind_unseparated(metadata.title.clone());
                set.push("duration = ")
                    .push_bind_unseparated(metadata.duration.map(|d| d as i64));
                set.push("thumbnail_url = ")
                    .push_bind_unseparated(metadata.thumbnail_url.clone());
            }
            if let Some(error) = &update.error {
                set.push("error_message = ")
                    .push_bind_unseparated(error.clone());
            }
            if let Some(started_at) = update.started_at {
                set.push("started_at = ")
                    .push_bind_unseparated(started_at.map(|t| t.timestamp()));
            }
            if let Some(completed_at) = update.completed_at {
                set.push("completed_at = ")
                    .push_bind_unseparated(completed_at.map(|t| t.timestamp()));
            }
        }
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update task: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "task {id}"
            ))));
        }

        Ok(())
    }

    /// One page of tasks, newest first
    pub async fn query_tasks(
        &self,
        status: Option<Status>,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<TaskRow>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        if let Some(status) = status {
            builder.push(" WHERE status = ").push_bind(status.to_i32());
        }
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows = builder
            .build_query_as::<TaskRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query tasks: {}",
                    e
                )))
            })?;

        Ok(rows)
    }

    /// Number of tasks, optionally restricted to one status
    pub async fn count_tasks(&self, status: Option<Status>) -> Result<u64> {
        let count: i64 = match status {
            Some(status) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE status = ?")
                    .bind(status.to_i32())
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks")
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to count tasks: {}",
                e
            )))
        })?;

        Ok(count.max(0) as u64)
    }

    /// Task counts grouped by status; statuses with no tasks are absent
    pub async fn count_by_status(&self) -> Result<HashMap<Status, u64>> {
        let rows: Vec<(i32, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to count tasks by status: {}",
                        e
                    )))
                })?;

        let mut counts = HashMap::new();
        for (status, count) in rows {
            *counts.entry(Status::from_i32(status)).or_insert(0) += count.max(0) as u64;
        }
        Ok(counts)
    }

    /// All tasks with `status`, oldest first
    pub async fn tasks_with_status(&self, status: Status) -> Result<Vec<TaskRow>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE status = ? ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(status.to_i32())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to list tasks by status: {}",
                    e
                )))
            })?;

        Ok(rows)
    }

    /// Move every task in `from` to `to`, returning how many rows changed
    pub async fn reset_status(&self, from: Status, to: Status) -> Result<u64> {
        let result = sqlx::query("UPDATE tasks SET status = ? WHERE status = ?")
            .bind(to.to_i32())
            .bind(from.to_i32())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to reset task status: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }
}
