//! Runtime state tracking: clean shutdown detection.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

const CLEAN_SHUTDOWN_KEY: &str = "clean_shutdown";

impl Database {
    /// Read a runtime state value
    pub async fn get_state(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM runtime_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read runtime state {}: {}",
                    key, e
                )))
            })
    }

    /// Insert or replace a runtime state value
    pub async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write runtime state {}: {}",
                key, e
            )))
        })?;

        Ok(())
    }

    /// Whether the previous session ended without `set_clean_shutdown()`
    ///
    /// A database that never recorded a start counts as clean.
    pub async fn was_unclean_shutdown(&self) -> Result<bool> {
        let value = self.get_state(CLEAN_SHUTDOWN_KEY).await?;
        Ok(value.is_some_and(|v| v != "true"))
    }

    /// Mark that the engine is running
    pub async fn set_clean_start(&self) -> Result<()> {
        self.set_state(CLEAN_SHUTDOWN_KEY, "false").await
    }

    /// Mark that the engine stopped gracefully
    pub async fn set_clean_shutdown(&self) -> Result<()> {
        self.set_state(CLEAN_SHUTDOWN_KEY, "true").await
    }
}
