//! Runner context: shared services plus persist/notify helpers.

use crate::config::Config;
use crate::db::{Database, TaskUpdate};
use crate::extractor::Extractor;
use crate::hub::NotificationHub;
use crate::types::{Event, Status, TaskId, TaskRecord};
use std::sync::Arc;
use url::Url;

use super::super::RunnerControl;

/// Everything one runner needs; cheap to clone
#[derive(Clone)]
pub(crate) struct TaskContext {
    pub(crate) id: TaskId,
    pub(crate) url: Url,
    pub(crate) db: Arc<Database>,
    pub(crate) hub: Arc<NotificationHub>,
    pub(crate) extractor: Arc<dyn Extractor>,
    pub(crate) config: Arc<Config>,
    pub(crate) control: Arc<RunnerControl>,
}

impl TaskContext {
    /// Move `record` to `next` if the lifecycle allows it
    pub(super) fn transition(&self, record: &mut TaskRecord, next: Status) -> bool {
        if !record.status.can_transition_to(next) {
            tracing::error!(
                task_id = self.id.0,
                from = %record.status,
                to = %next,
                "refusing invalid status transition"
            );
            return false;
        }
        record.status = next;
        true
    }

    /// Write `update`, logging instead of failing; the in-memory record stays authoritative
    pub(super) async fn persist(&self, update: TaskUpdate) {
        if let Err(e) = self.db.update_task(self.id, &update).await {
            tracing::warn!(task_id = self.id.0, error = %e, "failed to persist task update");
        }
    }

    pub(super) fn notify(&self, event: Event) {
        self.hub.publish(event);
    }

    /// Persist the full record, publish its status and refresh the snapshot
    pub(super) async fn commit(&self, record: &TaskRecord) {
        self.control.publish_snapshot(record);
        self.persist(TaskUpdate::from_record(record)).await;
        self.notify(Event::Status {
            task_id: self.id,
            status: record.status,
            error: record.error.clone(),
        });
    }
}
