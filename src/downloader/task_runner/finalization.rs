//! Runner finalization: map the fetch result and stop request to a final status.

use crate::error::Result;
use crate::extractor::FetchOutcome;
use crate::types::{MediaMetadata, Status, TaskRecord};
use crate::utils::remove_artifact;
use std::path::Path;

use super::StopReason;
use super::context::TaskContext;
use super::progress;

/// Status a finished fetch resolves to
///
/// Cancel always wins. A successful fetch wins over a pause or shutdown that arrived too
/// late to matter.
pub(super) fn resolve_status(succeeded: bool, stop: Option<StopReason>) -> Status {
    match (succeeded, stop) {
        (_, Some(StopReason::Cancel)) => Status::Cancelled,
        (true, _) => Status::Completed,
        (false, Some(StopReason::Pause | StopReason::Shutdown)) => Status::Paused,
        (false, None) => Status::Failed,
    }
}

/// Record the final state of a run and return it
pub(super) async fn finalize(
    ctx: &TaskContext,
    mut record: TaskRecord,
    result: Result<FetchOutcome>,
) -> Status {
    let id = ctx.id;
    let stop = ctx.control.stop_reason();
    let next = resolve_status(result.is_ok(), stop);

    if !ctx.transition(&mut record, next) {
        return record.status;
    }

    match result {
        Ok(outcome) if next == Status::Cancelled => {
            // Finished after the cancel request; the finished file goes as well
            discard_artifact(ctx, &mut record).await;
            remove_logged(ctx, &outcome.output_path).await;
            record.error = None;
            record.completed_at = Some(chrono::Utc::now());
            tracing::info!(task_id = id.0, "task cancelled after its fetch finished");
        }
        Ok(outcome) => {
            progress::complete(&mut record.progress);
            record.output_path = Some(outcome.output_path);
            merge_metadata(&mut record.metadata, outcome.metadata);
            record.error = None;
            record.completed_at = Some(chrono::Utc::now());
            tracing::info!(
                task_id = id.0,
                output = ?record.output_path,
                "task completed"
            );
        }
        Err(e) => match next {
            Status::Cancelled => {
                discard_artifact(ctx, &mut record).await;
                record.error = None;
                record.completed_at = Some(chrono::Utc::now());
                tracing::info!(task_id = id.0, "task cancelled");
            }
            Status::Paused => {
                tracing::info!(task_id = id.0, reason = ?stop, "task paused");
            }
            _ => {
                record.error = Some(e.to_string());
                record.completed_at = Some(chrono::Utc::now());
                tracing::error!(task_id = id.0, error = %e, "task failed");
            }
        },
    }

    ctx.commit(&record).await;
    record.status
}

/// Delete the partial artifact of a cancelled task, if one was announced
pub(super) async fn discard_artifact(ctx: &TaskContext, record: &mut TaskRecord) {
    if let Some(path) = record.output_path.take() {
        remove_logged(ctx, &path).await;
    }
}

async fn remove_logged(ctx: &TaskContext, path: &Path) {
    match remove_artifact(path).await {
        Ok(true) => {
            tracing::debug!(task_id = ctx.id.0, path = %path.display(), "removed partial artifact")
        }
        Ok(false) => {}
        Err(e) => tracing::warn!(
            task_id = ctx.id.0,
            path = %path.display(),
            error = %e,
            "failed to remove partial artifact"
        ),
    }
}

/// Fill metadata fields the fetch resolved, keeping what was already known
fn merge_metadata(current: &mut MediaMetadata, resolved: MediaMetadata) {
    if resolved.title.is_some() {
        current.title = resolved.title;
    }
    if resolved.duration.is_some() {
        current.duration = resolved.duration;
    }
    if resolved.thumbnail_url.is_some() {
        current.thumbnail_url = resolved.thumbnail_url;
    }
}
