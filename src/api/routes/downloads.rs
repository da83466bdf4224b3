//! Download task handlers.

use super::{CreateDownloadRequest, CreateDownloadResponse, DEFAULT_PER_PAGE, ListDownloadsQuery};
use crate::api::AppState;
use crate::error::Result;
use crate::types::{Status, TaskId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// GET /downloads - List tasks, newest first
#[utoipa::path(
    get,
    path = "/api/v1/downloads",
    tag = "downloads",
    params(ListDownloadsQuery),
    responses(
        (status = 200, description = "One page of tasks", body = crate::types::TaskPage),
        (status = 400, description = "Malformed query"),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_downloads(
    State(state): State<AppState>,
    Query(query): Query<ListDownloadsQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .downloader
        .list(
            query.status,
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
        .await?;
    Ok(Json(page))
}

/// POST /downloads - Create a download task
#[utoipa::path(
    post,
    path = "/api/v1/downloads",
    tag = "downloads",
    request_body = CreateDownloadRequest,
    responses(
        (status = 201, description = "Task created and queued", body = CreateDownloadResponse),
        (status = 400, description = "No extractor supports the URL", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn create_download(
    State(state): State<AppState>,
    Json(request): Json<CreateDownloadRequest>,
) -> Result<impl IntoResponse> {
    let id = state
        .downloader
        .create(&request.url, request.options)
        .await?;
    let record = state.downloader.get(id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateDownloadResponse {
            id: id.0,
            platform: record.platform,
            status: Status::Pending,
        }),
    ))
}

/// GET /downloads/:id - Get one task
#[utoipa::path(
    get,
    path = "/api/v1/downloads/{id}",
    tag = "downloads",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task record", body = crate::types::TaskRecord),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.downloader.get(TaskId(id)).await?))
}

/// GET /downloads/:id/progress - Current progress of one task
#[utoipa::path(
    get,
    path = "/api/v1/downloads/{id}/progress",
    tag = "downloads",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task progress", body = crate::types::Progress),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn get_download_progress(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.downloader.progress(TaskId(id)).await?))
}

/// POST /downloads/:id/pause - Pause a task
#[utoipa::path(
    post,
    path = "/api/v1/downloads/{id}/pause",
    tag = "downloads",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task paused"),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
        (status = 409, description = "Task already finished", body = crate::error::ApiError)
    )
)]
pub async fn pause_download(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.downloader.pause(TaskId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /downloads/:id/resume - Resume a paused task
#[utoipa::path(
    post,
    path = "/api/v1/downloads/{id}/resume",
    tag = "downloads",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task queued again"),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
        (status = 409, description = "Task already finished", body = crate::error::ApiError)
    )
)]
pub async fn resume_download(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.downloader.resume(TaskId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /downloads/:id/retry - Re-queue a failed or cancelled task
#[utoipa::path(
    post,
    path = "/api/v1/downloads/{id}/retry",
    tag = "downloads",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task queued again"),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
        (status = 409, description = "Task is not failed or cancelled", body = crate::error::ApiError)
    )
)]
pub async fn retry_download(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.downloader.retry(TaskId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /downloads/:id - Cancel a task and delete its partial output
#[utoipa::path(
    delete,
    path = "/api/v1/downloads/{id}",
    tag = "downloads",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task cancelled"),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
        (status = 409, description = "Task already finished", body = crate::error::ApiError)
    )
)]
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.downloader.cancel(TaskId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
