//! System handlers: health, status, platforms, validation, metadata, OpenAPI, events.

use super::{EngineStatus, FormatList, FormatsQuery, MetadataQuery, PlatformList, ValidateRequest};
use crate::api::AppState;
use crate::error::Result;
use crate::hub::{ListenerId, NotificationHub};
use crate::types::Event;
use axum::{
    Json,
    extract::{Query, State},
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /status - Task counts and engine information
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Engine status", body = EngineStatus),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn engine_status(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let downloader = &state.downloader;
    let tasks = downloader.status_snapshot().await?;

    Ok(Json(EngineStatus {
        tasks,
        running: downloader.is_running().await,
        max_concurrent_downloads: downloader.get_config().download.max_concurrent_downloads,
        uptime_seconds: downloader.uptime().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        platforms: downloader.extractors().platforms(),
    }))
}

/// GET /platforms - Platforms with a registered extractor
#[utoipa::path(
    get,
    path = "/api/v1/platforms",
    tag = "system",
    responses(
        (status = 200, description = "Supported platforms", body = PlatformList)
    )
)]
pub async fn list_platforms(State(state): State<AppState>) -> impl IntoResponse {
    Json(PlatformList {
        platforms: state.downloader.extractors().platforms(),
    })
}

/// POST /validate - Check whether a URL can be downloaded
#[utoipa::path(
    post,
    path = "/api/v1/validate",
    tag = "system",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Validation result", body = crate::types::UrlValidation)
    )
)]
pub async fn validate_url(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> impl IntoResponse {
    Json(state.downloader.validate(&request.url))
}

/// GET /metadata - Describe a URL without downloading it
#[utoipa::path(
    get,
    path = "/api/v1/metadata",
    tag = "system",
    params(MetadataQuery),
    responses(
        (status = 200, description = "Title, duration and formats", body = crate::types::MediaInfo),
        (status = 400, description = "No extractor supports the URL", body = crate::error::ApiError),
        (status = 502, description = "The extractor could not describe the URL", body = crate::error::ApiError)
    )
)]
pub async fn get_metadata(
    State(state): State<AppState>,
    Query(query): Query<MetadataQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.downloader.metadata(&query.url).await?))
}

/// GET /formats - Available formats of a URL, optionally limited to a quality
#[utoipa::path(
    get,
    path = "/api/v1/formats",
    tag = "system",
    params(FormatsQuery),
    responses(
        (status = 200, description = "Matching formats", body = FormatList),
        (status = 400, description = "No extractor supports the URL", body = crate::error::ApiError),
        (status = 502, description = "The extractor could not describe the URL", body = crate::error::ApiError)
    )
)]
pub async fn list_formats(
    State(state): State<AppState>,
    Query(query): Query<FormatsQuery>,
) -> Result<impl IntoResponse> {
    let formats = state.downloader.formats(&query.url, query.quality).await?;
    Ok(Json(FormatList {
        url: query.url,
        formats,
    }))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/api/v1/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI 3.1 specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// Hub subscription as a stream; unsubscribes when the client goes away
struct ListenerStream {
    events: ReceiverStream<Event>,
    hub: Arc<NotificationHub>,
    id: ListenerId,
}

impl Stream for ListenerStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl Drop for ListenerStream {
    fn drop(&mut self) {
        if self.hub.unsubscribe(self.id) {
            tracing::debug!(listener_id = self.id.0, "SSE client disconnected");
        }
    }
}

/// GET /events - Server-sent events stream
///
/// Each event is sent with its type (`progress` or `status`) as the SSE event name and the
/// JSON-encoded event as data. A client that falls behind is dropped by the hub and its
/// stream ends.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "system",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let subscription = state.downloader.subscribe();
    let id = subscription.id();
    tracing::debug!(listener_id = id.0, "SSE client connected");

    let stream = ListenerStream {
        events: subscription.into_stream(),
        hub: state.downloader.hub(),
        id,
    };

    let sse_stream = stream.filter_map(|event| match serde_json::to_string(&event) {
        Ok(data) => Some(Ok(SseEvent::default().event(event.event_type()).data(data))),
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize event");
            None
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}
