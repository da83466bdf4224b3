//! REST API server module
//!
//! Exposes the engine over HTTP: task creation and control, paginated listing, URL
//! validation, and a server-sent events stream of progress and status changes.

use crate::{Config, MediaDownloader, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Prefix every API route is nested under
pub const API_PREFIX: &str = "/api/v1";

/// Create the API router with all route definitions
///
/// # Routes (under `/api/v1`)
///
/// ## Downloads
/// - `GET /downloads` - List tasks (`status`, `page`, `per_page`)
/// - `POST /downloads` - Create a task
/// - `GET /downloads/:id` - Get one task
/// - `DELETE /downloads/:id` - Cancel a task
/// - `GET /downloads/:id/progress` - Progress of one task
/// - `POST /downloads/:id/pause` - Pause
/// - `POST /downloads/:id/resume` - Resume
/// - `POST /downloads/:id/retry` - Retry a failed or cancelled task
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /status` - Task counts, uptime, version, platforms
/// - `GET /platforms` - Supported platforms
/// - `POST /validate` - Check a URL
/// - `GET /metadata` - Describe a URL (`url`)
/// - `GET /formats` - Available formats of a URL (`url`, `quality`)
/// - `GET /events` - Server-sent events stream
/// - `GET /openapi.json` - OpenAPI specification
///
/// Swagger UI is served at `/swagger-ui` when enabled.
pub fn create_router(downloader: Arc<MediaDownloader>, config: Arc<Config>) -> Router {
    let state = AppState::new(downloader, config.clone());

    let api = Router::new()
        // Downloads
        .route(
            "/downloads",
            get(routes::list_downloads).post(routes::create_download),
        )
        .route(
            "/downloads/:id",
            get(routes::get_download).delete(routes::cancel_download),
        )
        .route("/downloads/:id/progress", get(routes::get_download_progress))
        .route("/downloads/:id/pause", post(routes::pause_download))
        .route("/downloads/:id/resume", post(routes::resume_download))
        .route("/downloads/:id/retry", post(routes::retry_download))
        // System
        .route("/health", get(routes::health_check))
        .route("/status", get(routes::engine_status))
        .route("/platforms", get(routes::list_platforms))
        .route("/validate", post(routes::validate_url))
        .route("/metadata", get(routes::get_metadata))
        .route("/formats", get(routes::list_formats))
        .route("/events", get(routes::event_stream))
        .route("/openapi.json", get(routes::openapi_spec))
        .with_state(state);

    let router = Router::new().nest(API_PREFIX, api);

    // Swagger UI reuses the spec served at /api/v1/openapi.json
    let router = if config.api.swagger_ui {
        router.merge(
            SwaggerUi::new("/swagger-ui")
                .url(format!("{API_PREFIX}/openapi.json"), ApiDoc::openapi()),
        )
    } else {
        router
    };

    let router = router.layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer for the configured origins ("*" or an empty list allows any origin)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let allowed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server on the configured bind address.
///
/// Runs until the server fails; embedders usually spawn it with
/// [`MediaDownloader::spawn_api_server`].
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, MediaDownloader};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(MediaDownloader::new((*config).clone()).await?);
/// downloader.start().await?;
///
/// media_dl::api::start_api_server(downloader, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(downloader: Arc<MediaDownloader>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;
    tracing::info!(address = %bind_address, "starting API server");

    let app = create_router(downloader, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;
    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
