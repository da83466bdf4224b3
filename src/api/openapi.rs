//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time by utoipa from the handler annotations.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-dl REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "REST API for queueing media downloads, controlling their lifecycle and streaming live progress",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        // Downloads
        crate::api::routes::list_downloads,
        crate::api::routes::create_download,
        crate::api::routes::get_download,
        crate::api::routes::get_download_progress,
        crate::api::routes::pause_download,
        crate::api::routes::resume_download,
        crate::api::routes::retry_download,
        crate::api::routes::cancel_download,

        // System
        crate::api::routes::health_check,
        crate::api::routes::engine_status,
        crate::api::routes::list_platforms,
        crate::api::routes::validate_url,
        crate::api::routes::get_metadata,
        crate::api::routes::list_formats,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::TaskId,
        crate::types::Status,
        crate::types::Platform,
        crate::types::VideoQuality,
        crate::types::DownloadOptions,
        crate::types::Progress,
        crate::types::MediaMetadata,
        crate::types::TaskRecord,
        crate::types::TaskPage,
        crate::types::StatusSnapshot,
        crate::types::UrlValidation,
        crate::types::MediaFormat,
        crate::types::MediaInfo,
        crate::types::Event,

        crate::api::routes::CreateDownloadRequest,
        crate::api::routes::CreateDownloadResponse,
        crate::api::routes::ValidateRequest,
        crate::api::routes::EngineStatus,
        crate::api::routes::PlatformList,
        crate::api::routes::FormatList,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Download tasks - Create, list, pause, resume, retry and cancel"),
        (name = "system", description = "System endpoints - Health, status, platforms, URL validation, metadata, events"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/api/v1/downloads",
            "/api/v1/downloads/{id}",
            "/api/v1/downloads/{id}/progress",
            "/api/v1/downloads/{id}/pause",
            "/api/v1/downloads/{id}/resume",
            "/api/v1/downloads/{id}/retry",
            "/api/v1/health",
            "/api/v1/status",
            "/api/v1/platforms",
            "/api/v1/validate",
            "/api/v1/metadata",
            "/api/v1/formats",
            "/api/v1/events",
        ] {
            assert!(paths.contains(&expected), "missing path {expected}");
        }
    }

    #[test]
    fn spec_has_schemas_and_tags() {
        let spec = ApiDoc::openapi();

        let components = spec.components.unwrap();
        assert!(components.schemas.contains_key("TaskRecord"));
        assert!(components.schemas.contains_key("ApiError"));

        let tags: Vec<String> = spec.tags.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(tags, vec!["downloads".to_string(), "system".to_string()]);
    }

    #[test]
    fn spec_serializes_as_openapi_3() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(json["info"]["title"], "media-dl REST API");
        assert!(json["openapi"].as_str().unwrap().starts_with("3."));
    }
}
