//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] - Task creation, queries and lifecycle control
//! - [`system`] - Health, status, platforms, URL validation, metadata, events, OpenAPI

use crate::types::{DownloadOptions, MediaFormat, Platform, Status, StatusSnapshot, VideoQuality};
use serde::{Deserialize, Serialize};

mod downloads;
mod system;

// Re-export all handlers so `routes::function_name` works from the router
pub use downloads::*;
pub use system::*;

/// Default page size for GET /downloads
pub const DEFAULT_PER_PAGE: u32 = 50;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateDownloadRequest {
    /// Media page or direct file URL
    pub url: String,
    /// Download preferences
    #[serde(default)]
    pub options: DownloadOptions,
}

/// Query parameters for GET /downloads
#[derive(Debug, Default, Deserialize, Serialize, utoipa::IntoParams)]
pub struct ListDownloadsQuery {
    /// Only tasks in this status
    pub status: Option<Status>,
    /// 1-based page number (default: 1)
    pub page: Option<u32>,
    /// Page size, 1 to 500 (default: 50)
    pub per_page: Option<u32>,
}

/// Request body for POST /validate
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ValidateRequest {
    /// URL to check
    pub url: String,
}

/// Query parameters for GET /metadata
#[derive(Debug, Deserialize, Serialize, utoipa::IntoParams)]
pub struct MetadataQuery {
    /// Media page or direct file URL
    pub url: String,
}

/// Query parameters for GET /formats
#[derive(Debug, Deserialize, Serialize, utoipa::IntoParams)]
pub struct FormatsQuery {
    /// Media page or direct file URL
    pub url: String,
    /// Only formats eligible under this quality
    pub quality: Option<VideoQuality>,
}

/// Response body for GET /formats
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FormatList {
    /// URL that was described
    pub url: String,
    /// Matching formats
    pub formats: Vec<MediaFormat>,
}

/// Response body for POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateDownloadResponse {
    /// Identifier of the new task
    pub id: i64,
    /// Platform of the extractor that accepted the URL
    pub platform: Option<Platform>,
    /// Initial status (always `pending`)
    pub status: Status,
}

/// Response body for GET /status
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct EngineStatus {
    /// Task counts by lifecycle state
    #[serde(flatten)]
    pub tasks: StatusSnapshot,
    /// Whether the control loop is admitting work
    pub running: bool,
    /// Configured concurrency limit
    pub max_concurrent_downloads: usize,
    /// Seconds since the engine was constructed
    pub uptime_seconds: u64,
    /// Crate version
    pub version: String,
    /// Platforms with a registered extractor, in dispatch order
    pub platforms: Vec<Platform>,
}

/// Response body for GET /platforms
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct PlatformList {
    /// Platforms with a registered extractor, in dispatch order
    pub platforms: Vec<Platform>,
}
