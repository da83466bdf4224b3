//! Rendering of engine errors as HTTP responses.
//!
//! Every handler returns `crate::Result`; the error side becomes a JSON [`ApiError`] body with
//! the status from [`ToHttpStatus`].

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        (status, Json(ApiError::from(self))).into_response()
    }
}

/// A bare `ApiError` carries no status of its own and renders as 500
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, TaskError};

    async fn body_of(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn task_not_found_renders_404_with_task_id() {
        let response = Error::Task(TaskError::NotFound { id: 123 }).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "task_not_found");
        assert_eq!(api_error.error.details.unwrap()["task_id"], 123);
    }

    #[tokio::test]
    async fn invalid_state_renders_409_with_context() {
        let error = Error::Task(TaskError::InvalidState {
            id: 456,
            operation: "resume".to_string(),
            current_state: "completed".to_string(),
        });
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "invalid_state");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["operation"], "resume");
        assert_eq!(details["current_state"], "completed");
    }

    #[tokio::test]
    async fn unsupported_resource_renders_400() {
        let response = Error::UnsupportedResource("ftp://x".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await.error.code, "unsupported_resource");
    }

    #[tokio::test]
    async fn fetch_failure_renders_502() {
        let response = Error::Fetch(FetchError::Timeout { seconds: 30 }).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_of(response).await.error.code, "fetch_timeout");
    }

    #[tokio::test]
    async fn bare_api_error_defaults_to_500() {
        let response = ApiError::internal("oops").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await.error.message, "oops");
    }
}
