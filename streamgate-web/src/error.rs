//! Mapping of pipeline errors onto HTTP responses.

use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use streamgate_core::StreamGateError;

/// Error returned by every handler.
///
/// Rendered as a JSON body `{error, reason, message, status_code, path?}`
/// where `reason` is a stable machine-readable tag.
#[derive(Debug, thiserror::Error)]
#[error("{error}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub reason: &'static str,
    pub message: String,
    pub path: Option<String>,
    pub retry_after: Option<Duration>,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str, reason: &'static str, message: String) -> Self {
        Self {
            status,
            error,
            reason,
            message,
            path: None,
            retry_after: None,
        }
    }

    /// Relay target answered with something other than media.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            "Upstream error",
            "upstream_unavailable",
            message.into(),
        )
    }

    /// Relay target is larger than the configured download ceiling.
    pub fn too_large(size: u64, limit: u64) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Download too large",
            "download_too_large",
            format!("Stream is {size} bytes, the limit is {limit} bytes"),
        )
    }

    /// Attaches the request path to the response body.
    pub fn at(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }
}

impl From<StreamGateError> for ApiError {
    fn from(error: StreamGateError) -> Self {
        let message = error.user_message();
        match error {
            StreamGateError::Validation { .. } => Self::new(
                StatusCode::BAD_REQUEST,
                "Validation error",
                "invalid_request",
                message,
            ),
            StreamGateError::RateLimited { retry_after, .. } => Self {
                retry_after,
                ..Self::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "Rate limit exceeded",
                    "rate_limited",
                    message,
                )
            },
            StreamGateError::Resolution(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Extraction failed",
                "resolution_failed",
                message,
            ),
            StreamGateError::Probe(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                "Extractor error",
                "extractor_failed",
                message,
            ),
            StreamGateError::Configuration { .. } | StreamGateError::Io(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "internal",
                message,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.error,
            "reason": self.reason,
            "message": self.message,
            "status_code": self.status.as_u16(),
        });
        if let Some(path) = &self.path {
            body["path"] = json!(path);
        }

        let mut response = (self.status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after {
            let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds.max(1)));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let error = ApiError::from(StreamGateError::validation("Invalid YouTube URL"));
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.reason, "invalid_request");
        assert_eq!(error.message, "Invalid YouTube URL");
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let error = ApiError::from(StreamGateError::RateLimited {
            client: "10.0.0.1".to_string(),
            retry_after: Some(Duration::from_millis(2_300)),
        });
        let response = error.at("/stream/audio").into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }

    #[test]
    fn test_configuration_is_internal() {
        let error = ApiError::from(StreamGateError::Configuration {
            reason: "zero window".to_string(),
        });
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message, "Configuration error occurred");
    }
}
