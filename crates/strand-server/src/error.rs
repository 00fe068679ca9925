//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`strand_core::Error`] via a wrapper so
//! route handlers can return `Result<T, AppError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError(strand_core::Error);

impl From<strand_core::Error> for AppError {
    fn from(e: strand_core::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "request failed");
        }

        let code = match &self.0 {
            strand_core::Error::NotFound { .. } => "not_found",
            strand_core::Error::Range(_) => "range",
            strand_core::Error::Validation(_) => "validation_error",
            strand_core::Error::MalformedMetadata(_) => "malformed_metadata",
            strand_core::Error::IncompatibleTracks(_) => "incompatible_tracks",
            strand_core::Error::CodecUnsupported(_) => "codec_unsupported",
            strand_core::Error::EmptySampleRange => "empty_sample_range",
            strand_core::Error::SampleDataShort { .. } => "sample_data_short",
            strand_core::Error::HlsMultiPeriod => "hls_multiperiod_unsupported",
            strand_core::Error::Io { .. } => "io_error",
            strand_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.0.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::from(strand_core::Error::not_found("bucket", "b9"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn range_produces_400() {
        let err = AppError::from(strand_core::Error::Range("before first sample".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn codec_unsupported_produces_500() {
        let err = AppError::from(strand_core::Error::CodecUnsupported("av01".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
