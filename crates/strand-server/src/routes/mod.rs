//! HTTP route handlers.

pub mod health;
pub mod manifest;
pub mod stream;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Build a media response: explicit Content-Length plus the permissive CORS
/// headers players expect on manifest and segment bodies.
pub(crate) fn media_response(content_type: &'static str, body: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_LENGTH, HeaderValue::from(body.len())),
            (
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            ),
        ],
        body,
    )
        .into_response()
}

/// MIME type for manifest and segment payloads.
pub(crate) const MIME_DASH: &str = "application/dash+xml";
pub(crate) const MIME_HLS: &str = "application/vnd.apple.mpegurl";
pub(crate) const MIME_MP4: &str = "video/mp4";
pub(crate) const MIME_SEGMENT: &str = "video/iso.segment";
