//! Manifest route handlers: DASH MPD and HLS master playlists.

use axum::extract::{Path, State};
use axum::response::IntoResponse;

use strand_media::{generate_hls, generate_mpd};

use crate::blob::read_with_timeout;
use crate::context::AppContext;
use crate::error::AppError;
use crate::playlist_spec::PlaylistSpec;
use crate::routes::{media_response, MIME_DASH, MIME_HLS};

/// GET /dash_manifest/{bucket}/{*key}
///
/// If the stored object already is an MPD it is passed through verbatim;
/// otherwise it is treated as a playlist description and the manifest is
/// generated from it.
pub async fn dash_manifest(
    State(ctx): State<AppContext>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let reader = ctx.resolver.find_bucket(&bucket)?;
    let blob = read_with_timeout(reader.as_ref(), &key, 0, 0, ctx.read_timeout()).await?;

    tracing::info!("dash_manifest: bucket: {bucket}, key: {key}, stored: {}", blob.len());

    let body = if looks_like_xml(&blob) {
        blob.to_vec()
    } else {
        let spec = PlaylistSpec::parse(&blob)?;
        let playlist = spec
            .load(&bucket, &reader, &ctx.media_cache, ctx.read_timeout())
            .await?;
        generate_mpd(&playlist)?.into_bytes()
    };

    Ok(media_response(MIME_DASH, body))
}

/// GET /hls_manifest/{bucket}/{*key}
///
/// The HLS master playlist for the playlist description stored at `key`.
/// An object that already is an M3U8 document is passed through.
pub async fn hls_manifest(
    State(ctx): State<AppContext>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let reader = ctx.resolver.find_bucket(&bucket)?;
    let blob = read_with_timeout(reader.as_ref(), &key, 0, 0, ctx.read_timeout()).await?;

    tracing::info!("hls_manifest: bucket: {bucket}, key: {key}, stored: {}", blob.len());

    let body = if blob.starts_with(b"#EXTM3U") {
        blob.to_vec()
    } else {
        let spec = PlaylistSpec::parse(&blob)?;
        let playlist = spec
            .load(&bucket, &reader, &ctx.media_cache, ctx.read_timeout())
            .await?;
        generate_hls(&playlist)?.master.into_bytes()
    };

    Ok(media_response(MIME_HLS, body))
}

/// GET /stream/{bucket}/{key}/playlist/{repr}
///
/// The variant playlist of one representation.
pub async fn hls_variant(
    State(ctx): State<AppContext>,
    Path((bucket, key, repr_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let reader = ctx.resolver.find_bucket(&bucket)?;
    let blob = read_with_timeout(reader.as_ref(), &key, 0, 0, ctx.read_timeout()).await?;
    let spec = PlaylistSpec::parse(&blob)?;
    let playlist = spec
        .load(&bucket, &reader, &ctx.media_cache, ctx.read_timeout())
        .await?;

    let manifests = generate_hls(&playlist)?;
    let variant = manifests
        .variants
        .get(&repr_id)
        .ok_or_else(|| strand_core::Error::not_found("representation", &repr_id))?;

    Ok(media_response(MIME_HLS, variant.clone().into_bytes()))
}

fn looks_like_xml(data: &[u8]) -> bool {
    let trimmed = data.trim_ascii_start();
    trimmed.starts_with(b"<?xml") || trimmed.starts_with(b"<MPD")
}
