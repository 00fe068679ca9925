//! Streaming route handlers: init segments and fabricated media segments.
//!
//! The segment path is the heart of the server: map the requested time
//! window to a sample range, read exactly that byte range from the blob
//! store, and wrap it as an fMP4 fragment.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use strand_core::{Error, Result};
use strand_media::{build_init, build_segment, Track, WriterOptions};

use crate::blob::{read_with_timeout, BlobReader};
use crate::context::AppContext;
use crate::error::AppError;
use crate::playlist_spec::PlaylistSpec;
use crate::routes::{media_response, MIME_MP4, MIME_SEGMENT};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Present (any value) for an init-segment request.
    pub init: Option<String>,
    /// Window start in whole seconds of content time.
    pub time: Option<u64>,
    /// Alternative to `time`: segment number, `time = number * chunk`.
    pub number: Option<u64>,
}

/// GET /dash_stream/{bucket}/{*key}?init=1 | ?time=N | ?number=N
///
/// Raw asset streaming: serves track 1 of the media stored at `key`, with
/// metadata from `<key>.meta`.
pub async fn dash_stream(
    State(ctx): State<AppContext>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<StreamQuery>,
) -> std::result::Result<impl IntoResponse, AppError> {
    let reader = ctx.resolver.find_bucket(&bucket)?;
    let media = ctx
        .media_cache
        .get_or_load(&bucket, &key, &reader, ctx.read_timeout())
        .await?;
    // Raw streaming always serves the first track.
    let track = media.track_by_number(1)?;

    if query.init.is_some() {
        tracing::info!("dash_stream: bucket: {bucket}, key: {key}, init");
        let body = build_init(track)?;
        return Ok(media_response(MIME_MP4, body));
    }

    let chunk = ctx.chunk_duration_sec();
    let time = match (query.time, query.number) {
        (Some(time), _) => time,
        (None, Some(number)) => number * chunk,
        (None, None) => {
            return Err(Error::Validation(
                "request is neither an init nor a data request".into(),
            )
            .into())
        }
    };

    tracing::info!("dash_stream: bucket: {bucket}, key: {key}, time: {time}");

    let sequence = (time / chunk) as u32 + 1;
    let body = fabricate_segment(&ctx, &reader, &key, track, time, chunk, sequence).await?;
    Ok(media_response(MIME_SEGMENT, body))
}

/// GET /stream/{bucket}/{key}/init/{repr}
///
/// Init segment of a representation from the playlist description at `key`.
pub async fn repr_init(
    State(ctx): State<AppContext>,
    Path((bucket, key, repr_id)): Path<(String, String, String)>,
) -> std::result::Result<impl IntoResponse, AppError> {
    let reader = ctx.resolver.find_bucket(&bucket)?;
    let blob = read_with_timeout(reader.as_ref(), &key, 0, 0, ctx.read_timeout()).await?;
    let spec = PlaylistSpec::parse(&blob)?;
    let playlist = spec
        .load(&bucket, &reader, &ctx.media_cache, ctx.read_timeout())
        .await?;

    let repr = playlist.representation(&repr_id)?;
    let request = repr
        .tracks
        .first()
        .ok_or_else(|| Error::not_found("track request", &repr_id))?;

    // The builder guarantees later track requests share init parameters, so
    // the first one describes them all.
    let body = build_init(request.track())?;
    Ok(media_response(MIME_MP4, body))
}

/// GET /stream/{bucket}/{key}/play/{repr}/{number}
///
/// One media segment of a representation; `number` is the global segment
/// number across the representation's concatenated track requests.
pub async fn repr_play(
    State(ctx): State<AppContext>,
    Path((bucket, key, repr_id, number)): Path<(String, String, String, u64)>,
) -> std::result::Result<impl IntoResponse, AppError> {
    let reader = ctx.resolver.find_bucket(&bucket)?;
    let blob = read_with_timeout(reader.as_ref(), &key, 0, 0, ctx.read_timeout()).await?;
    let spec = PlaylistSpec::parse(&blob)?;
    let playlist = spec
        .load(&bucket, &reader, &ctx.media_cache, ctx.read_timeout())
        .await?;

    let repr = playlist.representation(&repr_id)?;
    let repr_spec = spec.representation(&repr_id)?;
    let chunk = playlist.chunk_duration_sec.max(1);

    // Locate the track request owning this segment number; its spec entry
    // carries the storage key the sample bytes live under.
    let owner = repr
        .tracks
        .iter()
        .zip(repr_spec.tracks.iter())
        .find(|(tr, _)| {
            number >= tr.start_number && number < tr.start_number + tr.segment_count(chunk)
        });
    let Some((request, request_spec)) = owner else {
        return Err(Error::Range(format!(
            "segment {number} is outside representation {repr_id}"
        ))
        .into());
    };

    let local_time = (number - request.start_number) * chunk;
    tracing::info!(
        "play: bucket: {bucket}, repr: {repr_id}, segment: {number}, \
         asset: {}, local time: {local_time}s",
        request_spec.key
    );

    let body = fabricate_segment(
        &ctx,
        &reader,
        &request_spec.key,
        request.track(),
        local_time,
        chunk,
        number as u32 + 1,
    )
    .await?;
    Ok(media_response(MIME_SEGMENT, body))
}

/// Map `[time, time + chunk)` onto samples, read exactly that byte range,
/// and wrap it as an fMP4 segment.
async fn fabricate_segment(
    ctx: &AppContext,
    reader: &Arc<dyn BlobReader>,
    data_key: &str,
    track: &Track,
    time_sec: u64,
    chunk_sec: u64,
    sequence: u32,
) -> Result<Vec<u8>> {
    let timescale = track.timescale as u64;
    let dts_start = time_sec * timescale;
    let dts_end = (time_sec + chunk_sec) * timescale;

    let pos_start = track.sample_position_from_dts(dts_start).ok_or_else(|| {
        Error::Range(format!(
            "time {time_sec}s (dts {dts_start}) is outside track {}",
            track.number
        ))
    })?;
    // A window past the tail clamps to the last sample; the final segment of
    // a presentation is simply short.
    let pos_end = track
        .sample_end_position(dts_end)
        .unwrap_or(track.samples.len() - 1);

    let (start_offset, length) = track.byte_range(pos_start, pos_end);

    tracing::debug!(
        "segment window: track: {}, samples: [{pos_start}, {pos_end}], \
         dts: [{dts_start}, {dts_end}), bytes: [{start_offset}, {})",
        track.number,
        start_offset + length
    );

    let data = read_with_timeout(
        reader.as_ref(),
        data_key,
        start_offset,
        length,
        ctx.read_timeout(),
    )
    .await?;

    let opt = WriterOptions {
        pos_start,
        pos_end,
        dts_start,
        dts_end,
        dts_start_absolute: dts_start,
        // One fragment per segment: the split threshold covers the window.
        fragment_duration: chunk_sec * timescale,
        sequence_number: sequence,
    };

    build_segment(track, &opt, &data)
}
