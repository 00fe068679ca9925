//! The playlist model: periods, adaptations, representations, and
//! track-requests, plus the builder that assembles them.
//!
//! A [`Playlist`] describes one presentation to expose over DASH and HLS.
//! Representations are kept in a `BTreeMap` so manifest emission is
//! deterministic for identical inputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use strand_core::{Error, Result};

use crate::media::{Media, MediaType, Track};

/// Number of segments a duration spans at the given chunk size.
pub fn segment_count(duration_msec: u64, chunk_duration_sec: u64) -> u64 {
    let chunk_msec = 1000 * chunk_duration_sec.max(1);
    duration_msec.div_ceil(chunk_msec)
}

/// A reference into a loaded [`Media`]: the source of one track-request.
#[derive(Clone)]
pub struct TrackRef {
    pub media: Arc<Media>,
    /// 1-based track number within the media.
    pub track_number: u32,
}

impl TrackRef {
    pub fn new(media: Arc<Media>, track_number: u32) -> Self {
        Self {
            media,
            track_number,
        }
    }
}

/// One slice of a representation's virtual timeline, backed by a track of a
/// loaded media. Consecutive track-requests of a representation concatenate
/// end-to-end.
#[derive(Clone)]
pub struct TrackRequest {
    pub media: Arc<Media>,
    /// 1-based track number within `media`.
    pub requested_track_number: u32,
    /// First global segment number this request contributes.
    pub start_number: u64,
    pub duration_msec: u64,
}

impl TrackRequest {
    /// The effective track. The builder validated the number, so indexing is
    /// safe here.
    pub fn track(&self) -> &Track {
        &self.media.tracks[(self.requested_track_number - 1) as usize]
    }

    /// Segments contributed by this request.
    pub fn segment_count(&self, chunk_duration_sec: u64) -> u64 {
        segment_count(self.duration_msec, chunk_duration_sec)
    }
}

/// One switchable rendition of the presentation.
#[derive(Clone)]
pub struct Representation {
    pub id: String,
    /// Total duration of the concatenated track-requests.
    pub duration_msec: u64,
    pub tracks: Vec<TrackRequest>,
}

impl Representation {
    /// Resolve a global segment number to the owning track-request and the
    /// segment index local to it.
    pub fn request_for_segment(
        &self,
        number: u64,
        chunk_duration_sec: u64,
    ) -> Option<(&TrackRequest, u64)> {
        for tr in &self.tracks {
            let count = tr.segment_count(chunk_duration_sec);
            if number >= tr.start_number && number < tr.start_number + count {
                return Some((tr, number - tr.start_number));
            }
        }
        None
    }
}

/// A group of representations a player switches between.
#[derive(Clone)]
pub struct Adaptation {
    pub repr_ids: Vec<String>,
}

/// An ordered run of adaptations.
#[derive(Clone)]
pub struct Period {
    pub adaptations: Vec<Adaptation>,
    pub duration_msec: u64,
}

/// A full presentation description.
#[derive(Clone)]
pub struct Playlist {
    pub base_url: String,
    /// Uniform segment duration in whole seconds.
    pub chunk_duration_sec: u64,
    pub duration_msec: u64,
    pub periods: Vec<Period>,
    pub repr: BTreeMap<String, Representation>,
}

impl Playlist {
    pub fn representation(&self, id: &str) -> Result<&Representation> {
        self.repr
            .get(id)
            .ok_or_else(|| Error::not_found("representation", id))
    }
}

/// Assembles representations and adaptations into a single-period
/// [`Playlist`], enforcing the switching preconditions at build time.
pub struct PlaylistBuilder {
    base_url: String,
    chunk_duration_sec: u64,
    adaptations: Vec<Adaptation>,
    repr: BTreeMap<String, Representation>,
}

impl PlaylistBuilder {
    pub fn new(base_url: impl Into<String>, chunk_duration_sec: u64) -> Self {
        Self {
            base_url: base_url.into(),
            chunk_duration_sec,
            adaptations: Vec::new(),
            repr: BTreeMap::new(),
        }
    }

    /// Add one adaptation set. Each entry is `(representation id, track
    /// references)`; the references concatenate end-to-end into that
    /// representation's timeline.
    pub fn add_adaptation(&mut self, reprs: Vec<(&str, Vec<TrackRef>)>) -> Result<()> {
        let mut repr_ids = Vec::with_capacity(reprs.len());
        let mut adaptation_key: Option<(MediaType, String, u32)> = None;

        for (id, refs) in reprs {
            let repr = self.build_representation(id, refs)?;

            // Representations within one adaptation must be freely
            // switchable: same media type, codec family, and timescale.
            if let Some(first) = repr.tracks.first() {
                let track = first.track();
                let family = codec_family(&track.codec).to_string();
                let key = (track.media_type, family, track.timescale);
                match &adaptation_key {
                    None => adaptation_key = Some(key),
                    Some(existing) if *existing != key => {
                        return Err(Error::incompatible(format!(
                            "representation {id} does not match its adaptation set"
                        )));
                    }
                    Some(_) => {}
                }
            }

            repr_ids.push(repr.id.clone());
            self.repr.insert(repr.id.clone(), repr);
        }

        self.adaptations.push(Adaptation { repr_ids });
        Ok(())
    }

    pub fn build(self) -> Playlist {
        let duration_msec = self
            .repr
            .values()
            .map(|r| r.duration_msec)
            .max()
            .unwrap_or(0);

        Playlist {
            base_url: self.base_url,
            chunk_duration_sec: self.chunk_duration_sec,
            duration_msec,
            periods: vec![Period {
                adaptations: self.adaptations,
                duration_msec,
            }],
            repr: self.repr,
        }
    }

    fn build_representation(&self, id: &str, refs: Vec<TrackRef>) -> Result<Representation> {
        if self.repr.contains_key(id) {
            return Err(Error::incompatible(format!(
                "duplicate representation id {id}"
            )));
        }

        let mut tracks = Vec::with_capacity(refs.len());
        let mut duration_msec = 0u64;
        let mut start_number = 0u64;

        for r in refs {
            let track = r.media.track_by_number(r.track_number)?;

            // Concatenated tracks must not require decoder reinitialization.
            if let Some(prev) = tracks.last() {
                check_continuation(id, track, TrackRequest::track(prev))?;
            }
            let track_duration_msec = track.duration_msec();

            let request = TrackRequest {
                requested_track_number: r.track_number,
                start_number,
                duration_msec: track_duration_msec,
                media: r.media,
            };

            duration_msec += request.duration_msec;
            start_number += request.segment_count(self.chunk_duration_sec);
            tracks.push(request);
        }

        Ok(Representation {
            id: id.to_string(),
            duration_msec,
            tracks,
        })
    }
}

/// The switching family of a codec string: the sample-entry 4CC before the
/// first profile separator (`avc1.640028` -> `avc1`).
fn codec_family(codec: &str) -> &str {
    codec.split('.').next().unwrap_or(codec)
}

/// Tracks concatenated within one representation must share every parameter
/// the init segment bakes in.
fn check_continuation(repr_id: &str, track: &Track, prev: &Track) -> Result<()> {
    if track.media_type != prev.media_type {
        return Err(Error::incompatible(format!(
            "representation {repr_id}: media type changes between track requests"
        )));
    }
    if track.codec != prev.codec {
        return Err(Error::incompatible(format!(
            "representation {repr_id}: codec changes from {} to {}",
            prev.codec, track.codec
        )));
    }
    if track.timescale != prev.timescale || track.media_timescale != prev.media_timescale {
        return Err(Error::incompatible(format!(
            "representation {repr_id}: timescale changes between track requests"
        )));
    }
    if track.audio != prev.audio {
        return Err(Error::incompatible(format!(
            "representation {repr_id}: audio parameters change between track requests"
        )));
    }
    if track.video != prev.video {
        return Err(Error::incompatible(format!(
            "representation {repr_id}: video geometry changes between track requests"
        )));
    }
    if track.codec_private != prev.codec_private {
        return Err(Error::incompatible(format!(
            "representation {repr_id}: codec private data changes between track requests"
        )));
    }
    Ok(())
}
