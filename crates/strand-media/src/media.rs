//! The media metadata model: tracks, samples, and the DTS sample index.
//!
//! A [`Media`] is the parsed form of the side-car metadata blob written at
//! ingest time (bincode-encoded). It is immutable after decoding and shared
//! behind an `Arc` by everything that slices the asset.

use serde::{Deserialize, Serialize};

use strand_core::{Error, Result};

/// Sample flag bit: random-access point (sync sample).
pub const SAMPLE_FLAG_RAP: u32 = 0x1;

/// Media type of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Audio,
    Video,
    Other,
}

/// Audio-specific track parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Video-specific track parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_denum: u32,
    pub sar_w: u32,
    pub sar_h: u32,
}

/// One coded access unit.
///
/// `offset`/`length` locate the sample payload within the stored asset blob.
/// Timing fields are in the owning track's timescale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub dts: u64,
    /// pts = dts + cts_offset.
    pub cts_offset: i32,
    pub duration: u32,
    pub offset: u64,
    pub length: u32,
    pub flags: u32,
}

impl Sample {
    /// Whether decoding may begin at this sample.
    pub fn is_rap(&self) -> bool {
        self.flags & SAMPLE_FLAG_RAP != 0
    }
}

/// One elementary stream of an ingested asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: u32,
    /// Stable 1-based index used in manifests.
    pub number: u32,
    pub media_type: MediaType,
    /// Codec parameter string in DASH/HLS form (e.g. `avc1.640028`).
    pub codec: String,
    pub mime_type: String,
    /// Peak bandwidth in bits per second.
    pub bandwidth: u64,
    /// Ticks per second for this track's DTS/PTS.
    pub timescale: u32,
    /// Timescale used for manifest emission; normally equal to `timescale`.
    pub media_timescale: u32,
    /// Track length in `timescale` ticks.
    pub duration: u64,
    pub audio: Option<AudioParams>,
    pub video: Option<VideoParams>,
    /// Opaque codec configuration (avcC / hvcC / AudioSpecificConfig bytes),
    /// carried into the init segment.
    pub codec_private: Vec<u8>,
    /// Samples ordered by DTS non-decreasing.
    pub samples: Vec<Sample>,
}

impl Track {
    /// Largest sample index whose DTS is at or below `dts`, for locating the
    /// start of a time window. When several samples share exactly `dts`, the
    /// lowest index of the run is returned so the run is never split across
    /// adjacent windows. `None` when the track is empty or `dts` precedes the
    /// first sample.
    pub fn sample_position_from_dts(&self, dts: u64) -> Option<usize> {
        let first = self.samples.first()?;
        if dts < first.dts {
            return None;
        }
        let lower = self.samples.partition_point(|s| s.dts < dts);
        if lower < self.samples.len() && self.samples[lower].dts == dts {
            Some(lower)
        } else {
            Some(lower - 1)
        }
    }

    /// Largest sample index whose DTS is strictly below `dts`, for locating
    /// the end of a `[start, end)` time window. A sample sitting exactly on
    /// `dts` belongs to the next window. `None` when no sample precedes
    /// `dts`; callers treat that (and past-the-end windows) by clamping to
    /// the last sample.
    pub fn sample_end_position(&self, dts: u64) -> Option<usize> {
        self.samples.partition_point(|s| s.dts < dts).checked_sub(1)
    }

    /// Byte range in the stored asset covering samples
    /// `[pos_start, pos_end]` (inclusive). Returns `(offset, length)`.
    pub fn byte_range(&self, pos_start: usize, pos_end: usize) -> (u64, u64) {
        let start = &self.samples[pos_start];
        let end = &self.samples[pos_end];
        let off = start.offset;
        (off, end.offset + end.length as u64 - off)
    }

    /// Track duration in milliseconds, using the manifest timescale.
    pub fn duration_msec(&self) -> u64 {
        self.duration * 1000 / self.media_timescale as u64
    }
}

/// Top-level descriptor of an ingested asset. Track numbering is 1-based and
/// dense as produced by ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub tracks: Vec<Track>,
}

impl Media {
    /// Decode a side-car metadata blob and validate its invariants.
    pub fn decode(data: &[u8]) -> Result<Media> {
        let media: Media = bincode::deserialize(data)
            .map_err(|e| Error::malformed(format!("metadata decode: {e}")))?;
        media.validate()?;
        Ok(media)
    }

    /// Serialize into the side-car format. The companion ingest tool writes
    /// exactly this encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Internal(format!("metadata encode: {e}")))
    }

    /// Look up a track by its 1-based manifest number.
    pub fn track_by_number(&self, number: u32) -> Result<&Track> {
        let idx = number
            .checked_sub(1)
            .map(|n| n as usize)
            .filter(|&n| n < self.tracks.len())
            .ok_or_else(|| Error::not_found("track", number))?;
        Ok(&self.tracks[idx])
    }

    fn validate(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(Error::malformed("no tracks"));
        }

        for track in &self.tracks {
            if track.timescale == 0 {
                return Err(Error::malformed(format!(
                    "track {}: timescale is zero",
                    track.number
                )));
            }
            if track.media_timescale == 0 {
                return Err(Error::malformed(format!(
                    "track {}: media timescale is zero",
                    track.number
                )));
            }

            let mut duration_sum: u64 = 0;
            for pair in track.samples.windows(2) {
                if pair[1].dts < pair[0].dts {
                    return Err(Error::malformed(format!(
                        "track {}: dts not monotonic",
                        track.number
                    )));
                }
                if pair[1].offset < pair[0].offset {
                    return Err(Error::malformed(format!(
                        "track {}: sample offsets not monotonic",
                        track.number
                    )));
                }
            }
            for s in &track.samples {
                duration_sum += s.duration as u64;
            }
            if duration_sum > track.duration {
                return Err(Error::malformed(format!(
                    "track {}: sample durations exceed track duration",
                    track.number
                )));
            }
        }

        Ok(())
    }
}
