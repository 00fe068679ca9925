//! strand-media: the media engine.
//!
//! Maps `(track, time window)` requests onto exact sample and byte ranges of
//! stored ISO-BMFF assets and renders them for adaptive streaming.
//!
//! # Modules
//!
//! - [`media`] - Track/sample metadata model and the DTS sample index
//! - [`playlist`] - Presentation model: periods, adaptations, representations
//! - [`fmp4`] - Fragmented MP4 serialization: init and media segments
//! - [`dash`] - DASH MPD generation
//! - [`hls`] - HLS master and variant playlist generation

pub mod dash;
pub mod fmp4;
pub mod hls;
pub mod media;
pub mod playlist;

// Re-export commonly used items at the crate root.
pub use dash::generate_mpd;
pub use fmp4::{build_init, build_segment, Codec, WriterOptions};
pub use hls::{generate_hls, HlsManifests};
pub use media::{AudioParams, Media, MediaType, Sample, Track, VideoParams};
pub use playlist::{
    segment_count, Adaptation, Period, Playlist, PlaylistBuilder, Representation, TrackRef,
    TrackRequest,
};
