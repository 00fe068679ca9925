//! Fragmented MP4 (ISO BMFF) serialization.
//!
//! - Init segments: `ftyp` + `moov` describing one track.
//! - Media segments: `moof` + `mdat` wrapping a slice of stored samples.

pub(crate) mod boxes;
mod writer;

pub use writer::{build_init, build_segment, Codec, WriterOptions};
