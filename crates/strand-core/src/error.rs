//! Unified error type for the strand application.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for the HTTP layer to derive a status code via
//! [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in strand.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "bucket", "representation").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A requested time window could not be mapped to samples.
    #[error("Range error: {0}")]
    Range(String),

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The side-car metadata blob failed to decode or violates invariants.
    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    /// Representation/adaptation construction preconditions were violated.
    #[error("Incompatible tracks: {0}")]
    IncompatibleTracks(String),

    /// The fragment writer was asked for a codec it cannot describe.
    #[error("Unsupported codec: {0}")]
    CodecUnsupported(String),

    /// The fragment writer was given an empty sample range.
    #[error("Empty sample range")]
    EmptySampleRange,

    /// The provided sample buffer is shorter than the sample range requires.
    #[error("Sample data too short: need {need} bytes, got {got}")]
    SampleDataShort {
        /// Bytes required by the sample range.
        need: u64,
        /// Bytes actually provided.
        got: u64,
    },

    /// HLS generation was attempted over a multi-period playlist.
    #[error("HLS does not support multi-period playlists")]
    HlsMultiPeriod,

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Range(_) => 400,
            Error::Validation(_) => 400,
            Error::EmptySampleRange => 400,
            Error::MalformedMetadata(_) => 500,
            Error::IncompatibleTracks(_) => 500,
            Error::CodecUnsupported(_) => 500,
            Error::SampleDataShort { .. } => 500,
            Error::HlsMultiPeriod => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::MalformedMetadata`].
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedMetadata(message.into())
    }

    /// Convenience constructor for [`Error::IncompatibleTracks`].
    pub fn incompatible(message: impl Into<String>) -> Self {
        Error::IncompatibleTracks(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("bucket", "b1");
        assert_eq!(err.to_string(), "bucket not found: b1");
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn range_display() {
        let err = Error::Range("time 99 before first sample".into());
        assert_eq!(err.http_status(), 400);
        assert!(err.to_string().contains("time 99"));
    }

    #[test]
    fn malformed_metadata_display() {
        let err = Error::malformed("track 2: dts not monotonic");
        assert_eq!(err.to_string(), "Malformed metadata: track 2: dts not monotonic");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn incompatible_tracks_display() {
        let err = Error::incompatible("codec mismatch in representation v0");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn codec_unsupported_display() {
        let err = Error::CodecUnsupported("vp09.00.10.08".into());
        assert_eq!(err.to_string(), "Unsupported codec: vp09.00.10.08");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn empty_sample_range_is_client_error() {
        assert_eq!(Error::EmptySampleRange.http_status(), 400);
    }

    #[test]
    fn sample_data_short_display() {
        let err = Error::SampleDataShort { need: 100, got: 50 };
        assert_eq!(err.to_string(), "Sample data too short: need 100 bytes, got 50");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn hls_multi_period_is_server_error() {
        assert_eq!(Error::HlsMultiPeriod.http_status(), 500);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "blob missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);
    }
}
