//! The stored presentation description.
//!
//! A manifest key holds a JSON document naming the assets, tracks, and
//! grouping of one presentation. The loader pulls every referenced side-car
//! through the metadata cache and assembles a [`Playlist`] with the media
//! engine's builder.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use strand_core::{Error, Result};
use strand_media::{Playlist, PlaylistBuilder, TrackRef};

use crate::blob::BlobReader;
use crate::media_cache::MediaCache;

/// One track reference: which stored asset, which track inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrackRefSpec {
    /// Object key of the asset; its metadata lives at `<key>.meta`.
    pub key: String,
    /// 1-based track number within the asset.
    pub track_number: u32,
}

/// One representation: an id plus the track references concatenated into its
/// timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprSpec {
    pub id: String,
    pub tracks: Vec<TrackRefSpec>,
}

/// One adaptation set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationSpec {
    pub representations: Vec<ReprSpec>,
}

/// The full stored presentation description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlaylistSpec {
    pub base_url: String,
    pub chunk_duration_sec: u64,
    pub adaptations: Vec<AdaptationSpec>,
}

impl PlaylistSpec {
    pub fn parse(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| Error::malformed(format!("playlist description: {e}")))
    }

    /// Find the representation spec carrying `id`.
    pub fn representation(&self, id: &str) -> Result<&ReprSpec> {
        self.adaptations
            .iter()
            .flat_map(|a| a.representations.iter())
            .find(|r| r.id == id)
            .ok_or_else(|| Error::not_found("representation", id))
    }

    /// Load every referenced side-car and build the playlist.
    pub async fn load(
        &self,
        bucket: &str,
        reader: &Arc<dyn BlobReader>,
        cache: &MediaCache,
        read_timeout: Duration,
    ) -> Result<Playlist> {
        let mut builder = PlaylistBuilder::new(&self.base_url, self.chunk_duration_sec);

        for aset in &self.adaptations {
            let mut reprs = Vec::with_capacity(aset.representations.len());
            for repr in &aset.representations {
                let mut refs = Vec::with_capacity(repr.tracks.len());
                for t in &repr.tracks {
                    let media = cache
                        .get_or_load(bucket, &t.key, reader, read_timeout)
                        .await?;
                    refs.push(TrackRef::new(media, t.track_number));
                }
                reprs.push((repr.id.as_str(), refs));
            }
            builder.add_adaptation(reprs)?;
        }

        Ok(builder.build())
    }
}
