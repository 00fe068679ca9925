//! Per-process cache of parsed side-car metadata.
//!
//! Entries are immutable `Arc<Media>` handles; concurrent misses for the
//! same key coalesce into a single metadata read (single-flight), so a
//! thundering herd of segment requests costs one blob read.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use strand_core::Result;
use strand_media::Media;

use crate::blob::{read_with_timeout, BlobReader};

pub struct MediaCache {
    entries: DashMap<String, Arc<OnceCell<Arc<Media>>>>,
}

impl MediaCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Fetch the parsed metadata for `(bucket, key)`, reading and decoding
    /// `<key>.meta` on first use. Decode failures are not cached; a later
    /// request retries the read.
    pub async fn get_or_load(
        &self,
        bucket: &str,
        key: &str,
        reader: &Arc<dyn BlobReader>,
        read_timeout: Duration,
    ) -> Result<Arc<Media>> {
        let cache_key = format!("{bucket}/{key}");
        let cell = {
            let entry = self
                .entries
                .entry(cache_key)
                .or_insert_with(|| Arc::new(OnceCell::new()));
            Arc::clone(entry.value())
            // The map guard drops here, before any await.
        };

        let media = cell
            .get_or_try_init(|| async {
                let meta_key = format!("{key}.meta");
                let blob =
                    read_with_timeout(reader.as_ref(), &meta_key, 0, 0, read_timeout).await?;
                let media = Media::decode(&blob)?;
                tracing::debug!(
                    "metadata loaded: {bucket}/{key}, {} tracks",
                    media.tracks.len()
                );
                Ok::<_, strand_core::Error>(Arc::new(media))
            })
            .await?;

        Ok(Arc::clone(media))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MediaCache {
    fn default() -> Self {
        Self::new()
    }
}
