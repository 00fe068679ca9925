//! Application context shared by all request handlers (via Axum state).
//!
//! Cheaply cloneable: only `Arc`s inside. The bucket routing table and the
//! metadata cache are the sole shared state; both are immutable or
//! append-only after startup.

use std::sync::Arc;
use std::time::Duration;

use strand_core::Config;

use crate::blob::BucketResolver;
use crate::media_cache::MediaCache;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub resolver: Arc<BucketResolver>,
    pub media_cache: Arc<MediaCache>,
}

impl AppContext {
    /// Build the context, constructing filesystem buckets from the config.
    pub fn new(config: Config) -> Self {
        let resolver = BucketResolver::from_config(&config);
        Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            media_cache: Arc::new(MediaCache::new()),
        }
    }

    /// Build a context around an existing resolver (tests, alternative
    /// stores).
    pub fn with_resolver(config: Config, resolver: BucketResolver) -> Self {
        Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            media_cache: Arc::new(MediaCache::new()),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.config.read_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.config.write_timeout)
    }

    /// Chunk duration for raw (non-playlist) streaming requests.
    pub fn chunk_duration_sec(&self) -> u64 {
        self.config.chunk_duration_sec.max(1)
    }
}
