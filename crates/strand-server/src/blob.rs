//! Blob store access: the byte-range read interface the streaming core
//! consumes, its filesystem implementation, and bucket resolution.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use strand_core::{Config, Error, Result};

/// Random-access reads over stored objects.
#[async_trait]
pub trait BlobReader: Send + Sync {
    /// Read `length` bytes starting at `offset`. `offset == 0 && length == 0`
    /// reads the whole object.
    async fn read(&self, key: &str, offset: u64, length: u64) -> Result<Bytes>;
}

impl std::fmt::Debug for dyn BlobReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn BlobReader")
    }
}

/// Run a blob read under the configured timeout. Expiry surfaces as an I/O
/// error and takes the normal 5xx path.
pub async fn read_with_timeout(
    reader: &dyn BlobReader,
    key: &str,
    offset: u64,
    length: u64,
    timeout: Duration,
) -> Result<Bytes> {
    if timeout.is_zero() {
        return reader.read(key, offset, length).await;
    }
    tokio::time::timeout(timeout, reader.read(key, offset, length))
        .await
        .map_err(|_| Error::Io {
            source: std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("blob read of {key} timed out"),
            ),
        })?
}

/// Filesystem-backed blob reader: one directory per bucket, object keys are
/// paths relative to it.
pub struct FsBlobReader {
    root: PathBuf,
}

impl FsBlobReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        // Keys must stay inside the bucket directory.
        if key.is_empty()
            || key.starts_with('/')
            || key.starts_with('.')
            || key.contains('\\')
            || key.split('/').any(|part| part == "..")
        {
            return Err(Error::Validation(format!("invalid object key: {key}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobReader for FsBlobReader {
    async fn read(&self, key: &str, offset: u64, length: u64) -> Result<Bytes> {
        let path = self.resolve(key)?;

        if offset == 0 && length == 0 {
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| map_read_error(e, key))?;
            return Ok(Bytes::from(data));
        }

        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| map_read_error(e, key))?;
        file.seek(std::io::SeekFrom::Start(offset))
            .await
            .map_err(|e| Error::Io { source: e })?;

        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| Error::Io { source: e })?;
        Ok(Bytes::from(buf))
    }
}

fn map_read_error(e: std::io::Error, key: &str) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::not_found("object", key)
    } else {
        Error::Io { source: e }
    }
}

/// Maps bucket names to their blob readers. Built once at startup; the
/// routing table itself is immutable afterwards.
pub struct BucketResolver {
    buckets: HashMap<String, Arc<dyn BlobReader>>,
}

impl BucketResolver {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    /// Build filesystem-backed buckets from the configuration.
    pub fn from_config(config: &Config) -> Self {
        let mut resolver = Self::new();
        for name in &config.buckets {
            let dir = config.storage.root.join(name);
            if !dir.is_dir() {
                tracing::warn!("bucket {name}: directory {} missing", dir.display());
            }
            resolver.insert(name, Arc::new(FsBlobReader::new(dir)));
        }
        resolver
    }

    pub fn insert(&mut self, name: impl Into<String>, reader: Arc<dyn BlobReader>) {
        self.buckets.insert(name.into(), reader);
    }

    pub fn find_bucket(&self, name: &str) -> Result<Arc<dyn BlobReader>> {
        self.buckets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("bucket", name))
    }
}

impl Default for BucketResolver {
    fn default() -> Self {
        Self::new()
    }
}
