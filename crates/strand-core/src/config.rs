//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON. Key names are
//! kebab-case to match the deployment configs the companion ingest tooling
//! writes. Every field defaults sensibly so a completely empty `{}` file is
//! valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Upstream storage nodes. Informational for the filesystem store;
    /// retained so deployment configs parse unchanged.
    pub remotes: Vec<String>,
    /// Replica groups holding side-car metadata.
    pub metadata_groups: Vec<i32>,
    /// Bucket names served by this process.
    pub buckets: Vec<String>,
    pub io_thread_num: usize,
    pub nonblocking_io_thread_num: usize,
    pub net_thread_num: usize,
    /// Blob read timeout in seconds.
    pub read_timeout: u64,
    /// Response write timeout in seconds.
    pub write_timeout: u64,
    /// Default presentation chunk duration in whole seconds.
    pub chunk_duration_sec: u64,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remotes: Vec::new(),
            metadata_groups: Vec::new(),
            buckets: Vec::new(),
            io_thread_num: 4,
            nonblocking_io_thread_num: 4,
            net_thread_num: 2,
            read_timeout: 60,
            write_timeout: 60,
            chunk_duration_sec: 10,
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path. Unlike missing optional sections,
    /// a missing or unparseable file is a startup failure.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Validation(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.buckets.is_empty() {
            warnings.push("buckets is empty; every request will 404".into());
        }
        if self.read_timeout == 0 {
            warnings.push("read-timeout is 0; blob reads will never time out".into());
        }
        if self.write_timeout == 0 {
            warnings.push("write-timeout is 0; response writes will never time out".into());
        }
        if self.chunk_duration_sec == 0 {
            warnings.push("chunk-duration-sec is 0; falling back to 1 second at request time".into());
        }
        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }
        if !self.storage.root.as_os_str().is_empty() && !self.storage.root.is_dir() {
            warnings.push(format!(
                "storage.root {} is not a directory",
                self.storage.root.display()
            ));
        }

        warnings
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Blob storage settings. Buckets are directories under `root`; an object
/// key is a path relative to its bucket directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/data/buckets"),
        }
    }
}
