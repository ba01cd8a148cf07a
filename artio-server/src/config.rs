use artio_core::{ArtioError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    pub storage: StorageConfig,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for artifact blobs.
    pub root: PathBuf,
    /// SQLite database file for metadata records.
    pub db_path: PathBuf,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8003".to_string()
}

fn default_max_upload_bytes() -> usize {
    256 * 1024 * 1024
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("ARTIO"))
            .build()
            .map_err(|e| ArtioError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| ArtioError::Config(e.to_string()))?;

        Ok(config)
    }
}
