use crate::error::{ArtioError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Blob-side collaborator contract.
///
/// Locations are the slash-joined derived paths produced by
/// [`crate::ArtifactKey::location`]; implementations anchor them under
/// their own root.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `body` at `location`, replacing any existing blob. The write
    /// publishes atomically: a failure never leaves a partial blob at the
    /// final path.
    async fn write(&self, location: &str, body: Bytes) -> Result<()>;

    /// Read the blob at `location`. `None` when absent.
    async fn read(&self, location: &str) -> Result<Option<Bytes>>;

    /// Move the blob from `from` to `to`. Fails if `from` is absent.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Remove the blob at `location`. Returns `false` when it was already
    /// absent (idempotent).
    async fn remove(&self, location: &str) -> Result<bool>;

    /// Whether a blob exists at `location`.
    async fn exists(&self, location: &str) -> bool;

    /// File names directly under the directory `dir`. Missing directory
    /// reads as empty.
    async fn list(&self, dir: &str) -> Result<Vec<String>>;
}

/// Filesystem blob store rooted at a configured directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in location.split('/') {
            path.push(segment);
        }
        path
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(&self, location: &str, body: Bytes) -> Result<()> {
        let path = self.resolve(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|error| {
                ArtioError::Storage(format!("blob dir creation failed for {}: {}", location, error))
            })?;
        }

        // Write to a temporary file first, then rename for atomicity
        let temp_path = path.with_file_name(format!(
            "{}.tmp",
            path.file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| ArtioError::Storage(format!("unresolvable location: {}", location)))?
        ));

        let publish = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            drop(file);

            fs::rename(&temp_path, &path).await?;
            Ok::<(), std::io::Error>(())
        };

        if let Err(error) = publish.await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(ArtioError::Storage(format!(
                "blob write failed at {}: {}",
                location, error
            )));
        }

        tracing::debug!("Stored blob at {} ({} bytes)", location, body.len());
        Ok(())
    }

    async fn read(&self, location: &str) -> Result<Option<Bytes>> {
        match fs::read(self.resolve(location)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(ArtioError::Storage(format!(
                "blob read failed at {}: {}",
                location, error
            ))),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let to_path = self.resolve(to);
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await.map_err(|error| {
                ArtioError::Storage(format!("blob dir creation failed for {}: {}", to, error))
            })?;
        }

        fs::rename(self.resolve(from), &to_path)
            .await
            .map_err(|error| {
                ArtioError::Storage(format!("blob rename {} -> {} failed: {}", from, to, error))
            })
    }

    async fn remove(&self, location: &str) -> Result<bool> {
        match fs::remove_file(self.resolve(location)).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(ArtioError::Storage(format!(
                "blob removal failed at {}: {}",
                location, error
            ))),
        }
    }

    async fn exists(&self, location: &str) -> bool {
        self.resolve(location).exists()
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let dir_path = self.resolve(dir);
        if !dir_path.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&dir_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }

        Ok(names)
    }
}

/// Compute SHA256 hash of data
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verify that data matches the expected hash
pub fn verify_hash(data: &[u8], expected_hash: &str) -> Result<()> {
    let actual_hash = compute_hash(data);
    if actual_hash != expected_hash {
        return Err(ArtioError::Inconsistency(format!(
            "content hash mismatch: expected {} actual {}",
            expected_hash, actual_hash
        )));
    }
    Ok(())
}
