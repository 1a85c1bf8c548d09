//! Filesystem-based report storage
//!
//! Reports are stored as files in a directory structure:
//! ```text
//! {base_path}/
//!   {hash[0:2]}/
//!     {hash}.csv
//! ```
//!
//! The first two characters of the hash create a subdirectory to avoid
//! having too many files in a single directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use core_kernel::{DomainPort, PortError};
use tokio::fs;
use tracing::debug;

use crate::ports::ArtifactStore;
use crate::report::ContentHash;

pub struct FilesystemArtifactStore {
    base_path: PathBuf,
}

impl FilesystemArtifactStore {
    /// Creates the store, creating the base directory if it doesn't exist
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, PortError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| io_error("create report directory", &base_path, e))?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for_hash(&self, hash: &ContentHash) -> PathBuf {
        self.base_path
            .join(hash.shard())
            .join(format!("{}.csv", hash))
    }

    /// Resolves a location, refusing anything outside the base directory
    fn resolve(&self, location: &str) -> Result<PathBuf, PortError> {
        let path = PathBuf::from(location);
        if !path.starts_with(&self.base_path) || location.contains("..") {
            return Err(PortError::validation(format!(
                "report location outside storage directory: {}",
                location
            )));
        }
        Ok(path)
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> PortError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return PortError::not_found("report file", path.display());
    }
    PortError::internal_with_source(format!("failed to {} {}", action, path.display()), err)
}

impl DomainPort for FilesystemArtifactStore {}

#[async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn put(&self, hash: &ContentHash, bytes: &[u8]) -> Result<String, PortError> {
        let path = self.path_for_hash(hash);

        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!(hash = %hash, "Report already stored");
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error("create directory", parent, e))?;
            }

            // Write atomically using temp file + rename
            let temp_path = path.with_extension("csv.tmp");
            fs::write(&temp_path, bytes)
                .await
                .map_err(|e| io_error("write", &temp_path, e))?;
            fs::rename(&temp_path, &path)
                .await
                .map_err(|e| io_error("rename", &temp_path, e))?;

            debug!(hash = %hash, size = bytes.len(), "Stored report");
        }

        Ok(path.display().to_string())
    }

    async fn get(&self, location: &str) -> Result<Vec<u8>, PortError> {
        let path = self.resolve(location)?;
        fs::read(&path).await.map_err(|e| io_error("read", &path, e))
    }

    async fn remove(&self, location: &str) -> Result<(), PortError> {
        let path = self.resolve(location)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_temp_store() -> (FilesystemArtifactStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemArtifactStore::new(temp_dir.path()).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _temp) = create_temp_store().await;
        let bytes = b"1,20.00\n";
        let hash = ContentHash::of(bytes);

        let location = store.put(&hash, bytes).await.unwrap();

        assert!(location.ends_with(&format!("{}/{}.csv", hash.shard(), hash)));
        assert_eq!(store.get(&location).await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let (store, _temp) = create_temp_store().await;
        let hash = ContentHash::of(b"x");

        let first = store.put(&hash, b"x").await.unwrap();
        let second = store.put(&hash, b"x").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_remove_then_get_is_not_found() {
        let (store, _temp) = create_temp_store().await;
        let hash = ContentHash::of(b"y");
        let location = store.put(&hash, b"y").await.unwrap();

        store.remove(&location).await.unwrap();
        store.remove(&location).await.unwrap();
        assert!(store.get(&location).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_foreign_locations() {
        let (store, _temp) = create_temp_store().await;
        assert!(store.get("/etc/passwd").await.is_err());
    }
}
