//! On-disk key/value cache
//!
//! Keys are paths relative to the cache root. The metadata snapshot lives at
//! the root, card images under `images/`.

use crate::error::{ProxyError, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Key of the persisted identifier -> asset name snapshot
pub const METADATA_KEY: &str = "carddb.json";

/// Sub-folder holding cached card images
pub const IMAGE_FOLDER: &str = "images";

/// Cache key for a card image
pub fn image_key(asset_name: &str) -> String {
    format!("{}/{}", IMAGE_FOLDER, asset_name)
}

/// File-backed cache rooted at a directory
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Create a cache rooted at `root`. The directory is created lazily on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the full path for a key
    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Check if a key is present
    pub fn exists(&self, key: &str) -> bool {
        self.path(key).is_file()
    }

    pub fn read(&self, key: &str) -> Result<Vec<u8>> {
        std::fs::read(self.path(key)).map_err(|e| ProxyError::cache(key, e))
    }

    /// Store bytes under a key, creating parent directories as needed
    pub fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProxyError::cache(key, e))?;
        }
        std::fs::write(&path, bytes).map_err(|e| ProxyError::cache(key, e))?;
        log::debug!("Wrote {} bytes to cache key {}", bytes.len(), key);
        Ok(())
    }

    /// Last-modified time of a cached key
    pub fn modified(&self, key: &str) -> Result<SystemTime> {
        std::fs::metadata(self.path(key))
            .and_then(|meta| meta.modified())
            .map_err(|e| ProxyError::cache(key, e))
    }
}
