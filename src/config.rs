//! Run configuration
//!
//! Built once at startup and handed to the resolver, prefetcher and pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Vendor and application segments of the per-user cache directory
const VENDOR_NAME: &str = "xdg.me";
const APP_NAME: &str = "cardproxypdf";

/// RingsDB base URL (catalog and card images)
pub const DEFAULT_BASE_URL: &str = "http://ringsdb.com";

/// Timeout applied to every outbound request
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Age after which the metadata snapshot is ignored
pub const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Root of the local cache (metadata snapshot + images/)
    pub cache_dir: PathBuf,
    pub base_url: String,
    pub http_timeout: Duration,
    pub metadata_ttl: Duration,
    /// Ignore the metadata snapshot and always re-fetch the catalog
    pub refresh_metadata: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            metadata_ttl: DEFAULT_METADATA_TTL,
            refresh_metadata: false,
        }
    }
}

impl ProxyConfig {
    /// Default configuration rooted at a specific cache directory
    pub fn with_cache_dir(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

/// Returns the default cache directory: ~/.cache/xdg.me/cardproxypdf
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(VENDOR_NAME)
        .join(APP_NAME)
}
