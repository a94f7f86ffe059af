//! Error types for cardproxy_pdf

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Unified error type for the proxy pipeline
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Local cache file could not be read or written
    #[error("Cache error for {key}: {source}")]
    Cache {
        key: String,
        #[source]
        source: std::io::Error,
    },
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP error status code
    #[error("HTTP error {status} from {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },
    /// Failed to parse JSON (catalog response or metadata snapshot)
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Deck list could not be parsed
    #[error("Deck error: {0}")]
    Deck(String),
    /// Deck references a card the catalog does not know
    #[error("Unknown card identifier in deck: {0}")]
    UnresolvedIdentifier(String),
    /// Downloaded image is neither JPEG nor PNG
    #[error("unsupported image type: {detected} (asset {asset})")]
    UnsupportedImage { asset: String, detected: String },
    /// Image bytes matched a supported format but failed to decode
    #[error("Failed to decode image {asset}: {reason}")]
    ImageDecode { asset: String, reason: String },
    /// One or more images could not be fetched
    #[error("error(s) fetching images: {0}")]
    ImageFetch(FetchFailures),
    /// More images handed to a single page than the grid holds
    #[error("too many images to render ({0} > 9)")]
    PageOverflow(usize),
    /// Document rendering failed
    #[error("could not render PDF: {0}")]
    Render(String),
    /// File I/O outside the cache (deck input, PDF output)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    pub(crate) fn cache(key: &str, source: std::io::Error) -> Self {
        ProxyError::Cache {
            key: key.to_string(),
            source,
        }
    }
}

/// Per-asset fetch failures, ordered by asset name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchFailures(BTreeMap<String, String>);

impl FetchFailures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: impl Into<String>, cause: impl Into<String>) {
        self.0.insert(asset.into(), cause.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.0.contains_key(asset)
    }

    /// Cause recorded for a failed asset
    pub fn cause(&self, asset: &str) -> Option<&str> {
        self.0.get(asset).map(String::as_str)
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for FetchFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (asset, cause)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} ({})", asset, cause)?;
        }
        Ok(())
    }
}

/// Result alias for cardproxy_pdf operations
pub type Result<T> = std::result::Result<T, ProxyError>;
