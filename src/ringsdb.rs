//! RingsDB API client for the card catalog and card images
//!
//! Uses async reqwest with a client-level timeout.

use crate::error::{ProxyError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Catalog endpoint, relative to the base URL
const CATALOG_PATH: &str = "/api/public/cards/";

/// Path prefix of every card image; stripped from `imagesrc` to get the asset name
pub const IMAGE_PREFIX: &str = "/bundles/cards/";

const USER_AGENT: &str = "CardProxyPdf/1.0";

/// Raw card record as returned by the catalog endpoint
#[derive(Debug, Deserialize)]
pub struct RingsCard {
    #[serde(default)]
    pub octgnid: Option<String>,
    #[serde(default)]
    pub imagesrc: Option<String>,
}

/// One identifier -> asset name pair from the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub asset_name: String,
}

impl RingsCard {
    /// Convert into a catalog entry, or None when the card has no OCTGN id or
    /// no image usable as a file name in the image cache
    pub fn into_entry(self) -> Option<CatalogEntry> {
        let id = self.octgnid.filter(|id| !id.is_empty())?;
        let asset_name = asset_name_from_src(self.imagesrc.as_deref()?);
        if !is_plain_file_name(&asset_name) {
            if !asset_name.is_empty() {
                log::debug!("Skipping card {} with image path {:?}", id, asset_name);
            }
            return None;
        }
        Some(CatalogEntry { id, asset_name })
    }
}

/// A single path component that stays inside the directory it is joined to
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(|c: char| c == '/' || c == '\\')
}

/// Strip the image path prefix, keeping just the trailing file name
pub fn asset_name_from_src(src: &str) -> String {
    src.strip_prefix(IMAGE_PREFIX).unwrap_or(src).to_string()
}

/// Decode a catalog response body into entries, skipping unusable records
pub fn parse_catalog(body: &[u8]) -> Result<Vec<CatalogEntry>> {
    let cards: Vec<RingsCard> = serde_json::from_slice(body)?;
    let total = cards.len();
    let entries: Vec<CatalogEntry> = cards.into_iter().filter_map(RingsCard::into_entry).collect();
    if entries.len() < total {
        log::debug!(
            "Skipped {} catalog records without an OCTGN id or usable image",
            total - entries.len()
        );
    }
    Ok(entries)
}

/// RingsDB client. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct RingsDbClient {
    client: reqwest::Client,
    base_url: String,
}

impl RingsDbClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn catalog_url(&self) -> String {
        format!("{}{}", self.base_url, CATALOG_PATH)
    }

    pub fn image_url(&self, asset_name: &str) -> String {
        format!("{}{}{}", self.base_url, IMAGE_PREFIX, asset_name)
    }

    /// Fetch the full card catalog
    pub async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let body = self.get_bytes(&self.catalog_url()).await?;
        parse_catalog(&body)
    }

    /// Fetch raw image bytes for one asset
    pub async fn fetch_image(&self, asset_name: &str) -> Result<Vec<u8>> {
        self.get_bytes(&self.image_url(asset_name)).await
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ProxyError::HttpStatus {
                status: response.status(),
                url: url.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
#[path = "ringsdb_tests.rs"]
mod tests;
