//! Card metadata: OCTGN identifier -> image asset name
//!
//! Served from a snapshot in the local cache while it is younger than the TTL,
//! otherwise refreshed from the RingsDB catalog and persisted again.

use crate::cache::{FileCache, METADATA_KEY};
use crate::error::Result;
use crate::ringsdb::{CatalogEntry, RingsDbClient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Identifier -> asset name table for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping {
    images: HashMap<String, String>,
}

impl Mapping {
    /// Build from catalog entries. A repeated identifier keeps the last entry.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut images = HashMap::new();
        let mut duplicates = 0usize;
        for entry in entries {
            if images.insert(entry.id, entry.asset_name).is_some() {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            log::warn!(
                "Catalog contained {} duplicate card identifier(s); later entries replaced earlier ones",
                duplicates
            );
        }
        Self { images }
    }

    /// Look up the asset name for a card identifier
    pub fn get(&self, id: &str) -> Option<&str> {
        self.images.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.images.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Resolves the mapping from the cache snapshot or the remote catalog
pub struct MetadataResolver {
    cache: FileCache,
    client: RingsDbClient,
    ttl: Duration,
    force_refresh: bool,
}

impl MetadataResolver {
    pub fn new(cache: FileCache, client: RingsDbClient, ttl: Duration) -> Self {
        Self {
            cache,
            client,
            ttl,
            force_refresh: false,
        }
    }

    /// Skip the snapshot and always fetch the catalog
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Return the mapping, fetching from RingsDB only when no fresh snapshot exists
    pub async fn resolve(&self) -> Result<Mapping> {
        if !self.force_refresh {
            match self.load_snapshot() {
                Ok(Some(mapping)) => return Ok(mapping),
                Ok(None) => {}
                Err(e) => log::warn!("Failed loading metadata from cache: {}", e),
            }
        }

        log::info!("Fetching card metadata from {}", self.client.base_url());
        let entries = self.client.fetch_catalog().await?;
        let mapping = Mapping::from_entries(entries);
        log::info!("Fetched metadata for {} cards", mapping.len());

        if let Err(e) = self.save_snapshot(&mapping) {
            log::warn!("Failed saving metadata to cache: {}", e);
        }

        Ok(mapping)
    }

    /// Load the persisted snapshot. `Ok(None)` means missing or stale.
    pub fn load_snapshot(&self) -> Result<Option<Mapping>> {
        if !self.cache.exists(METADATA_KEY) {
            log::debug!("No metadata snapshot in cache");
            return Ok(None);
        }

        let modified = self.cache.modified(METADATA_KEY)?;
        // A timestamp in the future counts as fresh
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > self.ttl {
            log::info!(
                "Metadata snapshot is {}h old, refreshing",
                age.as_secs() / 3600
            );
            return Ok(None);
        }

        let bytes = self.cache.read(METADATA_KEY)?;
        let mapping: Mapping = serde_json::from_slice(&bytes)?;

        log::info!("Loaded card metadata from cache ({} cards)", mapping.len());
        Ok(Some(mapping))
    }

    /// Persist the mapping as the new snapshot
    pub fn save_snapshot(&self, mapping: &Mapping) -> Result<()> {
        let bytes = serde_json::to_vec(mapping)?;
        self.cache.write(METADATA_KEY, &bytes)?;
        log::info!("Saved card metadata to cache");
        Ok(())
    }
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
