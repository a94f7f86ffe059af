//! Concurrent image prefetching
//!
//! Every distinct asset referenced by the deck that is not already cached is
//! fetched in its own task. All tasks run to completion; failures are collected
//! per asset and reported together.

use crate::cache::{image_key, FileCache};
use crate::deck::DeckEntry;
use crate::error::{FetchFailures, ProxyError, Result};
use crate::ringsdb::RingsDbClient;
use std::collections::BTreeSet;

/// Outcome of a successful prefetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchSummary {
    /// Distinct assets referenced by the deck
    pub distinct: usize,
    pub already_cached: usize,
    pub fetched: usize,
}

/// Ensures all deck images are present in the local cache
pub struct ImagePrefetcher {
    cache: FileCache,
    client: RingsDbClient,
}

impl ImagePrefetcher {
    pub fn new(cache: FileCache, client: RingsDbClient) -> Self {
        Self { cache, client }
    }

    /// Fetch every missing image. Returns once all fetch tasks have finished.
    pub async fn prefetch(&self, deck: &[DeckEntry]) -> Result<PrefetchSummary> {
        let distinct: BTreeSet<&str> = deck.iter().map(|e| e.asset_name.as_str()).collect();

        let mut already_cached = 0;
        let mut tasks = Vec::new();
        for asset_name in &distinct {
            if self.cache.exists(&image_key(asset_name)) {
                already_cached += 1;
                continue;
            }

            let cache = self.cache.clone();
            let client = self.client.clone();
            let name = asset_name.to_string();
            let handle = tokio::spawn(async move { fetch_to_cache(&client, &cache, &name).await });
            tasks.push((asset_name.to_string(), handle));
        }

        if !tasks.is_empty() {
            log::info!(
                "Fetching {} image(s) ({} already cached)",
                tasks.len(),
                already_cached
            );
        }

        // Barrier: every task is observed, in asset-name order
        let mut failures = FetchFailures::new();
        let mut fetched = 0;
        for (asset_name, handle) in tasks {
            match handle.await {
                Ok(Ok(())) => {
                    log::info!("Fetched {} to cache", asset_name);
                    fetched += 1;
                }
                Ok(Err(e)) => failures.insert(asset_name, e.to_string()),
                Err(e) => failures.insert(asset_name, format!("fetch task failed: {}", e)),
            }
        }

        if !failures.is_empty() {
            return Err(ProxyError::ImageFetch(failures));
        }

        Ok(PrefetchSummary {
            distinct: distinct.len(),
            already_cached,
            fetched,
        })
    }
}

async fn fetch_to_cache(client: &RingsDbClient, cache: &FileCache, asset_name: &str) -> Result<()> {
    let bytes = client.fetch_image(asset_name).await?;
    cache.write(&image_key(asset_name), &bytes)
}
