//! End-to-end run: metadata -> deck -> prefetch -> layout -> render
//!
//! Each stage returns early on the first fatal error.

use crate::cache::FileCache;
use crate::config::ProxyConfig;
use crate::deck::{self, total_copies};
use crate::error::Result;
use crate::layout;
use crate::metadata::MetadataResolver;
use crate::prefetch::ImagePrefetcher;
use crate::render::{render_document, DocumentRenderer, PdfRenderer};
use crate::ringsdb::RingsDbClient;
use std::path::Path;

/// What a successful run produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Deck lines
    pub cards: usize,
    /// Physical copies laid out
    pub copies: usize,
    pub distinct_images: usize,
    /// Images downloaded during this run
    pub fetched: usize,
    pub pages: usize,
}

/// Build a PDF of the deck at `input` and write it to `output`
pub async fn run(config: &ProxyConfig, input: &Path, output: &Path) -> Result<RunSummary> {
    let title = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "Proxies".to_string());
    run_with_renderer(config, input, output, PdfRenderer::new(&title)).await
}

/// Same as [`run`], rendering through any `DocumentRenderer`
pub async fn run_with_renderer<R: DocumentRenderer>(
    config: &ProxyConfig,
    input: &Path,
    output: &Path,
    mut renderer: R,
) -> Result<RunSummary> {
    let cache = FileCache::new(&config.cache_dir);
    let client = RingsDbClient::new(&config.base_url, config.http_timeout)?;
    log::debug!("Cache directory: {}", cache.root().display());

    let mapping = MetadataResolver::new(cache.clone(), client.clone(), config.metadata_ttl)
        .force_refresh(config.refresh_metadata)
        .resolve()
        .await?;

    let cards = deck::load_o8d(input)?;
    let entries = deck::resolve_entries(&cards, &mapping)?;
    log::info!(
        "Deck {} has {} card(s), {} copies in total",
        input.display(),
        entries.len(),
        total_copies(&entries)
    );

    let prefetched = ImagePrefetcher::new(cache.clone(), client)
        .prefetch(&entries)
        .await?;

    let pages = layout::layout(&entries)?;
    if pages.is_empty() {
        log::warn!("Deck is empty; writing a blank document");
    }

    render_document(&mut renderer, &cache, &pages)?;
    renderer.write_to(output)?;
    log::info!("Wrote {} page(s) to {}", pages.len(), output.display());

    Ok(RunSummary {
        cards: entries.len(),
        copies: total_copies(&entries),
        distinct_images: prefetched.distinct,
        fetched: prefetched.fetched,
        pages: pages.len(),
    })
}
