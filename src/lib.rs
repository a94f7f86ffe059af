//! Card Proxy PDF - printable proxy sheets for OCTGN deck lists
//!
//! Resolves deck cards to RingsDB card images through a local cache, fetches
//! missing images concurrently and lays them out nine to a page.

pub mod cache;
pub mod config;
pub mod deck;
pub mod error;
pub mod layout;
pub mod metadata;
pub mod pipeline;
pub mod prefetch;
pub mod render;
pub mod ringsdb;

pub use cache::FileCache;
pub use config::ProxyConfig;
pub use deck::{DeckCard, DeckEntry};
pub use error::{FetchFailures, ProxyError, Result};
pub use layout::{Page, Placement};
pub use metadata::{Mapping, MetadataResolver};
pub use pipeline::{run, run_with_renderer, RunSummary};
pub use prefetch::{ImagePrefetcher, PrefetchSummary};
pub use render::{DocumentRenderer, ImageKind, PdfRenderer};
pub use ringsdb::{CatalogEntry, RingsDbClient};
