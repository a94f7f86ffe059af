//! Card Proxy PDF
//!
//! Turns an OCTGN deck list (.o8d) into a printable PDF of card images.

use cardproxy_pdf::config::{default_cache_dir, ProxyConfig, DEFAULT_BASE_URL};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Build printable proxy sheets from an OCTGN deck list
#[derive(Parser, Debug)]
#[command(name = "cardproxy_pdf")]
#[command(version, about, long_about = None)]
struct Args {
    /// Deck list to read (.o8d)
    input: PathBuf,

    /// PDF file to write
    output: PathBuf,

    /// Cache directory for card metadata and images
    #[arg(long, default_value_os_t = default_cache_dir())]
    cache_dir: PathBuf,

    /// Base URL of the card database
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Timeout for each HTTP request, in seconds
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Re-fetch card metadata even if the cached copy is fresh
    #[arg(long, default_value_t = false)]
    refresh_metadata: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ProxyConfig {
        cache_dir: args.cache_dir,
        base_url: args.base_url,
        http_timeout: Duration::from_secs(args.timeout_secs),
        refresh_metadata: args.refresh_metadata,
        ..ProxyConfig::default()
    };

    match cardproxy_pdf::run(&config, &args.input, &args.output).await {
        Ok(summary) => {
            log::info!(
                "Done: {} copies of {} cards on {} page(s) ({} image(s) downloaded)",
                summary.copies,
                summary.cards,
                summary.pages,
                summary.fetched
            );
        }
        Err(e) => {
            log::error!("error: {}", e);
            std::process::exit(1);
        }
    }
}
