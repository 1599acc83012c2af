//! Crawler module for page fetching and harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`Fetcher`] seam
//! - Structured extraction of page records
//! - The shared frontier of visited and pending addresses
//! - Batch dispatch with a politeness delay between batches

mod dispatcher;
mod extractor;
mod fetcher;
mod frontier;
mod observer;
mod patterns;

pub use dispatcher::{CrawlReport, Dispatcher};
pub use extractor::{FormField, FormRecord, ImageRecord, PageExtractor, PageRecord, Table};
pub use fetcher::{build_http_client, Document, FetchError, FetchErrorKind, Fetcher, HttpFetcher};
pub use frontier::{AddressState, Frontier};
pub use observer::{CrawlObserver, NullObserver, TracingObserver};
pub use patterns::{PatternMatcher, TextPattern};

use crate::config::{validate, Config};
use crate::HarvestError;

/// Runs a complete crawl over HTTP
///
/// This is the main entry point for a harvest. It will:
/// 1. Validate the configuration
/// 2. Build the HTTP client
/// 3. Crawl the seed's origin in batches until the frontier is exhausted
///
/// # Arguments
///
/// * `config` - The harvest configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The crawl ran; individual fetch failures are in the report
/// * `Err(HarvestError)` - The configuration is invalid or the client could not be built
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::Config;
/// use sumi_harvest::crawler::crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let report = crawl(Config::new("https://example.com/")).await?;
/// println!("{} pages harvested", report.pages.len());
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: Config) -> Result<CrawlReport, HarvestError> {
    validate(&config)?;
    let fetcher = HttpFetcher::new(&config.http)?;
    let dispatcher = Dispatcher::from_validated(&config, fetcher)?;
    Ok(dispatcher.run().await)
}
