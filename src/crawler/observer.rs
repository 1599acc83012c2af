//! Crawl observers
//!
//! An observer is told about every batch, record and failure as the dispatcher
//! produces them. Observers cannot influence the crawl.

use crate::crawler::extractor::PageRecord;
use crate::crawler::fetcher::FetchError;

/// Trait for receiving crawl progress
///
/// All methods default to doing nothing, so implementations only override the
/// events they care about. Calls are made from the dispatcher's own task.
pub trait CrawlObserver: Send + Sync {
    /// Called when a batch has been claimed
    ///
    /// # Arguments
    ///
    /// * `batch` - 1-based batch number
    /// * `size` - Number of addresses in the batch
    fn record_batch(&self, _batch: usize, _size: usize) {}

    /// Called for every page record, in completion order
    fn record_page(&self, _record: &PageRecord) {}

    /// Called for every failed fetch
    fn record_failure(&self, _error: &FetchError) {}
}

/// Observer that reports progress through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn record_batch(&self, batch: usize, size: usize) {
        tracing::info!("Dispatching batch {} ({} addresses)", batch, size);
    }

    fn record_page(&self, record: &PageRecord) {
        tracing::debug!(
            "Harvested {} ({} links, {} images, {} tables, {} forms)",
            record.address,
            record.links.len(),
            record.images.len(),
            record.tables.len(),
            record.forms.len()
        );
    }

    fn record_failure(&self, error: &FetchError) {
        tracing::warn!("{}", error);
    }
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl CrawlObserver for NullObserver {}
