//! Crawl dispatcher - main crawl loop
//!
//! The dispatcher drives a crawl through a small state machine:
//!
//! ```text
//! Running -> Draining(batch) -> Merging(outcomes) -> Delaying -> Running
//!    |
//!    +-> Done (frontier exhausted or cancellation requested)
//! ```
//!
//! Each batch claims at most `workers` addresses from the frontier and spawns
//! one task per address. The batch is a barrier: nothing from it is merged
//! until every task has finished, and the next batch is not claimed until the
//! merge and the politeness delay are over. At most `workers` requests are
//! therefore outstanding at any time.

use crate::config::{validate, Config};
use crate::crawler::extractor::{PageExtractor, PageRecord};
use crate::crawler::fetcher::{FetchError, FetchErrorKind, Fetcher};
use crate::crawler::frontier::Frontier;
use crate::crawler::observer::{CrawlObserver, TracingObserver};
use crate::output::CrawlStatistics;
use crate::url::Address;
use crate::ConfigError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Result of one fetch+extract task
struct Outcome {
    /// Position of the address in its batch
    claim: usize,
    address: Address,
    result: Result<PageRecord, FetchError>,
}

/// Crawl loop states
enum Phase {
    Running,
    Draining(Vec<Address>),
    Merging(Vec<Outcome>),
    Delaying,
    Done,
}

/// Everything a finished crawl produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Page records in completion order
    pub pages: Vec<PageRecord>,

    /// Failed fetches in completion order
    pub failures: Vec<FetchError>,

    /// Every address that was visited, sorted
    pub visited: Vec<Address>,

    pub statistics: CrawlStatistics,
}

impl CrawlReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Drives a single-origin crawl with a given fetcher
pub struct Dispatcher<F: Fetcher + 'static> {
    fetcher: Arc<F>,
    extractor: Arc<PageExtractor>,
    frontier: Arc<Frontier>,
    workers: usize,
    politeness_delay: Duration,
    observer: Arc<dyn CrawlObserver>,
    cancelled: Arc<AtomicBool>,
}

impl<F: Fetcher + 'static> Dispatcher<F> {
    /// Creates a dispatcher for the given configuration
    ///
    /// The configuration is validated first, so an invalid seed, worker count
    /// or selector is reported before any request is made.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration
    /// * `fetcher` - Fetcher used for every address
    ///
    /// # Returns
    ///
    /// * `Ok(Dispatcher)` - Ready to run
    /// * `Err(ConfigError)` - The configuration is invalid
    pub fn new(config: &Config, fetcher: F) -> Result<Self, ConfigError> {
        validate(config)?;
        Self::from_validated(config, fetcher)
    }

    /// Creates a dispatcher for a configuration that already passed [`validate`]
    pub(crate) fn from_validated(config: &Config, fetcher: F) -> Result<Self, ConfigError> {
        let seed = Address::parse(&config.crawler.seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.crawler.seed, e)))?;
        let extractor = PageExtractor::new(seed.origin(), &config.extract)?;
        let frontier = Frontier::new(seed, config.crawler.max_pages);

        Ok(Self {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            frontier: Arc::new(frontier),
            workers: config.crawler.workers,
            politeness_delay: config.crawler.politeness_delay(),
            observer: Arc::new(TracingObserver),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replaces the default tracing observer
    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the flag that stops the crawl before its next batch
    ///
    /// A batch already in flight always runs to completion.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Runs the crawl until the frontier is exhausted or cancellation is requested
    ///
    /// Fetch failures never abort the crawl. A failed address is still marked
    /// visited, produces no record and is reported in the returned report.
    pub async fn run(&self) -> CrawlReport {
        let start = Instant::now();
        let mut statistics = CrawlStatistics::default();
        let mut pages = Vec::new();
        let mut failures = Vec::new();

        tracing::info!(
            "Starting crawl of {} (max {} pages, {} workers)",
            self.frontier.origin(),
            self.frontier.max_pages(),
            self.workers
        );

        let mut phase = Phase::Running;
        loop {
            phase = match phase {
                Phase::Running => {
                    if self.is_cancelled() {
                        tracing::info!("Cancellation requested, stopping crawl");
                        statistics.cancelled = true;
                        Phase::Done
                    } else if self.frontier.is_exhausted() {
                        Phase::Done
                    } else {
                        let batch = self.frontier.claim_batch(self.workers);
                        if batch.is_empty() {
                            Phase::Done
                        } else {
                            statistics.batches += 1;
                            self.observer.record_batch(statistics.batches, batch.len());
                            Phase::Draining(batch)
                        }
                    }
                }

                Phase::Draining(batch) => Phase::Merging(self.drain(batch).await),

                Phase::Merging(outcomes) => {
                    for outcome in &outcomes {
                        self.frontier.mark_visited(&outcome.address);
                    }

                    let mut discovered = Vec::with_capacity(outcomes.len());
                    for outcome in outcomes {
                        match outcome.result {
                            Ok(record) => {
                                statistics.links_discovered += record.links.len();
                                discovered.push((outcome.claim, record.links.clone()));
                                self.observer.record_page(&record);
                                pages.push(record);
                            }
                            Err(error) => {
                                self.observer.record_failure(&error);
                                failures.push(error);
                            }
                        }
                    }

                    // Offering in claim order admits links in the same sequence
                    // whatever the worker count, so the ceiling cuts the same set
                    discovered.sort_by_key(|(claim, _)| *claim);
                    for (_, links) in discovered {
                        statistics.links_admitted += self.frontier.offer(links);
                    }

                    Phase::Delaying
                }

                Phase::Delaying => {
                    // No next batch means nothing to be polite for
                    if !self.politeness_delay.is_zero()
                        && !self.is_cancelled()
                        && !self.frontier.is_exhausted()
                    {
                        tokio::time::sleep(self.politeness_delay).await;
                    }
                    Phase::Running
                }

                Phase::Done => break,
            };
        }

        statistics.pages_visited = self.frontier.visited_count();
        statistics.pages_recorded = pages.len();
        statistics.failures = failures.len();
        statistics.elapsed = start.elapsed();

        tracing::info!(
            "Crawl finished: {} pages visited, {} records, {} failures in {:.2?}",
            statistics.pages_visited,
            statistics.pages_recorded,
            statistics.failures,
            statistics.elapsed
        );

        CrawlReport {
            pages,
            failures,
            visited: self.frontier.visited(),
            statistics,
        }
    }

    /// Fetches and extracts every address of a batch concurrently
    ///
    /// Returns once all tasks have completed, with outcomes in completion order.
    /// Each outcome carries its address's position in the batch.
    async fn drain(&self, batch: Vec<Address>) -> Vec<Outcome> {
        let mut tasks = JoinSet::new();

        for (claim, address) in batch.iter().cloned().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let extractor = Arc::clone(&self.extractor);
            let frontier = Arc::clone(&self.frontier);

            tasks.spawn(async move {
                tracing::debug!("Visiting {}", address);
                let result = match fetcher.fetch(&address).await {
                    Ok(document) => Ok(extractor.extract(&document)),
                    Err(error) => Err(error),
                };
                frontier.mark_visited(&address);
                Outcome {
                    claim,
                    address,
                    result,
                }
            });
        }

        let mut outcomes = Vec::with_capacity(batch.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!("Fetch task failed: {}", e),
            }
        }

        // A task that panicked still counts as a visit, reported as a failure
        if outcomes.len() < batch.len() {
            let finished: HashSet<Address> =
                outcomes.iter().map(|outcome| outcome.address.clone()).collect();

            for (claim, address) in batch.into_iter().enumerate() {
                if !finished.contains(&address) {
                    let error = FetchError::new(
                        address.clone(),
                        FetchErrorKind::Aborted("worker task did not complete".to_string()),
                    );
                    outcomes.push(Outcome {
                        claim,
                        address,
                        result: Err(error),
                    });
                }
            }
        }

        outcomes
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
