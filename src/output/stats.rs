//! Crawl statistics
//!
//! Counters gathered by the dispatcher over one crawl and a printer for the
//! command-line summary.

use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStatistics {
    /// Distinct addresses visited (fetched successfully or not)
    pub pages_visited: usize,

    /// Page records produced
    pub pages_recorded: usize,

    /// Fetch failures
    pub failures: usize,

    /// Batches dispatched
    pub batches: usize,

    /// In-scope links found across all records
    pub links_discovered: usize,

    /// Links admitted into the frontier
    pub links_admitted: usize,

    /// Wall-clock duration of the crawl
    pub elapsed: Duration,

    /// Whether the crawl stopped early on request
    pub cancelled: bool,
}

impl CrawlStatistics {
    /// Returns the share of visited addresses that produced a record, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.pages_visited == 0 {
            return 0.0;
        }
        (self.pages_recorded as f64 / self.pages_visited as f64) * 100.0
    }

    /// Returns pages visited per second of wall-clock time
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.pages_visited as f64 / secs
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Pages visited: {}", stats.pages_visited);
    println!("  Records produced: {}", stats.pages_recorded);
    println!("  Fetch failures: {}", stats.failures);
    println!("  Batches: {}", stats.batches);
    println!();

    println!("Links:");
    println!("  In-scope links found: {}", stats.links_discovered);
    println!("  Admitted to frontier: {}", stats.links_admitted);
    println!();

    println!(
        "Elapsed: {:.2?} ({:.2} pages/sec)",
        stats.elapsed,
        stats.pages_per_second()
    );
    if stats.cancelled {
        println!("Crawl was interrupted before the frontier was exhausted");
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages recorded)",
        stats.success_rate(),
        stats.pages_recorded,
        stats.pages_visited
    );
}
