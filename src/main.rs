//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest page harvester.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use sumi_harvest::config::{load_config_with_hash, validate, Config};
use sumi_harvest::crawler::{Dispatcher, HttpFetcher};
use sumi_harvest::output::{print_statistics, write_records_to_path, OutputFormat};
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: A polite single-origin page harvester
///
/// Sumi-Harvest crawls one web origin from a seed address in small concurrent
/// batches, pausing between batches, and writes a structured record for every
/// page it fetched.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version)]
#[command(about = "A polite single-origin page harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Write records to this file instead of the configured path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Output encoding (defaults to the configured format, or the output file extension)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Override the maximum number of pages
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Override the number of concurrent workers per batch
    #[arg(long, value_name = "N")]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    apply_overrides(&mut config, &cli);
    validate(&config).context("Invalid command-line override")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(output) = &cli.output {
        config.output.path = output.display().to_string();
        if cli.format.is_none() {
            if let Some(format) = OutputFormat::from_path(output) {
                config.output.format = format;
            }
        }
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed: {}", config.crawler.seed);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Workers per batch: {}", config.crawler.workers);
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay);

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s", config.http.timeout_secs);

    println!("\nExtraction:");
    println!("  Selectors: {}", config.extract.selectors.join(", "));
    if config.extract.patterns.is_empty() {
        println!("  Patterns: none");
    } else {
        let patterns: Vec<_> = config.extract.patterns.iter().map(|p| p.key()).collect();
        println!("  Patterns: {}", patterns.join(", "));
    }

    println!("\nOutput:");
    println!("  Path: {}", config.output.path);
    println!("  Format: {}", config.output.format);

    println!("\n✓ Configuration is valid");
}

/// Requests cancellation, returning true if it had already been requested
fn is_repeat_interrupt(cancelled: &AtomicBool) -> bool {
    cancelled.swap(true, Ordering::SeqCst)
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new(&config.http).context("Failed to build HTTP client")?;
    let dispatcher = Dispatcher::new(&config, fetcher)?;

    // First Ctrl-C stops the crawl after the current batch, a second one exits
    let cancelled = dispatcher.cancellation_flag();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if is_repeat_interrupt(&cancelled) {
                tracing::error!("Second interrupt received, exiting without writing output");
                std::process::exit(130);
            }
            tracing::warn!("Interrupt received, finishing current batch (Ctrl-C again to abort)");
        }
    });

    let report = dispatcher.run().await;

    if !report.failures.is_empty() {
        tracing::warn!("{} addresses could not be fetched", report.failure_count());
    }

    let path = Path::new(&config.output.path);
    write_records_to_path(&report.pages, config.output.format, path)
        .with_context(|| format!("Failed to write records to {}", path.display()))?;
    tracing::info!(
        "Wrote {} records to {} ({})",
        report.pages.len(),
        path.display(),
        config.output.format
    );

    print_statistics(&report.statistics);

    Ok(())
}
