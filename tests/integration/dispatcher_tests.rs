//! Dispatcher tests against an in-memory site
//!
//! The fetcher here serves a fixed binary-tree site without any network, so
//! batch scheduling properties can be checked deterministically.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_harvest::config::Config;
use sumi_harvest::crawler::{
    CrawlObserver, Dispatcher, Document, FetchError, FetchErrorKind, Fetcher, NullObserver,
};
use sumi_harvest::url::Address;

const SITE: &str = "https://site.test";

fn page_url(i: usize) -> String {
    format!("{}/p/{}", SITE, i)
}

/// A binary tree of `size` pages; every page also links home and off-site
struct TreeSite {
    size: usize,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<HashMap<String, usize>>,
}

impl TreeSite {
    fn new(size: usize, latency: Duration) -> Self {
        Self {
            size,
            latency,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn body(&self, i: usize) -> String {
        let mut body = format!("<title>Page {}</title>", i);
        for child in [2 * i + 1, 2 * i + 2] {
            if child < self.size {
                body.push_str(&format!(r#"<a href="/p/{}">child</a>"#, child));
            }
        }
        body.push_str(r#"<a href="/p/0">home</a>"#);
        body.push_str(r#"<a href="https://elsewhere.test/p/1">away</a>"#);
        body
    }

    fn index_of(&self, address: &Address) -> Option<usize> {
        address
            .as_str()
            .strip_prefix(&format!("{}/p/", SITE))?
            .parse()
            .ok()
            .filter(|i| *i < self.size)
    }
}

impl Fetcher for TreeSite {
    async fn fetch(&self, address: &Address) -> Result<Document, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.index_of(address) {
            Some(i) => Ok(Document::new(address.clone(), self.body(i))),
            None => Err(FetchError::new(address.clone(), FetchErrorKind::Status(404))),
        }
    }
}

/// Requests cancellation once a given batch has been claimed
struct CancelAfterBatch {
    flag: Arc<AtomicBool>,
    batch: usize,
}

impl CrawlObserver for CancelAfterBatch {
    fn record_batch(&self, batch: usize, _size: usize) {
        if batch >= self.batch {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

fn create_test_config(max_pages: usize, workers: usize) -> Config {
    let mut config = Config::new(page_url(0));
    config.crawler.max_pages = max_pages;
    config.crawler.workers = workers;
    config.crawler.politeness_delay = 0;
    config.extract.selectors = vec![];
    config
}

async fn run(config: &Config, site: TreeSite) -> (sumi_harvest::CrawlReport, Arc<TreeSite>) {
    let site = Arc::new(site);
    let dispatcher = Dispatcher::new(config, SharedSite(Arc::clone(&site)))
        .unwrap()
        .with_observer(Arc::new(NullObserver));
    (dispatcher.run().await, site)
}

/// Lets a test keep a handle on the site after the dispatcher takes ownership
struct SharedSite(Arc<TreeSite>);

impl Fetcher for SharedSite {
    async fn fetch(&self, address: &Address) -> Result<Document, FetchError> {
        self.0.fetch(address).await
    }
}

#[tokio::test]
async fn test_worker_count_does_not_change_visited_set() {
    let config_one = create_test_config(100, 1);
    let config_many = create_test_config(100, 8);

    let (serial, _) = run(&config_one, TreeSite::new(40, Duration::from_millis(1))).await;
    let (parallel, _) = run(&config_many, TreeSite::new(40, Duration::from_millis(1))).await;

    assert_eq!(serial.visited.len(), 40);
    assert_eq!(serial.visited, parallel.visited);
    assert_eq!(serial.pages.len(), parallel.pages.len());
    assert!(serial.statistics.batches > parallel.statistics.batches);
}

#[tokio::test]
async fn test_ceiling_caps_distinct_fetches() {
    let config = create_test_config(25, 4);

    let (report, site) = run(&config, TreeSite::new(40, Duration::from_millis(1))).await;

    assert_eq!(report.visited.len(), 25);
    assert_eq!(report.pages.len(), 25);
    assert_eq!(site.calls.lock().unwrap().len(), 25);
}

#[tokio::test]
async fn test_no_address_fetched_twice() {
    let config = create_test_config(100, 6);

    let (report, site) = run(&config, TreeSite::new(60, Duration::from_millis(2))).await;

    let calls = site.calls.lock().unwrap();
    assert_eq!(calls.len(), 60);
    assert!(calls.values().all(|count| *count == 1));

    let distinct: HashSet<_> = report.pages.iter().map(|p| p.address.clone()).collect();
    assert_eq!(distinct.len(), report.pages.len());
}

#[tokio::test]
async fn test_off_origin_links_not_followed() {
    let config = create_test_config(100, 4);

    let (report, site) = run(&config, TreeSite::new(7, Duration::ZERO)).await;

    assert_eq!(report.visited.len(), 7);
    assert!(!site
        .calls
        .lock()
        .unwrap()
        .keys()
        .any(|url| url.starts_with("https://elsewhere.test")));
    assert!(report
        .pages
        .iter()
        .flat_map(|p| p.links.iter())
        .all(|link| link.as_str().starts_with(SITE)));
}

#[tokio::test]
async fn test_in_flight_never_exceeds_workers() {
    let config = create_test_config(100, 4);

    let (report, site) = run(&config, TreeSite::new(31, Duration::from_millis(20))).await;

    assert_eq!(report.visited.len(), 31);
    let max = site.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 4, "saw {} concurrent fetches", max);
    assert!(max >= 2, "batches were not fetched concurrently");
}

#[tokio::test]
async fn test_cancellation_stops_between_batches() {
    let config = create_test_config(100, 2);
    let site = Arc::new(TreeSite::new(31, Duration::from_millis(1)));

    let dispatcher = Dispatcher::new(&config, SharedSite(Arc::clone(&site))).unwrap();
    let flag = dispatcher.cancellation_flag();
    let dispatcher = dispatcher.with_observer(Arc::new(CancelAfterBatch { flag, batch: 2 }));

    let report = dispatcher.run().await;

    // Batch 1 is the seed, batch 2 its two children; both complete
    assert!(report.statistics.cancelled);
    assert_eq!(report.statistics.batches, 2);
    assert_eq!(report.pages.len(), 3);
    assert!(!dispatcher.frontier().is_exhausted());
    assert_eq!(site.calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_home_links_do_not_requeue_seed() {
    let config = create_test_config(100, 4);

    let (report, site) = run(&config, TreeSite::new(5, Duration::ZERO)).await;

    assert_eq!(report.pages.len(), 5);
    assert!(report.failures.is_empty());
    assert_eq!(report.statistics.pages_visited, 5);
    assert_eq!(site.calls.lock().unwrap().get(&page_url(0)), Some(&1));
}

/// A small fixed site where one branch answers much slower than its sibling
struct LopsidedSite {
    pages: HashMap<String, (Duration, String)>,
}

impl LopsidedSite {
    fn new() -> Self {
        let page = |path: &str, latency_ms: u64, links: &[&str]| {
            let body: String = links
                .iter()
                .map(|link| format!(r#"<a href="{}">{}</a>"#, link, link))
                .collect();
            (
                format!("{}{}", SITE, path),
                (Duration::from_millis(latency_ms), body),
            )
        };
        Self {
            pages: HashMap::from([
                page("/", 0, &["/a", "/b"]),
                page("/a", 50, &["/a1", "/a2"]),
                page("/b", 0, &["/b1", "/b2"]),
                page("/a1", 0, &[]),
                page("/a2", 0, &[]),
                page("/b1", 0, &[]),
                page("/b2", 0, &[]),
            ]),
        }
    }
}

impl Fetcher for LopsidedSite {
    async fn fetch(&self, address: &Address) -> Result<Document, FetchError> {
        match self.pages.get(address.as_str()) {
            Some((latency, body)) => {
                tokio::time::sleep(*latency).await;
                Ok(Document::new(address.clone(), body.clone()))
            }
            None => Err(FetchError::new(address.clone(), FetchErrorKind::Status(404))),
        }
    }
}

async fn run_lopsided(workers: usize) -> Vec<String> {
    let mut config = create_test_config(5, workers);
    config.crawler.seed = format!("{}/", SITE);
    let dispatcher = Dispatcher::new(&config, LopsidedSite::new())
        .unwrap()
        .with_observer(Arc::new(NullObserver));
    dispatcher
        .run()
        .await
        .visited
        .iter()
        .map(|address| address.to_string())
        .collect()
}

#[tokio::test]
async fn test_slow_sibling_does_not_change_ceiling_cut() {
    let serial = run_lopsided(1).await;
    let parallel = run_lopsided(8).await;

    let expected: Vec<String> = ["/", "/a", "/a1", "/a2", "/b"]
        .iter()
        .map(|path| format!("{}{}", SITE, path))
        .collect();
    assert_eq!(serial, expected);
    assert_eq!(parallel, expected);
}

#[tokio::test]
async fn test_worker_count_does_not_change_visited_set_under_ceiling() {
    let config_one = create_test_config(25, 1);
    let config_many = create_test_config(25, 8);

    let (serial, _) = run(&config_one, TreeSite::new(40, Duration::from_millis(1))).await;
    let (parallel, _) = run(&config_many, TreeSite::new(40, Duration::from_millis(3))).await;

    assert_eq!(serial.visited.len(), 25);
    assert_eq!(serial.visited, parallel.visited);
}
