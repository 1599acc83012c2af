//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end over real HTTP.

use std::collections::HashSet;
use std::time::Duration;
use sumi_harvest::config::Config;
use sumi_harvest::crawler::{crawl, FetchErrorKind};
use sumi_harvest::output::{write_records_to_path, OutputFormat};
use sumi_harvest::HarvestError;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for the given seed with no politeness delay
fn create_test_config(seed: &str) -> Config {
    let mut config = Config::new(seed);
    config.crawler.politeness_delay = 0;
    config.crawler.workers = 4;
    config.http.user_agent = "TestHarvester/1.0".to_string();
    config.http.timeout_secs = 5;
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

async fn mount_page(server: &MockServer, page: &str, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_single_origin() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<html><head><title>Home</title></head><body>
            <a href="/a">A</a><a href="/b">B</a>
        </body></html>"#,
        1,
    )
    .await;
    mount_page(
        &server,
        "/a",
        r#"<html><head><title>A</title></head><body>
            <a href="/b">B</a><a href="/c">C</a>
        </body></html>"#,
        1,
    )
    .await;
    mount_page(
        &server,
        "/b",
        r#"<html><head><title>B</title></head><body><a href="/">Home</a></body></html>"#,
        1,
    )
    .await;
    mount_page(&server, "/c", r#"<title>C</title>"#, 1).await;

    let config = create_test_config(&format!("{}/", server.uri()));
    let report = crawl(config).await.unwrap();

    assert_eq!(report.pages.len(), 4);
    assert_eq!(report.failure_count(), 0);
    assert_eq!(report.visited.len(), 4);

    let titles: HashSet<_> = report.pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, HashSet::from(["Home", "A", "B", "C"]));

    let home = report.pages.iter().find(|p| p.title == "Home").unwrap();
    assert_eq!(home.links.len(), 2);
    assert_eq!(home.field("title"), Some("Home"));
}

#[tokio::test]
async fn test_max_pages_one_fetches_only_seed() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<title>Home</title><a href="/a">A</a><a href="/b">B</a>"#,
        1,
    )
    .await;
    mount_page(&server, "/a", "<title>A</title>", 0).await;
    mount_page(&server, "/b", "<title>B</title>", 0).await;

    let mut config = create_test_config(&format!("{}/", server.uri()));
    config.crawler.max_pages = 1;

    let report = crawl(config).await.unwrap();

    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.visited.len(), 1);
    // The record still lists the links it found
    assert_eq!(report.pages[0].links.len(), 2);
}

#[tokio::test]
async fn test_ceiling_bounds_distinct_fetches() {
    let server = MockServer::start().await;

    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", &links, 1).await;

    Mock::given(method("GET"))
        .respond_with(html("<p>leaf</p>"))
        .mount(&server)
        .await;

    let mut config = create_test_config(&format!("{}/", server.uri()));
    config.crawler.max_pages = 5;
    config.crawler.workers = 3;

    let report = crawl(config).await.unwrap();

    assert_eq!(report.visited.len(), 5);
    assert_eq!(report.pages.len(), 5);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
}

#[tokio::test]
async fn test_cycle_fetches_each_page_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/a",
        &format!(r#"<title>A</title><a href="{}/b">B</a>"#, base),
        1,
    )
    .await;
    mount_page(
        &server,
        "/b",
        &format!(r#"<title>B</title><a href="{}/a">A</a><a href="/b">self</a>"#, base),
        1,
    )
    .await;

    let config = create_test_config(&format!("{}/a", base));
    let report = crawl(config).await.unwrap();

    assert_eq!(report.pages.len(), 2);
    assert_eq!(report.statistics.batches, 2);
}

#[tokio::test]
async fn test_seed_server_error_yields_no_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/", server.uri()));
    let report = crawl(config).await.unwrap();

    assert!(report.pages.is_empty());
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.failures[0].kind, FetchErrorKind::Status(500));
    assert_eq!(report.visited.len(), 1);
}

#[tokio::test]
async fn test_missing_page_is_failure_not_abort() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="/gone">Gone</a><a href="/ok">Ok</a>"#,
        1,
    )
    .await;
    mount_page(&server, "/ok", "<title>Ok</title>", 1).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/", server.uri()));
    let report = crawl(config).await.unwrap();

    assert_eq!(report.pages.len(), 2);
    assert_eq!(report.failure_count(), 1);
    assert!(report.failures[0].address.as_str().ends_with("/gone"));
    assert_eq!(report.failures[0].kind, FetchErrorKind::Status(404));
    assert_eq!(report.statistics.pages_visited, 3);
}

#[tokio::test]
async fn test_off_origin_links_never_requested() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;

    mount_page(
        &server,
        "/",
        &format!(
            r#"<title>Home</title><a href="{}/elsewhere">Other</a><a href="/local">Local</a>"#,
            other.uri()
        ),
        1,
    )
    .await;
    mount_page(&server, "/local", "<title>Local</title>", 1).await;
    mount_page(&other, "/elsewhere", "<title>Elsewhere</title>", 0).await;

    let config = create_test_config(&format!("{}/", server.uri()));
    let report = crawl(config).await.unwrap();

    assert_eq!(report.pages.len(), 2);
    let home = report.pages.iter().find(|p| p.title == "Home").unwrap();
    assert_eq!(home.links.len(), 1);
    assert!(home.links[0].as_str().ends_with("/local"));
}

#[tokio::test]
async fn test_fetch_timeout_is_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<title>Slow</title>").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = create_test_config(&format!("{}/", server.uri()));
    config.http.timeout_secs = 1;

    let report = crawl(config).await.unwrap();

    assert!(report.pages.is_empty());
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.failures[0].kind, FetchErrorKind::Timeout);
}

#[tokio::test]
async fn test_user_agent_header_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "TestHarvester/1.0"))
        .respond_with(html("<title>Agent</title>"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/", server.uri()));
    let report = crawl(config).await.unwrap();

    // An unmatched header would have produced a 404 failure
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages[0].title, "Agent");
}

#[tokio::test]
async fn test_structured_extraction() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/catalog/",
        r#"<html><head><title> Catalog </title></head><body>
            <h1>Products</h1>
            <p>Contact sales@example.com for bulk orders.</p>
            <img src="img/tea.png" alt="Tea" width="64" height="64">
            <img alt="placeholder">
            <table>
                <tr><th>Item</th><th>Price</th></tr>
                <tr><td>Green tea</td><td>$4.50</td></tr>
            </table>
            <form action="search" method="post">
                <input type="text" name="q">
                <input type="hidden" name="lang" value="en">
            </form>
        </body></html>"#,
        1,
    )
    .await;

    let seed = format!("{}/catalog/", server.uri());
    let mut config = create_test_config(&seed);
    config.extract.patterns = vec![sumi_harvest::crawler::TextPattern::Emails];

    let report = crawl(config).await.unwrap();
    assert_eq!(report.pages.len(), 1);
    let page = &report.pages[0];

    assert_eq!(page.title, "Catalog");
    assert_eq!(page.address.as_str(), seed);

    assert_eq!(page.images.len(), 1);
    assert_eq!(page.images[0].url, format!("{}/catalog/img/tea.png", server.uri()));
    assert_eq!(page.images[0].alt, "Tea");
    assert_eq!(page.images[0].width, "64");

    assert_eq!(page.tables.len(), 1);
    assert_eq!(page.tables[0][1], vec!["Green tea", "$4.50"]);

    assert_eq!(page.forms.len(), 1);
    assert_eq!(page.forms[0].action, format!("{}/catalog/search", server.uri()));
    assert_eq!(page.forms[0].method, "post");
    assert_eq!(page.forms[0].fields.len(), 2);
    assert_eq!(page.forms[0].fields[1].value, "en");

    assert_eq!(page.field("h1"), Some("Products"));
    assert_eq!(
        page.matches_for("emails"),
        Some(&["sales@example.com".to_string()][..])
    );
}

#[tokio::test]
async fn test_records_written_as_json_and_csv() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<title>Home</title><a href="/a">A</a>"#, 1).await;
    mount_page(&server, "/a", r#"<title>A</title><h1>Heading</h1>"#, 1).await;

    let config = create_test_config(&format!("{}/", server.uri()));
    let report = crawl(config).await.unwrap();
    assert_eq!(report.pages.len(), 2);

    let dir = tempfile::tempdir().unwrap();

    let json_path = dir.path().join("harvest.json");
    write_records_to_path(&report.pages, OutputFormat::Json, &json_path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json.as_array().map(Vec::len), Some(2));

    let csv_path = dir.path().join("harvest.csv");
    write_records_to_path(&report.pages, OutputFormat::Csv, &csv_path).unwrap();
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(&headers[..3], &["url", "title", "fetched_at"]);
    assert!(headers.contains(&"h1".to_string()));
    assert_eq!(reader.records().count(), 2);
}

#[tokio::test]
async fn test_invalid_config_sends_no_requests() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Home</title>", 0).await;

    let mut config = create_test_config(&format!("{}/", server.uri()));
    config.crawler.workers = 0;

    assert!(crawl(config).await.is_err());
}

#[tokio::test]
async fn test_bad_user_agent_is_config_error() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Home</title>", 0).await;

    let mut config = create_test_config(&format!("{}/", server.uri()));
    config.http.user_agent = "Bot\r\nX-Injected: 1".to_string();

    assert!(matches!(crawl(config).await, Err(HarvestError::Config(_))));
}
