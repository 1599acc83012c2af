//! HTTP fetcher implementation
//!
//! This module handles all outbound requests for the crawler, including:
//! - Building the HTTP client with the configured User-Agent and timeout
//! - Retrieving a single address with GET
//! - Classifying every failure into a [`FetchError`] that never escapes a batch

use crate::config::HttpConfig;
use crate::url::Address;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on the time spent establishing a connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A fetched HTML document
///
/// Holds the raw source of a page together with the address it was requested
/// from. Parsing is left to the extractor so a document can move freely
/// between tasks.
#[derive(Debug, Clone)]
pub struct Document {
    address: Address,
    body: String,
}

impl Document {
    pub fn new(address: Address, body: impl Into<String>) -> Self {
        Self {
            address,
            body: body.into(),
        }
    }

    /// The address the document was requested from
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The raw HTML source
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchErrorKind {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("fetch task aborted: {0}")]
    Aborted(String),
}

/// A failed fetch of one address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to fetch {address}: {kind}")]
pub struct FetchError {
    pub address: Address,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(address: Address, kind: FetchErrorKind) -> Self {
        Self { address, kind }
    }
}

/// Retrieves documents
///
/// Implementations must be cheap to share between tasks; the dispatcher holds
/// one behind an `Arc` and calls it from every worker of a batch. A fetcher
/// does not enforce crawl scope and must not touch crawl state.
pub trait Fetcher: Send + Sync {
    /// Fetches a single address
    fn fetch(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<Document, FetchError>> + Send;
}

/// Builds an HTTP client with proper configuration
///
/// The client follows redirects (reqwest's default policy of up to 10 hops),
/// keeps no cookie store, and applies the configured timeout to each request
/// as a whole.
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::HttpConfig;
/// use sumi_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let timeout = config.timeout();

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(CONNECT_TIMEOUT))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a client built from the HTTP configuration
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::from_client(build_http_client(config)?))
    }

    /// Wraps an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, address: &Address) -> Result<Document, FetchError> {
        tracing::debug!("Fetching {}", address);

        let response = self
            .client
            .get(address.as_str())
            .send()
            .await
            .map_err(|e| FetchError::new(address.clone(), classify_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                address.clone(),
                FetchErrorKind::Status(status.as_u16()),
            ));
        }

        let body = response.text().await.map_err(|e| {
            let kind = if e.is_timeout() {
                FetchErrorKind::Timeout
            } else {
                FetchErrorKind::Body(e.to_string())
            };
            FetchError::new(address.clone(), kind)
        })?;

        Ok(Document::new(address.clone(), body))
    }
}

/// Maps a reqwest error onto the fetch failure taxonomy
fn classify_error(error: &reqwest::Error) -> FetchErrorKind {
    if error.is_timeout() {
        FetchErrorKind::Timeout
    } else if error.is_connect() {
        FetchErrorKind::Connect(error.to_string())
    } else if let Some(status) = error.status() {
        FetchErrorKind::Status(status.as_u16())
    } else {
        FetchErrorKind::Transport(error.to_string())
    }
}
