use crate::url::Origin;
use crate::{UrlError, UrlResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// An absolute http(s) URL identifying one crawlable page
///
/// Two addresses are equal iff their serialized forms are equal. Parsing goes
/// through [`Url`], so scheme and host case and default ports are already
/// normalized, but nothing else is: trailing slashes, query parameter order
/// and fragments all make addresses distinct.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::Address;
///
/// let a = Address::parse("https://example.com/docs").unwrap();
/// let b = Address::parse("https://example.com/docs/").unwrap();
/// assert_ne!(a, b);
///
/// let c = a.resolve("guide?b=2&a=1").unwrap();
/// assert_eq!(c.as_str(), "https://example.com/guide?b=2&a=1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(Url);

impl Address {
    /// Parses an absolute address
    ///
    /// # Returns
    ///
    /// * `Ok(Address)` - The input is an absolute http or https URL with a host
    /// * `Err(UrlError)` - The input is empty, malformed, uses another scheme,
    ///   or has no host
    pub fn parse(input: &str) -> UrlResult<Self> {
        let url = Url::parse(input.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        Self::from_url(url)
    }

    /// Wraps an already parsed URL, applying the same checks as [`Address::parse`]
    pub fn from_url(url: Url) -> UrlResult<Self> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                url.scheme()
            )));
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(UrlError::MissingHost);
        }

        Ok(Self(url))
    }

    /// Resolves a reference (href, src, action) against this address
    ///
    /// Returns `None` when the reference cannot be joined or resolves to
    /// something that is not a crawlable address (`mailto:`, `javascript:`, ...).
    pub fn resolve(&self, reference: &str) -> Option<Address> {
        let joined = self.0.join(reference.trim()).ok()?;
        Self::from_url(joined).ok()
    }

    /// Returns the origin (scheme, host, port) of this address
    pub fn origin(&self) -> Origin {
        Origin::of(self)
    }

    /// Returns the serialized address
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the underlying parsed URL
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Address {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
