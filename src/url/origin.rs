use crate::url::Address;
use std::fmt;

/// The (scheme, host, port) triple of an address
///
/// A crawl is bounded by the origin of its seed: an address is in scope iff
/// its origin equals the seed's. Ports are compared after filling in the
/// scheme's default, so `http://example.com/` and `http://example.com:80/`
/// share an origin while `https://example.com/` does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Origin {
    /// Returns the origin of an address
    pub fn of(address: &Address) -> Self {
        let url = address.as_url();
        Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_lowercase(),
            port: url.port_or_known_default(),
        }
    }

    /// Returns true if the address belongs to this origin
    pub fn contains(&self, address: &Address) -> bool {
        let url = address.as_url();
        url.scheme() == self.scheme
            && url
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(&self.host))
            && url.port_or_known_default() == self.port
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}://{}:{}", self.scheme, self.host, port),
            None => write!(f, "{}://{}", self.scheme, self.host),
        }
    }
}
