//! Provider endpoint parsing and request target building.
use std::str::FromStr;

use coin_common::net::addr;
use coin_common::{CoinError, Result};
use strum_macros::{Display, EnumString};
use url::{Position, Url};

/// URL scheme understood by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Scheme {
    /// Plain TCP.
    #[strum(serialize = "http")]
    Http,
    /// TLS over TCP.
    #[strum(serialize = "https")]
    Https,
}

impl Scheme {
    /// Port used when the URL does not name one.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Base URL of an HTTP service: scheme, host, port and path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    url: Url,
}

impl Endpoint {
    /// URL scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host name or address.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.url
            .port_or_known_default()
            .unwrap_or_else(|| self.scheme.default_port())
    }

    /// `host:port` to dial.
    pub fn socket_addr(&self) -> String {
        addr(self.host(), self.port())
    }

    /// Value of the `Host` header: the port is omitted when it is the scheme default.
    pub fn authority(&self) -> String {
        match self.url.port() {
            Some(port) => addr(self.host(), port),
            None => self.host().to_string(),
        }
    }

    /// Request target for `path` below the base path with an encoded query string.
    pub fn target(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut url = self.url.clone();
        url.set_path(&format!("{}{}", self.url.path().trim_end_matches('/'), path));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url[Position::BeforePath..].to_string()
    }
}

impl FromStr for Endpoint {
    type Err = CoinError;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let mut url = Url::parse(raw).map_err(|e| CoinError::InvalidUrl(format!("{}: {}", raw, e)))?;
        let scheme = Scheme::from_str(url.scheme())
            .map_err(|_| CoinError::InvalidUrl(format!("unsupported scheme: {}", raw)))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(CoinError::InvalidUrl(format!("missing host: {}", raw)));
        }

        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&base_path);
        url.set_query(None);
        url.set_fragment(None);
        Ok(Endpoint { scheme, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_url() {
        let endpoint: Endpoint = "https://api.coingecko.com/api/v3/".parse().unwrap();
        assert_eq!(endpoint.scheme(), Scheme::Https);
        assert_eq!(endpoint.host(), "api.coingecko.com");
        assert_eq!(endpoint.port(), 443);
        assert_eq!(endpoint.authority(), "api.coingecko.com");
        assert_eq!(endpoint.socket_addr(), "api.coingecko.com:443");
        assert_eq!(endpoint.target("/ping", &[]), "/api/v3/ping");
    }

    #[test]
    fn explicit_port_appears_in_authority() {
        let endpoint: Endpoint = "HTTP://127.0.0.1:8089".parse().unwrap();
        assert_eq!(endpoint.scheme(), Scheme::Http);
        assert_eq!(endpoint.authority(), "127.0.0.1:8089");
        assert_eq!(endpoint.target("", &[]), "/");
    }

    #[test]
    fn query_values_are_encoded() {
        let endpoint: Endpoint = "http://localhost/api?stale=1".parse().unwrap();
        let target = endpoint.target("/coins/markets", &[("ids", "bitcoin,usd-coin"), ("q", "a b")]);
        assert_eq!(target, "/api/coins/markets?ids=bitcoin%2Cusd-coin&q=a+b");
    }

    #[test]
    fn rejects_bad_urls() {
        assert!("api.coingecko.com".parse::<Endpoint>().is_err());
        assert!("ftp://host/x".parse::<Endpoint>().is_err());
        assert!("http://host:99999".parse::<Endpoint>().is_err());
        assert!("http://:80/path".parse::<Endpoint>().is_err());
    }
}
