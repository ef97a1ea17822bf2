//! Market data provider requests.
use coin_common::net::PRICE_CHANGE_WINDOWS;
use coin_common::{Result, WatchList};

use crate::transport::{Endpoint, Request};

const MARKETS_PATH: &str = "/coins/markets";

/// Builds bulk snapshot requests against the provider's markets endpoint.
#[derive(Debug, Clone)]
pub struct Provider {
    endpoint: Endpoint,
    vs_currency: String,
}

impl Provider {
    /// Provider rooted at `base_url` quoting prices in `vs_currency`.
    pub fn new(base_url: &str, vs_currency: &str) -> Result<Self> {
        Ok(Self {
            endpoint: base_url.parse()?,
            vs_currency: vs_currency.to_string(),
        })
    }

    /// Provider base endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// One request covering every id of `watch_list`, with the 7 day sparkline and
    /// all percentage-change windows.
    pub fn markets_request(&self, watch_list: &WatchList) -> Request {
        let ids = watch_list.joined();
        let target = self.endpoint.target(
            MARKETS_PATH,
            &[
                ("ids", ids.as_str()),
                ("vs_currency", self.vs_currency.as_str()),
                ("sparkline", "true"),
                ("price_change_percentage", PRICE_CHANGE_WINDOWS),
            ],
        );
        Request::get(&self.endpoint, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markets_request_carries_all_ids_and_windows() {
        let provider = Provider::new("https://api.coingecko.com/api/v3", "usd").unwrap();
        let request = provider.markets_request(&WatchList::from_ids(["bitcoin", "ethereum"]));
        assert_eq!(request.endpoint().host(), "api.coingecko.com");
        assert_eq!(
            request.target(),
            "/api/v3/coins/markets?ids=bitcoin%2Cethereum&vs_currency=usd&sparkline=true\
             &price_change_percentage=1h%2C24h%2C7d%2C30d%2C1y"
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(Provider::new("api.coingecko.com", "usd").is_err());
    }
}
