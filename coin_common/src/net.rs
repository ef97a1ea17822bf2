//! Shared networking constants and helpers used by the relay and the market consumer.
use std::time::Duration;

/// Bus topic every snapshot is published under.
pub const TOPIC: &str = "coins";
/// Consumer group (NSQ channel) the market consumer subscribes with.
pub const CHANNEL: &str = "market";
/// Default `nsqd` TCP address.
pub const DEFAULT_NSQD_ADDR: &str = "127.0.0.1:4150";

/// Default market data provider base URL.
pub const DEFAULT_PROVIDER_URL: &str = "https://api.coingecko.com/api/v3";
/// Default target currency for prices.
pub const DEFAULT_VS_CURRENCY: &str = "usd";
/// Percentage-change windows requested from the provider.
pub const PRICE_CHANGE_WINDOWS: &str = "1h,24h,7d,30d,1y";

/// Deadline for establishing a provider connection.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause between two fetch cycles.
pub const FETCH_INTERVAL: Duration = Duration::from_secs(10);
/// Period after which the held provider connection is force-closed.
pub const RECYCLE_PERIOD: Duration = Duration::from_secs(60);

/// Helper to format a host and port like "host:port".
pub fn addr(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}
