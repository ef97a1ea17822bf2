//! Command-line arguments for the coin relay.
use std::path::PathBuf;

use clap::Parser;
use coin_common::net::{DEFAULT_NSQD_ADDR, DEFAULT_PROVIDER_URL, DEFAULT_VS_CURRENCY, TOPIC};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the watch-list file.
    /// Ids may be separated by commas, spaces, or new lines; `#` starts a comment.
    #[clap(long, env = "COIN_WATCH_LIST")]
    pub watch_list: PathBuf,

    /// Base URL of the market data provider.
    #[clap(long, env = "COIN_PROVIDER_URL", default_value = DEFAULT_PROVIDER_URL)]
    pub provider_url: String,

    /// Currency prices are quoted in.
    #[clap(long, default_value = DEFAULT_VS_CURRENCY)]
    pub vs_currency: String,

    /// `nsqd` TCP address snapshots are published to.
    #[clap(long, env = "NSQD_ADDR", default_value = DEFAULT_NSQD_ADDR)]
    pub nsqd_addr: String,

    /// Topic snapshots are published under.
    #[clap(long, default_value = TOPIC)]
    pub topic: String,

    /// Seconds between fetch cycles.
    #[clap(long, default_value_t = 10)]
    pub fetch_interval_secs: u64,

    /// Seconds after which the held provider connection is force-closed.
    #[clap(long, default_value_t = 60)]
    pub recycle_secs: u64,
}
