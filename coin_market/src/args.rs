//! Command-line arguments for the market consumer.
use clap::Parser;
use coin_common::net::{CHANNEL, DEFAULT_NSQD_ADDR, TOPIC};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// `nsqd` TCP address to consume from.
    #[clap(long, env = "NSQD_ADDR", default_value = DEFAULT_NSQD_ADDR)]
    pub nsqd_addr: String,

    /// `nsqlookupd` HTTP address. When set, every `nsqd` it reports for the topic is
    /// consumed instead of `--nsqd-addr`.
    #[clap(long, env = "NSQLOOKUPD_ADDR")]
    pub lookupd_addr: Option<String>,

    /// Topic carrying snapshot messages.
    #[clap(long, default_value = TOPIC)]
    pub topic: String,

    /// Consumer group (NSQ channel).
    #[clap(long, default_value = CHANNEL)]
    pub channel: String,

    /// Number of concurrent message handlers.
    #[clap(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Messages the bus may deliver before they are acknowledged.
    #[clap(long, default_value_t = 16)]
    pub max_in_flight: u32,

    /// Seconds between table summaries in the log.
    #[clap(long, default_value_t = 30)]
    pub report_interval_secs: u64,
}
