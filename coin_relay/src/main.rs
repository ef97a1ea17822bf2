//! Coin relay binary.
//!
//! Opens the watch-list store and the bus connection, starts the fetch and publish
//! workers, and runs until SIGINT or SIGTERM. On the signal the pipeline is shut down
//! in order: stop fetching, drain the hand-off channel onto the bus, close the store.
//!
//! Usage example (CLI):
//! ```bash
//! coin_relay --watch-list ./coins.txt --nsqd-addr 127.0.0.1:4150
//! ```
//!
//! Startup fails with a non-zero exit code when the store or the bus is unreachable.
#![warn(missing_docs)]
mod args;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use coin_common::bus::NsqProducer;
use coin_common::net::DIAL_TIMEOUT;
use coin_common::{CoinError, FileWatchList, Result, WatchListStore};
use coin_relay::{Pipeline, PipelineSettings, Provider, Transport};
use crossbeam_channel::bounded;
use log::info;

use crate::args::Args;

fn main() -> Result<(), CoinError> {
    init_logger();
    let args = Args::parse();

    let store: Arc<dyn WatchListStore> = Arc::new(FileWatchList::open(&args.watch_list)?);
    let publisher = NsqProducer::connect(&args.nsqd_addr)?;
    let transport = Arc::new(Transport::new(DIAL_TIMEOUT)?);
    let provider = Provider::new(&args.provider_url, &args.vs_currency)?;

    let (signal_tx, signal_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = signal_tx.try_send(());
    })
    .map_err(|e| CoinError::Signal(e.to_string()))?;

    let settings = PipelineSettings {
        topic: args.topic,
        fetch_interval: Duration::from_secs(args.fetch_interval_secs),
        recycle_period: Duration::from_secs(args.recycle_secs),
        ..PipelineSettings::default()
    };
    let mut coordinator =
        Pipeline::new(store, transport, provider, Box::new(publisher), settings).start()?;

    signal_rx
        .recv()
        .map_err(|e| CoinError::ChannelRecv(e.to_string()))?;
    info!("Termination signal received, shutting down");
    let report = coordinator.shutdown();
    info!("Relay exited: {}", report);
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
