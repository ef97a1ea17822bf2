//! Market consumer binary.
//!
//! Subscribes to the snapshot topic on `nsqd` (or on every node `nsqlookupd` reports
//! for it), merges every message into an in-memory
//! table and logs a summary of it periodically. Runs until SIGINT or SIGTERM.
//!
//! Usage example (CLI):
//! ```bash
//! coin_market --nsqd-addr 127.0.0.1:4150 --concurrency 4
//! coin_market --lookupd-addr 127.0.0.1:4161
//! ```
#![warn(missing_docs)]
mod args;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use coin_common::bus::NsqSubscriber;
use coin_common::{CoinError, Result};
use coin_market::{AggregationConsumer, Reporter, SnapshotTable, lookup_producers};
use crossbeam_channel::bounded;
use log::info;

use crate::args::Args;

fn main() -> Result<(), CoinError> {
    init_logger();
    let args = Args::parse();

    let consumer = Arc::new(AggregationConsumer::new(Arc::new(SnapshotTable::new())));
    let nsqd_addrs = match &args.lookupd_addr {
        Some(lookupd) => lookup_producers(lookupd, &args.topic)?
            .iter()
            .map(|producer| producer.tcp_addr())
            .collect(),
        None => vec![args.nsqd_addr.clone()],
    };
    let mut subscriptions = Vec::with_capacity(nsqd_addrs.len());
    for addr in &nsqd_addrs {
        let bus = NsqSubscriber::new(addr, args.max_in_flight);
        subscriptions.push(consumer.subscribe(&bus, &args.topic, &args.channel, args.concurrency)?);
        info!("Consuming '{}' from {}", args.topic, addr);
    }
    let reporter = Reporter::spawn(
        Arc::clone(&consumer),
        Duration::from_secs(args.report_interval_secs),
    )?;

    let (signal_tx, signal_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = signal_tx.try_send(());
    })
    .map_err(|e| CoinError::Signal(e.to_string()))?;

    signal_rx
        .recv()
        .map_err(|e| CoinError::ChannelRecv(e.to_string()))?;
    info!("Termination signal received, shutting down");
    for subscription in subscriptions {
        subscription.stop();
    }
    reporter.stop();
    info!(
        "Market consumer exited: {} instruments, {} merged, {} discarded",
        consumer.table().len()?,
        consumer.merged(),
        consumer.discarded()
    );
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
