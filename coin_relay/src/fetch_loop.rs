//! Periodic fetch and fan-out of provider snapshots.
//!
//! Each cycle reads the watch-list from the store, issues one bulk request through
//! the transport and decodes the response as a stream of JSON array frames. Every
//! decoded snapshot whose id is on the watch-list is encoded and pushed onto the
//! hand-off channel in stream order. A failure at any step skips the rest of the
//! cycle; the loop itself only ends when asked to stop, and it only looks at the
//! stop signal between cycles.
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use coin_common::{CoinError, EncodedMessage, InstrumentSnapshot, Result, WatchListStore};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, info, warn};
use serde_json::StreamDeserializer;
use serde_json::de::IoRead;

use crate::provider::Provider;
use crate::transport::Transport;
use crate::worker::WorkerHandle;

/// Outcome of a single fetch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Snapshots decoded from the response.
    pub decoded: u64,
    /// Snapshots put on the hand-off channel.
    pub forwarded: u64,
    /// Snapshots dropped because their id is not watched.
    pub filtered: u64,
    /// Whether decoding stopped early on a bad frame or a broken read.
    pub truncated: bool,
}

/// Totals returned by the fetch loop when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Cycles started.
    pub cycles: u64,
    /// Cycles abandoned on a store, network or channel failure.
    pub skipped: u64,
    /// Snapshots put on the hand-off channel across all cycles.
    pub forwarded: u64,
}

/// Lazily decode consecutive JSON arrays of snapshots from `body`.
pub fn decode_batches<R: Read>(
    body: R,
) -> StreamDeserializer<'static, IoRead<R>, Vec<InstrumentSnapshot>> {
    serde_json::Deserializer::from_reader(body).into_iter::<Vec<InstrumentSnapshot>>()
}

/// The producing side of the pipeline.
pub struct FetchLoop {
    store: Arc<dyn WatchListStore>,
    transport: Arc<Transport>,
    provider: Provider,
    handoff: Sender<EncodedMessage>,
    interval: Duration,
}

impl FetchLoop {
    /// Fetch loop feeding `handoff` every `interval`.
    pub fn new(
        store: Arc<dyn WatchListStore>,
        transport: Arc<Transport>,
        provider: Provider,
        handoff: Sender<EncodedMessage>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            provider,
            handoff,
            interval,
        }
    }

    /// Run one fetch cycle to completion or failure.
    pub fn run_cycle(&self) -> Result<CycleReport> {
        let watch_list = self.store.list()?;
        let mut report = CycleReport::default();
        if watch_list.is_empty() {
            debug!("Watch-list is empty, nothing to fetch");
            return Ok(report);
        }

        let request = self.provider.markets_request(&watch_list);
        let response = self.transport.acquire(&request)?;

        for batch in decode_batches(response.into_body()) {
            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    report.truncated = true;
                    if e.is_io() {
                        warn!("Provider read interrupted after {} snapshots: {}", report.decoded, e);
                    } else {
                        let e = CoinError::from(e);
                        warn!("Dropping rest of response [{}]: {}", e.category(), e);
                    }
                    break;
                }
            };

            for snapshot in batch {
                report.decoded += 1;
                if !watch_list.contains(&snapshot.id) {
                    report.filtered += 1;
                    continue;
                }
                let message = match snapshot.encode() {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Could not encode {} [{}]: {}", snapshot.id, e.category(), e);
                        continue;
                    }
                };
                self.handoff
                    .send(message)
                    .map_err(|_| CoinError::ChannelSend("hand-off channel closed".into()))?;
                report.forwarded += 1;
            }
        }
        Ok(report)
    }

    /// Run cycles until `stop_rx` fires or disconnects.
    pub fn run(self, stop_rx: Receiver<()>) -> FetchStats {
        info!("Fetch loop: Started, interval {:?}", self.interval);
        let mut stats = FetchStats::default();

        loop {
            match stop_rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }

            stats.cycles += 1;
            match self.run_cycle() {
                Ok(report) => {
                    stats.forwarded += report.forwarded;
                    info!(
                        "Fetch cycle {}: decoded {}, forwarded {}, filtered {}",
                        stats.cycles, report.decoded, report.forwarded, report.filtered
                    );
                }
                Err(e) => {
                    stats.skipped += 1;
                    warn!("Fetch cycle {} skipped [{}]: {}", stats.cycles, e.category(), e);
                }
            }

            match stop_rx.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }
        }

        info!(
            "Fetch loop: Stopped after {} cycles ({} skipped, {} forwarded)",
            stats.cycles, stats.skipped, stats.forwarded
        );
        stats
    }

    /// Run the loop on its own thread.
    pub fn spawn(self, stop_rx: Receiver<()>) -> Result<WorkerHandle<FetchStats>> {
        WorkerHandle::spawn("fetch-loop", move || self.run(stop_rx))
    }
}
