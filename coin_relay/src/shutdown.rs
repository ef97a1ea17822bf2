//! Ordered shutdown of the relay pipeline.
//!
//! The coordinator walks `RUNNING -> STOPPING -> DRAINING -> STOPPED`:
//!
//! - `STOPPING`: the fetch loop is told to stop, the recycle timer is stopped and the
//!   transport is shut down: its held connection is torn down so an in-flight request
//!   fails fast, and any connection dialed afterwards is refused.
//! - `DRAINING`: once the fetch loop has confirmed its exit the hand-off channel is
//!   closed; the publish worker empties it and releases the bus publisher.
//! - `STOPPED`: once the publish worker has confirmed, the store is closed.
//!
//! Each transition waits for the previous worker's completion signal, so every
//! message that reached the hand-off channel is attempted before the store goes away.
use std::fmt;
use std::sync::Arc;

use coin_common::{EncodedMessage, WatchListStore};
use crossbeam_channel::Sender;
use log::{error, info, warn};
use strum_macros::Display;

use crate::fetch_loop::FetchStats;
use crate::publisher::PublishStats;
use crate::transport::{ConnectionHandle, ConnectionRecycler};
use crate::worker::{Completion, WorkerHandle};

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShutdownState {
    /// Workers running.
    #[strum(serialize = "RUNNING")]
    Running,
    /// Fetch loop asked to stop.
    #[strum(serialize = "STOPPING")]
    Stopping,
    /// Hand-off channel closed, publish worker draining.
    #[strum(serialize = "DRAINING")]
    Draining,
    /// Everything released.
    #[strum(serialize = "STOPPED")]
    Stopped,
}

/// Summary of a completed shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Fetch loop totals.
    pub fetch: FetchStats,
    /// Publish worker totals.
    pub publish: PublishStats,
    /// Messages left on the hand-off channel after the publish worker exited.
    pub undrained: usize,
    /// Completion signals received from the fetch loop.
    pub fetch_signals: usize,
    /// Completion signals received from the publish worker.
    pub publisher_signals: usize,
    /// Whether the store closed cleanly.
    pub store_closed: bool,
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycles ({} skipped), {} forwarded, {} published, {} failed, {} undrained",
            self.fetch.cycles,
            self.fetch.skipped,
            self.fetch.forwarded,
            self.publish.published,
            self.publish.failed,
            self.undrained
        )
    }
}

/// Everything the coordinator tears down.
pub(crate) struct Workers {
    pub(crate) stop_tx: Sender<()>,
    pub(crate) fetch: WorkerHandle<FetchStats>,
    pub(crate) publish: WorkerHandle<PublishStats>,
    pub(crate) recycler: ConnectionRecycler,
    pub(crate) connection: ConnectionHandle,
    pub(crate) handoff: Sender<EncodedMessage>,
    pub(crate) store: Arc<dyn WatchListStore>,
}

/// Owner of the running pipeline.
pub struct ShutdownCoordinator {
    state: ShutdownState,
    workers: Option<Workers>,
    report: Option<ShutdownReport>,
}

impl ShutdownCoordinator {
    pub(crate) fn new(workers: Workers) -> Self {
        Self {
            state: ShutdownState::Running,
            workers: Some(workers),
            report: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Stop the pipeline in order and report what it did. Calling it again returns
    /// the first report.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let Some(workers) = self.workers.take() else {
            return self.report.clone().unwrap_or_default();
        };
        let Workers {
            stop_tx,
            fetch,
            publish,
            recycler,
            connection,
            handoff,
            store,
        } = workers;
        let mut report = ShutdownReport::default();

        self.transition(ShutdownState::Stopping);
        let _ = stop_tx.try_send(());
        drop(stop_tx);
        recycler.stop();
        match connection.shutdown() {
            Ok(true) => info!("Provider connection torn down"),
            Ok(false) => {}
            Err(e) => warn!("Could not tear down provider connection: {}", e),
        }
        if let Some(done) = settle(fetch) {
            report.fetch = done.output;
            report.fetch_signals = done.signals;
        }

        self.transition(ShutdownState::Draining);
        drop(handoff);
        if let Some(done) = settle(publish) {
            report.publish = done.output;
            report.publisher_signals = done.signals;
        }
        report.undrained = report.publish.undrained;
        if report.undrained > 0 {
            warn!("{} messages were never published", report.undrained);
        }

        self.transition(ShutdownState::Stopped);
        match store.close() {
            Ok(()) => report.store_closed = true,
            Err(e) => error!("Store close failed [{}]: {}", e.category(), e),
        }
        info!("Shutdown complete: {}", report);

        self.report = Some(report.clone());
        report
    }

    fn transition(&mut self, next: ShutdownState) {
        info!("Pipeline {} -> {}", self.state, next);
        self.state = next;
    }
}

impl Drop for ShutdownCoordinator {
    fn drop(&mut self) {
        if self.workers.is_some() {
            self.shutdown();
        }
    }
}

fn settle<T: Send + 'static>(worker: WorkerHandle<T>) -> Option<Completion<T>> {
    let name = worker.name().to_string();
    match worker.wait() {
        Ok(done) => Some(done),
        Err(e) => {
            error!("{} did not complete [{}]: {}", name, e.category(), e);
            None
        }
    }
}
