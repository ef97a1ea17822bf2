//! Start-up wiring of the relay pipeline.
use std::sync::Arc;
use std::time::Duration;

use coin_common::bus::Publisher;
use coin_common::net::{FETCH_INTERVAL, RECYCLE_PERIOD, TOPIC};
use coin_common::{EncodedMessage, Result, WatchListStore};
use crossbeam_channel::bounded;
use log::info;

use crate::fetch_loop::FetchLoop;
use crate::provider::Provider;
use crate::publisher::PublishWorker;
use crate::shutdown::{ShutdownCoordinator, Workers};
use crate::transport::{ConnectionRecycler, Transport};

/// Default number of encoded snapshots the hand-off channel buffers.
pub const HANDOFF_CAPACITY: usize = 64;

/// Tunables of a running pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Bus topic snapshots are published under.
    pub topic: String,
    /// Pause between fetch cycles.
    pub fetch_interval: Duration,
    /// Period of the forced connection recycle.
    pub recycle_period: Duration,
    /// Hand-off channel capacity; the fetch loop blocks when it is full.
    pub handoff_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            topic: TOPIC.to_string(),
            fetch_interval: FETCH_INTERVAL,
            recycle_period: RECYCLE_PERIOD,
            handoff_capacity: HANDOFF_CAPACITY,
        }
    }
}

/// Collaborators of the relay, ready to be started.
pub struct Pipeline {
    store: Arc<dyn WatchListStore>,
    transport: Arc<Transport>,
    provider: Provider,
    publisher: Box<dyn Publisher>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Assemble a pipeline from its collaborators.
    pub fn new(
        store: Arc<dyn WatchListStore>,
        transport: Arc<Transport>,
        provider: Provider,
        publisher: Box<dyn Publisher>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            transport,
            provider,
            publisher,
            settings,
        }
    }

    /// Spawn the recycle timer, the publish worker and the fetch loop, in that
    /// order, and hand them to a coordinator in the `RUNNING` state.
    pub fn start(self) -> Result<ShutdownCoordinator> {
        let settings = self.settings;
        let (handoff_tx, handoff_rx) = bounded::<EncodedMessage>(settings.handoff_capacity);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let connection = self.transport.handle();
        let recycler = ConnectionRecycler::spawn(connection.clone(), settings.recycle_period)?;

        let publish = match PublishWorker::new(self.publisher, &settings.topic, handoff_rx).spawn() {
            Ok(publish) => publish,
            Err(e) => {
                recycler.stop();
                return Err(e);
            }
        };

        let fetch_loop = FetchLoop::new(
            Arc::clone(&self.store),
            self.transport,
            self.provider,
            handoff_tx.clone(),
            settings.fetch_interval,
        );
        let fetch = match fetch_loop.spawn(stop_rx) {
            Ok(fetch) => fetch,
            Err(e) => {
                recycler.stop();
                drop(handoff_tx);
                let _ = publish.wait();
                return Err(e);
            }
        };

        info!(
            "Pipeline running: topic {}, fetch every {:?}, recycle every {:?}",
            settings.topic, settings.fetch_interval, settings.recycle_period
        );
        Ok(ShutdownCoordinator::new(Workers {
            stop_tx,
            fetch,
            publish,
            recycler,
            connection,
            handoff: handoff_tx,
            store: self.store,
        }))
    }
}
