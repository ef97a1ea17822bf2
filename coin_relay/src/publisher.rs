//! Ordered drain of the hand-off channel onto the bus.
use coin_common::bus::Publisher;
use coin_common::{EncodedMessage, Result};
use crossbeam_channel::Receiver;
use log::{info, warn};

use crate::worker::WorkerHandle;

/// Totals returned by the publish worker when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Messages taken off the hand-off channel.
    pub attempted: u64,
    /// Messages the bus accepted.
    pub published: u64,
    /// Messages the bus refused; they are not retried.
    pub failed: u64,
    /// Messages still queued when the worker stopped reading.
    pub undrained: usize,
}

/// Single consumer of the hand-off channel.
pub struct PublishWorker {
    publisher: Box<dyn Publisher>,
    topic: String,
    handoff: Receiver<EncodedMessage>,
}

impl PublishWorker {
    /// Worker publishing everything from `handoff` under `topic`.
    pub fn new(publisher: Box<dyn Publisher>, topic: &str, handoff: Receiver<EncodedMessage>) -> Self {
        Self {
            publisher,
            topic: topic.to_string(),
            handoff,
        }
    }

    /// Publish in FIFO order until the channel is closed and empty, then release the
    /// publisher.
    pub fn run(mut self) -> PublishStats {
        info!("Publisher: Started on topic {}", self.topic);
        let mut stats = PublishStats::default();

        for message in self.handoff.iter() {
            stats.attempted += 1;
            match self.publisher.publish(&self.topic, message.as_bytes()) {
                Ok(()) => stats.published += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        "Publisher: dropped {} byte message [{}]: {}",
                        message.len(),
                        e.category(),
                        e
                    );
                }
            }
        }

        stats.undrained = self.handoff.len();
        info!("Publisher: Stopping");
        self.publisher.stop();
        info!(
            "Publisher: Stopped ({} published, {} failed)",
            stats.published, stats.failed
        );
        stats
    }

    /// Run the worker on its own thread.
    pub fn spawn(self) -> Result<WorkerHandle<PublishStats>> {
        WorkerHandle::spawn("publisher", move || self.run())
    }
}
