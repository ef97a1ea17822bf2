//! Bus handler that folds snapshot messages into the `SnapshotTable`.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use coin_common::bus::{MessageHandler, Subscriber, Subscription};
use coin_common::{InstrumentSnapshot, Result};
use log::{debug, error, info, warn};

use crate::table::SnapshotTable;

/// Decodes snapshot messages and merges them into a shared table.
///
/// `handle` may run on several threads at once. A message that fails to decode is
/// logged and counted; it is acknowledged like any other so the bus does not
/// redeliver it.
#[derive(Debug)]
pub struct AggregationConsumer {
    table: Arc<SnapshotTable>,
    merged: AtomicU64,
    discarded: AtomicU64,
}

impl AggregationConsumer {
    /// Consumer merging into `table`.
    pub fn new(table: Arc<SnapshotTable>) -> Self {
        Self {
            table,
            merged: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// The table being maintained.
    pub fn table(&self) -> &Arc<SnapshotTable> {
        &self.table
    }

    /// Process one message body.
    pub fn handle(&self, body: &[u8]) {
        let snapshot = match InstrumentSnapshot::decode(body) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Discarding {} byte message [{}]: {}",
                    body.len(),
                    e.category(),
                    e
                );
                return;
            }
        };

        let id = snapshot.id.clone();
        match self.table.merge(snapshot) {
            Ok(previous) => {
                self.merged.fetch_add(1, Ordering::Relaxed);
                debug!("Merged {} ({})", id, if previous.is_some() { "update" } else { "new" });
            }
            Err(e) => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                error!("Could not merge {}: {}", id, e);
            }
        }
    }

    /// Messages merged so far.
    pub fn merged(&self) -> u64 {
        self.merged.load(Ordering::Relaxed)
    }

    /// Messages dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Attach this consumer to `topic` under consumer group `group`.
    pub fn subscribe(
        self: &Arc<Self>,
        bus: &dyn Subscriber,
        topic: &str,
        group: &str,
        concurrency: usize,
    ) -> Result<Box<dyn Subscription>> {
        let consumer = Arc::clone(self);
        let handler: MessageHandler = Arc::new(move |body: &[u8]| consumer.handle(body));
        let subscription = bus.subscribe(topic, group, concurrency, handler)?;
        info!(
            "Consuming {} as {} with {} handlers",
            topic, group, concurrency
        );
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coin_common::bus::{MemoryBus, Publisher};
    use std::thread;
    use std::time::{Duration, Instant};

    fn priced(id: &str, price: f64) -> InstrumentSnapshot {
        let mut snapshot = InstrumentSnapshot::new(id, id, id);
        snapshot.current_price = Some(price);
        snapshot.sparkline_in_7d = Some(coin_common::snapshot::Sparkline {
            price: vec![price; 168],
        });
        snapshot
    }

    #[test]
    fn concurrent_writers_leave_one_complete_snapshot() {
        let consumer = Arc::new(AggregationConsumer::new(Arc::new(SnapshotTable::new())));
        let first = priced("bitcoin", 1.0);
        let second = priced("bitcoin", 2.0);

        let mut writers = Vec::new();
        for snapshot in [first.clone(), second.clone()] {
            let consumer = Arc::clone(&consumer);
            let body = snapshot.encode().unwrap().into_bytes();
            writers.push(thread::spawn(move || {
                for _ in 0..200 {
                    consumer.handle(&body);
                }
            }));
        }
        for writer in writers {
            writer.join().unwrap();
        }

        let stored = consumer.table().get("bitcoin").unwrap().unwrap();
        assert!(stored == first || stored == second);
        assert_eq!(consumer.merged(), 400);
        assert_eq!(consumer.table().len().unwrap(), 1);
    }

    #[test]
    fn malformed_message_is_dropped_and_processing_continues() {
        let consumer = AggregationConsumer::new(Arc::new(SnapshotTable::new()));
        consumer.handle(b"\xff\xff\xff not a snapshot");
        consumer.handle(&[]);
        consumer.handle(&priced("ethereum", 3000.0).encode().unwrap().into_bytes());

        assert_eq!(consumer.discarded(), 2);
        assert_eq!(consumer.merged(), 1);
        assert!(consumer.table().get("ethereum").unwrap().is_some());
    }

    #[test]
    fn subscription_feeds_the_table() {
        let bus = MemoryBus::new();
        let consumer = Arc::new(AggregationConsumer::new(Arc::new(SnapshotTable::new())));
        let subscription = consumer.subscribe(&bus, "coins", "market", 2).unwrap();

        let mut publisher = bus.clone();
        for (id, price) in [("bitcoin", 1.0), ("ethereum", 2.0), ("solana", 3.0)] {
            let message = priced(id, price).encode().unwrap();
            publisher.publish("coins", message.as_bytes()).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while consumer.merged() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        subscription.stop();
        assert_eq!(consumer.table().len().unwrap(), 3);
        assert_eq!(
            consumer.table().get("solana").unwrap().unwrap().current_price,
            Some(3.0)
        );
    }
}
