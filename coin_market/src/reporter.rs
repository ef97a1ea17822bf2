//! Periodic log summary of the aggregated view.
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use coin_common::{InstrumentSnapshot, Result};
use crossbeam_channel::{Sender, bounded, select, tick};
use log::{info, warn};

use crate::consumer::AggregationConsumer;
use crate::table::SnapshotTable;

/// One log line per instrument: symbol, price and age of the snapshot at `now`.
pub fn summarize(table: &SnapshotTable, now: DateTime<Utc>) -> Result<Vec<String>> {
    Ok(table
        .snapshot_all()?
        .iter()
        .map(|snapshot| describe(snapshot, now))
        .collect())
}

fn describe(snapshot: &InstrumentSnapshot, now: DateTime<Utc>) -> String {
    let price = snapshot
        .current_price
        .map(|p| format!("{:.2}", p))
        .unwrap_or_else(|| "n/a".to_string());
    let age = match snapshot.last_updated_at() {
        Some(updated) => format!("{}s old", (now - updated).num_seconds().max(0)),
        None => "age unknown".to_string(),
    };
    format!(
        "{} ({}) price={} {}",
        snapshot.id,
        snapshot.symbol.to_uppercase(),
        price,
        age
    )
}

/// Background thread logging the table every interval.
pub struct Reporter {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

impl Reporter {
    /// Log a summary of `consumer`'s table every `interval`.
    pub fn spawn(consumer: Arc<AggregationConsumer>, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);
        let join = thread::Builder::new()
            .name("reporter".to_string())
            .spawn(move || {
                loop {
                    select! {
                        recv(ticker) -> _ => report(&consumer),
                        recv(stop_rx) -> _ => break,
                    }
                }
            })?;
        Ok(Self { stop_tx, join })
    }

    /// Stop reporting.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.join.join();
    }
}

fn report(consumer: &AggregationConsumer) {
    match summarize(consumer.table(), Utc::now()) {
        Ok(lines) => {
            info!(
                "Table: {} instruments ({} merged, {} discarded)",
                lines.len(),
                consumer.merged(),
                consumer.discarded()
            );
            for line in lines {
                info!("  {}", line);
            }
        }
        Err(e) => warn!("Table report failed: {}", e),
    }
}
