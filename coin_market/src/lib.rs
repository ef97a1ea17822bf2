//! Market consumer: rebuilds the latest snapshot per instrument from the bus.
//!
//! - `table`: `SnapshotTable`, the shared id -> snapshot map.
//! - `consumer`: `AggregationConsumer`, the bus handler that decodes and merges messages.
//! - `lookup`: `nsqlookupd` discovery of the `nsqd` nodes carrying a topic.
//! - `reporter`: periodic log summary of the table.
#![warn(missing_docs)]
pub mod consumer;
pub mod lookup;
pub mod reporter;
pub mod table;

pub use consumer::AggregationConsumer;
pub use lookup::{Producer, lookup_producers};
pub use reporter::Reporter;
pub use table::SnapshotTable;
