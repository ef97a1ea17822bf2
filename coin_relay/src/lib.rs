//! Coin relay: fetches market snapshots for a watch-list and publishes them on a bus.
//!
//! The relay wires together these building blocks:
//!
//! - `transport`: HTTP(S) client that holds at most one provider connection, closes it
//!   before every dial and lets other threads force it closed.
//! - `provider`: builds the bulk markets request for the current watch-list.
//! - `fetch_loop`: periodic worker: read the watch-list, fetch, decode the response as a
//!   stream of JSON frames, filter by watch-list and hand encoded snapshots over.
//! - `publisher`: single consumer of the hand-off channel that publishes in FIFO order.
//! - `pipeline`: starts the workers around a bounded hand-off channel.
//! - `shutdown`: walks the pipeline through `RUNNING -> STOPPING -> DRAINING -> STOPPED`.
//!
//! Concurrency follows one pattern throughout: plain threads connected by
//! `crossbeam_channel` channels, with completion confirmed through `worker::WorkerHandle`.
#![warn(missing_docs)]
pub mod fetch_loop;
pub mod pipeline;
pub mod provider;
pub mod publisher;
pub mod shutdown;
pub mod transport;
pub mod worker;

pub use fetch_loop::{CycleReport, FetchLoop, FetchStats};
pub use pipeline::{Pipeline, PipelineSettings};
pub use provider::Provider;
pub use publisher::{PublishStats, PublishWorker};
pub use shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownState};
pub use transport::{ConnectionHandle, Transport};
