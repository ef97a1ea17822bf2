//!
//! Common types and utilities shared by the coin relay and the market consumer.
//!
//! This crate aggregates:
//! - `error`: unified error type `CoinError` and its `ErrorCategory`.
//! - `result`: handy `Result<T, CoinError>` alias.
//! - `net`: topic/channel names, default addresses and pipeline timings.
//! - `snapshot`: `InstrumentSnapshot` and its bus message codec.
//! - `watch_list`: the tracked instrument ids and the store that owns them.
//! - `bus`: publish/subscribe contracts, an NSQ client and an in-process bus.
#![warn(missing_docs)]
pub mod bus;
pub mod error;
pub mod net;
pub mod result;
pub mod snapshot;
pub mod watch_list;

pub use error::{CoinError, ErrorCategory};
pub use result::Result;
pub use snapshot::{EncodedMessage, InstrumentSnapshot};
pub use watch_list::{FileWatchList, WatchList, WatchListStore};
