//! Error types shared between the relay and the market consumer.
//!
//! The `CoinError` enum unifies the failure cases of the pipeline: network I/O,
//! provider payloads, wire encoding, bus and store collaborators, and the worker
//! threads themselves. Every variant maps onto one `ErrorCategory` so log lines
//! can say which part of the error taxonomy a failure belongs to.
use std::io;
use std::sync::PoisonError;
use std::time::Duration;

use strum_macros::Display;
use thiserror::Error;

/// Unified error type shared by every crate in the workspace.
#[derive(Error, Debug)]
pub enum CoinError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Connection establishment did not finish within the dial deadline.
    #[error("Dial to {addr} timed out after {timeout:?}")]
    DialTimeout {
        /// Address that was being dialed.
        addr: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// Resolving, connecting, reading or writing a network peer failed.
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a non-success HTTP status.
    #[error("HTTP status {status} {reason}")]
    HttpStatus {
        /// Numeric status code.
        status: u16,
        /// Reason phrase from the status line.
        reason: String,
    },

    /// TLS configuration or handshake setup failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A provider or bus URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failure while decoding with `bincode` (invalid or truncated payloads, etc.).
    #[error("Bincode serialization/deserialization error: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),

    /// Failure while encoding with `bincode`.
    #[error("Bincode serialization/deserialization error: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),

    /// Failure while decoding provider JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// The message bus rejected or could not carry a command.
    #[error("Bus error: {0}")]
    Bus(String),

    /// The watch-list store could not be opened or read.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The watch-list store was used after `close()`.
    #[error("Store connection is closed")]
    StoreClosed,

    /// Crossbeam/channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// Crossbeam/channel receive failed (e.g., sender closed); contains a short context string.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),

    /// A worker thread panicked instead of signalling completion.
    #[error("Worker thread panicked: {0}")]
    WorkerPanicked(String),

    /// Installing the termination signal handler failed.
    #[error("Signal handler error: {0}")]
    Signal(String),
}

/// Coarse classification of failures used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorCategory {
    /// Dial or read failure; the current cycle is skipped.
    #[strum(serialize = "transient-network")]
    TransientNetwork,
    /// Bad message or bad provider payload; the unit is dropped.
    #[strum(serialize = "decode-malformed")]
    DecodeMalformed,
    /// Store or bus unreachable; fatal at startup.
    #[strum(serialize = "resource-unavailable")]
    ResourceUnavailable,
    /// The bus did not accept a message; the message is lost.
    #[strum(serialize = "publish-failure")]
    PublishFailure,
    /// Anything else: channel, lock and thread bookkeeping.
    #[strum(serialize = "internal")]
    Internal,
}

impl CoinError {
    /// Which part of the error taxonomy this failure belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoinError::Io(_)
            | CoinError::DialTimeout { .. }
            | CoinError::Network(_)
            | CoinError::HttpStatus { .. }
            | CoinError::Tls(_) => ErrorCategory::TransientNetwork,
            CoinError::Format(_)
            | CoinError::BincodeDecode(_)
            | CoinError::BincodeEncode(_)
            | CoinError::SerdeJson(_) => ErrorCategory::DecodeMalformed,
            CoinError::InvalidUrl(_) | CoinError::StoreUnavailable(_) | CoinError::StoreClosed => {
                ErrorCategory::ResourceUnavailable
            }
            CoinError::Bus(_) => ErrorCategory::PublishFailure,
            CoinError::ChannelSend(_)
            | CoinError::ChannelRecv(_)
            | CoinError::MutexLock(_)
            | CoinError::WorkerPanicked(_)
            | CoinError::Signal(_) => ErrorCategory::Internal,
        }
    }
}

impl<T> From<PoisonError<T>> for CoinError {
    fn from(err: PoisonError<T>) -> Self {
        CoinError::MutexLock(err.to_string())
    }
}
