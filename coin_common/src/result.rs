//! Result type alias shared across the workspace.
//!
//! This module defines a convenient alias that defaults the error type to the
//! common `CoinError`, so functions can simply return `Result<T>`.
use crate::error::CoinError;

/// Workspace-wide `Result` alias with `CoinError` as the default error.
pub type Result<T, E = CoinError> = std::result::Result<T, E>;
