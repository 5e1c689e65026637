// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the destination.
//!
//! Only [`ConfigError`] ever reaches the host runtime as a hard failure;
//! everything the broker throws at us after initialization is classified,
//! logged and absorbed so the destination is never torn down over a
//! transient condition.

use thiserror::Error;

/// Unrecoverable misconfiguration, reported only at initialization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing `{0}` option")]
    MissingOption(&'static str),
}

/// Failure to hand a message to the broker client.
///
/// All three kinds are transient from the destination's point of view:
/// they are logged with a brief pause and the caller is told success, so
/// the host does not restart the destination over them.
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// The client's local delivery queue is saturated.
    #[error("producer queue is full")]
    QueueFull,
    /// A broker-level error (unreachable, unknown leader, ...).
    #[error("broker error: {0}")]
    Broker(String),
    /// The payload could not be encoded for the wire.
    #[error("payload encoding failed: {0}")]
    Encoding(String),
}

/// Failure to construct the broker client handle.
#[derive(Debug, Error)]
#[error("could not open producer: {0}")]
pub struct OpenError(pub String);
