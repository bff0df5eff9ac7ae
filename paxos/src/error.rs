//! The crate's error hierarchy.
//!
//! Most faults described in the spec's error-handling table (unknown-peer messages, out-of-order
//! or duplicate appends, nacks) are *not* represented here: the spec's disposition for them is
//! "drop and log", not "propagate", so the relevant handlers simply log via `slog` and return.
//! `PaxosError` exists for the faults that are not safe to swallow: storage I/O, (de)serialization,
//! and configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaxosError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize value: {0}")]
    Serialize(String),

    #[error("failed to deserialize value: {0}")]
    Deserialize(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A durable write did not take effect. Per the spec this is fatal: a promise or a
    /// highest-proposed-decree that silently fails to persist is a correctness break, so the
    /// replica must not continue serving requests once this is observed.
    #[error("durable write failed: {0}")]
    DurableWriteFailed(String),
}
