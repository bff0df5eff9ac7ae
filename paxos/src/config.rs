//! Layered configuration for embedding a [`crate::parliament::Parliament`].
//!
//! Mirrors the reference crate's `toml_config` feature: a plain, serde-deserializable struct with
//! defaults for every field, loadable from a TOML string or file. Locating the file, watching it,
//! and exposing CLI overrides remain the embedding application's job.

use std::path::Path;
use std::time::Duration;

#[cfg(feature = "toml_config")]
use serde::Deserialize;

use crate::error::PaxosError;
use crate::util::defaults::{ACCEPTOR_LEASE_WINDOW, PROPOSER_PAUSE_BOUND, SIGNAL_RETRY_INTERVAL};

/// Configuration for one replica's `Parliament`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "toml_config", derive(Deserialize))]
#[cfg_attr(feature = "toml_config", serde(default))]
pub struct ParliamentConfig {
    /// This replica's own address, as it should appear in the membership view.
    pub hostname: String,
    pub port: u16,
    /// Directory root for durable fields and the ledger (`paxos.ledger`, `paxos.promised_decree`, …).
    pub storage_directory: String,
    /// Path to a file listing the initial membership, one `hostname:port` per line.
    pub replicaset_file: String,
    #[cfg_attr(feature = "toml_config", serde(with = "duration_millis"))]
    pub signal_retry_interval: Duration,
    #[cfg_attr(feature = "toml_config", serde(with = "duration_millis"))]
    pub acceptor_lease_window: Duration,
    #[cfg_attr(feature = "toml_config", serde(with = "duration_millis"))]
    pub proposer_pause_bound: Duration,
}

impl Default for ParliamentConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 0,
            storage_directory: ".".to_string(),
            replicaset_file: "paxos.replicaset".to_string(),
            signal_retry_interval: SIGNAL_RETRY_INTERVAL,
            acceptor_lease_window: ACCEPTOR_LEASE_WINDOW,
            proposer_pause_bound: PROPOSER_PAUSE_BOUND,
        }
    }
}

#[cfg(feature = "toml_config")]
mod duration_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(feature = "toml_config")]
impl ParliamentConfig {
    /// Parses a `ParliamentConfig` from a TOML document, filling in defaults for any field the
    /// document omits.
    pub fn from_toml_str(contents: &str) -> Result<Self, PaxosError> {
        toml::from_str(contents).map_err(|e| PaxosError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PaxosError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
