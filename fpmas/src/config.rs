//! Ambient runtime configuration: the knobs that govern *how* a simulation
//! runs without being part of the simulated graph itself (synchronization
//! mode, load-balancing period, log level).
//!
//! Modeled on `risingwave_common::config`'s `ServerConfig`: every field
//! carries a `#[serde(default = "...")]` so a caller can load a partial
//! `toml` document, and [`Config::default`] is defined as "parse an empty
//! document" rather than a hand-duplicated struct literal, so the two can
//! never drift apart.

use serde::{Deserialize, Serialize};

/// Which [`crate::synchro::SyncMode`] a [`crate::graph::DistributedGraph`]
/// should be built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncModeKind {
    /// Optimistic, periodic bulk exchange. See [`crate::synchro::ghost`].
    Ghost,
    /// Pessimistic, per-access RPC mutex. See [`crate::synchro::hard`].
    HardSync,
}

fn default_sync_mode() -> SyncModeKind {
    SyncModeKind::Ghost
}

fn default_lb_period() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level, user-facing runtime configuration.
///
/// Constructed either programmatically or via [`toml::from_str`]; this
/// crate never reads a file path or environment variable itself (per
/// `SPEC_FULL.md` §6, the process-lifecycle contract is not part of the
/// core).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Synchronization policy new [`crate::graph::DistributedGraph`]s are
    /// built with.
    #[serde(default = "default_sync_mode")]
    pub sync_mode: SyncModeKind,
    /// Number of scheduler steps between automatic load-balancing passes,
    /// when a caller wires [`crate::graph::load_balancing::ScheduledLoadBalancing`]
    /// on this cadence. Zero disables automatic scheduling (a caller must
    /// trigger `distribute` manually).
    #[serde(default = "default_lb_period")]
    pub lb_period: u64,
    /// Textual log level (`"error"`, `"warn"`, `"info"`, `"debug"`,
    /// `"trace"`) a binary embedding this crate may use to initialize its
    /// `log` backend. This crate logs but does not install a logger.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str("").expect("every field of Config has a default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_empty_document() {
        let config = Config::default();
        assert_eq!(config.sync_mode, SyncModeKind::Ghost);
        assert_eq!(config.lb_period, 10);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn partial_document_fills_the_rest_with_defaults() {
        let config: Config = toml::from_str("sync_mode = \"hard_sync\"").unwrap();
        assert_eq!(config.sync_mode, SyncModeKind::HardSync);
        assert_eq!(config.lb_period, 10);
    }
}
