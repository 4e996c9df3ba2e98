//! Instrumentation configuration
//!
//! The transport variant is a process-wide choice: remotes of the handshake
//! and socket transports expose different attributes, and a test run only
//! ever talks to one of them. The first call to [`active`] (or an explicit
//! [`install`]) fixes the configuration for the rest of the process.

use crate::error::{TestkitError, TestkitResult};
use once_cell::sync::OnceCell;
use plexus_stack::TransportVariant;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Environment variable selecting the transport variant
pub const TRANSPORT_ENV: &str = "PLEXUS_TRANSPORT";

static ACTIVE: OnceCell<TesterConfig> = OnceCell::new();

/// Polling and transport settings for connectivity checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    /// Transport whose remote attributes are inspected
    pub transport: TransportVariant,
    /// Pause between two connectivity checks
    pub retry_wait_ms: u64,
    /// Fixed part of the default convergence timeout
    pub base_wait_ms: u64,
    /// Additional default timeout per registry node
    pub per_node_wait_ms: u64,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            transport: TransportVariant::Handshake,
            retry_wait_ms: 500,
            base_wait_ms: 4_000,
            per_node_wait_ms: 1_000,
        }
    }
}

impl TesterConfig {
    /// Configuration for the given transport with default timings
    pub fn for_transport(transport: TransportVariant) -> Self {
        Self {
            transport,
            ..Default::default()
        }
    }

    /// Defaults, with the transport taken from `PLEXUS_TRANSPORT` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(TRANSPORT_ENV) {
            match value.parse() {
                Ok(transport) => config.transport = transport,
                Err(err) => warn!(%err, "ignoring {TRANSPORT_ENV}"),
            }
        }
        config
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(source: &str) -> TestkitResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| TestkitError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make polling spin
    pub fn validate(&self) -> TestkitResult<()> {
        if self.retry_wait_ms == 0 {
            return Err(TestkitError::config("retry_wait_ms must be greater than 0"));
        }
        Ok(())
    }

    /// Pause between two connectivity checks
    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }

    /// Default time allowed for `node_count` nodes to converge
    pub fn expected_wait(&self, node_count: usize) -> Duration {
        let per_node = self.per_node_wait_ms.saturating_mul(node_count as u64);
        Duration::from_millis(self.base_wait_ms.saturating_add(per_node))
    }
}

/// Fix the process-wide configuration
///
/// Installing the configuration that is already active is a no-op; any other
/// configuration is rejected once one is in place.
pub fn install(config: TesterConfig) -> TestkitResult<&'static TesterConfig> {
    config.validate()?;
    let active = ACTIVE.get_or_init(|| config.clone());
    if *active != config {
        return Err(TestkitError::config(format!(
            "configuration already fixed with the {} transport",
            active.transport
        )));
    }
    Ok(active)
}

/// The process-wide configuration, initialised from the environment on first use
pub fn active() -> &'static TesterConfig {
    ACTIVE.get_or_init(TesterConfig::from_env)
}

/// Transport variant of the running process
pub fn active_transport() -> TransportVariant {
    active().transport
}
