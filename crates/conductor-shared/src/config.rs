//! # Layered Configuration
//!
//! Layered the same way a `config/base.toml` + environment-overlay
//! strategy works, scaled down to the handful of knobs the core actually
//! needs: the tracker's reconciliation tick, subscriber buffer capacities,
//! and the envelope service's identity file path. Base defaults live in code;
//! an optional TOML file and environment variables (prefix `CONDUCTOR_`)
//! layer on top, base < file < env.

use crate::error::{SharedError, SharedResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the orchestrator core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub tracker: TrackerConfig,
    pub progress: ProgressConfig,
    pub envelope: EnvelopeConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            progress: ProgressConfig::default(),
            envelope: EnvelopeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub reconciliation_tick_ms: u64,
    pub subscriber_buffer_capacity: usize,
    pub node_max_age_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            reconciliation_tick_ms: 1_000,
            subscriber_buffer_capacity: 100,
            node_max_age_secs: 3_600,
        }
    }
}

impl TrackerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.reconciliation_tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub subscriber_buffer_capacity: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer_capacity: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub identity_path: PathBuf,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            identity_path: PathBuf::from(".conductor/identity"),
        }
    }
}

impl CoreConfig {
    /// Load defaults, then an optional TOML file, then `CONDUCTOR_*` env overrides.
    pub fn load(file: Option<&std::path::Path>) -> SharedResult<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&CoreConfig::default())
                .map_err(|e| SharedError::config(e.to_string()))?);

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CONDUCTOR")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .map_err(|e| SharedError::config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SharedError::config(e.to_string()))
    }
}
