//! costctl configuration
//!
//! A single JSON file drives both the decision thresholds and the
//! scanner's fetch behavior. Every field has a default, so a missing
//! or partial file still yields a working setup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cost_engine::EngineConfig;

use crate::error::{CtlError, CtlResult};

/// Top-level costctl configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtlConfig {
    /// Decision thresholds and lookback windows for the engine.
    #[serde(default)]
    pub engine: EngineConfig,

    /// How many metric fetches run in parallel during a scan.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Per-fetch deadline in seconds. Zero disables the deadline.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for CtlConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl CtlConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> CtlResult<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| CtlError::Config(format!("read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| CtlError::Config(format!("parse {}: {e}", path.display())))?;
        Ok(config)
    }

    /// Load from a path when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> CtlResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> CtlResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Fetch deadline for the scanner, `None` when disabled.
    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }
}
