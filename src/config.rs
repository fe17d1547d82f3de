use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Runtime options for the control panel core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Sample-rate drift poll cadence. Zero disables polling.
    pub poll_interval_ms: u64,

    /// Offer the extra small buffer sizes and the "no devices" placeholder
    pub diagnostic: bool,

    /// Buffered change notifications per subscriber
    pub event_capacity: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            diagnostic: cfg!(debug_assertions),
            event_capacity: 64,
        }
    }
}

impl PanelConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        if self.poll_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.poll_interval_ms))
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse panel config JSON")
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read panel config from {:?}", path))?;

        Self::from_json(&content)
    }
}
