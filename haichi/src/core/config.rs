use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::Tolerance;

/// Time allowed for each apply/verify pass to run on the display server.
const APPLY_ALLOWANCE: Duration = Duration::from_secs(5);

/// Engine configuration settings.
/// Every field is optional in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub auto_restore: bool,
    pub debounce_ms: u64,
    pub stability_ms: u64,
    pub retry_delay_ms: u64,
    pub cooldown_ms: u64,
    pub verify_tolerance_x: i32,
    pub verify_tolerance_y: i32,
    pub manual_change_tolerance: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_restore: true,
            debounce_ms: 1000,
            stability_ms: 500,
            retry_delay_ms: 1500,
            cooldown_ms: 2000,
            verify_tolerance_x: 2,
            verify_tolerance_y: 100,
            manual_change_tolerance: 5,
        }
    }
}

impl EngineConfig {
    /// Missing file means defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        tracing::info!("Loaded config from {:?}: {:?}", path, config);
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stability_wait(&self) -> Duration {
        Duration::from_millis(self.stability_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Longest an IPC caller waits for a command answer. A manual restore
    /// can span two apply passes with the retry delay between them.
    pub fn reply_timeout(&self) -> Duration {
        self.retry_delay() + self.cooldown() + APPLY_ALLOWANCE * 2
    }

    pub fn verify_tolerance(&self) -> Tolerance {
        Tolerance {
            x: self.verify_tolerance_x,
            y: self.verify_tolerance_y,
        }
    }
}
