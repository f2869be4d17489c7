//! Runtime configuration, loaded from `clientbook.json` in the data
//! directory. Every field has a default; a missing file means defaults.

use crate::types::{Amount, DEFAULT_DRIFT_TOLERANCE};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "clientbook.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts:  usize,
    pub base_delay_ms: u64,
    pub max_delay_ms:  u64,
    pub jitter_pct:    f64,
    pub timeout_ms:    Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts:  3,
            base_delay_ms: 1_000,
            max_delay_ms:  1_000,
            jitter_pct:    0.0,
            timeout_ms:    Some(20_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub drift_tolerance:             Amount,
    pub retry:                       RetryConfig,
    /// SQLite busy timeout applied to every connection.
    pub busy_timeout_ms:             u64,
    /// Validity of newly issued public access tokens. `None` issues tokens
    /// without an expiry.
    pub default_token_validity_days: Option<i64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            drift_tolerance:             DEFAULT_DRIFT_TOLERANCE,
            retry:                       RetryConfig::default(),
            busy_timeout_ms:             5_000,
            default_token_validity_days: Some(30),
        }
    }
}

impl LedgerConfig {
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = Path::new(data_dir).join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No {} in {data_dir}; using defaults", CONFIG_FILE);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let cfg: LedgerConfig = serde_json::from_str(content)?;
        anyhow::ensure!(
            cfg.drift_tolerance >= 0.0,
            "drift_tolerance must be non-negative (got {})",
            cfg.drift_tolerance
        );
        Ok(cfg)
    }
}
