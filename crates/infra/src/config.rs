//! Engine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_ledger::DEFAULT_PROBE_LIMIT;

pub const PROBE_LIMIT_VAR: &str = "STOCKLEDGER_ID_PROBE_LIMIT";
pub const CONFLICT_RETRIES_VAR: &str = "STOCKLEDGER_CONFLICT_RETRIES";

const DEFAULT_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Candidate numbers probed before falling back to a timestamp number.
    pub id_probe_limit: u32,
    /// Whole-operation retries after a write conflict. 0 surfaces conflicts immediately.
    pub conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id_probe_limit: DEFAULT_PROBE_LIMIT,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

impl EngineConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(PROBE_LIMIT_VAR) {
            config.id_probe_limit = parse_u32(PROBE_LIMIT_VAR, &raw)?;
            if config.id_probe_limit == 0 {
                return Err(ConfigError::Invalid {
                    key: PROBE_LIMIT_VAR,
                    value: raw,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if let Some(raw) = lookup(CONFLICT_RETRIES_VAR) {
            config.conflict_retries = parse_u32(CONFLICT_RETRIES_VAR, &raw)?;
        }
        Ok(config)
    }
}

fn parse_u32(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
