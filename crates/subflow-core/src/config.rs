use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{AccountId, MAX_RECEIVERS, MIN_PERIOD_SECS};

/// Configuration for an embedded subflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Account that collects protocol fees.
    pub fee_collector: AccountId,
    /// Minimum billing interval accepted at plan creation (seconds).
    pub min_period_secs: u64,
    /// Maximum payout receivers per plan.
    pub max_receivers: usize,
    /// Data directory for the persistent store backend, if any.
    pub data_dir: Option<String>,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_collector: AccountId::new("fee-collector"),
            min_period_secs: MIN_PERIOD_SECS,
            max_receivers: MAX_RECEIVERS,
            data_dir: None,
            log_level: "info".into(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &std::path::Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&raw).map_err(|e| CoreError::Config(format!("cannot parse config: {}", e)))
    }
}
