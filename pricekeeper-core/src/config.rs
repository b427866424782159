//! Serializable keeper configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Decimal places at which stored and incoming adjusted closes are compared.
pub const ADJ_CLOSE_DECIMALS: u32 = 4;

/// Maximum number of incoming dates sampled per spot-check.
pub const SPOT_CHECK_SAMPLE_SIZE: usize = 20;

/// Configuration for a [`PriceKeeper`](crate::keeper::PriceKeeper).
///
/// Every field has a default, so an empty TOML file is a valid config:
///
/// ```toml
/// store_dir = "data/price_store"
///
/// [spot_check]
/// sample_size = 20
/// adj_close_decimals = 4
/// seed = 7
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeeperConfig {
    /// Directory of the file-backed store.
    pub store_dir: PathBuf,

    pub spot_check: SpotCheckConfig,
}

/// Spot-check sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpotCheckConfig {
    pub sample_size: usize,

    pub adj_close_decimals: u32,

    /// Fixed RNG seed. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("data/price_store"),
            spot_check: SpotCheckConfig::default(),
        }
    }
}

impl Default for SpotCheckConfig {
    fn default() -> Self {
        Self {
            sample_size: SPOT_CHECK_SAMPLE_SIZE,
            adj_close_decimals: ADJ_CLOSE_DECIMALS,
            seed: None,
        }
    }
}

impl KeeperConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: KeeperConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spot_check.sample_size == 0 {
            return Err(ConfigError::Invalid(
                "spot_check.sample_size must be at least 1".into(),
            ));
        }
        // 10^16 already exceeds f64's exact integer range.
        if self.spot_check.adj_close_decimals > 15 {
            return Err(ConfigError::Invalid(
                "spot_check.adj_close_decimals must be at most 15".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
