//! Serializable bot configuration.
//!
//! A single TOML file carries everything one bot instance needs:
//!
//! ```toml
//! [bot]
//! symbol = "EURUSD"
//! max_positions = 3
//! min_confidence = 70.0
//!
//! [simulator]
//! seed = 42
//!
//! [credentials]
//! login = "5001"
//! server = "Sim-Demo"
//! password = "demo"
//! ```
//!
//! Every section and field is optional; missing values take their defaults.
//! Values are validated only by type.

use serde::{Deserialize, Serialize};
use signalbot_core::market::{Credentials, SimulatorConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Per-instance trading parameters. Immutable once a bot is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub symbol: String,
    /// Open positions the bot will hold at once.
    pub max_positions: usize,
    /// Fraction of equity risked per trade. Carried for consumers; lot sizing is confidence-based.
    pub risk_per_trade: f64,
    /// Minimum signal confidence (0..=100) to act on.
    pub min_confidence: f64,
    pub analysis_interval_ms: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".to_string(),
            max_positions: 3,
            risk_per_trade: 0.02,
            min_confidence: 70.0,
            analysis_interval_ms: 5_000,
        }
    }
}

impl BotConfig {
    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_interval_ms)
    }
}

/// Decision model persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Seed for fresh parameters when no weights file exists.
    pub seed: u64,
    /// JSON weights loaded at startup and written back on shutdown.
    pub weights_path: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            weights_path: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub simulator: SimulatorConfig,
    pub model: ModelConfig,
    pub credentials: Credentials,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A config with demo credentials filled in, as written by `init-config`.
    pub fn demo() -> Self {
        Self {
            credentials: Credentials::new("5001", "Sim-Demo", "demo"),
            ..Self::default()
        }
    }
}
