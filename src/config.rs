//! Exporter configuration.
//!
//! The exporter is configured once at construction. A TOML file can carry
//! the same settings under `[metrics]`, alongside the demo driver's
//! settings under `[demo]`.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// `host:port` to bind the exposition server to.
    pub server_address: String,
    /// Chain identifier, used as the `network` label value.
    pub chain_id: String,
    /// Optional ceiling applied to recorded signer balances.
    pub max_signer_balance: Option<f64>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:9090".to_string(),
            chain_id: "SN_MAIN".to_string(),
            max_signer_balance: None,
        }
    }
}

impl ExporterConfig {
    /// Creates a config for the given address and chain.
    pub fn new(server_address: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            chain_id: chain_id.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (host, port) = self
            .server_address
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::InvalidAddress(self.server_address.clone()))?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(ConfigError::InvalidAddress(self.server_address.clone()));
        }
        if self.chain_id.trim().is_empty() {
            return Err(ConfigError::EmptyChainId);
        }
        if let Some(ceiling) = self.max_signer_balance {
            if !ceiling.is_finite() {
                return Err(ConfigError::InvalidBalanceCeiling(ceiling));
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Address is not `host:port`.
    #[error("invalid server address {0:?} (expected host:port)")]
    InvalidAddress(String),
    /// Network label value is blank.
    #[error("chain id must not be empty")]
    EmptyChainId,
    /// Balance ceiling is NaN or infinite.
    #[error("invalid signer balance ceiling: {0}")]
    InvalidBalanceCeiling(f64),
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Exporter settings, `[metrics]`.
    #[serde(default)]
    pub metrics: ExporterConfig,
    /// Demo driver settings, `[demo]`.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Settings for the demo validator loop in the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Milliseconds between simulated blocks.
    pub block_interval_ms: u64,
    /// Blocks per simulated epoch.
    pub epoch_length: u64,
    /// Starting signer balance.
    pub initial_balance: f64,
    /// Balance below which the low-balance flag is raised.
    pub balance_threshold: f64,
    /// Milliseconds to wait for in-flight scrapes on shutdown.
    pub shutdown_grace_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            block_interval_ms: 1000,
            epoch_length: 40,
            initial_balance: 10.0,
            balance_threshold: 1.0,
            shutdown_grace_ms: 5000,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.metrics.validate()?;
        Ok(config)
    }
}
