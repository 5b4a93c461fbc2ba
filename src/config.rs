//! Consolidator configuration
//!
//! Endpoints and signing policy. Loaded from an optional JSON file; any field
//! left out falls back to its default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::{Network, MAX_FEE_RATE};
use crate::multisig::SigningOptions;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Endpoints and policy for a consolidation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidatorConfig {
    pub network: Network,
    /// Base URL of the bare multisig indexing service
    pub indexer_url: String,
    /// Esplora-compatible base URL used for `outspend` lookups
    pub spent_check_url: String,
    /// Raw transaction endpoints, tried in order
    pub raw_tx_endpoints: Vec<String>,
    pub request_timeout_secs: u64,
    /// Upper bound on the accepted fee rate (sat/vbyte)
    pub max_fee_rate: u64,
    /// Grind signatures to a 32 byte R
    pub low_r: bool,
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            indexer_url: "http://127.0.0.1:4000/v2".to_string(),
            spent_check_url: "https://mempool.space/api".to_string(),
            raw_tx_endpoints: vec![
                "https://mempool.space/api".to_string(),
                "https://blockstream.info/api".to_string(),
            ],
            request_timeout_secs: 15,
            max_fee_rate: MAX_FEE_RATE,
            low_r: true,
        }
    }
}

impl ConsolidatorConfig {
    /// Load from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = fs::File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.raw_tx_endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one raw transaction endpoint is required".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request timeout must be positive".into()));
        }
        if self.max_fee_rate == 0 {
            return Err(ConfigError::Invalid("max fee rate must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn signing_options(&self) -> SigningOptions {
        SigningOptions { low_r: self.low_r }
    }
}

/// Per-call consolidation knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidateOptions {
    /// Cap on the number of inputs; `None` spends everything eligible
    pub max_inputs_per_tx: Option<usize>,
    /// Trust the indexer's view and skip per-output spent lookups
    pub skip_spent_check: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConsolidatorConfig::default();
        assert_eq!(config.network, Network::Bitcoin);
        assert_eq!(config.raw_tx_endpoints.len(), 2);
        assert!(config.raw_tx_endpoints[0].contains("mempool.space"));
        assert!(config.raw_tx_endpoints[1].contains("blockstream.info"));
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.max_fee_rate, 10_000);
        assert!(config.signing_options().low_r);
        assert!(config.validate().is_ok());

        let options = ConsolidateOptions::default();
        assert!(options.max_inputs_per_tx.is_none());
        assert!(!options.skip_spent_check);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("consolidator.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"network": "testnet", "raw_tx_endpoints": ["http://localhost:3002/api"], "low_r": false}}"#
        )
        .unwrap();

        let config = ConsolidatorConfig::from_file(&path).unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.raw_tx_endpoints, vec!["http://localhost:3002/api"]);
        assert!(!config.signing_options().low_r);
        assert_eq!(config.request_timeout_secs, 15);
    }

    #[test]
    fn test_invalid_files_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();

        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            ConsolidatorConfig::from_file(&missing),
            Err(ConfigError::IoError(_))
        ));

        let garbage = temp_dir.path().join("garbage.json");
        fs::write(&garbage, "not json").unwrap();
        assert!(matches!(
            ConsolidatorConfig::from_file(&garbage),
            Err(ConfigError::SerializationError(_))
        ));

        let empty = temp_dir.path().join("empty.json");
        fs::write(&empty, r#"{"raw_tx_endpoints": []}"#).unwrap();
        assert!(matches!(
            ConsolidatorConfig::from_file(&empty),
            Err(ConfigError::Invalid(_))
        ));
    }
}
