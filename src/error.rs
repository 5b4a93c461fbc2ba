//! Top-level consolidation errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::consolidate::FilterStats;
use crate::core::{AddressError, TransactionError};
use crate::crypto::KeyError;
use crate::indexer::IndexerError;
use crate::multisig::SigningError;

/// Everything that can stop a consolidation run
#[derive(Error, Debug)]
pub enum ConsolidationError {
    /// Missing or malformed private key
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),
    #[error("Invalid fee rate {rate} sat/vB (must be above 0 and at most {max})")]
    InvalidFeeRate { rate: f64, max: u64 },
    #[error("Invalid input cap: max_inputs_per_tx must be at least 1")]
    InvalidInputCap,
    #[error("Malformed UTXO {txid}:{vout}: {source}")]
    MalformedUtxo {
        txid: String,
        vout: u32,
        source: TransactionError,
    },
    #[error("No bare multisig UTXOs found")]
    NoUtxos,
    #[error("No suitable UTXOs after filtering")]
    NoSuitableUtxos { stats: FilterStats },
    #[error("Insufficient funds")]
    InsufficientFunds { available: u64, fee: u64 },
    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_messages() {
        assert_eq!(
            ConsolidationError::from(KeyError::MissingPrivateKey).to_string(),
            "Private key not found"
        );
        assert_eq!(ConsolidationError::NoUtxos.to_string(), "No bare multisig UTXOs found");
        assert_eq!(
            ConsolidationError::NoSuitableUtxos {
                stats: FilterStats::default()
            }
            .to_string(),
            "No suitable UTXOs after filtering"
        );
        assert_eq!(
            ConsolidationError::InsufficientFunds {
                available: 500,
                fee: 1_600
            }
            .to_string(),
            "Insufficient funds"
        );
    }

    #[test]
    fn test_argument_messages() {
        assert_eq!(
            ConsolidationError::InvalidFeeRate {
                rate: 0.5,
                max: 100
            }
            .to_string(),
            "Invalid fee rate 0.5 sat/vB (must be above 0 and at most 100)"
        );
        assert_eq!(
            ConsolidationError::InvalidInputCap.to_string(),
            "Invalid input cap: max_inputs_per_tx must be at least 1"
        );
    }

    #[test]
    fn test_signing_errors_pass_through() {
        let err = ConsolidationError::from(SigningError::MissingPartialSignature { index: 3 });
        assert_eq!(err.to_string(), "Input 3: missing or invalid partial signature");
    }
}
