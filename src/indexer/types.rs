//! Indexing service data types

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use bitcoin::{Amount, OutPoint, ScriptBuf};

use crate::core::{parse_outpoint, TransactionError};

/// Errors talking to the indexing service or raw transaction providers
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Invalid transaction: {0}")]
    Transaction(#[from] TransactionError),
}

/// A bare multisig output reported by the indexing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateUtxo {
    pub txid: String,
    pub vout: u32,
    /// Value in BTC as reported by the indexer; only used for logging, the
    /// spendable amount is read from the previous transaction
    #[serde(rename = "amount")]
    pub amount_btc: f64,
    pub script_pub_key_hex: String,
    #[serde(default)]
    pub script_pub_key_type: String,
    #[serde(default)]
    pub required_signatures: Option<u8>,
}

impl CandidateUtxo {
    /// Decoded output script
    pub fn script_pubkey(&self) -> Result<ScriptBuf, TransactionError> {
        hex::decode(self.script_pub_key_hex.trim())
            .map(ScriptBuf::from_bytes)
            .map_err(|e| TransactionError::InvalidHex(e.to_string()))
    }

    /// Outpoint spent by this UTXO
    pub fn outpoint(&self) -> Result<OutPoint, TransactionError> {
        parse_outpoint(&self.txid, self.vout)
    }

    /// Indexer-reported value in satoshis, zero when not representable
    pub fn reported_sats(&self) -> u64 {
        Amount::from_btc(self.amount_btc)
            .map(|amount| amount.to_sat())
            .unwrap_or(0)
    }
}

/// UTXO listings come back either as a bare array or wrapped in `result`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UtxoListing {
    Bare(Vec<CandidateUtxo>),
    Wrapped { result: Vec<CandidateUtxo> },
}

impl UtxoListing {
    pub(crate) fn into_utxos(self) -> Vec<CandidateUtxo> {
        match self {
            Self::Bare(utxos) | Self::Wrapped { result: utxos } => utxos,
        }
    }
}

/// Esplora `outspend` response; only the spent flag is read
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutspendStatus {
    pub spent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_utxo_camel_case() {
        let json = r#"{
            "txid": "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16",
            "vout": 1,
            "amount": 0.001,
            "scriptPubKeyHex": "5121aa51ae",
            "scriptPubKeyType": "multisig",
            "requiredSignatures": 1
        }"#;
        let utxo: CandidateUtxo = serde_json::from_str(json).unwrap();
        assert_eq!(utxo.vout, 1);
        assert_eq!(utxo.reported_sats(), 100_000);
        assert_eq!(utxo.required_signatures, Some(1));
        assert_eq!(
            utxo.script_pubkey().unwrap().as_bytes(),
            &[0x51, 0x21, 0xaa, 0x51, 0xae]
        );
        assert_eq!(utxo.outpoint().unwrap().vout, 1);
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{"txid": "00", "vout": 0, "amount": 1.0, "scriptPubKeyHex": "zz"}"#;
        let utxo: CandidateUtxo = serde_json::from_str(json).unwrap();
        assert!(utxo.required_signatures.is_none());
        assert!(utxo.script_pub_key_type.is_empty());
        assert!(utxo.script_pubkey().is_err());
        assert!(utxo.outpoint().is_err());
    }

    #[test]
    fn test_outspend_ignores_extra_fields() {
        let status: OutspendStatus =
            serde_json::from_str(r#"{"spent": true, "txid": "ab", "vin": 0}"#).unwrap();
        assert!(status.spent);
        let unspent: OutspendStatus = serde_json::from_str(r#"{"spent": false}"#).unwrap();
        assert!(!unspent.spent);
    }

    #[test]
    fn test_listing_envelopes() {
        let item = r#"{"txid": "ab", "vout": 0, "amount": 0.5, "scriptPubKeyHex": "51"}"#;
        let bare: UtxoListing = serde_json::from_str(&format!("[{}]", item)).unwrap();
        let wrapped: UtxoListing =
            serde_json::from_str(&format!(r#"{{"result": [{}, {}]}}"#, item, item)).unwrap();
        assert_eq!(bare.into_utxos().len(), 1);
        assert_eq!(wrapped.into_utxos().len(), 2);
    }
}
