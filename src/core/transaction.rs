//! Consolidation transactions
//!
//! Builds the unsigned single-output transaction, decodes previous
//! transactions and computes the legacy signature hash that bare multisig
//! inputs are signed with.

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{OutPoint, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use std::str::FromStr;
use thiserror::Error;

use super::script::script_code;

/// Transaction version used for consolidations
pub const TX_VERSION: Version = Version::TWO;

/// Transaction decoding and signing-hash errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Invalid txid: {0}")]
    InvalidTxid(String),
    #[error("Invalid transaction encoding: {0}")]
    Encoding(#[from] encode::Error),
    #[error("Input {index} out of range ({count} inputs)")]
    InputOutOfRange { index: usize, count: usize },
}

/// Outpoint from a display-order hex txid
pub fn parse_outpoint(txid: &str, vout: u32) -> Result<OutPoint, TransactionError> {
    let txid =
        Txid::from_str(txid.trim()).map_err(|e| TransactionError::InvalidTxid(e.to_string()))?;
    Ok(OutPoint::new(txid, vout))
}

/// Input spending `previous_output` with an empty script-sig and final sequence
pub fn unsigned_input(previous_output: OutPoint) -> TxIn {
    TxIn {
        previous_output,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }
}

/// Version 2, locktime 0 transaction spending `outpoints` into `output`
pub fn consolidation_transaction<I>(outpoints: I, output: TxOut) -> Transaction
where
    I: IntoIterator<Item = OutPoint>,
{
    Transaction {
        version: TX_VERSION,
        lock_time: LockTime::ZERO,
        input: outpoints.into_iter().map(unsigned_input).collect(),
        output: vec![output],
    }
}

/// Decode a consensus-serialized transaction; trailing bytes are rejected
pub fn decode_transaction(raw: &[u8]) -> Result<Transaction, TransactionError> {
    Ok(encode::deserialize(raw)?)
}

/// Decode a hex-encoded transaction
pub fn transaction_from_hex(raw_hex: &str) -> Result<Transaction, TransactionError> {
    let raw =
        hex::decode(raw_hex.trim()).map_err(|e| TransactionError::InvalidHex(e.to_string()))?;
    decode_transaction(&raw)
}

/// Legacy SIGHASH_ALL digest of input `index` over `script_pubkey`
pub fn legacy_sighash(
    tx: &Transaction,
    index: usize,
    script_pubkey: &Script,
) -> Result<[u8; 32], TransactionError> {
    let count = tx.input.len();
    if index >= count {
        return Err(TransactionError::InputOutOfRange { index, count });
    }

    let sighash = SighashCache::new(tx)
        .legacy_signature_hash(index, &script_code(script_pubkey), EcdsaSighashType::All.to_u32())
        .map_err(|_| TransactionError::InputOutOfRange { index, count })?;
    Ok(sighash.to_byte_array())
}
