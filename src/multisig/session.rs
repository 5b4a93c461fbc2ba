//! Signing session for a consolidation transaction
//!
//! Holds the unsigned transaction plus one [`InputArtifacts`] slot per input.
//! Signing and finalization only ever add artifacts: partial signatures are
//! appended and a final script-sig is written at most once. The signed
//! transaction is assembled from those artifacts in [`SigningSession::extract_tx`].

use bitcoin::{ScriptBuf, Transaction, Witness};
use thiserror::Error;

use crate::core::TransactionError;

/// Signing and finalization errors, tagged with the input index
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Classification count ({classifications}) does not match input count ({inputs})")]
    ClassificationCountMismatch { classifications: usize, inputs: usize },
    #[error("Input {index} out of range ({count} inputs)")]
    InputOutOfRange { index: usize, count: usize },
    #[error("Input {index}: sighash computation failed: {source}")]
    Sighash {
        index: usize,
        #[source]
        source: TransactionError,
    },
    #[error("Input {index}: classification holds neither of our key encodings")]
    NoSigningKey { index: usize },
    #[error("Input {index}: missing or invalid partial signature")]
    MissingPartialSignature { index: usize },
    #[error("Input {index}: already finalized")]
    AlreadyFinalized { index: usize },
    #[error("Input {index}: not finalized")]
    NotFinalized { index: usize },
}

/// Options applied when producing signatures; the sighash type is always
/// SIGHASH_ALL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningOptions {
    /// Grind nonces for signatures with a 32-byte R
    pub low_r: bool,
}

impl Default for SigningOptions {
    fn default() -> Self {
        Self { low_r: true }
    }
}

/// A signature over one input, keyed by the public key encoding it answers for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialSignature {
    pub pubkey: Vec<u8>,
    /// DER signature followed by the sighash byte
    pub signature: Vec<u8>,
}

/// Everything produced for one input during signing and finalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputArtifacts {
    partial_sigs: Vec<PartialSignature>,
    final_script_sig: Option<ScriptBuf>,
}

impl InputArtifacts {
    pub fn partial_sigs(&self) -> &[PartialSignature] {
        &self.partial_sigs
    }

    pub fn final_script_sig(&self) -> Option<&ScriptBuf> {
        self.final_script_sig.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.final_script_sig.is_some()
    }

    /// Partial signature for a specific key encoding
    pub fn signature_for(&self, pubkey: &[u8]) -> Option<&PartialSignature> {
        self.partial_sigs.iter().find(|p| p.pubkey == pubkey)
    }
}

/// An unsigned transaction and the per-input signing state built on it
#[derive(Debug, Clone)]
pub struct SigningSession {
    unsigned_tx: Transaction,
    artifacts: Vec<InputArtifacts>,
    options: SigningOptions,
}

impl SigningSession {
    /// Start a session; any script-sigs already present are discarded
    pub fn new(mut tx: Transaction, options: SigningOptions) -> Self {
        for input in &mut tx.input {
            input.script_sig = ScriptBuf::new();
            input.witness = Witness::new();
        }
        let artifacts = vec![InputArtifacts::default(); tx.input.len()];
        Self {
            unsigned_tx: tx,
            artifacts,
            options,
        }
    }

    pub fn unsigned_tx(&self) -> &Transaction {
        &self.unsigned_tx
    }

    pub fn options(&self) -> SigningOptions {
        self.options
    }

    pub fn input_count(&self) -> usize {
        self.unsigned_tx.input.len()
    }

    /// Artifacts recorded so far for input `index`
    pub fn input(&self, index: usize) -> Result<&InputArtifacts, SigningError> {
        let count = self.artifacts.len();
        self.artifacts
            .get(index)
            .ok_or(SigningError::InputOutOfRange { index, count })
    }

    fn input_mut(&mut self, index: usize) -> Result<&mut InputArtifacts, SigningError> {
        let count = self.artifacts.len();
        self.artifacts
            .get_mut(index)
            .ok_or(SigningError::InputOutOfRange { index, count })
    }

    pub fn is_finalized(&self, index: usize) -> bool {
        self.artifacts
            .get(index)
            .map(InputArtifacts::is_finalized)
            .unwrap_or(false)
    }

    /// Record a partial signature, replacing one for the same key
    pub fn add_partial_signature(
        &mut self,
        index: usize,
        partial: PartialSignature,
    ) -> Result<(), SigningError> {
        let input = self.input_mut(index)?;
        if input.is_finalized() {
            return Err(SigningError::AlreadyFinalized { index });
        }
        input.partial_sigs.retain(|p| p.pubkey != partial.pubkey);
        input.partial_sigs.push(partial);
        Ok(())
    }

    /// Record the final unlocking script; an input is finalized only once
    pub fn set_final_script_sig(
        &mut self,
        index: usize,
        script_sig: ScriptBuf,
    ) -> Result<(), SigningError> {
        let input = self.input_mut(index)?;
        if input.is_finalized() {
            return Err(SigningError::AlreadyFinalized { index });
        }
        input.final_script_sig = Some(script_sig);
        Ok(())
    }

    /// Assemble the signed transaction; every input must be finalized
    pub fn extract_tx(&self) -> Result<Transaction, SigningError> {
        let mut tx = self.unsigned_tx.clone();
        for (index, (input, artifacts)) in tx.input.iter_mut().zip(&self.artifacts).enumerate() {
            let script_sig = artifacts
                .final_script_sig()
                .ok_or(SigningError::NotFinalized { index })?;
            input.script_sig = script_sig.clone();
        }
        Ok(tx)
    }
}
