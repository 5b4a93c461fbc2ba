//! Input finalization
//!
//! Turns partial signatures into final script-sigs. The standard path
//! decodes the multisig script and orders signatures by key position; when
//! that fails the script-sig is built by hand from the first partial
//! signature, the same `OP_0 <sig>` shape the signer writes for data-carrying
//! scripts.

use bitcoin::ecdsa::Signature;
use bitcoin::sighash::EcdsaSighashType;
use bitcoin::{Script, ScriptBuf};

use super::classifier::ScriptClassification;
use super::session::{InputArtifacts, SigningError, SigningSession};
use crate::core::{multisig_script_sig, MultisigScript};

/// Why the standard finalizer gave up on an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StandardFinalizeError {
    /// The script is not a decodable multisig
    Script(String),
    /// Fewer usable signatures than the script requires
    NotEnoughSignatures { have: usize, need: usize },
}

impl std::fmt::Display for StandardFinalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Script(e) => write!(f, "{}", e),
            Self::NotEnoughSignatures { have, need } => {
                write!(f, "have {} of {} required signatures", have, need)
            }
        }
    }
}

/// Strict DER signature followed by the SIGHASH_ALL byte
fn parse_partial(signature: &[u8]) -> Option<Signature> {
    Signature::from_slice(signature)
        .ok()
        .filter(|sig| sig.sighash_type == EcdsaSighashType::All)
}

/// Standard CHECKMULTISIG finalization: `OP_0` followed by `m` signatures in
/// key order
pub fn finalize_standard(
    artifacts: &InputArtifacts,
    script_pubkey: &Script,
) -> Result<ScriptBuf, StandardFinalizeError> {
    let multisig = MultisigScript::decode(script_pubkey)
        .map_err(|e| StandardFinalizeError::Script(e.to_string()))?;
    let need = multisig.required as usize;

    let signatures: Vec<Signature> = multisig
        .pubkeys
        .iter()
        .filter_map(|key| artifacts.signature_for(key))
        .filter_map(|p| parse_partial(&p.signature))
        .take(need)
        .collect();

    if signatures.len() < need {
        return Err(StandardFinalizeError::NotEnoughSignatures {
            have: signatures.len(),
            need,
        });
    }

    Ok(multisig_script_sig(&signatures))
}

/// Finalize every input of `session`.
///
/// Inputs that already carry a final script-sig are left untouched, which
/// makes the call idempotent.
pub fn finalize_inputs(
    session: &mut SigningSession,
    classifications: &[ScriptClassification],
) -> Result<(), SigningError> {
    if classifications.len() != session.input_count() {
        return Err(SigningError::ClassificationCountMismatch {
            classifications: classifications.len(),
            inputs: session.input_count(),
        });
    }

    for (index, classification) in classifications.iter().enumerate() {
        if session.is_finalized(index) {
            log::debug!("Input {} already finalized, skipping", index);
            continue;
        }

        let artifacts = session.input(index)?;
        let script_sig = match finalize_standard(artifacts, &classification.script_pubkey) {
            Ok(script_sig) => script_sig,
            Err(reason) => {
                log::debug!(
                    "Input {}: standard finalization failed ({}), building script-sig manually",
                    index,
                    reason
                );
                let signature = artifacts
                    .partial_sigs()
                    .first()
                    .and_then(|p| parse_partial(&p.signature))
                    .ok_or(SigningError::MissingPartialSignature { index })?;
                multisig_script_sig(&[signature])
            }
        };

        session.set_final_script_sig(index, script_sig)?;
    }

    Ok(())
}
