//! Per-input legacy signing
//!
//! Each input is signed over its classified output script with the legacy
//! signature hash. Decodable multisig inputs get a partial signature for the
//! finalizer; inputs whose key slots hold embedded data get their final
//! script-sig right away, since nothing downstream can rebuild one for a
//! script it cannot parse.

use bitcoin::ecdsa::Signature;

use super::classifier::{ScriptClassification, SignType};
use super::session::{PartialSignature, SigningError, SigningSession};
use crate::core::{legacy_sighash, multisig_script_sig};
use crate::crypto::KeyMaterial;

/// Sign every input of `session` with `keys`.
///
/// `classifications[i]` describes input `i`. Errors are returned as-is and
/// leave already-recorded artifacts in place.
pub fn sign_inputs(
    session: &mut SigningSession,
    keys: &KeyMaterial,
    classifications: &[ScriptClassification],
) -> Result<(), SigningError> {
    if classifications.len() != session.input_count() {
        return Err(SigningError::ClassificationCountMismatch {
            classifications: classifications.len(),
            inputs: session.input_count(),
        });
    }

    let compressed = keys.compressed();
    let uncompressed = keys.uncompressed();
    let options = session.options();

    for (index, classification) in classifications.iter().enumerate() {
        let digest = legacy_sighash(session.unsigned_tx(), index, &classification.script_pubkey)
            .map_err(|source| SigningError::Sighash { index, source })?;
        let signature = Signature::sighash_all(keys.sign_digest(&digest, options.low_r));

        match classification.sign_type {
            SignType::Compressed | SignType::Uncompressed => {
                let pubkey = classification
                    .signing_key(&compressed, &uncompressed)
                    .ok_or(SigningError::NoSigningKey { index })?;
                session.add_partial_signature(
                    index,
                    PartialSignature {
                        pubkey: pubkey.to_vec(),
                        signature: signature.to_vec(),
                    },
                )?;
            }
            SignType::InvalidPubkeys => {
                if !classification.can_sign() {
                    return Err(SigningError::NoSigningKey { index });
                }
                session.set_final_script_sig(index, multisig_script_sig(&[signature]))?;
            }
        }

        log::debug!(
            "Signed input {} ({:?})",
            index,
            classification.sign_type
        );
    }

    Ok(())
}
