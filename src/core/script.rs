//! Bare multisig scripts
//!
//! Strict decoding of `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`, the legacy
//! script code used for signature hashing, and the locking and unlocking
//! scripts the engine builds.

use bitcoin::blockdata::opcodes::all::{
    OP_CHECKMULTISIG, OP_CODESEPARATOR, OP_PUSHBYTES_0, OP_PUSHNUM_1, OP_PUSHNUM_16,
};
use bitcoin::blockdata::opcodes::Opcode;
use bitcoin::ecdsa::Signature;
use bitcoin::script::{Builder, Instruction, PushBytes, PushBytesError};
use bitcoin::{PublicKey, Script, ScriptBuf};
use thiserror::Error;

// =============================================================================
// Script Errors
// =============================================================================

/// Script-related errors
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Malformed script: {0}")]
    Parse(#[from] bitcoin::script::Error),
    #[error("Not a multisig script: {0}")]
    NotMultisig(&'static str),
    #[error("Invalid public key at position {0}")]
    InvalidPublicKey(usize),
    #[error("Push too large: {0}")]
    PushTooLarge(#[from] PushBytesError),
}

/// Decode `OP_1`..`OP_16` into its small integer value
fn small_int(instruction: &Instruction<'_>) -> Option<u8> {
    let Instruction::Op(op) = instruction else {
        return None;
    };
    let code = op.to_u8();
    (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8())
        .contains(&code)
        .then(|| code - OP_PUSHNUM_1.to_u8() + 1)
}

fn is_op(instruction: &Instruction<'_>, expected: Opcode) -> bool {
    matches!(instruction, Instruction::Op(op) if *op == expected)
}

// =============================================================================
// Bare Multisig
// =============================================================================

/// A decoded `OP_m <pubkey>... OP_n OP_CHECKMULTISIG` script whose key slots
/// are all valid secp256k1 points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigScript {
    /// Number of required signatures (m)
    pub required: u8,
    /// Public keys in script order, as encoded in the script
    pub pubkeys: Vec<Vec<u8>>,
}

impl MultisigScript {
    /// Strictly decode a bare multisig script.
    ///
    /// Fails when the template does not match or when any key slot is not a
    /// valid public key, which is exactly what data-carrying scripts do.
    pub fn decode(script: &Script) -> Result<Self, ScriptError> {
        let items = script.instructions().collect::<Result<Vec<_>, _>>()?;
        if items.len() < 4 {
            return Err(ScriptError::NotMultisig("too short"));
        }

        let required = small_int(&items[0]).ok_or(ScriptError::NotMultisig("missing OP_m"))?;
        if !is_op(&items[items.len() - 1], OP_CHECKMULTISIG) {
            return Err(ScriptError::NotMultisig("missing OP_CHECKMULTISIG"));
        }
        let total = small_int(&items[items.len() - 2])
            .ok_or(ScriptError::NotMultisig("missing OP_n"))?;

        let key_items = &items[1..items.len() - 2];
        if key_items.len() != total as usize || required > total {
            return Err(ScriptError::NotMultisig("key count mismatch"));
        }

        let mut pubkeys = Vec::with_capacity(key_items.len());
        for (index, item) in key_items.iter().enumerate() {
            let Instruction::PushBytes(data) = item else {
                return Err(ScriptError::NotMultisig("non-push key slot"));
            };
            PublicKey::from_slice(data.as_bytes())
                .map_err(|_| ScriptError::InvalidPublicKey(index))?;
            pubkeys.push(data.as_bytes().to_vec());
        }

        Ok(Self { required, pubkeys })
    }

    /// Position of a key in the script, if present
    pub fn position(&self, pubkey: &[u8]) -> Option<usize> {
        self.pubkeys.iter().position(|k| k.as_slice() == pubkey)
    }
}

/// Build `OP_m <keys...> OP_n OP_CHECKMULTISIG` without validating the keys
pub fn multisig_script(required: u8, keys: &[&[u8]]) -> Result<ScriptBuf, ScriptError> {
    let mut builder = Builder::new().push_int(i64::from(required));
    for key in keys {
        builder = builder.push_slice(<&PushBytes>::try_from(*key)?);
    }
    Ok(builder
        .push_int(keys.len() as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script())
}

/// `OP_0 <sig_1> ... <sig_m>`, the legacy CHECKMULTISIG unlocking script
pub fn multisig_script_sig(signatures: &[Signature]) -> ScriptBuf {
    signatures
        .iter()
        .fold(Builder::new().push_opcode(OP_PUSHBYTES_0), |builder, sig| {
            builder.push_slice(sig.serialize())
        })
        .into_script()
}

/// The script code committed to by a legacy signature hash: the script with
/// every `OP_CODESEPARATOR` opcode removed and all other bytes untouched
pub fn script_code(script: &Script) -> ScriptBuf {
    let bytes = script.as_bytes();
    let mut code = Vec::with_capacity(bytes.len());
    let mut start = 0;
    for item in script.instruction_indices() {
        match item {
            Ok((pos, instruction)) if is_op(&instruction, OP_CODESEPARATOR) => {
                code.extend_from_slice(&bytes[start..pos]);
                start = pos + 1;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    code.extend_from_slice(&bytes[start..]);
    ScriptBuf::from_bytes(code)
}

// =============================================================================
// Tests
// =============================================================================
