//! Core Bitcoin primitives
//!
//! Thin layer over the `bitcoin` crate for what the engine signs over:
//! - Strict bare multisig decoding and script building
//! - Consolidation transactions and the legacy signature hash
//! - Destination address decoding and P2PKH derivation
//! - Fee rate and consolidation size estimation

pub mod address;
pub mod fee;
pub mod script;
pub mod transaction;

pub use bitcoin::Network;

pub use address::{address_to_script, p2pkh_address, AddressError};
pub use fee::{
    consolidation_fee, estimate_consolidation_vsize, FeeRate, BARE_MULTISIG_INPUT_SIZE,
    MAX_FEE_RATE,
};
pub use script::{multisig_script, multisig_script_sig, script_code, MultisigScript, ScriptError};
pub use transaction::{
    consolidation_transaction, decode_transaction, legacy_sighash, parse_outpoint,
    transaction_from_hex, unsigned_input, TransactionError, TX_VERSION,
};
