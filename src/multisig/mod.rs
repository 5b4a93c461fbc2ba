//! Bare multisig signing engine
//!
//! Classifies bare multisig outputs against our key, signs each input with
//! the legacy signature hash and finalizes the script-sigs, including for
//! scripts whose "public keys" are embedded protocol data.
//!
//! # Example
//!
//! ```ignore
//! use bare_multisig_consolidator::multisig::{
//!     classify, finalize_inputs, sign_inputs, SigningOptions, SigningSession,
//! };
//!
//! let classification = classify(&script, &keys.compressed(), &keys.uncompressed())
//!     .ok_or("cannot sign this output")?;
//! let classifications = vec![classification];
//!
//! let mut session = SigningSession::new(unsigned_tx, SigningOptions::default());
//! sign_inputs(&mut session, &keys, &classifications)?;
//! finalize_inputs(&mut session, &classifications)?;
//!
//! let raw_hex = bitcoin::consensus::encode::serialize_hex(&session.extract_tx()?);
//! ```

pub mod classifier;
pub mod finalizer;
pub mod session;
pub mod signer;

pub use classifier::{
    classify, KeyMatcher, MatchOutcome, RawByteMatcher, ScriptClassification, ScriptClassifier,
    SignType, StructuralMatcher,
};
pub use finalizer::{finalize_inputs, finalize_standard, StandardFinalizeError};
pub use session::{InputArtifacts, PartialSignature, SigningError, SigningOptions, SigningSession};
pub use signer::sign_inputs;
