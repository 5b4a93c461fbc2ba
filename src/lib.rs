//! Bare-Multisig Consolidator: sweep bare multisig outputs with one key
//!
//! Overlay protocols have long stored data in bare multisig outputs
//! (`OP_m <pubkey>... OP_n OP_CHECKMULTISIG`) by writing it into fake public
//! key slots. This crate provides:
//! - Script classification against both encodings of a key, including
//!   scripts whose key slots are not valid curve points
//! - Legacy signature hashing and per-input signing
//! - Finalization with a manual fallback for non-standard scripts
//! - UTXO discovery, spent filtering and previous transaction retrieval
//!   with ordered provider fallback
//! - Fee estimation and single-output consolidation
//!
//! The result is a raw signed transaction in hex; broadcasting is left to the
//! caller.
//!
//! # Example
//!
//! ```no_run
//! use bare_multisig_consolidator::{consolidate_bare_multisig, ConsolidateOptions, ConsolidatorConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let raw_hex = consolidate_bare_multisig(
//!     ConsolidatorConfig::default(),
//!     "<64 hex chars>",
//!     "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH",
//!     10.0,
//!     None,
//!     ConsolidateOptions {
//!         max_inputs_per_tx: Some(200),
//!         skip_spent_check: false,
//!     },
//! )
//! .await?;
//! println!("{}", raw_hex);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consolidate;
pub mod core;
pub mod crypto;
pub mod error;
pub mod indexer;
pub mod multisig;

// Re-export commonly used types
pub use config::{ConsolidateOptions, ConsolidatorConfig};
pub use consolidate::{consolidate_bare_multisig, ConsolidationPlan, ConsolidationPlanner, FilterStats};
pub use core::{FeeRate, Network};
pub use crypto::KeyMaterial;
pub use error::ConsolidationError;
pub use indexer::{CandidateUtxo, IndexerApi, PrevTxFetcher, RawTxProvider};
pub use multisig::{classify, ScriptClassification, SignType, SigningSession};
