//! External data sources
//!
//! This module provides:
//! - The indexing service API (UTXO listing and spent checks)
//! - Raw transaction providers with ordered fallback and a shared cache

pub mod client;
pub mod provider;
pub mod types;

pub use client::{HttpIndexer, IndexerApi};
pub use provider::{EsploraProvider, PrevTxFetcher, RawTxProvider};
pub use types::{CandidateUtxo, IndexerError, OutspendStatus};
