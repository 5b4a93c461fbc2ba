//! Bare multisig consolidation
//!
//! Ties the indexer, previous transaction providers and the signing engine
//! together into one call that returns a signed raw transaction.

pub mod planner;

pub use crate::config::ConsolidateOptions;
pub use planner::{
    consolidate_bare_multisig, ConsolidationPlan, ConsolidationPlanner, FilterStats, PlannedInput,
};
