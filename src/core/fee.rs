//! Fee calculation for consolidation transactions
//!
//! Bare multisig inputs carry no witness, so virtual size equals the
//! serialized size. Input size is estimated from the worst case script-sig
//! the finalizer can produce for a single signature.

use bitcoin::consensus::encode::VarInt;
use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Default maximum fee rate (sat/vbyte)
pub const MAX_FEE_RATE: u64 = 10_000;

/// Version + locktime
const TX_OVERHEAD: usize = 4 + 4;

/// `OP_0 <push 73: DER (max 72) || sighash>`
pub const MAX_SCRIPT_SIG_SIZE: usize = 1 + 1 + 72 + 1;

/// Outpoint (36) + script length (1) + script-sig + sequence (4)
pub const BARE_MULTISIG_INPUT_SIZE: usize = 36 + 1 + MAX_SCRIPT_SIG_SIZE + 4;

// =============================================================================
// Fee Rate
// =============================================================================

/// Fee rate, stored in satoshis per 1000 virtual bytes so fractional
/// sat/vbyte rates are exact to three decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeeRate(u64);

impl FeeRate {
    /// Create from satoshis per vbyte; `None` for negative or non-finite rates
    pub fn from_sat_per_vbyte(rate: f64) -> Option<Self> {
        if !rate.is_finite() || rate < 0.0 {
            return None;
        }
        Some(Self((rate * 1000.0).round() as u64))
    }

    /// Create from satoshis per 1000 vbytes
    pub fn from_sat_per_kvb(rate: u64) -> Self {
        Self(rate)
    }

    /// Fee for a given size, rounded up to the next satoshi
    pub fn fee_for_vsize(&self, vsize: usize) -> u64 {
        self.0.saturating_mul(vsize as u64).div_ceil(1000)
    }

    pub fn as_sat_per_vbyte(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Whether the rate is positive and at most `max` sat/vbyte
    pub fn is_within(&self, max: u64) -> bool {
        self.0 > 0 && self.0 <= max.saturating_mul(1000)
    }
}

// =============================================================================
// Size Estimation
// =============================================================================

fn compact_size_len(n: usize) -> usize {
    VarInt(n as u64).size()
}

/// Estimated virtual size of a consolidation spending `input_count` bare
/// multisig inputs into outputs with the given script lengths
pub fn estimate_consolidation_vsize(input_count: usize, output_script_lens: &[usize]) -> usize {
    let outputs: usize = output_script_lens
        .iter()
        .map(|len| 8 + compact_size_len(*len) + len)
        .sum();

    TX_OVERHEAD
        + compact_size_len(input_count)
        + input_count * BARE_MULTISIG_INPUT_SIZE
        + compact_size_len(output_script_lens.len())
        + outputs
}

/// Fee for a single-output consolidation
pub fn consolidation_fee(input_count: usize, output_script_len: usize, rate: FeeRate) -> u64 {
    rate.fee_for_vsize(estimate_consolidation_vsize(input_count, &[output_script_len]))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(sat_per_vbyte: f64) -> FeeRate {
        FeeRate::from_sat_per_vbyte(sat_per_vbyte).unwrap()
    }

    #[test]
    fn test_fee_rate() {
        assert_eq!(rate(10.0).fee_for_vsize(250), 2500);
        assert!(rate(10.0).is_within(MAX_FEE_RATE));
        assert!(rate(10_000.0).is_within(MAX_FEE_RATE));
        assert!(!rate(10_000.5).is_within(MAX_FEE_RATE));
        assert!(!rate(0.0).is_within(MAX_FEE_RATE));
        assert!(FeeRate::from_sat_per_vbyte(-1.0).is_none());
        assert!(FeeRate::from_sat_per_vbyte(f64::NAN).is_none());
    }

    #[test]
    fn test_fractional_rates_round_fee_up() {
        assert_eq!(rate(1.5).fee_for_vsize(160), 240);
        assert_eq!(rate(1.5).as_sat_per_vbyte(), 1.5);
        // 160.16 sats
        assert_eq!(rate(1.001).fee_for_vsize(160), 161);
        assert_eq!(rate(0.1).fee_for_vsize(1), 1);
        assert!(rate(0.1).is_within(MAX_FEE_RATE));
        assert_eq!(FeeRate::from_sat_per_kvb(1500), rate(1.5));
    }

    #[test]
    fn test_single_input_p2pkh_estimate() {
        // 10 bytes overhead + 116 input + 34 P2PKH output
        assert_eq!(BARE_MULTISIG_INPUT_SIZE, 116);
        assert_eq!(estimate_consolidation_vsize(1, &[25]), 160);
        assert_eq!(consolidation_fee(1, 25, rate(10.0)), 1600);
    }

    #[test]
    fn test_estimate_grows_with_input_varint() {
        let small = estimate_consolidation_vsize(252, &[25]);
        let large = estimate_consolidation_vsize(253, &[25]);
        assert_eq!(large - small, BARE_MULTISIG_INPUT_SIZE + 2);
    }
}
