//! Resource metering
//!
//! Two regimes, fixed for the whole block:
//! - [`MeterKind::Standard`]: cost is the execution gas reported after applying a transaction.
//! - [`MeterKind::Footprint`]: cost is the estimated DA size times the footprint scalar,
//!   known before execution.

use super::entities::{Candidate, Transaction};
use super::system_payload::extract_da_footprint_gas_scalar;
use crate::error::{AssemblyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point scale of the Fjord size estimate
const SIZE_SCALE: u64 = 1_000_000;

/// Accounting regime of a block
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeterKind {
    /// Actual execution gas, known only after execution
    Standard,
    /// Synthetic DA footprint, known before execution
    Footprint,
}

impl fmt::Display for MeterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Footprint => write!(f, "footprint"),
        }
    }
}

/// Estimated DA size in bytes of an encoded transaction
pub fn estimated_da_size(encoded: &[u8]) -> u64 {
    op_alloy_flz::tx_estimated_size_fjord(encoded) / SIZE_SCALE
}

/// Per-block parameters needed by the footprint meter
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MeteringContext {
    /// Multiplier from estimated DA bytes to budget units
    pub footprint_scalar: u16,
}

impl MeteringContext {
    /// Read the metering context from the leading system transaction
    pub fn from_system_transactions(system_txs: &[Transaction]) -> Result<Self> {
        let first = system_txs
            .first()
            .ok_or(AssemblyError::MissingSystemTransaction)?;
        Self::from_payload(&first.input)
    }

    /// Read the metering context from a raw system payload
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(Self {
            footprint_scalar: extract_da_footprint_gas_scalar(payload)?,
        })
    }

    /// Footprint cost of a transaction
    pub fn footprint_cost(&self, tx: &Transaction) -> u64 {
        estimated_da_size(&tx.encode()).saturating_mul(u64::from(self.footprint_scalar))
    }

    /// Footprint cost of a candidate, zero for system transactions
    pub fn candidate_cost(&self, candidate: &Candidate) -> u64 {
        if candidate.is_system() {
            return 0;
        }
        self.footprint_cost(&candidate.tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TxKind;
    use crate::domain::system_payload::encode_l1_attributes;
    use primitive_types::{H160, U256};

    fn tx_with_input(input: Vec<u8>) -> Transaction {
        Transaction {
            kind: TxKind::User,
            sender: H160::repeat_byte(0x01),
            nonce: 0,
            gas_limit: 100_000,
            gas_price: U256::from(10),
            to: Some(H160::repeat_byte(0x02)),
            value: U256::zero(),
            input,
        }
    }

    #[test]
    fn test_small_transaction_hits_minimum_size() {
        assert_eq!(estimated_da_size(&[]), 100);
        assert_eq!(estimated_da_size(&tx_with_input(vec![]).encode()), 100);
    }

    #[test]
    fn test_estimate_matches_fjord_model() {
        let noisy: Vec<u8> = (0..4096u32)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 11) as u8)
            .collect();
        let flz_len = op_alloy_flz::flz_compress_len(&noisy) as u64;
        let expected = (flz_len * op_alloy_flz::L1_COST_FASTLZ_COEF)
            .saturating_sub(op_alloy_flz::L1_COST_INTERCEPT)
            .max(op_alloy_flz::MIN_TX_SIZE_SCALED)
            / 1_000_000;
        assert_eq!(estimated_da_size(&noisy), expected);
    }

    #[test]
    fn test_incompressible_input_grows_estimate() {
        let noisy: Vec<u8> = (0..2048u32)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
            .collect();
        let small = estimated_da_size(&tx_with_input(vec![]).encode());
        let large = estimated_da_size(&tx_with_input(noisy).encode());
        assert!(large > small);
    }

    #[test]
    fn test_footprint_cost_scales_with_scalar() {
        let tx = tx_with_input(vec![]);
        let base = MeteringContext {
            footprint_scalar: 1,
        };
        let scaled = MeteringContext {
            footprint_scalar: 400,
        };
        assert_eq!(scaled.footprint_cost(&tx), base.footprint_cost(&tx) * 400);
    }

    #[test]
    fn test_system_candidate_is_free() {
        let ctx = MeteringContext {
            footprint_scalar: 400,
        };
        let candidate = Candidate::new(Transaction::system(encode_l1_attributes(400)), 0);
        assert_eq!(ctx.candidate_cost(&candidate), 0);
    }

    #[test]
    fn test_context_from_system_transactions() {
        let system = vec![Transaction::system(encode_l1_attributes(250))];
        let ctx = MeteringContext::from_system_transactions(&system).unwrap();
        assert_eq!(ctx.footprint_scalar, 250);

        let err = MeteringContext::from_system_transactions(&[]).unwrap_err();
        assert!(matches!(err, AssemblyError::MissingSystemTransaction));

        let short = vec![Transaction::system(vec![0x3d, 0xb6, 0xbe, 0x2b])];
        assert!(MeteringContext::from_system_transactions(&short).is_err());
    }
}
