//! Fixed-layout payload of the leading system transaction
//!
//! ```text
//! +---------+--------------------------+
//! | Bytes   | Field                    |
//! +---------+--------------------------+
//! | 4       | Function selector        |
//! | 4       | BaseFeeScalar            |
//! | 4       | BlobBaseFeeScalar        |
//! | 8       | SequenceNumber           |
//! | 8       | Timestamp                |
//! | 8       | L1BlockNumber            |
//! | 32      | BaseFee                  |
//! | 32      | BlobBaseFee              |
//! | 32      | BlockHash                |
//! | 32      | BatcherHash              |
//! | 4       | OperatorFeeScalar        |
//! | 8       | OperatorFeeConstant      |
//! | 2       | DAFootprintGasScalar     |
//! +---------+--------------------------+
//! ```
//!
//! Only the selector and the trailing footprint scalar are interpreted here.
//! Everything else belongs to the execution layer.

use crate::error::{AssemblyError, Result};

/// Total payload length
pub const L1_ATTRIBUTES_LEN: usize = 4 + 4 + 4 + 8 + 8 + 8 + 32 * 4 + 4 + 8 + 2;

/// Selector of `setL1BlockValuesJovian()`
pub const L1_ATTRIBUTES_SELECTOR: [u8; 4] = [0x3d, 0xb6, 0xbe, 0x2b];

/// Scalar used when the payload carries zero
pub const DEFAULT_DA_FOOTPRINT_GAS_SCALAR: u16 = 400;

const FOOTPRINT_SCALAR_OFFSET: usize = L1_ATTRIBUTES_LEN - 2;

/// Build a payload with the given footprint scalar and all other fields zeroed
pub fn encode_l1_attributes(da_footprint_gas_scalar: u16) -> Vec<u8> {
    let mut data = vec![0u8; L1_ATTRIBUTES_LEN];
    data[..4].copy_from_slice(&L1_ATTRIBUTES_SELECTOR);
    data[FOOTPRINT_SCALAR_OFFSET..].copy_from_slice(&da_footprint_gas_scalar.to_be_bytes());
    data
}

/// Extract the DA footprint gas scalar
pub fn extract_da_footprint_gas_scalar(data: &[u8]) -> Result<u16> {
    if data.len() != L1_ATTRIBUTES_LEN {
        return Err(AssemblyError::MalformedSystemPayload {
            reason: format!(
                "expected {} bytes, got {}",
                L1_ATTRIBUTES_LEN,
                data.len()
            ),
        });
    }

    if data[..4] != L1_ATTRIBUTES_SELECTOR {
        return Err(AssemblyError::MalformedSystemPayload {
            reason: format!("unexpected selector 0x{}", hex::encode(&data[..4])),
        });
    }

    let mut scalar = [0u8; 2];
    scalar.copy_from_slice(&data[FOOTPRINT_SCALAR_OFFSET..]);
    let scalar = u16::from_be_bytes(scalar);

    if scalar == 0 {
        return Ok(DEFAULT_DA_FOOTPRINT_GAS_SCALAR);
    }
    Ok(scalar)
}
