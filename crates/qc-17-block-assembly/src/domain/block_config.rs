//! Per-block configuration resolution
//!
//! [`BlockConfig::resolve`] is pure: the same parent, schedule and attributes
//! always resolve to the same configuration.

use super::entities::{Address, BlockHash, BlockHeader, Transaction};
use super::meter::MeterKind;
use crate::error::{AssemblyError, Result};
use serde::{Deserialize, Serialize};

/// Extra data version written while Holocene is the latest active fork
pub const HOLOCENE_EXTRA_DATA_VERSION: u8 = 0;

/// Extra data version written once Jovian is active
pub const JOVIAN_EXTRA_DATA_VERSION: u8 = 1;

/// Holocene extra data length: version + denominator + elasticity
pub const HOLOCENE_EXTRA_DATA_LEN: usize = 1 + 4 + 4;

/// Jovian extra data length: Holocene layout + min base fee
pub const JOVIAN_EXTRA_DATA_LEN: usize = HOLOCENE_EXTRA_DATA_LEN + 8;

/// Fork activation times and fee-market defaults of a chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSchedule {
    /// Holocene activation timestamp
    pub holocene_time: Option<u64>,

    /// Isthmus activation timestamp
    pub isthmus_time: Option<u64>,

    /// Jovian activation timestamp
    pub jovian_time: Option<u64>,

    /// Default EIP-1559 base fee change denominator
    pub eip1559_denominator: u32,

    /// Default EIP-1559 elasticity multiplier
    pub eip1559_elasticity: u32,

    /// Largest resource budget a block may carry
    pub max_gas_limit: u64,
}

impl Default for ChainSchedule {
    fn default() -> Self {
        Self {
            holocene_time: None,
            isthmus_time: None,
            jovian_time: None,
            eip1559_denominator: 250,
            eip1559_elasticity: 6,
            max_gas_limit: 30_000_000,
        }
    }
}

fn is_active(activation: Option<u64>, timestamp: u64) -> bool {
    activation.is_some_and(|at| timestamp >= at)
}

impl ChainSchedule {
    /// Every fork activated at genesis
    pub fn all_active() -> Self {
        Self {
            holocene_time: Some(0),
            isthmus_time: Some(0),
            jovian_time: Some(0),
            ..Self::default()
        }
    }

    /// Everything up to Isthmus activated at genesis, Jovian never
    pub fn isthmus() -> Self {
        Self {
            holocene_time: Some(0),
            isthmus_time: Some(0),
            jovian_time: None,
            ..Self::default()
        }
    }

    /// Check if Holocene is active at `timestamp`
    pub fn is_holocene_active(&self, timestamp: u64) -> bool {
        is_active(self.holocene_time, timestamp)
    }

    /// Check if Isthmus is active at `timestamp`
    pub fn is_isthmus_active(&self, timestamp: u64) -> bool {
        is_active(self.isthmus_time, timestamp)
    }

    /// Check if Jovian is active at `timestamp`
    pub fn is_jovian_active(&self, timestamp: u64) -> bool {
        is_active(self.jovian_time, timestamp)
    }

    /// Default fee-market parameters
    pub fn default_eip1559_params(&self) -> Eip1559Params {
        Eip1559Params {
            denominator: self.eip1559_denominator,
            elasticity: self.eip1559_elasticity,
        }
    }

    /// Reject schedules that cannot resolve any block
    pub fn validate(&self) -> Result<()> {
        if self.eip1559_denominator == 0 || self.eip1559_elasticity == 0 {
            return Err(AssemblyError::InvalidConfig(
                "EIP-1559 defaults must be non-zero".into(),
            ));
        }
        if self.max_gas_limit == 0 {
            return Err(AssemblyError::InvalidConfig(
                "max_gas_limit must be non-zero".into(),
            ));
        }

        let forks = [
            ("holocene", self.holocene_time),
            ("isthmus", self.isthmus_time),
            ("jovian", self.jovian_time),
        ];
        for pair in forks.windows(2) {
            let (earlier_name, earlier) = pair[0];
            let (later_name, later) = pair[1];
            match (earlier, later) {
                (None, Some(_)) => {
                    return Err(AssemblyError::InvalidConfig(format!(
                        "{} scheduled without {}",
                        later_name, earlier_name
                    )));
                }
                (Some(a), Some(b)) if b < a => {
                    return Err(AssemblyError::InvalidConfig(format!(
                        "{} ({}) activates before {} ({})",
                        later_name, b, earlier_name, a
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// EIP-1559 fee-market parameters
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip1559Params {
    /// Base fee change denominator
    pub denominator: u32,

    /// Elasticity multiplier
    pub elasticity: u32,
}

impl Eip1559Params {
    /// Decode the 8-byte attribute form (denominator BE ‖ elasticity BE)
    ///
    /// All-zero bytes resolve to `defaults`.
    pub fn from_attribute_bytes(bytes: [u8; 8], defaults: Eip1559Params) -> Result<Self> {
        let (denominator, elasticity) = split_params(&bytes);
        if denominator == 0 && elasticity == 0 {
            return Ok(defaults);
        }
        if denominator == 0 {
            return Err(AssemblyError::InvalidConfig(format!(
                "zero EIP-1559 denominator with elasticity {}",
                elasticity
            )));
        }
        Ok(Self {
            denominator,
            elasticity,
        })
    }

    /// Encode into the 8-byte attribute form
    pub fn to_attribute_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.denominator.to_be_bytes());
        out[4..].copy_from_slice(&self.elasticity.to_be_bytes());
        out
    }
}

fn split_params(bytes: &[u8]) -> (u32, u32) {
    let mut denominator = [0u8; 4];
    let mut elasticity = [0u8; 4];
    denominator.copy_from_slice(&bytes[..4]);
    elasticity.copy_from_slice(&bytes[4..8]);
    (u32::from_be_bytes(denominator), u32::from_be_bytes(elasticity))
}

/// Encode header extra data for the given fork state
pub fn encode_extra_data(params: Eip1559Params, min_base_fee: Option<u64>) -> Vec<u8> {
    let mut out = Vec::with_capacity(JOVIAN_EXTRA_DATA_LEN);
    match min_base_fee {
        Some(_) => out.push(JOVIAN_EXTRA_DATA_VERSION),
        None => out.push(HOLOCENE_EXTRA_DATA_VERSION),
    }
    out.extend_from_slice(&params.to_attribute_bytes());
    if let Some(min_base_fee) = min_base_fee {
        out.extend_from_slice(&min_base_fee.to_be_bytes());
    }
    out
}

/// Decode header extra data into fee-market parameters and min base fee
pub fn decode_extra_data(data: &[u8]) -> Result<(Eip1559Params, Option<u64>)> {
    let (version, expected_len) = match data.first() {
        Some(&HOLOCENE_EXTRA_DATA_VERSION) => (HOLOCENE_EXTRA_DATA_VERSION, HOLOCENE_EXTRA_DATA_LEN),
        Some(&JOVIAN_EXTRA_DATA_VERSION) => (JOVIAN_EXTRA_DATA_VERSION, JOVIAN_EXTRA_DATA_LEN),
        Some(other) => {
            return Err(AssemblyError::InvalidConfig(format!(
                "unknown extra data version {}",
                other
            )));
        }
        None => return Err(AssemblyError::InvalidConfig("empty extra data".into())),
    };
    if data.len() != expected_len {
        return Err(AssemblyError::InvalidConfig(format!(
            "extra data version {} must be {} bytes, got {}",
            version,
            expected_len,
            data.len()
        )));
    }

    let (denominator, elasticity) = split_params(&data[1..HOLOCENE_EXTRA_DATA_LEN]);
    if denominator == 0 {
        return Err(AssemblyError::InvalidConfig(
            "zero EIP-1559 denominator in extra data".into(),
        ));
    }

    let min_base_fee = if version == JOVIAN_EXTRA_DATA_VERSION {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&data[HOLOCENE_EXTRA_DATA_LEN..]);
        Some(u64::from_be_bytes(raw))
    } else {
        None
    };

    Ok((
        Eip1559Params {
            denominator,
            elasticity,
        },
        min_base_fee,
    ))
}

/// EIP-1559 base fee of the child block
pub fn next_base_fee(gas_used: u64, gas_limit: u64, base_fee: u64, params: Eip1559Params) -> u64 {
    let elasticity = u128::from(params.elasticity.max(1));
    let denominator = u128::from(params.denominator.max(1));
    let gas_target = u128::from(gas_limit) / elasticity;
    let gas_used = u128::from(gas_used);
    let base_fee_wide = u128::from(base_fee);

    if gas_target == 0 || gas_used == gas_target {
        return base_fee;
    }

    if gas_used > gas_target {
        let delta = (base_fee_wide * (gas_used - gas_target) / gas_target / denominator).max(1);
        u64::try_from(base_fee_wide + delta).unwrap_or(u64::MAX)
    } else {
        let delta = base_fee_wide * (gas_target - gas_used) / gas_target / denominator;
        u64::try_from(base_fee_wide.saturating_sub(delta)).unwrap_or(0)
    }
}

/// Header fields of the block being built on
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentHeader {
    /// Parent block hash
    pub hash: BlockHash,

    /// Parent height
    pub number: u64,

    /// Parent timestamp
    pub timestamp: u64,

    /// Parent resource budget
    pub gas_limit: u64,

    /// Parent reported usage
    pub gas_used: u64,

    /// Parent footprint total, if footprint metering was active
    pub da_footprint_used: Option<u64>,

    /// Parent base fee
    pub base_fee: u64,

    /// Parent extra data
    pub extra_data: Vec<u8>,
}

impl ParentHeader {
    /// Genesis-like parent with the given budget
    pub fn genesis(gas_limit: u64, base_fee: u64) -> Self {
        Self {
            hash: BlockHash::zero(),
            number: 0,
            timestamp: 0,
            gas_limit,
            gas_used: 0,
            da_footprint_used: None,
            base_fee,
            extra_data: Vec::new(),
        }
    }

    /// Parent view of an assembled header
    pub fn from_header(header: &BlockHeader) -> Self {
        Self {
            hash: header.hash(),
            number: header.number,
            timestamp: header.timestamp,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            da_footprint_used: header.da_footprint_used,
            base_fee: header.base_fee,
            extra_data: header.extra_data.clone(),
        }
    }
}

/// Build request for one block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadAttributes {
    /// Block timestamp
    pub timestamp: u64,

    /// Fee recipient
    pub beneficiary: Address,

    /// Requested budget (parent budget if absent)
    pub gas_limit: Option<u64>,

    /// Fee-market parameters, 8-byte attribute form
    pub eip1559_params: Option<[u8; 8]>,

    /// Base fee floor, only valid once Jovian is active
    pub min_base_fee: Option<u64>,

    /// Mandatory system transactions in canonical order
    pub system_transactions: Vec<Transaction>,

    /// Build from system transactions only
    pub no_tx_pool: bool,
}

/// Everything an assembly run needs to know about the block it builds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockConfig {
    /// Parent block hash
    pub parent_hash: BlockHash,

    /// Height of the new block
    pub number: u64,

    /// Block timestamp
    pub timestamp: u64,

    /// Fee recipient
    pub beneficiary: Address,

    /// Resource budget
    pub gas_limit: u64,

    /// Accounting regime
    pub meter: MeterKind,

    /// Min base fee, when the floor rule is in force
    pub min_base_fee: Option<u64>,

    /// Fee-market parameters written into the header
    pub eip1559_params: Option<Eip1559Params>,

    /// Header extra data
    pub extra_data: Vec<u8>,

    /// Base fee of the new block
    pub base_fee: u64,

    /// Mandatory system transactions in canonical order
    pub system_transactions: Vec<Transaction>,

    /// Skip pool selection
    pub no_tx_pool: bool,
}

impl BlockConfig {
    /// Resolve the configuration of the child of `parent`
    pub fn resolve(
        schedule: &ChainSchedule,
        parent: &ParentHeader,
        attributes: &PayloadAttributes,
    ) -> Result<Self> {
        schedule.validate()?;

        let timestamp = attributes.timestamp;
        if timestamp <= parent.timestamp {
            return Err(AssemblyError::InvalidConfig(format!(
                "timestamp {} not after parent timestamp {}",
                timestamp, parent.timestamp
            )));
        }

        let gas_limit = attributes.gas_limit.unwrap_or(parent.gas_limit);
        if gas_limit == 0 || gas_limit > schedule.max_gas_limit {
            return Err(AssemblyError::InvalidConfig(format!(
                "gas limit {} outside 1..={}",
                gas_limit, schedule.max_gas_limit
            )));
        }

        let jovian = schedule.is_jovian_active(timestamp);
        let holocene = schedule.is_holocene_active(timestamp);

        let min_base_fee = match (jovian, attributes.min_base_fee) {
            (true, Some(min_base_fee)) => Some(min_base_fee),
            (true, None) => {
                return Err(AssemblyError::InvalidConfig(
                    "min_base_fee required once Jovian is active".into(),
                ));
            }
            (false, Some(_)) => {
                return Err(AssemblyError::InvalidConfig(
                    "min_base_fee not allowed before Jovian".into(),
                ));
            }
            (false, None) => None,
        };

        let eip1559_params = if holocene {
            let raw = attributes.eip1559_params.ok_or_else(|| {
                AssemblyError::InvalidConfig("eip1559_params required once Holocene is active".into())
            })?;
            Some(Eip1559Params::from_attribute_bytes(
                raw,
                schedule.default_eip1559_params(),
            )?)
        } else {
            None
        };

        let extra_data = match eip1559_params {
            Some(params) => encode_extra_data(params, min_base_fee),
            None => Vec::new(),
        };

        let base_fee = Self::child_base_fee(schedule, parent)?;

        if attributes.system_transactions.is_empty() {
            return Err(AssemblyError::MissingSystemTransaction);
        }
        if let Some(index) = attributes
            .system_transactions
            .iter()
            .position(|tx| !tx.is_system())
        {
            return Err(AssemblyError::InvalidConfig(format!(
                "system transaction {} is not of system kind",
                index
            )));
        }

        Ok(Self {
            parent_hash: parent.hash,
            number: parent.number + 1,
            timestamp,
            beneficiary: attributes.beneficiary,
            gas_limit,
            meter: if jovian {
                MeterKind::Footprint
            } else {
                MeterKind::Standard
            },
            min_base_fee,
            eip1559_params,
            extra_data,
            base_fee,
            system_transactions: attributes.system_transactions.clone(),
            no_tx_pool: attributes.no_tx_pool,
        })
    }

    fn child_base_fee(schedule: &ChainSchedule, parent: &ParentHeader) -> Result<u64> {
        let parent_jovian = schedule.is_jovian_active(parent.timestamp);
        let parent_holocene = schedule.is_holocene_active(parent.timestamp);

        let (params, floor) = if parent_holocene && !parent.extra_data.is_empty() {
            let (params, min_base_fee) = decode_extra_data(&parent.extra_data)?;
            (params, min_base_fee.unwrap_or(0))
        } else {
            (schedule.default_eip1559_params(), 0)
        };

        let parent_usage = if parent_jovian {
            parent.gas_used.max(parent.da_footprint_used.unwrap_or(0))
        } else {
            parent.gas_used
        };

        let base_fee = next_base_fee(parent_usage, parent.gas_limit, parent.base_fee, params);
        Ok(base_fee.max(floor))
    }
}
