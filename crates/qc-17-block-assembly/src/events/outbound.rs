//! Outbound events (published)

use crate::domain::{Block, BlockHash, MeterKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current event schema version
pub const EVENT_VERSION: u16 = 1;

/// Event: Block successfully assembled
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockAssembledEvent {
    /// Event version
    pub version: u16,

    /// Sender subsystem ID (always 17)
    pub sender_id: u8,

    /// Correlation ID of the run
    pub correlation_id: Uuid,

    /// Assembled block hash
    pub block_hash: BlockHash,

    /// Parent block hash
    pub parent_hash: BlockHash,

    /// Block number
    pub block_number: u64,

    /// Transaction count (system transactions included)
    pub transaction_count: u32,

    /// Reported usage
    pub gas_used: u64,

    /// Sum of execution gas
    pub execution_gas_used: u64,

    /// Resource budget
    pub gas_limit: u64,

    /// Metering regime
    pub meter: MeterKind,

    /// Candidates considered and dropped
    pub dropped_count: u32,

    /// Assembly time in milliseconds
    pub assembly_time_ms: u64,
}

impl BlockAssembledEvent {
    /// Summarize an assembled block
    pub fn from_block(block: &Block, correlation_id: Uuid, assembly_time_ms: u64) -> Self {
        Self {
            version: EVENT_VERSION,
            sender_id: crate::SUBSYSTEM_ID,
            correlation_id,
            block_hash: block.hash(),
            parent_hash: block.header.parent_hash,
            block_number: block.header.number,
            transaction_count: block.transactions.len() as u32,
            gas_used: block.header.gas_used,
            execution_gas_used: block.header.execution_gas_used,
            gas_limit: block.header.gas_limit,
            meter: block.meter,
            dropped_count: block.dropped.len() as u32,
            assembly_time_ms,
        }
    }
}
