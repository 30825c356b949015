//! Domain layer - Pure business logic for block assembly
//!
//! Everything here is synchronous and free of I/O. One assembly run is driven
//! by [`Assembler::assemble`] over a [`PendingPool`](crate::ports::PendingPool)
//! and an [`ExecutionSink`](crate::ports::ExecutionSink).
//!
//! ## Entities
//!
//! - [`Transaction`] / [`Candidate`]: pooled or system transactions
//! - [`Block`] / [`BlockHeader`] / [`Receipt`]: the assembled artifact
//! - [`BlockConfig`]: per-block resolution of budget, meter and fee market
//!
//! ## Metering
//!
//! - [`MeterKind::Standard`]: execution gas, known after execution
//! - [`MeterKind::Footprint`]: estimated DA size times the footprint scalar
//!
//! ## Invariants
//!
//! 1. System transactions lead the block
//! 2. Metered usage never exceeds the budget
//! 3. Reported usage equals the metered sum
//! 4. A disqualified account contributes nothing further
//! 5. Identical inputs give an identical transaction list

pub mod assembler;
pub mod block_config;
mod entities;
pub mod invariants;
pub mod meter;
pub mod state;
pub mod system_payload;

pub use assembler::{Assembler, RunControl, TransientErrorPolicy};
pub use block_config::{
    decode_extra_data, encode_extra_data, next_base_fee, BlockConfig, ChainSchedule,
    Eip1559Params, ParentHeader, PayloadAttributes,
};
pub use entities::*;
pub use invariants::validate_block;
pub use meter::{estimated_da_size, MeterKind, MeteringContext};
pub use state::AssemblyState;
pub use system_payload::{
    encode_l1_attributes, extract_da_footprint_gas_scalar, DEFAULT_DA_FOOTPRINT_GAS_SCALAR,
    L1_ATTRIBUTES_LEN, L1_ATTRIBUTES_SELECTOR,
};
