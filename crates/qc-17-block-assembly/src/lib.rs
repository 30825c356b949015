//! # Quantum Chain - Block Assembly Engine (Subsystem 17)
//!
//! **Bounded Context:** Block Assembly
//! **Architecture Compliance:** DDD + Hexagonal + EDA + TDD
//!
//! ## Purpose
//!
//! Builds one candidate block at a time from a parent header and a set of
//! payload attributes:
//! - Mandatory system transactions are executed first, in the given order
//! - Pool transactions are picked by per-account priority scheduling
//! - Every admitted transaction is charged against a single budget
//! - Runs can be cancelled or bounded by a build deadline
//!
//! ## Metering Regimes
//!
//! | Regime | Cost of a transaction | Known |
//! |--------|-----------------------|-------|
//! | Standard | execution gas | after execution |
//! | Footprint (Jovian) | estimated DA size × footprint scalar | before execution |
//!
//! The footprint scalar is read from the leading system transaction's
//! L1-attributes payload.
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Adapters (Outer)                                   │
//! │  - PendingSnapshot, InMemoryExecutor, publishers    │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Ports (Middle)                                     │
//! │  - Inbound: BlockAssemblyService                    │
//! │  - Outbound: PendingPool, ExecutionSink,            │
//! │    MempoolReader, StateProvider, EventPublisher     │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Inner - Pure Logic)                        │
//! │  - Assembler, AssemblyState, MeteringContext        │
//! │  - BlockConfig resolution and fee market            │
//! │  - Invariants: precedence, budget, usage, nonces    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Critical Invariants
//!
//! 1. **System Precedence**: system transactions lead the block
//! 2. **Budget**: metered usage ≤ block gas limit
//! 3. **Usage Exactness**: header usage equals the metered sum
//! 4. **Nonce Ordering**: sequential nonces per sender
//! 5. **Determinism**: identical inputs give identical blocks
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let service = ConcreteBlockAssembler::new(mempool, state, publisher, AssemblyConfig::from_env()?)?;
//! let outcome = service.assemble_block(parent, attributes).await?;
//! ```
//!
//! ## Module Structure
//!
//! - [`domain`]: Pure domain logic (selection loop, metering, block config)
//! - [`ports`]: Hexagonal architecture interfaces (inbound/outbound)
//! - [`adapters`]: In-memory pool, execution, mempool and publishers
//! - [`events`]: Event schemas for EDA
//! - [`service`]: Async orchestration of assembly runs

#![warn(missing_docs)]
#![warn(clippy::all)]

/// In-memory adapters for the outbound ports
pub mod adapters;
/// Domain models and business logic
pub mod domain;
/// Event type definitions
pub mod events;
pub mod ports;
pub mod service;
pub mod utils;

pub mod logging;

mod config;
mod error;
mod metrics;

pub use config::AssemblyConfig;
pub use error::{AssemblyError, ExecutionError, Result};
pub use metrics::Metrics;

// Re-export commonly used types
pub use domain::{
    Assembler, AssemblyOutcome, Block, BlockConfig, BlockHeader, Candidate, ChainSchedule,
    DropReason, DroppedTransaction, MeterKind, MeteringContext, ParentHeader, PayloadAttributes,
    Receipt, RunControl, Transaction, TransientErrorPolicy, TxKind,
};

pub use ports::{
    AssemblyStatus, BlockAssemblyService, EventPublisher, ExecutionOutcome, ExecutionSink,
    MempoolReader, PendingPool, StateProvider,
};

pub use events::BlockAssembledEvent;

pub use logging::{init_tracing, LoggingConfig};

pub use service::ConcreteBlockAssembler;

/// Subsystem identifier for IPC communication
pub const SUBSYSTEM_ID: u8 = 17;

/// Maximum transactions pulled from the mempool per assembly run
pub const MAX_TRANSACTION_CANDIDATES: usize = 10_000;

/// Default build deadline (2 seconds)
pub const DEFAULT_BUILD_TIMEOUT_MS: u64 = 2_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_id() {
        assert_eq!(SUBSYSTEM_ID, 17);
    }

    #[test]
    fn test_constants() {
        assert_eq!(MAX_TRANSACTION_CANDIDATES, 10_000);
        assert_eq!(DEFAULT_BUILD_TIMEOUT_MS, 2_000);
    }
}
