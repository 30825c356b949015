//! Outbound ports (driven side - SPI)
//!
//! [`PendingPool`] and [`ExecutionSink`] are synchronous: one assembly run is a
//! strictly sequential loop and never awaits between decisions. The async ports
//! feed a run with its inputs and take its output away.

use crate::domain::{Address, Candidate, ParentHeader, Transaction, TxHash};
use crate::error::{ExecutionError, Result};
use async_trait::async_trait;

/// Port: Priority-ordered view over per-account nonce queues
pub trait PendingPool {
    /// Head of the highest-priority account that is still eligible
    fn next_eligible(&mut self) -> Option<Candidate>;

    /// Consume the head of `account`, exposing its next nonce
    fn advance(&mut self, account: Address);

    /// Exclude `account` for the rest of the run
    fn disqualify(&mut self, account: Address);
}

/// Gas accounting of one applied transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Hash of the applied transaction
    pub tx_hash: TxHash,

    /// Actual execution gas
    pub gas_used: u64,
}

/// Port: Execution engine with single-step speculation
///
/// `apply` stages the effects of one transaction. The caller then either
/// `commit`s them into the block state or `discard`s them.
pub trait ExecutionSink {
    /// Apply `tx` speculatively
    fn apply(&mut self, tx: &Transaction) -> std::result::Result<ExecutionOutcome, ExecutionError>;

    /// Merge the staged effects into the block state
    fn commit(&mut self);

    /// Drop the staged effects
    fn discard(&mut self);
}

/// Port: Fetch pending transactions from Mempool
#[async_trait]
pub trait MempoolReader: Send + Sync {
    /// Snapshot of up to `max_count` validated pending candidates
    async fn pending_candidates(&self, max_count: usize) -> Result<Vec<Candidate>>;
}

/// Port: Execution state rooted at a parent block
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Sink handed to one assembly run
    type Sink: ExecutionSink + Send + 'static;

    /// Fresh execution sink over the post-state of `parent`
    async fn execution_sink(&self, parent: &ParentHeader) -> Result<Self::Sink>;
}

/// Port: Publish events to Event Bus
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish generic event
    async fn publish_event(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}
