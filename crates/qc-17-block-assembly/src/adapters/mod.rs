//! Adapters for the outbound ports
//!
//! In-memory implementations used by the service and its tests:
//! - [`PendingSnapshot`]: per-account priority queues over one pool snapshot
//! - [`InMemoryExecutor`]: account-model execution with single-step speculation
//! - [`InMemoryMempool`] / [`InMemoryStateProvider`]: async sources for a run
//! - [`RecordingPublisher`] / [`NoOpPublisher`]: event sinks

pub mod execution;
pub mod mempool;
pub mod pool;
pub mod publisher;

pub use execution::{intrinsic_gas, AccountState, InMemoryExecutor, InMemoryStateProvider};
pub use mempool::InMemoryMempool;
pub use pool::PendingSnapshot;
pub use publisher::{topics, NoOpPublisher, RecordingPublisher};
