//! Error types for the block assembly subsystem
//!
//! Two layers:
//! - [`AssemblyError`]: fatal to a run (or caller-facing from the service).
//! - [`ExecutionError`]: raised by an [`ExecutionSink`](crate::ports::ExecutionSink) for a
//!   single transaction. Recovered locally for pool transactions, fatal for system ones.

use crate::domain::{Address, TxHash};
use thiserror::Error;

/// Result type alias for block assembly operations
pub type Result<T> = std::result::Result<T, AssemblyError>;

/// Errors that abort an assembly run
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Block configuration could not be resolved
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// System transaction payload cannot yield a metering context
    #[error("Malformed system transaction payload: {reason}")]
    MalformedSystemPayload {
        /// What was wrong with the payload
        reason: String,
    },

    /// A block cannot be built without its system transactions
    #[error("No system transaction supplied")]
    MissingSystemTransaction,

    /// A mandatory system transaction failed to execute
    #[error("System transaction {index} ({tx_hash:?}) failed: {source}")]
    SystemTransactionFailed {
        /// Position in canonical order
        index: usize,
        /// Hash of the failing transaction
        tx_hash: TxHash,
        /// Underlying execution failure
        #[source]
        source: ExecutionError,
    },

    /// The run was superseded or abandoned before completion
    #[error("Assembly cancelled for parent {parent_hash:?}")]
    Cancelled {
        /// Parent the run was building on
        parent_hash: primitive_types::H256,
    },

    /// A block invariant did not hold after assembly
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AssemblyError {
    /// Check if error is recoverable (a later run may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Check if error is critical (configuration or core bug)
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::MalformedSystemPayload { .. }
                | Self::InvariantViolation(_)
                | Self::InternalError(_)
        )
    }
}

/// Per-transaction execution failure
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// Transaction nonce is behind the account nonce
    #[error("Nonce too low for {sender:?}: expected {expected}, got {actual}")]
    NonceTooLow {
        /// Sender account
        sender: Address,
        /// Account nonce in the evolving state
        expected: u64,
        /// Transaction nonce
        actual: u64,
    },

    /// Transaction nonce is ahead of the account nonce
    #[error("Nonce too high for {sender:?}: expected {expected}, got {actual}")]
    NonceTooHigh {
        /// Sender account
        sender: Address,
        /// Account nonce in the evolving state
        expected: u64,
        /// Transaction nonce
        actual: u64,
    },

    /// Sender cannot cover value plus maximum fee
    #[error("Insufficient funds for {sender:?}: balance {balance}, required {required}")]
    InsufficientFunds {
        /// Sender account
        sender: Address,
        /// Available balance (decimal)
        balance: String,
        /// Required amount (decimal)
        required: String,
    },

    /// Gas limit below the intrinsic cost
    #[error("Intrinsic gas too low: limit {gas_limit}, intrinsic {intrinsic}")]
    IntrinsicGasTooLow {
        /// Declared gas limit
        gas_limit: u64,
        /// Intrinsic gas of the transaction
        intrinsic: u64,
    },

    /// A speculative application is already pending
    #[error("Speculative execution already pending")]
    PendingSpeculation,

    /// Any other failure reported by the execution engine
    #[error("Execution failed: {0}")]
    Other(String),
}

impl ExecutionError {
    /// Nonce errors make every later nonce of the account unexecutable
    pub fn is_nonce_error(&self) -> bool {
        matches!(self, Self::NonceTooLow { .. } | Self::NonceTooHigh { .. })
    }
}
