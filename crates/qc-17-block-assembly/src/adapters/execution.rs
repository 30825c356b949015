//! In-memory execution engine
//!
//! A deterministic account-model state machine with a copy-on-write overlay
//! scoped to one transaction. `apply` writes only to the overlay; `commit`
//! merges it into the base accounts and `discard` drops it.

use crate::domain::{Address, ParentHeader, Transaction};
use crate::error::{ExecutionError, Result};
use crate::ports::{ExecutionOutcome, ExecutionSink, StateProvider};
use async_trait::async_trait;
use primitive_types::U256;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Base cost of every transaction
pub const TX_BASE_GAS: u64 = 21_000;

/// Extra cost of a contract creation
pub const TX_CREATE_GAS: u64 = 32_000;

/// Cost per zero calldata byte
pub const TX_DATA_ZERO_GAS: u64 = 4;

/// Cost per non-zero calldata byte
pub const TX_DATA_NON_ZERO_GAS: u64 = 16;

/// Intrinsic gas of a transaction
pub fn intrinsic_gas(tx: &Transaction) -> u64 {
    let zeros = tx.input.iter().filter(|b| **b == 0).count() as u64;
    let non_zeros = tx.input.len() as u64 - zeros;
    let create = if tx.to.is_none() { TX_CREATE_GAS } else { 0 };
    TX_BASE_GAS + create + zeros * TX_DATA_ZERO_GAS + non_zeros * TX_DATA_NON_ZERO_GAS
}

/// Account state snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountState {
    /// Account nonce
    pub nonce: u64,

    /// Account balance
    pub balance: U256,
}

/// Execution sink over an in-memory account map
#[derive(Clone, Debug, Default)]
pub struct InMemoryExecutor {
    accounts: HashMap<Address, AccountState>,
    overlay: Option<HashMap<Address, AccountState>>,
}

impl InMemoryExecutor {
    /// Executor with no accounts
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor over existing accounts
    pub fn with_accounts(accounts: HashMap<Address, AccountState>) -> Self {
        Self {
            accounts,
            overlay: None,
        }
    }

    /// Set an account in the committed state
    pub fn set_account(&mut self, address: Address, nonce: u64, balance: U256) {
        self.accounts
            .insert(address, AccountState { nonce, balance });
    }

    /// Committed account state
    pub fn account(&self, address: &Address) -> AccountState {
        self.accounts.get(address).cloned().unwrap_or_default()
    }

    /// Check if a speculative application is staged
    pub fn has_pending(&self) -> bool {
        self.overlay.is_some()
    }

    fn stage_user(
        &self,
        tx: &Transaction,
        gas_used: u64,
    ) -> std::result::Result<HashMap<Address, AccountState>, ExecutionError> {
        let mut sender = self.account(&tx.sender);

        if tx.nonce < sender.nonce {
            return Err(ExecutionError::NonceTooLow {
                sender: tx.sender,
                expected: sender.nonce,
                actual: tx.nonce,
            });
        }
        if tx.nonce > sender.nonce {
            return Err(ExecutionError::NonceTooHigh {
                sender: tx.sender,
                expected: sender.nonce,
                actual: tx.nonce,
            });
        }

        let balance = sender.balance;
        let insufficient = |required: String| ExecutionError::InsufficientFunds {
            sender: tx.sender,
            balance: balance.to_string(),
            required,
        };

        // Overflowing costs can never be covered
        let required = U256::from(tx.gas_limit)
            .checked_mul(tx.gas_price)
            .and_then(|max_fee| max_fee.checked_add(tx.value))
            .ok_or_else(|| insufficient("overflow".to_string()))?;
        if balance < required {
            return Err(insufficient(required.to_string()));
        }

        let fee = U256::from(gas_used)
            .checked_mul(tx.gas_price)
            .ok_or_else(|| insufficient("overflow".to_string()))?;
        sender.balance = balance
            .checked_sub(tx.value)
            .and_then(|rest| rest.checked_sub(fee))
            .ok_or_else(|| insufficient(required.to_string()))?;
        sender.nonce += 1;

        let mut changes = HashMap::new();
        if let Some(to) = tx.to.filter(|to| *to != tx.sender) {
            let mut recipient = self.account(&to);
            recipient.balance = recipient.balance.saturating_add(tx.value);
            changes.insert(to, recipient);
        } else if tx.to == Some(tx.sender) {
            sender.balance = sender.balance.saturating_add(tx.value);
        }
        changes.insert(tx.sender, sender);
        Ok(changes)
    }
}

impl ExecutionSink for InMemoryExecutor {
    fn apply(&mut self, tx: &Transaction) -> std::result::Result<ExecutionOutcome, ExecutionError> {
        if self.overlay.is_some() {
            return Err(ExecutionError::PendingSpeculation);
        }

        let intrinsic = intrinsic_gas(tx);
        if tx.gas_limit < intrinsic {
            return Err(ExecutionError::IntrinsicGasTooLow {
                gas_limit: tx.gas_limit,
                intrinsic,
            });
        }

        let changes = if tx.is_system() {
            HashMap::new()
        } else {
            self.stage_user(tx, intrinsic)?
        };
        self.overlay = Some(changes);

        Ok(ExecutionOutcome {
            tx_hash: tx.hash(),
            gas_used: intrinsic,
        })
    }

    fn commit(&mut self) {
        if let Some(changes) = self.overlay.take() {
            self.accounts.extend(changes);
        }
    }

    fn discard(&mut self) {
        self.overlay = None;
    }
}

/// State provider handing out executors over one shared account map
#[derive(Debug, Default)]
pub struct InMemoryStateProvider {
    accounts: RwLock<HashMap<Address, AccountState>>,
}

impl InMemoryStateProvider {
    /// Provider with no accounts
    pub fn new() -> Self {
        Self::default()
    }

    /// Fund an account
    pub async fn set_account(&self, address: Address, nonce: u64, balance: U256) {
        self.accounts
            .write()
            .await
            .insert(address, AccountState { nonce, balance });
    }
}

#[async_trait]
impl StateProvider for InMemoryStateProvider {
    type Sink = InMemoryExecutor;

    async fn execution_sink(&self, _parent: &ParentHeader) -> Result<Self::Sink> {
        let accounts = self.accounts.read().await.clone();
        Ok(InMemoryExecutor::with_accounts(accounts))
    }
}
