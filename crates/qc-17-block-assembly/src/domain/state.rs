//! Mutable state of one assembly run

use super::block_config::BlockConfig;
use super::entities::*;
use super::meter::MeterKind;
use crate::ports::ExecutionOutcome;
use crate::utils::hashing::transactions_root;
use std::collections::HashSet;

/// Accumulated result of one in-flight assembly run
///
/// Owned by exactly one run and never shared; every run starts from
/// [`AssemblyState::new`].
#[derive(Debug)]
pub struct AssemblyState {
    meter: MeterKind,
    transactions: Vec<Transaction>,
    receipts: Vec<Receipt>,
    dropped: Vec<DroppedTransaction>,
    disqualified: HashSet<Address>,
    execution_gas: u64,
    footprint: u64,
}

impl AssemblyState {
    /// Fresh state for a block metered under `meter`
    pub fn new(meter: MeterKind) -> Self {
        Self {
            meter,
            transactions: Vec::new(),
            receipts: Vec::new(),
            dropped: Vec::new(),
            disqualified: HashSet::new(),
            execution_gas: 0,
            footprint: 0,
        }
    }

    /// Usage counted against the budget under the active regime
    pub fn metered_usage(&self) -> u64 {
        match self.meter {
            MeterKind::Standard => self.execution_gas,
            MeterKind::Footprint => self.footprint,
        }
    }

    /// Sum of execution gas of every admitted transaction
    pub fn execution_gas(&self) -> u64 {
        self.execution_gas
    }

    /// Budget left under the active regime
    pub fn remaining(&self, budget: u64) -> u64 {
        budget.saturating_sub(self.metered_usage())
    }

    /// Number of admitted transactions, system ones included
    pub fn admitted(&self) -> usize {
        self.transactions.len()
    }

    /// Accounts excluded from the rest of the run
    pub fn disqualified_accounts(&self) -> usize {
        self.disqualified.len()
    }

    /// Record an admitted transaction with its execution outcome and footprint
    pub fn admit(&mut self, tx: Transaction, outcome: ExecutionOutcome, da_footprint: u64) {
        self.execution_gas += outcome.gas_used;
        self.footprint += da_footprint;
        self.receipts.push(Receipt {
            tx_hash: outcome.tx_hash,
            gas_used: outcome.gas_used,
            cumulative_gas_used: self.execution_gas,
            da_footprint,
        });
        self.transactions.push(tx);
    }

    /// Record a candidate that was not admitted
    pub fn record_drop(
        &mut self,
        candidate: &Candidate,
        reason: DropReason,
        account_disqualified: bool,
    ) {
        if account_disqualified {
            self.disqualified.insert(candidate.sender());
        }
        self.dropped.push(DroppedTransaction {
            tx_hash: candidate.hash,
            sender: candidate.sender(),
            nonce: candidate.nonce(),
            reason,
            account_disqualified,
        });
    }

    /// Check if `account` was disqualified in this run
    pub fn is_disqualified(&self, account: &Address) -> bool {
        self.disqualified.contains(account)
    }

    /// Seal the state into a block
    pub fn into_block(self, config: &BlockConfig) -> Block {
        let hashes: Vec<TxHash> = self.receipts.iter().map(|r| r.tx_hash).collect();
        let gas_used = self.metered_usage();

        let header = BlockHeader {
            parent_hash: config.parent_hash,
            number: config.number,
            timestamp: config.timestamp,
            beneficiary: config.beneficiary,
            gas_limit: config.gas_limit,
            gas_used,
            execution_gas_used: self.execution_gas,
            da_footprint_used: match self.meter {
                MeterKind::Footprint => Some(self.footprint),
                MeterKind::Standard => None,
            },
            base_fee: config.base_fee,
            extra_data: config.extra_data.clone(),
            transactions_root: transactions_root(&hashes),
        };

        Block {
            header,
            transactions: self.transactions,
            receipts: self.receipts,
            dropped: self.dropped,
            meter: self.meter,
        }
    }
}
