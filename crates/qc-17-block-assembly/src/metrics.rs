//! Metrics collection for block assembly subsystem

use crate::domain::Block;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for block assembly
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total blocks assembled
    pub blocks_assembled: AtomicU64,

    /// Total transactions admitted (system transactions included)
    pub transactions_admitted: AtomicU64,

    /// Total candidates dropped
    pub transactions_dropped: AtomicU64,

    /// Total accounts disqualified
    pub accounts_disqualified: AtomicU64,

    /// Total reported usage across all blocks
    pub total_gas_used: AtomicU64,

    /// Total runs cancelled
    pub runs_cancelled: AtomicU64,

    /// Total runs failed
    pub runs_failed: AtomicU64,

    /// Total assembly time (microseconds)
    pub assembly_time_us: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an assembled block
    pub fn record_block_assembled(&self, block: &Block, duration_us: u64) {
        let disqualified = block
            .dropped
            .iter()
            .filter(|d| d.account_disqualified)
            .count() as u64;

        self.blocks_assembled.fetch_add(1, Ordering::Relaxed);
        self.transactions_admitted
            .fetch_add(block.transactions.len() as u64, Ordering::Relaxed);
        self.transactions_dropped
            .fetch_add(block.dropped.len() as u64, Ordering::Relaxed);
        self.accounts_disqualified
            .fetch_add(disqualified, Ordering::Relaxed);
        self.total_gas_used
            .fetch_add(block.header.gas_used, Ordering::Relaxed);
        self.assembly_time_us
            .fetch_add(duration_us, Ordering::Relaxed);
    }

    /// Record a cancelled run
    pub fn record_cancelled(&self) {
        self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed run
    pub fn record_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get blocks assembled
    pub fn get_blocks_assembled(&self) -> u64 {
        self.blocks_assembled.load(Ordering::Relaxed)
    }

    /// Get runs cancelled
    pub fn get_runs_cancelled(&self) -> u64 {
        self.runs_cancelled.load(Ordering::Relaxed)
    }

    /// Get average transactions per block
    pub fn get_avg_transactions_per_block(&self) -> f64 {
        let blocks = self.blocks_assembled.load(Ordering::Relaxed);
        if blocks == 0 {
            return 0.0;
        }
        let txs = self.transactions_admitted.load(Ordering::Relaxed);
        txs as f64 / blocks as f64
    }

    /// Get average assembly time (microseconds)
    pub fn get_avg_assembly_time(&self) -> f64 {
        let blocks = self.blocks_assembled.load(Ordering::Relaxed);
        if blocks == 0 {
            return 0.0;
        }
        let time = self.assembly_time_us.load(Ordering::Relaxed);
        time as f64 / blocks as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BlockHeader, DropReason, DroppedTransaction, MeterKind, Transaction, TxHash,
    };
    use primitive_types::{H160, H256};

    fn block(tx_count: usize, dropped: usize) -> Block {
        Block {
            header: BlockHeader {
                parent_hash: H256::zero(),
                number: 1,
                timestamp: 1,
                beneficiary: H160::zero(),
                gas_limit: 1_000_000,
                gas_used: 100_000,
                execution_gas_used: 100_000,
                da_footprint_used: None,
                base_fee: 0,
                extra_data: vec![],
                transactions_root: H256::zero(),
            },
            transactions: vec![Transaction::system(vec![]); tx_count],
            receipts: vec![],
            dropped: (0..dropped)
                .map(|i| DroppedTransaction {
                    tx_hash: TxHash::zero(),
                    sender: H160::zero(),
                    nonce: i as u64,
                    reason: DropReason::ExceedsBudget {
                        cost: 1,
                        available: 0,
                    },
                    account_disqualified: i == 0,
                })
                .collect(),
            meter: MeterKind::Standard,
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_block_assembled(&block(100, 2), 4_000);
        metrics.record_block_assembled(&block(150, 0), 6_000);

        assert_eq!(metrics.get_blocks_assembled(), 2);
        assert_eq!(metrics.get_avg_transactions_per_block(), 125.0);
        assert_eq!(metrics.get_avg_assembly_time(), 5_000.0);
        assert_eq!(metrics.transactions_dropped.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.accounts_disqualified.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_cancelled_runs() {
        let metrics = Metrics::new();
        metrics.record_cancelled();
        metrics.record_failed();
        assert_eq!(metrics.get_runs_cancelled(), 1);
        assert_eq!(metrics.get_blocks_assembled(), 0);
    }
}
