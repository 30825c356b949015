//! Invariant checkers for assembled blocks
//!
//! These functions enforce the invariants that MUST hold
//! for every assembled block.

use super::entities::*;
use super::meter::MeterKind;
use crate::error::{AssemblyError, Result};
use std::collections::{HashMap, HashSet};

/// INVARIANT-1: System Transaction Precedence
/// The first `system_count` transactions are system transactions, and no other is.
pub fn check_system_precedence(block: &Block, system_count: usize) -> Result<()> {
    for (index, tx) in block.transactions.iter().enumerate() {
        let expected_system = index < system_count;
        if tx.is_system() != expected_system {
            return Err(AssemblyError::InvariantViolation(format!(
                "transaction {} is_system={} but {} system transactions lead the block",
                index,
                tx.is_system(),
                system_count
            )));
        }
    }
    if block.transactions.len() < system_count {
        return Err(AssemblyError::InvariantViolation(format!(
            "block holds {} transactions, fewer than {} system transactions",
            block.transactions.len(),
            system_count
        )));
    }
    Ok(())
}

/// INVARIANT-2: Budget Ceiling
/// Cumulative metered cost MUST NOT exceed the block budget.
pub fn check_budget(block: &Block) -> Result<()> {
    let limit = block.header.gas_limit;
    let metered = metered_usage(block);
    if metered > limit {
        return Err(AssemblyError::InvariantViolation(format!(
            "metered usage {} exceeds budget {}",
            metered, limit
        )));
    }
    Ok(())
}

/// INVARIANT-3: Usage Exactness
/// Reported usage equals the sum of metered costs, not merely bounds it.
pub fn check_usage_exactness(block: &Block) -> Result<()> {
    let header = &block.header;
    let execution: u64 = block.receipts.iter().map(|r| r.gas_used).sum();

    if header.execution_gas_used != execution {
        return Err(AssemblyError::InvariantViolation(format!(
            "execution gas {} differs from receipt total {}",
            header.execution_gas_used, execution
        )));
    }

    let metered = metered_usage(block);
    if header.gas_used != metered {
        return Err(AssemblyError::InvariantViolation(format!(
            "reported usage {} differs from metered total {} under {} metering",
            header.gas_used, metered, block.meter
        )));
    }

    let footprint_reported = match block.meter {
        MeterKind::Footprint => header.da_footprint_used == Some(metered),
        MeterKind::Standard => header.da_footprint_used.is_none(),
    };
    if !footprint_reported {
        return Err(AssemblyError::InvariantViolation(format!(
            "footprint field {:?} inconsistent with {} metering",
            header.da_footprint_used, block.meter
        )));
    }

    Ok(())
}

/// INVARIANT-4: Nonce Ordering
/// Transactions from the same sender appear with consecutive ascending nonces.
pub fn check_nonce_ordering(transactions: &[Transaction]) -> Result<()> {
    let mut last_nonce: HashMap<Address, u64> = HashMap::new();

    for tx in transactions.iter().filter(|tx| !tx.is_system()) {
        if let Some(previous) = last_nonce.insert(tx.sender, tx.nonce) {
            if tx.nonce != previous + 1 {
                return Err(AssemblyError::InvariantViolation(format!(
                    "sender {:?} nonce {} follows {}",
                    tx.sender, tx.nonce, previous
                )));
            }
        }
    }

    Ok(())
}

/// INVARIANT-5: No Duplicates
/// No transaction hash appears more than once.
pub fn check_no_duplicates(hashes: &[TxHash]) -> Result<()> {
    let mut seen = HashSet::with_capacity(hashes.len());
    for hash in hashes {
        if !seen.insert(hash) {
            return Err(AssemblyError::InvariantViolation(format!(
                "duplicate transaction hash {:?}",
                hash
            )));
        }
    }
    Ok(())
}

/// INVARIANT-6: Receipt Alignment
/// One receipt per transaction, same order, cumulative gas consistent.
pub fn check_receipts(block: &Block) -> Result<()> {
    if block.receipts.len() != block.transactions.len() {
        return Err(AssemblyError::InvariantViolation(format!(
            "{} receipts for {} transactions",
            block.receipts.len(),
            block.transactions.len()
        )));
    }

    let mut cumulative = 0u64;
    for (tx, receipt) in block.transactions.iter().zip(&block.receipts) {
        if receipt.tx_hash != tx.hash() {
            return Err(AssemblyError::InvariantViolation(format!(
                "receipt {:?} out of order",
                receipt.tx_hash
            )));
        }
        cumulative += receipt.gas_used;
        if receipt.cumulative_gas_used != cumulative {
            return Err(AssemblyError::InvariantViolation(format!(
                "receipt {:?} cumulative gas {} expected {}",
                receipt.tx_hash, receipt.cumulative_gas_used, cumulative
            )));
        }
    }
    Ok(())
}

/// Usage of a block under its own metering regime
pub fn metered_usage(block: &Block) -> u64 {
    match block.meter {
        MeterKind::Standard => block.receipts.iter().map(|r| r.gas_used).sum(),
        MeterKind::Footprint => block.receipts.iter().map(|r| r.da_footprint).sum(),
    }
}

/// Validate all invariants for an assembled block
pub fn validate_block(block: &Block, system_count: usize) -> Result<()> {
    check_system_precedence(block, system_count)?;
    check_receipts(block)?;
    check_budget(block)?;
    check_usage_exactness(block)?;
    check_nonce_ordering(&block.transactions)?;
    check_no_duplicates(&block.transaction_hashes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::{H256, U256};

    fn user_tx(sender: u8, nonce: u64) -> Transaction {
        Transaction {
            kind: TxKind::User,
            sender: Address::repeat_byte(sender),
            nonce,
            gas_limit: 21_000,
            gas_price: U256::from(100),
            to: Some(Address::repeat_byte(0xEE)),
            value: U256::zero(),
            input: vec![],
        }
    }

    fn block_of(meter: MeterKind, txs: Vec<Transaction>, footprint: u64) -> Block {
        let mut cumulative = 0;
        let receipts: Vec<Receipt> = txs
            .iter()
            .map(|tx| {
                cumulative += 21_000;
                Receipt {
                    tx_hash: tx.hash(),
                    gas_used: 21_000,
                    cumulative_gas_used: cumulative,
                    da_footprint: if tx.is_system() { 0 } else { footprint },
                }
            })
            .collect();
        let execution = cumulative;
        let metered: u64 = match meter {
            MeterKind::Standard => execution,
            MeterKind::Footprint => receipts.iter().map(|r| r.da_footprint).sum(),
        };

        Block {
            header: BlockHeader {
                parent_hash: H256::zero(),
                number: 1,
                timestamp: 2,
                beneficiary: Address::zero(),
                gas_limit: 1_000_000,
                gas_used: metered,
                execution_gas_used: execution,
                da_footprint_used: (meter == MeterKind::Footprint).then_some(metered),
                base_fee: 0,
                extra_data: vec![],
                transactions_root: H256::zero(),
            },
            transactions: txs,
            receipts,
            dropped: vec![],
            meter,
        }
    }

    #[test]
    fn test_valid_standard_block() {
        let txs = vec![
            Transaction::system(vec![1]),
            user_tx(1, 0),
            user_tx(2, 4),
            user_tx(1, 1),
        ];
        let block = block_of(MeterKind::Standard, txs, 0);
        assert!(validate_block(&block, 1).is_ok());
    }

    #[test]
    fn test_valid_footprint_block() {
        let txs = vec![Transaction::system(vec![1]), user_tx(1, 0), user_tx(1, 1)];
        let block = block_of(MeterKind::Footprint, txs, 40_000);
        assert!(validate_block(&block, 1).is_ok());
        assert_eq!(metered_usage(&block), 80_000);
    }

    #[test]
    fn test_budget_enforcement() {
        let txs = vec![Transaction::system(vec![1]), user_tx(1, 0)];
        let mut block = block_of(MeterKind::Footprint, txs, 600_000);
        assert!(check_budget(&block).is_ok());

        block.receipts[1].da_footprint = 1_000_001;
        assert!(check_budget(&block).is_err());
    }

    #[test]
    fn test_usage_exactness() {
        let txs = vec![Transaction::system(vec![1]), user_tx(1, 0)];
        let mut block = block_of(MeterKind::Footprint, txs, 40_000);
        assert!(check_usage_exactness(&block).is_ok());

        block.header.gas_used = block.header.execution_gas_used;
        assert!(check_usage_exactness(&block).is_err());
    }

    #[test]
    fn test_system_precedence() {
        let txs = vec![user_tx(1, 0), Transaction::system(vec![1])];
        let block = block_of(MeterKind::Standard, txs, 0);
        assert!(check_system_precedence(&block, 1).is_err());
    }

    #[test]
    fn test_nonce_ordering_gap() {
        assert!(check_nonce_ordering(&[user_tx(1, 0), user_tx(1, 1)]).is_ok());
        assert!(check_nonce_ordering(&[user_tx(1, 0), user_tx(1, 2)]).is_err());
        assert!(check_nonce_ordering(&[user_tx(1, 1), user_tx(1, 0)]).is_err());
    }

    #[test]
    fn test_no_duplicates() {
        let a = user_tx(1, 0).hash();
        let b = user_tx(1, 1).hash();
        assert!(check_no_duplicates(&[a, b]).is_ok());
        assert!(check_no_duplicates(&[a, b, a]).is_err());
    }

    #[test]
    fn test_receipts_cumulative() {
        let txs = vec![Transaction::system(vec![1]), user_tx(1, 0)];
        let mut block = block_of(MeterKind::Standard, txs, 0);
        assert!(check_receipts(&block).is_ok());

        block.receipts[1].cumulative_gas_used = 1;
        assert!(check_receipts(&block).is_err());
    }
}
