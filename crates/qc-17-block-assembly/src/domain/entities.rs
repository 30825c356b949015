//! Domain entities for block assembly

use super::meter::MeterKind;
use crate::error::ExecutionError;
use crate::utils::hashing::sha256_h256;
use primitive_types::{H160, H256, U256};
use rlp::RlpStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 20-byte account address
pub type Address = H160;

/// Transaction hash (SHA-256 of the RLP encoding)
pub type TxHash = H256;

/// Block hash (SHA-256 of the RLP-encoded header)
pub type BlockHash = H256;

/// Sender of protocol-mandated system transactions
pub const SYSTEM_ADDRESS: Address = H160([
    0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad,
    0xde, 0xad, 0x00, 0x01,
]);

/// Predeploy receiving the leading system transaction
pub const L1_BLOCK_ADDRESS: Address = H160([
    0x42, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x15,
]);

/// Gas allowance given to system transactions
pub const SYSTEM_TX_GAS: u64 = 1_000_000;

/// Transaction origin
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    /// Regular pooled transaction
    User,
    /// Protocol-mandated transaction, never pooled, always first
    System,
}

/// A validated transaction as seen by the assembler
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Origin
    pub kind: TxKind,

    /// Recovered sender address
    pub sender: Address,

    /// Sender nonce
    pub nonce: u64,

    /// Maximum gas the transaction may consume
    pub gas_limit: u64,

    /// Price per gas (priority in the pool)
    pub gas_price: U256,

    /// Recipient (None for contract creation)
    pub to: Option<Address>,

    /// Value transferred
    pub value: U256,

    /// Calldata
    pub input: Vec<u8>,
}

impl Transaction {
    /// Build a system transaction carrying `input` as its payload
    pub fn system(input: Vec<u8>) -> Self {
        Self {
            kind: TxKind::System,
            sender: SYSTEM_ADDRESS,
            nonce: 0,
            gas_limit: SYSTEM_TX_GAS,
            gas_price: U256::zero(),
            to: Some(L1_BLOCK_ADDRESS),
            value: U256::zero(),
            input,
        }
    }

    /// Check if this is a system transaction
    pub fn is_system(&self) -> bool {
        self.kind == TxKind::System
    }

    /// Canonical RLP encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(8);
        stream.append(&match self.kind {
            TxKind::User => 0u8,
            TxKind::System => 0x7e,
        });
        stream.append(&self.sender);
        stream.append(&self.nonce);
        stream.append(&self.gas_limit);
        stream.append(&self.gas_price);
        match self.to {
            Some(to) => stream.append(&to),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value);
        stream.append(&self.input);
        stream.out().to_vec()
    }

    /// Transaction hash
    pub fn hash(&self) -> TxHash {
        sha256_h256(&self.encode())
    }
}

/// A pending transaction pulled from the pool, with its scheduling metadata
///
/// Immutable once pulled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Cached transaction hash
    pub hash: TxHash,

    /// The transaction itself
    pub tx: Transaction,

    /// Priority score (higher first)
    pub priority: U256,

    /// Arrival sequence in the pool (earlier first on equal priority)
    pub arrival: u64,
}

impl Candidate {
    /// Wrap a transaction, using its gas price as priority
    pub fn new(tx: Transaction, arrival: u64) -> Self {
        Self {
            hash: tx.hash(),
            priority: tx.gas_price,
            tx,
            arrival,
        }
    }

    /// Sender account
    pub fn sender(&self) -> Address {
        self.tx.sender
    }

    /// Sender nonce
    pub fn nonce(&self) -> u64 {
        self.tx.nonce
    }

    /// Check if the wrapped transaction is a system transaction
    pub fn is_system(&self) -> bool {
        self.tx.is_system()
    }
}

/// Outcome of applying one transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash
    pub tx_hash: TxHash,

    /// Actual execution gas
    pub gas_used: u64,

    /// Execution gas of this and all earlier transactions in the block
    pub cumulative_gas_used: u64,

    /// Metered DA footprint (zero under standard metering and for system transactions)
    pub da_footprint: u64,
}

/// Header fields produced by one assembly run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Parent block hash
    pub parent_hash: BlockHash,

    /// Block number (height)
    pub number: u64,

    /// Unix timestamp
    pub timestamp: u64,

    /// Fee recipient
    pub beneficiary: Address,

    /// Resource budget
    pub gas_limit: u64,

    /// Reported resource usage (metered footprint or execution gas, per regime)
    pub gas_used: u64,

    /// Sum of receipt gas, regardless of regime
    pub execution_gas_used: u64,

    /// Footprint total when footprint metering is active
    pub da_footprint_used: Option<u64>,

    /// Base fee per gas
    pub base_fee: u64,

    /// Encoded fee-market parameters
    pub extra_data: Vec<u8>,

    /// Commitment to the ordered transaction hashes
    pub transactions_root: H256,
}

impl BlockHeader {
    /// Canonical RLP encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(11);
        stream.append(&self.parent_hash);
        stream.append(&self.number);
        stream.append(&self.timestamp);
        stream.append(&self.beneficiary);
        stream.append(&self.gas_limit);
        stream.append(&self.gas_used);
        stream.append(&self.execution_gas_used);
        match self.da_footprint_used {
            Some(footprint) => stream.append(&footprint),
            None => stream.append_empty_data(),
        };
        stream.append(&self.base_fee);
        stream.append(&self.extra_data);
        stream.append(&self.transactions_root);
        stream.out().to_vec()
    }

    /// Block hash
    pub fn hash(&self) -> BlockHash {
        sha256_h256(&self.encode())
    }
}

/// Why a candidate did not make it into the block
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Metered cost would overflow the remaining budget
    ExceedsBudget {
        /// Metered cost of the candidate
        cost: u64,
        /// Budget left at the time of the decision
        available: u64,
    },

    /// The execution sink rejected the transaction
    ExecutionFailed(ExecutionError),

    /// The pool offered a candidate that may not be selected; nothing was executed
    Ineligible(Ineligibility),
}

/// Why a pool candidate could not be considered at all
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ineligibility {
    /// System transactions are never taken from the pool
    SystemTransaction,
    /// The sender was already disqualified in this run
    DisqualifiedAccount,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemTransaction => write!(f, "system transaction offered by the pool"),
            Self::DisqualifiedAccount => write!(f, "sender already disqualified"),
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExceedsBudget { cost, available } => {
                write!(f, "cost {} exceeds remaining budget {}", cost, available)
            }
            Self::ExecutionFailed(err) => write!(f, "{}", err),
            Self::Ineligible(why) => write!(f, "ineligible: {}", why),
        }
    }
}

/// A candidate that was not admitted, surfaced to the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedTransaction {
    /// Transaction hash
    pub tx_hash: TxHash,

    /// Sender account
    pub sender: Address,

    /// Sender nonce
    pub nonce: u64,

    /// Why it was dropped
    pub reason: DropReason,

    /// Whether the rest of the account's queue was excluded from the block
    pub account_disqualified: bool,
}

/// The terminal artifact of one assembly run
#[derive(Clone, Debug)]
pub struct Block {
    /// Header fields
    pub header: BlockHeader,

    /// Ordered transactions, system transactions first
    pub transactions: Vec<Transaction>,

    /// One receipt per transaction, same order
    pub receipts: Vec<Receipt>,

    /// Candidates that were considered and rejected
    pub dropped: Vec<DroppedTransaction>,

    /// Metering regime the block was built under
    pub meter: MeterKind,
}

impl Block {
    /// Block hash
    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    /// Number of leading system transactions
    pub fn system_transaction_count(&self) -> usize {
        self.transactions
            .iter()
            .take_while(|tx| tx.is_system())
            .count()
    }

    /// Ordered transaction hashes
    pub fn transaction_hashes(&self) -> Vec<TxHash> {
        self.transactions.iter().map(Transaction::hash).collect()
    }
}

/// Result of an assembly run that did not fail
#[derive(Clone, Debug)]
pub enum AssemblyOutcome {
    /// The run finished and produced a block
    Completed(Box<Block>),

    /// The run was abandoned; nothing was produced
    Cancelled,
}

impl AssemblyOutcome {
    /// The produced block, if the run completed
    pub fn block(&self) -> Option<&Block> {
        match self {
            Self::Completed(block) => Some(block),
            Self::Cancelled => None,
        }
    }

    /// Consume the outcome, returning the block if the run completed
    pub fn into_block(self) -> Option<Block> {
        match self {
            Self::Completed(block) => Some(*block),
            Self::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(nonce: u64) -> Transaction {
        Transaction {
            kind: TxKind::User,
            sender: Address::repeat_byte(0xAA),
            nonce,
            gas_limit: 21_000,
            gas_price: U256::from(1_000_000_000u64),
            to: Some(Address::repeat_byte(0xBB)),
            value: U256::from(1),
            input: vec![],
        }
    }

    #[test]
    fn test_hash_distinguishes_nonce() {
        assert_ne!(transfer(0).hash(), transfer(1).hash());
        assert_eq!(transfer(7).hash(), transfer(7).hash());
    }

    #[test]
    fn test_system_transaction_defaults() {
        let tx = Transaction::system(vec![1, 2, 3]);
        assert!(tx.is_system());
        assert_eq!(tx.sender, SYSTEM_ADDRESS);
        assert_eq!(tx.gas_price, U256::zero());
        assert_ne!(tx.encode(), transfer(0).encode());
    }

    #[test]
    fn test_candidate_priority_is_gas_price() {
        let candidate = Candidate::new(transfer(3), 9);
        assert_eq!(candidate.priority, U256::from(1_000_000_000u64));
        assert_eq!(candidate.nonce(), 3);
        assert_eq!(candidate.arrival, 9);
        assert_eq!(candidate.hash, transfer(3).hash());
        assert!(!candidate.is_system());
    }

    #[test]
    fn test_drop_reason_display() {
        let reason = DropReason::ExceedsBudget {
            cost: 500,
            available: 100,
        };
        assert_eq!(reason.to_string(), "cost 500 exceeds remaining budget 100");
    }
}
