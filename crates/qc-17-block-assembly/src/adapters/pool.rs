//! Immutable pending-pool snapshot
//!
//! Data structures:
//! - `heads`: O(log n) priority queue (BTreeSet) holding one head per account
//! - `queues`: O(log n) nonce-ordered candidates per account
//!
//! Only candidates with contiguous nonces starting at an account's lowest
//! nonce are ready. Anything after a gap is left out of the snapshot.

use crate::domain::{Address, Candidate, TxHash};
use crate::ports::PendingPool;
use primitive_types::U256;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Ordering key of an account head
#[derive(Clone, Debug, PartialEq, Eq)]
struct HeadKey {
    priority: U256,
    arrival: u64,
    hash: TxHash,
    sender: Address,
}

impl HeadKey {
    fn of(candidate: &Candidate) -> Self {
        Self {
            priority: candidate.priority,
            arrival: candidate.arrival,
            hash: candidate.hash,
            sender: candidate.sender(),
        }
    }
}

impl Ord for HeadKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first
        other
            .priority
            .cmp(&self.priority)
            // Earlier arrival first on equal priority
            .then_with(|| self.arrival.cmp(&other.arrival))
            .then_with(|| self.hash.cmp(&other.hash))
            .then_with(|| self.sender.cmp(&other.sender))
    }
}

impl PartialOrd for HeadKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Snapshot of ready pending transactions, consumed by one assembly run
#[derive(Clone, Debug, Default)]
pub struct PendingSnapshot {
    heads: BTreeSet<HeadKey>,
    head_of: HashMap<Address, HeadKey>,
    queues: HashMap<Address, BTreeMap<u64, Candidate>>,
    disqualified: HashSet<Address>,
}

impl PendingSnapshot {
    /// Build a snapshot from validated candidates in any order
    pub fn new(candidates: Vec<Candidate>) -> Self {
        let mut queues: HashMap<Address, BTreeMap<u64, Candidate>> = HashMap::new();

        for candidate in candidates {
            if candidate.is_system() {
                warn!(hash = ?candidate.hash, "System transaction offered to pool snapshot, ignored");
                continue;
            }
            let queue = queues.entry(candidate.sender()).or_default();
            // Same sender and nonce: keep the one the heads order ranks first
            let keep_existing = queue
                .get(&candidate.nonce())
                .is_some_and(|existing| HeadKey::of(existing) <= HeadKey::of(&candidate));
            if !keep_existing {
                queue.insert(candidate.nonce(), candidate);
            }
        }

        for queue in queues.values_mut() {
            let Some(&first) = queue.keys().next() else {
                continue;
            };
            let contiguous = queue
                .keys()
                .zip(first..)
                .take_while(|(nonce, expected)| **nonce == *expected)
                .count();
            if contiguous < queue.len() {
                let gap_at = first + contiguous as u64;
                let dropped = queue.split_off(&gap_at);
                debug!(count = dropped.len(), gap_at, "Left out transactions after nonce gap");
            }
        }

        let mut snapshot = Self {
            queues,
            ..Self::default()
        };
        let senders: Vec<Address> = snapshot.queues.keys().copied().collect();
        for sender in senders {
            snapshot.refresh_head(sender);
        }
        snapshot
    }

    /// Number of ready candidates still queued
    pub fn len(&self) -> usize {
        self.queues.values().map(BTreeMap::len).sum()
    }

    /// Check if no candidate is queued
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Number of accounts with a queued head
    pub fn ready_accounts(&self) -> usize {
        self.heads.len()
    }

    /// Check if `account` was disqualified
    pub fn is_disqualified(&self, account: &Address) -> bool {
        self.disqualified.contains(account)
    }

    fn refresh_head(&mut self, account: Address) {
        if let Some(old) = self.head_of.remove(&account) {
            self.heads.remove(&old);
        }
        if self.disqualified.contains(&account) {
            return;
        }
        let next = self
            .queues
            .get(&account)
            .and_then(|queue| queue.values().next())
            .map(HeadKey::of);
        if let Some(key) = next {
            self.heads.insert(key.clone());
            self.head_of.insert(account, key);
        }
    }
}

impl PendingPool for PendingSnapshot {
    fn next_eligible(&mut self) -> Option<Candidate> {
        let head = self.heads.iter().next()?;
        self.queues
            .get(&head.sender)
            .and_then(|queue| queue.values().next())
            .cloned()
    }

    fn advance(&mut self, account: Address) {
        if let Some(queue) = self.queues.get_mut(&account) {
            queue.pop_first();
            if queue.is_empty() {
                self.queues.remove(&account);
            }
        }
        self.refresh_head(account);
    }

    fn disqualify(&mut self, account: Address) {
        self.disqualified.insert(account);
        self.queues.remove(&account);
        self.refresh_head(account);
    }
}
