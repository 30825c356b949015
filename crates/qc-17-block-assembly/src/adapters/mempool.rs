//! In-memory mempool reader

use crate::domain::Candidate;
use crate::error::Result;
use crate::ports::MempoolReader;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Mempool holding validated candidates in arrival order
#[derive(Debug, Default)]
pub struct InMemoryMempool {
    candidates: RwLock<Vec<Candidate>>,
}

impl InMemoryMempool {
    /// Empty mempool
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate
    pub async fn insert(&self, candidate: Candidate) {
        self.candidates.write().await.push(candidate);
    }

    /// Remove candidates included in a block
    pub async fn remove_included(&self, hashes: &[crate::domain::TxHash]) {
        self.candidates
            .write()
            .await
            .retain(|candidate| !hashes.contains(&candidate.hash));
    }

    /// Number of pooled candidates
    pub async fn len(&self) -> usize {
        self.candidates.read().await.len()
    }

    /// Check if the pool is empty
    pub async fn is_empty(&self) -> bool {
        self.candidates.read().await.is_empty()
    }
}

#[async_trait]
impl MempoolReader for InMemoryMempool {
    async fn pending_candidates(&self, max_count: usize) -> Result<Vec<Candidate>> {
        let candidates = self.candidates.read().await;
        Ok(candidates.iter().take(max_count).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Transaction, TxKind};
    use primitive_types::U256;

    fn candidate(nonce: u64) -> Candidate {
        Candidate::new(
            Transaction {
                kind: TxKind::User,
                sender: Address::repeat_byte(1),
                nonce,
                gas_limit: 21_000,
                gas_price: U256::from(1),
                to: None,
                value: U256::zero(),
                input: vec![],
            },
            nonce,
        )
    }

    #[tokio::test]
    async fn test_snapshot_respects_max_count() {
        let mempool = InMemoryMempool::new();
        for nonce in 0..5 {
            mempool.insert(candidate(nonce)).await;
        }
        assert_eq!(mempool.pending_candidates(3).await.unwrap().len(), 3);
        assert_eq!(mempool.pending_candidates(10).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_remove_included() {
        let mempool = InMemoryMempool::new();
        let first = candidate(0);
        mempool.insert(first.clone()).await;
        mempool.insert(candidate(1)).await;

        mempool.remove_included(&[first.hash]).await;
        assert_eq!(mempool.len().await, 1);
    }
}
