//! # Service Run Tests (qc-17)
//!
//! Exercises the async service: cancellation, supersession of runs on the
//! same parent, independent runs on different parents and the build deadline.

use async_trait::async_trait;
use primitive_types::U256;
use qc_17_block_assembly::adapters::{
    topics, InMemoryMempool, InMemoryStateProvider, RecordingPublisher,
};
use qc_17_block_assembly::domain::{
    encode_l1_attributes, Address, AssemblyOutcome, BlockHash, Candidate, ChainSchedule,
    ParentHeader, PayloadAttributes, Transaction, TxKind,
};
use qc_17_block_assembly::{
    AssemblyConfig, BlockAssembledEvent, BlockAssemblyService, ConcreteBlockAssembler,
    MempoolReader, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

// =============================================================================
// TEST HELPERS
// =============================================================================

/// Mempool whose first read blocks until released
struct GatedMempool {
    inner: InMemoryMempool,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl GatedMempool {
    fn new() -> (Self, oneshot::Sender<()>) {
        let (release, gate) = oneshot::channel();
        let mempool = Self {
            inner: InMemoryMempool::new(),
            gate: Mutex::new(Some(gate)),
        };
        (mempool, release)
    }
}

#[async_trait]
impl MempoolReader for GatedMempool {
    async fn pending_candidates(&self, max_count: usize) -> Result<Vec<Candidate>> {
        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.inner.pending_candidates(max_count).await
    }
}

type Service = ConcreteBlockAssembler<GatedMempool, InMemoryStateProvider, RecordingPublisher>;

fn transfer(nonce: u64) -> Candidate {
    Candidate::new(
        Transaction {
            kind: TxKind::User,
            sender: Address::repeat_byte(1),
            nonce,
            gas_limit: 21_000,
            gas_price: U256::from(7),
            to: Some(Address::repeat_byte(2)),
            value: U256::from(1),
            input: vec![],
        },
        nonce,
    )
}

fn parent(hash_byte: u8) -> ParentHeader {
    ParentHeader {
        hash: BlockHash::repeat_byte(hash_byte),
        ..ParentHeader::genesis(1_000_000, 1_000)
    }
}

fn attributes() -> PayloadAttributes {
    PayloadAttributes {
        timestamp: 12,
        beneficiary: Address::repeat_byte(0xFE),
        gas_limit: None,
        eip1559_params: Some([0; 8]),
        min_base_fee: Some(10),
        system_transactions: vec![Transaction::system(encode_l1_attributes(400))],
        no_tx_pool: false,
    }
}

async fn make_service(config: AssemblyConfig) -> (Arc<Service>, oneshot::Sender<()>, Arc<RecordingPublisher>) {
    let (mempool, release) = GatedMempool::new();
    for nonce in 0..5 {
        mempool.inner.insert(transfer(nonce)).await;
    }

    let state = Arc::new(InMemoryStateProvider::new());
    state
        .set_account(Address::repeat_byte(1), 0, U256::from(u64::MAX))
        .await;
    let publisher = Arc::new(RecordingPublisher::new());

    let service = ConcreteBlockAssembler::new(
        Arc::new(mempool),
        state,
        Arc::clone(&publisher),
        config,
    )
    .unwrap();
    (Arc::new(service), release, publisher)
}

fn jovian_config() -> AssemblyConfig {
    AssemblyConfig {
        schedule: ChainSchedule::all_active(),
        build_timeout_ms: 0,
        ..AssemblyConfig::default()
    }
}

async fn wait_in_flight(service: &Service, count: usize) {
    for _ in 0..200 {
        if service.status().await.in_flight == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} in-flight runs", count);
}

// =============================================================================
// CANCELLATION
// =============================================================================

#[tokio::test]
async fn test_cancel_in_flight_run() {
    let (service, release, publisher) = make_service(jovian_config()).await;

    let runner = Arc::clone(&service);
    let run = tokio::spawn(async move { runner.assemble_block(parent(1), attributes()).await });

    wait_in_flight(&service, 1).await;
    assert!(service.cancel(BlockHash::repeat_byte(1)).await);
    release.send(()).unwrap();

    let outcome = run.await.unwrap().unwrap();
    assert!(matches!(outcome, AssemblyOutcome::Cancelled));
    assert!(publisher.events().await.is_empty());

    let status = service.status().await;
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.runs_cancelled, 1);
    assert_eq!(status.blocks_assembled, 0);
}

#[tokio::test]
async fn test_newer_run_supersedes_older_on_same_parent() {
    let (service, release, publisher) = make_service(jovian_config()).await;

    let runner = Arc::clone(&service);
    let older = tokio::spawn(async move { runner.assemble_block(parent(1), attributes()).await });
    wait_in_flight(&service, 1).await;

    let newer = service
        .assemble_block(parent(1), attributes())
        .await
        .unwrap();
    let block = newer.into_block().unwrap();
    assert_eq!(block.transactions.len(), 6);

    release.send(()).unwrap();
    assert!(matches!(
        older.await.unwrap().unwrap(),
        AssemblyOutcome::Cancelled
    ));

    let events = publisher.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, topics::BLOCK_ASSEMBLED);
    let event: BlockAssembledEvent = serde_json::from_slice(&events[0].1).unwrap();
    assert_eq!(event.block_hash, block.hash());
    assert_eq!(event.parent_hash, BlockHash::repeat_byte(1));
}

#[tokio::test]
async fn test_runs_on_different_parents_are_independent() {
    let (service, release, _) = make_service(jovian_config()).await;

    let runner = Arc::clone(&service);
    let first = tokio::spawn(async move { runner.assemble_block(parent(1), attributes()).await });
    wait_in_flight(&service, 1).await;

    let second = service
        .assemble_block(parent(2), attributes())
        .await
        .unwrap()
        .into_block()
        .unwrap();

    release.send(()).unwrap();
    let first = first.await.unwrap().unwrap().into_block().unwrap();

    assert_eq!(first.transaction_hashes(), second.transaction_hashes());
    assert_ne!(first.hash(), second.hash());
    assert_eq!(service.status().await.blocks_assembled, 2);
}

// =============================================================================
// DEADLINE
// =============================================================================

#[tokio::test]
async fn test_deadline_seals_what_was_admitted() {
    let config = AssemblyConfig {
        build_timeout_ms: 1,
        ..jovian_config()
    };
    let (service, release, _) = make_service(config).await;

    let runner = Arc::clone(&service);
    let run = tokio::spawn(async move { runner.assemble_block(parent(1), attributes()).await });
    wait_in_flight(&service, 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.send(()).unwrap();

    let block = run.await.unwrap().unwrap().into_block().unwrap();
    assert_eq!(block.transactions.len(), 1);
    assert!(block.transactions[0].is_system());
}

#[tokio::test]
async fn test_malformed_system_payload_fails_run() {
    let (service, release, publisher) = make_service(jovian_config()).await;
    release.send(()).unwrap();

    let mut attrs = attributes();
    attrs.system_transactions = vec![Transaction::system(vec![0u8; 10])];

    assert!(service.assemble_block(parent(1), attrs).await.is_err());
    assert!(publisher.events().await.is_empty());
    assert_eq!(service.status().await.in_flight, 0);
}
