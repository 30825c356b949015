//! Concrete Block Assembly Service Implementation
//!
//! Wires the outbound ports to the domain assembler. Each request gets its own
//! pool snapshot, execution sink and [`RunControl`], and runs on the blocking
//! thread pool. Runs for different parents never share state; a newer run for
//! the same parent cancels the older one.

use crate::{
    adapters::{topics, PendingSnapshot},
    config::AssemblyConfig,
    domain::{
        AssemblyOutcome, Assembler, Block, BlockConfig, BlockHash, ParentHeader,
        PayloadAttributes, RunControl,
    },
    error::{AssemblyError, Result},
    events::BlockAssembledEvent,
    metrics::Metrics,
    ports::{AssemblyStatus, BlockAssemblyService, EventPublisher, MempoolReader, StateProvider},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle of one in-flight run
#[derive(Debug)]
struct InFlightRun {
    id: Uuid,
    control: RunControl,
}

/// Concrete implementation of BlockAssemblyService
pub struct ConcreteBlockAssembler<M, S, E> {
    /// Pending transaction source
    mempool: Arc<M>,

    /// Execution state source
    state: Arc<S>,

    /// Event bus publisher
    publisher: Arc<E>,

    /// Assembly configuration
    config: RwLock<AssemblyConfig>,

    /// Runs currently building, by parent hash
    in_flight: Mutex<HashMap<BlockHash, InFlightRun>>,

    /// Height and hash of the last assembled block
    last_block: Mutex<Option<(u64, BlockHash)>>,

    /// Metrics collector
    metrics: Arc<Metrics>,
}

impl<M, S, E> ConcreteBlockAssembler<M, S, E>
where
    M: MempoolReader + 'static,
    S: StateProvider + 'static,
    E: EventPublisher + 'static,
{
    /// Create a new block assembly service
    pub fn new(
        mempool: Arc<M>,
        state: Arc<S>,
        publisher: Arc<E>,
        config: AssemblyConfig,
    ) -> Result<Self> {
        config.validate()?;

        info!("[qc-17] Initializing Block Assembly Service");
        info!("  Max Candidates: {}", config.max_candidates);
        info!("  Build Timeout: {}ms", config.build_timeout_ms);
        info!("  Transient Error Policy: {:?}", config.transient_error_policy);

        Ok(Self {
            mempool,
            state,
            publisher,
            config: RwLock::new(config),
            in_flight: Mutex::new(HashMap::new()),
            last_block: Mutex::new(None),
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Metrics collector
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Current configuration
    pub async fn config(&self) -> AssemblyConfig {
        self.config.read().await.clone()
    }

    /// Replace the configuration for subsequent runs
    pub async fn update_config(&self, config: AssemblyConfig) -> Result<()> {
        config.validate()?;
        *self.config.write().await = config;
        info!("[qc-17] Assembly configuration updated");
        Ok(())
    }

    async fn register(&self, parent_hash: BlockHash, control: RunControl) -> Uuid {
        let id = Uuid::new_v4();
        let previous = self
            .in_flight
            .lock()
            .await
            .insert(parent_hash, InFlightRun { id, control });

        if let Some(previous) = previous {
            previous.control.cancel();
            info!(
                superseded = %previous.id,
                "[qc-17] New run for parent {:?} supersedes in-flight run",
                parent_hash
            );
        }
        id
    }

    async fn deregister(&self, parent_hash: BlockHash, id: Uuid) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(&parent_hash).is_some_and(|run| run.id == id) {
            in_flight.remove(&parent_hash);
        }
    }

    async fn run(
        &self,
        config: &AssemblyConfig,
        block_config: BlockConfig,
        parent: &ParentHeader,
        control: RunControl,
    ) -> Result<AssemblyOutcome> {
        let candidates = if block_config.no_tx_pool {
            Vec::new()
        } else {
            self.mempool
                .pending_candidates(config.max_candidates)
                .await?
        };
        let mut sink = self.state.execution_sink(parent).await?;

        debug!(
            candidates = candidates.len(),
            meter = %block_config.meter,
            "Starting assembly run"
        );

        let policy = config.transient_error_policy;
        let verify = config.verify_invariants;
        let parent_hash = parent.hash;

        tokio::task::spawn_blocking(move || {
            let mut pool = PendingSnapshot::new(candidates);
            Assembler::new(&block_config)
                .with_transient_policy(policy)
                .with_invariant_checks(verify)
                .assemble(&mut pool, &mut sink, &control)
        })
        .await
        .map_err(|e| {
            if e.is_cancelled() {
                AssemblyError::Cancelled { parent_hash }
            } else {
                AssemblyError::InternalError(format!("assembly task failed: {}", e))
            }
        })?
    }

    async fn publish_assembled(&self, block: &Block, correlation_id: Uuid, elapsed_ms: u64) {
        let event = BlockAssembledEvent::from_block(block, correlation_id, elapsed_ms);
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[qc-17] Failed to serialize assembled event: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .publisher
            .publish_event(topics::BLOCK_ASSEMBLED, payload)
            .await
        {
            warn!("[qc-17] Failed to publish assembled event: {}", e);
        }
    }
}

#[async_trait]
impl<M, S, E> BlockAssemblyService for ConcreteBlockAssembler<M, S, E>
where
    M: MempoolReader + 'static,
    S: StateProvider + 'static,
    E: EventPublisher + 'static,
{
    async fn assemble_block(
        &self,
        parent: ParentHeader,
        attributes: PayloadAttributes,
    ) -> Result<AssemblyOutcome> {
        let started = Instant::now();
        let config = self.config.read().await.clone();

        let block_config = match BlockConfig::resolve(&config.schedule, &parent, &attributes) {
            Ok(block_config) => block_config,
            Err(e) => {
                self.metrics.record_failed();
                warn!("[qc-17] Block configuration rejected: {}", e);
                return Err(e);
            }
        };

        let control = match config.build_timeout() {
            Some(timeout) => RunControl::with_timeout(timeout),
            None => RunControl::new(),
        };
        let id = self.register(parent.hash, control.clone()).await;

        let result = self.run(&config, block_config, &parent, control).await;
        self.deregister(parent.hash, id).await;

        let elapsed = started.elapsed();
        match &result {
            Ok(AssemblyOutcome::Completed(block)) => {
                self.metrics
                    .record_block_assembled(block, elapsed.as_micros() as u64);
                *self.last_block.lock().await = Some((block.header.number, block.hash()));
                if config.publish_events {
                    self.publish_assembled(block, id, elapsed.as_millis() as u64)
                        .await;
                }
            }
            Ok(AssemblyOutcome::Cancelled) => {
                self.metrics.record_cancelled();
            }
            Err(e) => {
                if matches!(e, AssemblyError::Cancelled { .. }) {
                    self.metrics.record_cancelled();
                } else {
                    self.metrics.record_failed();
                }
                warn!(critical = e.is_critical(), "[qc-17] Assembly failed: {}", e);
            }
        }

        result
    }

    async fn cancel(&self, parent_hash: BlockHash) -> bool {
        match self.in_flight.lock().await.get(&parent_hash) {
            Some(run) => {
                run.control.cancel();
                info!("[qc-17] Cancelled run {} for parent {:?}", run.id, parent_hash);
                true
            }
            None => false,
        }
    }

    async fn status(&self) -> AssemblyStatus {
        let in_flight = self.in_flight.lock().await.len();
        let last_block = *self.last_block.lock().await;

        AssemblyStatus {
            in_flight,
            blocks_assembled: self.metrics.get_blocks_assembled(),
            runs_cancelled: self.metrics.get_runs_cancelled(),
            last_block_number: last_block.map(|(number, _)| number),
            last_block_hash: last_block.map(|(_, hash)| hash),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryMempool, InMemoryStateProvider, RecordingPublisher};
    use crate::domain::{encode_l1_attributes, Address, Candidate, ChainSchedule, Transaction, TxKind};
    use primitive_types::U256;

    type TestService =
        ConcreteBlockAssembler<InMemoryMempool, InMemoryStateProvider, RecordingPublisher>;

    async fn service() -> (TestService, Arc<InMemoryMempool>, Arc<RecordingPublisher>) {
        let mempool = Arc::new(InMemoryMempool::new());
        let state = Arc::new(InMemoryStateProvider::new());
        let publisher = Arc::new(RecordingPublisher::new());
        state
            .set_account(Address::repeat_byte(1), 0, U256::from(u64::MAX))
            .await;

        let config = AssemblyConfig {
            schedule: ChainSchedule::isthmus(),
            ..AssemblyConfig::default()
        };
        let service = ConcreteBlockAssembler::new(
            Arc::clone(&mempool),
            state,
            Arc::clone(&publisher),
            config,
        )
        .unwrap();
        (service, mempool, publisher)
    }

    fn attributes() -> PayloadAttributes {
        PayloadAttributes {
            timestamp: 2,
            beneficiary: Address::repeat_byte(0xFE),
            gas_limit: Some(1_000_000),
            eip1559_params: Some([0; 8]),
            min_base_fee: None,
            system_transactions: vec![Transaction::system(encode_l1_attributes(400))],
            no_tx_pool: false,
        }
    }

    fn transfer(nonce: u64) -> Candidate {
        Candidate::new(
            Transaction {
                kind: TxKind::User,
                sender: Address::repeat_byte(1),
                nonce,
                gas_limit: 21_000,
                gas_price: U256::from(1),
                to: Some(Address::repeat_byte(2)),
                value: U256::zero(),
                input: vec![],
            },
            nonce,
        )
    }

    #[tokio::test]
    async fn test_assemble_publishes_event() {
        let (service, mempool, publisher) = service().await;
        mempool.insert(transfer(0)).await;
        mempool.insert(transfer(1)).await;

        let outcome = service
            .assemble_block(ParentHeader::genesis(1_000_000, 1), attributes())
            .await
            .unwrap();
        let block = outcome.into_block().unwrap();
        assert_eq!(block.transactions.len(), 3);

        let events = publisher.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, topics::BLOCK_ASSEMBLED);
        let event: BlockAssembledEvent = serde_json::from_slice(&events[0].1).unwrap();
        assert_eq!(event.block_hash, block.hash());
        assert_eq!(event.transaction_count, 3);

        let status = service.status().await;
        assert_eq!(status.blocks_assembled, 1);
        assert_eq!(status.in_flight, 0);
        assert_eq!(status.last_block_number, Some(1));
    }

    #[tokio::test]
    async fn test_invalid_attributes_rejected() {
        let (service, _, publisher) = service().await;
        let mut attrs = attributes();
        attrs.system_transactions.clear();

        let err = service
            .assemble_block(ParentHeader::genesis(1_000_000, 1), attrs)
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::MissingSystemTransaction));
        assert!(publisher.events().await.is_empty());
        assert_eq!(service.metrics().runs_failed.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    struct ClosedBus;

    #[async_trait]
    impl EventPublisher for ClosedBus {
        async fn publish_event(&self, _topic: &str, _payload: Vec<u8>) -> Result<()> {
            Err(AssemblyError::InternalError("bus closed".into()))
        }
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_block() {
        let mempool = Arc::new(InMemoryMempool::new());
        let state = Arc::new(InMemoryStateProvider::new());
        state
            .set_account(Address::repeat_byte(1), 0, U256::from(u64::MAX))
            .await;
        mempool.insert(transfer(0)).await;

        let config = AssemblyConfig {
            schedule: ChainSchedule::isthmus(),
            ..AssemblyConfig::default()
        };
        let service =
            ConcreteBlockAssembler::new(mempool, state, Arc::new(ClosedBus), config).unwrap();

        let outcome = service
            .assemble_block(ParentHeader::genesis(1_000_000, 1), attributes())
            .await
            .unwrap();
        assert_eq!(outcome.into_block().unwrap().transactions.len(), 2);
        assert_eq!(service.status().await.blocks_assembled, 1);
    }

    #[tokio::test]
    async fn test_cancel_unknown_parent() {
        let (service, _, _) = service().await;
        assert!(!service.cancel(BlockHash::repeat_byte(9)).await);
    }

    #[tokio::test]
    async fn test_update_config_validates() {
        let (service, _, _) = service().await;
        let bad = AssemblyConfig {
            max_candidates: 0,
            ..AssemblyConfig::default()
        };
        assert!(service.update_config(bad).await.is_err());

        let good = AssemblyConfig {
            publish_events: false,
            ..service.config().await
        };
        service.update_config(good).await.unwrap();
        assert!(!service.config().await.publish_events);
    }
}
