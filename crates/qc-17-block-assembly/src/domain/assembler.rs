//! Block assembler (core domain logic)
//!
//! One run is a sequential state machine:
//!
//! ```text
//! Init -> Selecting -> {Admitting | Disqualifying} -> Selecting -> ... -> Done
//! ```
//!
//! Init executes the system transactions unconditionally. Selecting pulls the
//! head of the highest-priority eligible account. Under footprint metering the
//! cost is known before execution; under standard metering the candidate is
//! applied speculatively and its effects are discarded when it does not fit.

use super::block_config::BlockConfig;
use super::entities::*;
use super::invariants;
use super::meter::{MeterKind, MeteringContext};
use super::state::AssemblyState;
use crate::error::{AssemblyError, ExecutionError, Result};
use crate::ports::{ExecutionSink, PendingPool};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What to do with an account whose transaction failed for a non-nonce reason
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientErrorPolicy {
    /// Exclude the rest of the account's queue from the block
    #[default]
    DisqualifyAccount,
    /// Drop only the failing transaction and move on to the account's next nonce
    SkipTransaction,
}

/// Cooperative cancellation and build deadline of one run
#[derive(Clone, Debug, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    /// Control with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Control that stops admission once `budget` has elapsed
    pub fn with_timeout(budget: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + budget),
        }
    }

    /// Abandon the run; it returns [`AssemblyOutcome::Cancelled`] at its next check
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if the run was abandoned
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Check if the build deadline has passed
    pub fn deadline_reached(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Assembler for one resolved block configuration
pub struct Assembler<'a> {
    config: &'a BlockConfig,
    transient_policy: TransientErrorPolicy,
    verify_invariants: bool,
}

impl<'a> Assembler<'a> {
    /// Create an assembler with the default error policy and invariant checks on
    pub fn new(config: &'a BlockConfig) -> Self {
        Self {
            config,
            transient_policy: TransientErrorPolicy::default(),
            verify_invariants: true,
        }
    }

    /// Set the policy for non-nonce execution failures
    pub fn with_transient_policy(mut self, policy: TransientErrorPolicy) -> Self {
        self.transient_policy = policy;
        self
    }

    /// Enable or disable the post-assembly invariant check
    pub fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.verify_invariants = enabled;
        self
    }

    /// Run assembly to completion, cancellation, or deadline
    #[tracing::instrument(
        skip(self, pool, sink, control),
        fields(number = self.config.number, meter = %self.config.meter, gas_limit = self.config.gas_limit)
    )]
    pub fn assemble<P, S>(
        &self,
        pool: &mut P,
        sink: &mut S,
        control: &RunControl,
    ) -> Result<AssemblyOutcome>
    where
        P: PendingPool,
        S: ExecutionSink,
    {
        if control.is_cancelled() {
            debug!("Run cancelled before init");
            return Ok(AssemblyOutcome::Cancelled);
        }

        let mut state = AssemblyState::new(self.config.meter);
        let metering = self.init(&mut state, sink)?;

        if self.config.no_tx_pool {
            debug!("Pool selection disabled, sealing system transactions only");
        } else if !self.select(&mut state, pool, sink, metering.as_ref(), control) {
            sink.discard();
            info!(
                admitted = state.admitted(),
                "[qc-17] Assembly cancelled for block #{}",
                self.config.number
            );
            return Ok(AssemblyOutcome::Cancelled);
        }

        let block = state.into_block(self.config);

        if self.verify_invariants {
            invariants::validate_block(&block, self.config.system_transactions.len())?;
        }

        info!(
            txs = block.transactions.len(),
            gas_used = block.header.gas_used,
            execution_gas = block.header.execution_gas_used,
            dropped = block.dropped.len(),
            "[qc-17] Assembled block #{} ({}/{} {})",
            block.header.number,
            block.header.gas_used,
            block.header.gas_limit,
            block.meter
        );

        Ok(AssemblyOutcome::Completed(Box::new(block)))
    }

    /// Init: execute system transactions and read the metering context
    fn init<S: ExecutionSink>(
        &self,
        state: &mut AssemblyState,
        sink: &mut S,
    ) -> Result<Option<MeteringContext>> {
        let metering = match self.config.meter {
            MeterKind::Footprint => Some(MeteringContext::from_system_transactions(
                &self.config.system_transactions,
            )?),
            MeterKind::Standard => None,
        };

        for (index, tx) in self.config.system_transactions.iter().enumerate() {
            match sink.apply(tx) {
                Ok(outcome) => {
                    sink.commit();
                    debug!(index, gas_used = outcome.gas_used, "System transaction applied");
                    state.admit(tx.clone(), outcome, 0);
                }
                Err(source) => {
                    sink.discard();
                    warn!(index, error = %source, "[qc-17] System transaction failed");
                    return Err(AssemblyError::SystemTransactionFailed {
                        index,
                        tx_hash: tx.hash(),
                        source,
                    });
                }
            }
        }

        if state.metered_usage() > self.config.gas_limit {
            return Err(AssemblyError::InvalidConfig(format!(
                "system transactions use {} gas, budget is {}",
                state.metered_usage(),
                self.config.gas_limit
            )));
        }

        Ok(metering)
    }

    /// Selecting loop; returns `false` when the run was cancelled
    fn select<P, S>(
        &self,
        state: &mut AssemblyState,
        pool: &mut P,
        sink: &mut S,
        metering: Option<&MeteringContext>,
        control: &RunControl,
    ) -> bool
    where
        P: PendingPool,
        S: ExecutionSink,
    {
        let budget = self.config.gas_limit;

        loop {
            if control.is_cancelled() {
                return false;
            }
            if control.deadline_reached() {
                debug!(admitted = state.admitted(), "Build deadline reached");
                return true;
            }

            let Some(candidate) = pool.next_eligible() else {
                return true;
            };

            let ineligible = if candidate.is_system() {
                Some(Ineligibility::SystemTransaction)
            } else if state.is_disqualified(&candidate.sender()) {
                Some(Ineligibility::DisqualifiedAccount)
            } else {
                None
            };
            if let Some(why) = ineligible {
                self.disqualify(state, pool, &candidate, DropReason::Ineligible(why));
                continue;
            }

            let available = state.remaining(budget);

            let footprint = match metering {
                Some(ctx) => {
                    let cost = ctx.candidate_cost(&candidate);
                    if cost > available {
                        self.disqualify(
                            state,
                            pool,
                            &candidate,
                            DropReason::ExceedsBudget { cost, available },
                        );
                        continue;
                    }
                    cost
                }
                None => 0,
            };

            let outcome = match sink.apply(&candidate.tx) {
                Ok(outcome) => outcome,
                Err(err) => {
                    sink.discard();
                    self.on_execution_error(state, pool, &candidate, err);
                    continue;
                }
            };

            let (cost, available) = match self.config.meter {
                MeterKind::Standard => (outcome.gas_used, available),
                MeterKind::Footprint => (
                    outcome.gas_used,
                    budget.saturating_sub(state.execution_gas()),
                ),
            };
            if cost > available {
                sink.discard();
                self.disqualify(
                    state,
                    pool,
                    &candidate,
                    DropReason::ExceedsBudget { cost, available },
                );
                continue;
            }

            sink.commit();
            debug!(
                sender = ?candidate.sender(),
                nonce = candidate.nonce(),
                gas_used = outcome.gas_used,
                footprint,
                "Admitted transaction"
            );
            state.admit(candidate.tx.clone(), outcome, footprint);
            pool.advance(candidate.sender());

            assert!(
                state.metered_usage() <= budget,
                "metered usage {} exceeds budget {} after commit",
                state.metered_usage(),
                budget
            );
        }
    }

    fn disqualify<P: PendingPool>(
        &self,
        state: &mut AssemblyState,
        pool: &mut P,
        candidate: &Candidate,
        reason: DropReason,
    ) {
        debug!(sender = ?candidate.sender(), nonce = candidate.nonce(), %reason, "Disqualified account");
        pool.disqualify(candidate.sender());
        state.record_drop(candidate, reason, true);
    }

    fn on_execution_error<P: PendingPool>(
        &self,
        state: &mut AssemblyState,
        pool: &mut P,
        candidate: &Candidate,
        err: ExecutionError,
    ) {
        let disqualify = err.is_nonce_error()
            || self.transient_policy == TransientErrorPolicy::DisqualifyAccount;

        if disqualify {
            self.disqualify(state, pool, candidate, DropReason::ExecutionFailed(err));
        } else {
            debug!(sender = ?candidate.sender(), nonce = candidate.nonce(), error = %err, "Skipped transaction");
            pool.advance(candidate.sender());
            state.record_drop(candidate, DropReason::ExecutionFailed(err), false);
        }
    }
}
