//! Configuration types for block assembly

use crate::domain::{ChainSchedule, TransientErrorPolicy};
use crate::error::{AssemblyError, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Runtime configuration for block assembly
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Max candidates pulled from the mempool per run
    pub max_candidates: usize,

    /// Build deadline in milliseconds (0 = no deadline)
    pub build_timeout_ms: u64,

    /// Handling of non-nonce execution failures
    pub transient_error_policy: TransientErrorPolicy,

    /// Check block invariants after every run
    pub verify_invariants: bool,

    /// Publish `block.assembled` events
    pub publish_events: bool,

    /// Fork schedule and fee-market defaults
    pub schedule: ChainSchedule,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_candidates: crate::MAX_TRANSACTION_CANDIDATES,
            build_timeout_ms: crate::DEFAULT_BUILD_TIMEOUT_MS,
            transient_error_policy: TransientErrorPolicy::default(),
            verify_invariants: true,
            publish_events: true,
            schedule: ChainSchedule::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AssemblyError::InvalidConfig(format!("{}={} is not valid", name, raw))),
        Err(_) => Ok(None),
    }
}

fn parse_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}

fn parse_fork_time(name: &str) -> Result<Option<Option<u64>>> {
    match env::var(name) {
        Ok(raw) if raw.eq_ignore_ascii_case("never") || raw.is_empty() => Ok(Some(None)),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(|time| Some(Some(time)))
            .map_err(|_| AssemblyError::InvalidConfig(format!("{}={} is not valid", name, raw))),
        Err(_) => Ok(None),
    }
}

impl AssemblyConfig {
    /// Create configuration from environment variables over the defaults.
    ///
    /// # Environment Variables
    ///
    /// - `QC_ASSEMBLY_MAX_CANDIDATES`: Candidates per run (default: 10000)
    /// - `QC_ASSEMBLY_BUILD_TIMEOUT_MS`: Build deadline, 0 disables (default: 2000)
    /// - `QC_ASSEMBLY_TRANSIENT_POLICY`: `disqualify_account` or `skip_transaction`
    /// - `QC_ASSEMBLY_VERIFY_INVARIANTS`: Post-run invariant check (default: true)
    /// - `QC_ASSEMBLY_PUBLISH_EVENTS`: Publish assembled-block events (default: true)
    /// - `QC_ASSEMBLY_HOLOCENE_TIME` / `_ISTHMUS_TIME` / `_JOVIAN_TIME`: Fork times, `never` unsets
    /// - `QC_ASSEMBLY_EIP1559_DENOMINATOR` / `_EIP1559_ELASTICITY`: Fee-market defaults
    /// - `QC_ASSEMBLY_MAX_GAS_LIMIT`: Budget ceiling (default: 30000000)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = parse_env("QC_ASSEMBLY_MAX_CANDIDATES")? {
            config.max_candidates = v;
        }
        if let Some(v) = parse_env("QC_ASSEMBLY_BUILD_TIMEOUT_MS")? {
            config.build_timeout_ms = v;
        }
        if let Ok(raw) = env::var("QC_ASSEMBLY_TRANSIENT_POLICY") {
            config.transient_error_policy = match raw.to_lowercase().as_str() {
                "disqualify_account" => TransientErrorPolicy::DisqualifyAccount,
                "skip_transaction" => TransientErrorPolicy::SkipTransaction,
                other => {
                    return Err(AssemblyError::InvalidConfig(format!(
                        "unknown transient error policy {}",
                        other
                    )))
                }
            };
        }
        if let Some(v) = parse_flag("QC_ASSEMBLY_VERIFY_INVARIANTS") {
            config.verify_invariants = v;
        }
        if let Some(v) = parse_flag("QC_ASSEMBLY_PUBLISH_EVENTS") {
            config.publish_events = v;
        }

        let schedule = &mut config.schedule;
        if let Some(v) = parse_fork_time("QC_ASSEMBLY_HOLOCENE_TIME")? {
            schedule.holocene_time = v;
        }
        if let Some(v) = parse_fork_time("QC_ASSEMBLY_ISTHMUS_TIME")? {
            schedule.isthmus_time = v;
        }
        if let Some(v) = parse_fork_time("QC_ASSEMBLY_JOVIAN_TIME")? {
            schedule.jovian_time = v;
        }
        if let Some(v) = parse_env("QC_ASSEMBLY_EIP1559_DENOMINATOR")? {
            schedule.eip1559_denominator = v;
        }
        if let Some(v) = parse_env("QC_ASSEMBLY_EIP1559_ELASTICITY")? {
            schedule.eip1559_elasticity = v;
        }
        if let Some(v) = parse_env("QC_ASSEMBLY_MAX_GAS_LIMIT")? {
            schedule.max_gas_limit = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values no run could work with
    pub fn validate(&self) -> Result<()> {
        if self.max_candidates == 0 {
            return Err(AssemblyError::InvalidConfig(
                "max_candidates must be non-zero".into(),
            ));
        }
        self.schedule.validate()
    }

    /// Build deadline, if any
    pub fn build_timeout(&self) -> Option<Duration> {
        (self.build_timeout_ms > 0).then(|| Duration::from_millis(self.build_timeout_ms))
    }
}
