//! Inbound ports (driving side - API)

use crate::domain::{AssemblyOutcome, BlockHash, ParentHeader, PayloadAttributes};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Primary port: Block assembly service
#[async_trait]
pub trait BlockAssemblyService: Send + Sync {
    /// Assemble the child of `parent` described by `attributes`
    ///
    /// A newer request for the same parent cancels this one, which then
    /// returns [`AssemblyOutcome::Cancelled`].
    async fn assemble_block(
        &self,
        parent: ParentHeader,
        attributes: PayloadAttributes,
    ) -> Result<AssemblyOutcome>;

    /// Cancel the in-flight run building on `parent_hash`
    ///
    /// Returns `false` when no such run exists.
    async fn cancel(&self, parent_hash: BlockHash) -> bool;

    /// Current service status
    async fn status(&self) -> AssemblyStatus;
}

/// Assembly service status
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStatus {
    /// Runs currently building
    pub in_flight: usize,

    /// Blocks assembled this session
    pub blocks_assembled: u64,

    /// Runs cancelled this session
    pub runs_cancelled: u64,

    /// Height of the last assembled block
    pub last_block_number: Option<u64>,

    /// Hash of the last assembled block
    pub last_block_hash: Option<BlockHash>,
}
