//! Event publisher adapters

use crate::error::Result;
use crate::ports::EventPublisher;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Topics for block assembly events
pub mod topics {
    /// Topic for assembled blocks
    pub const BLOCK_ASSEMBLED: &str = "block.assembled";
}

/// No-op publisher for running without an event bus
#[derive(Debug, Clone, Default)]
pub struct NoOpPublisher;

#[async_trait]
impl EventPublisher for NoOpPublisher {
    async fn publish_event(&self, _topic: &str, _payload: Vec<u8>) -> Result<()> {
        Ok(())
    }
}

/// Publisher that keeps every published event in memory
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingPublisher {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far, oldest first
    pub async fn events(&self) -> Vec<(String, Vec<u8>)> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_event(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.events.lock().await.push((topic.to_string(), payload));
        Ok(())
    }
}
