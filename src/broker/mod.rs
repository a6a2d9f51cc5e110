//! Broker abstraction
//!
//! The gateway only needs one capability from the broker: produce a
//! (topic, key, value) record. Workers hold it as `Arc<dyn Producer>`.

pub mod kafka;
pub mod partitioner;

pub use kafka::KafkaProducer;

use async_trait::async_trait;
use thiserror::Error;

/// Produce failure for a single record
#[derive(Debug, Error)]
pub enum ProduceError {
    #[error("topic {0} not found in cluster metadata")]
    UnknownTopic(String),

    #[error("topic {0} has no partitions")]
    NoPartitions(String),

    #[error("broker client error: {0}")]
    Client(String),
}

/// Broker produce capability
///
/// Implementations own their client lifecycle; `close` is called once by
/// the worker pool after its last produce call returned.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    /// Deliver one record
    async fn produce(&self, topic: &str, key: &[u8], value: &[u8]) -> Result<(), ProduceError>;

    /// Release client resources
    async fn close(&self) {}
}
