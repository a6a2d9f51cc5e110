//! Kafka producer built on rskafka
//!
//! Partition clients are created lazily per topic on first use and cached.
//! Records are routed by murmur2 key hash, so every line of one HTTP batch
//! (which shares one key) goes to the same partition.

use crate::broker::partitioner::partition_for;
use crate::broker::{ProduceError, Producer};
use crate::infrastructure::config::{BrokerCompression, KafkaConfig};
use async_trait::async_trait;
use parking_lot::RwLock;
use rskafka::client::partition::{
    Compression as RecordCompression, PartitionClient, UnknownTopicHandling,
};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::Record;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Partition clients of one topic, ordered by partition id
struct TopicRoute {
    partitions: Vec<PartitionClient>,
}

/// Kafka implementation of the produce capability
pub struct KafkaProducer {
    client: Client,
    routes: RwLock<HashMap<String, Arc<TopicRoute>>>,
    compression: BrokerCompression,
}

impl KafkaProducer {
    /// Connect to the bootstrap brokers
    pub async fn connect(config: &KafkaConfig) -> Result<Self, ProduceError> {
        let client = ClientBuilder::new(config.brokers.clone())
            .build()
            .await
            .map_err(|e| ProduceError::Client(format!("failed to create Kafka client: {}", e)))?;

        tracing::info!(target: "broker", brokers = ?config.brokers, "kafka client connected");

        Ok(Self {
            client,
            routes: RwLock::new(HashMap::new()),
            compression: config.compression,
        })
    }

    /// Cached route for `topic`, resolving partitions from metadata on a miss
    async fn route(&self, topic: &str) -> Result<Arc<TopicRoute>, ProduceError> {
        let cached = self.routes.read().get(topic).cloned();
        if let Some(route) = cached {
            return Ok(route);
        }

        let topics = self
            .client
            .list_topics()
            .await
            .map_err(|e| ProduceError::Client(format!("metadata request failed: {}", e)))?;

        let ids = topics
            .into_iter()
            .find(|t| t.name == topic)
            .map(|t| t.partitions)
            .ok_or_else(|| ProduceError::UnknownTopic(topic.to_string()))?;

        if ids.is_empty() {
            return Err(ProduceError::NoPartitions(topic.to_string()));
        }

        let mut partitions = Vec::with_capacity(ids.len());
        for id in ids {
            let client = self
                .client
                .partition_client(topic.to_string(), id, UnknownTopicHandling::Retry)
                .await
                .map_err(|e| {
                    ProduceError::Client(format!(
                        "failed to create partition client for {}/{}: {}",
                        topic, id, e
                    ))
                })?;
            partitions.push(client);
        }

        tracing::info!(target: "broker", topic, partitions = partitions.len(), "resolved topic route");

        // Two workers may resolve the same topic concurrently; either result is valid
        let route = Arc::new(TopicRoute { partitions });
        self.routes
            .write()
            .insert(topic.to_string(), Arc::clone(&route));
        Ok(route)
    }
}

fn record_compression(compression: BrokerCompression) -> RecordCompression {
    match compression {
        BrokerCompression::None => RecordCompression::NoCompression,
        BrokerCompression::Gzip => RecordCompression::Gzip,
    }
}

#[async_trait]
impl Producer for KafkaProducer {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn produce(&self, topic: &str, key: &[u8], value: &[u8]) -> Result<(), ProduceError> {
        let route = self.route(topic).await?;
        let index = partition_for(key, route.partitions.len());

        let record = Record {
            key: Some(key.to_vec()),
            value: Some(value.to_vec()),
            headers: BTreeMap::new(),
            timestamp: chrono::Utc::now(),
        };

        route.partitions[index]
            .produce(vec![record], record_compression(self.compression))
            .await
            .map(|offsets| {
                tracing::trace!(target: "broker", topic, partition = index, ?offsets, "produced");
            })
            .map_err(|e| ProduceError::Client(format!("produce to {} failed: {}", topic, e)))
    }

    async fn close(&self) {
        let topics = {
            let mut routes = self.routes.write();
            let n = routes.len();
            routes.clear();
            n
        };
        tracing::info!(target: "broker", topics, "kafka producer closed");
    }
}
