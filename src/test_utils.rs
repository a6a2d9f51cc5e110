//! Test utilities
//!
//! `RecordingProducer` stands in for the broker in unit tests.

use crate::broker::{ProduceError, Producer};
use crate::core::Message;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Record captured by `RecordingProducer`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub topic: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// In-memory producer recording successful produce calls
#[derive(Default)]
pub struct RecordingProducer {
    records: Mutex<Vec<Recorded>>,
    failing_topics: Mutex<HashSet<String>>,
    delay_ms: AtomicU64,
    closed: AtomicBool,
}

impl RecordingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every produce call to `topic` fail
    pub fn fail_topic(&self, topic: &str) {
        self.failing_topics.lock().insert(topic.to_string());
    }

    /// Sleep this long inside every produce call
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn records(&self) -> Vec<Recorded> {
        self.records.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Poll until at least `count` records arrived or `timeout` elapsed
    pub async fn wait_for(&self, count: usize, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.records.lock().len() < count && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Producer for RecordingProducer {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn produce(&self, topic: &str, key: &[u8], value: &[u8]) -> Result<(), ProduceError> {
        let delay = self.delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.failing_topics.lock().contains(topic) {
            return Err(ProduceError::Client(format!("{} is down", topic)));
        }

        self.records.lock().push(Recorded {
            topic: topic.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

/// Build a message from string parts
pub fn message(topic: &str, key: &str, value: &str) -> Message {
    Message::new(
        Arc::from(topic),
        Bytes::copy_from_slice(key.as_bytes()),
        Bytes::copy_from_slice(value.as_bytes()),
    )
}
