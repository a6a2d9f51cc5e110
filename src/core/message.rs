//! Normalized log record
//!
//! Both ingestion front ends reduce their input to `Message`s. A message is
//! moved into the work queue and consumed by exactly one worker.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Immutable (topic, key, value) triple bound for the broker
///
/// Every line of one HTTP batch shares the topic allocation. Key and value
/// are `Bytes` slices into the request or datagram buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    topic: Arc<str>,
    key: Bytes,
    value: Bytes,
}

impl Message {
    /// Create a new message
    pub fn new(topic: Arc<str>, key: Bytes, value: Bytes) -> Self {
        Self { topic, key, value }
    }

    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[inline]
    pub fn key(&self) -> &Bytes {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Split into owned parts
    pub fn into_parts(self) -> (Arc<str>, Bytes, Bytes) {
        (self.topic, self.key, self.value)
    }
}

// Values can be large binary payloads; only print their length
impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("topic", &self.topic)
            .field("key", &String::from_utf8_lossy(&self.key))
            .field("value_len", &self.value.len())
            .finish()
    }
}
