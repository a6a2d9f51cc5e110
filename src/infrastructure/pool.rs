//! Broker worker pool
//!
//! A fixed number of workers share one bounded `WorkQueue`. Each worker
//! takes a message, hands it to the broker producer and repeats until the
//! pool is stopped. Enqueue waits while the queue is full; this is the only
//! backpressure between the front ends and the broker.

use crate::broker::Producer;
use crate::core::Message;
use crate::infrastructure::clock::CachedClock;
use crate::infrastructure::queue::{QueueClosed, WorkQueue};
use crate::log_broker;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// State shared by all workers
struct Shared {
    queue: WorkQueue<Message>,
    producer: Arc<dyn Producer>,
    produced: AtomicU64,
    failed: AtomicU64,
}

/// Bounded multi-worker producer pool
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: usize,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
    clock: Arc<CachedClock>,
    started_ms: u64,
}

/// Pool status for periodic logging and the stats endpoint
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub workers: usize,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub produced: u64,
    pub failed: u64,
    pub rate_per_sec: f64,
}

impl WorkerPool {
    /// Create the queue and spawn `workers` produce loops
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        workers: usize,
        capacity: usize,
        producer: Arc<dyn Producer>,
        clock: Arc<CachedClock>,
    ) -> Self {
        let shared = Arc::new(Shared {
            queue: WorkQueue::new(capacity),
            producer,
            produced: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });
        let cancel = CancellationToken::new();

        let handles = (0..workers)
            .map(|id| {
                let shared = Arc::clone(&shared);
                let cancel = cancel.clone();
                tokio::spawn(run_worker(id, shared, cancel))
            })
            .collect();

        tracing::info!(
            workers,
            capacity,
            producer = shared.producer.name(),
            "worker pool started"
        );

        let started_ms = clock.now_millis();
        Self {
            shared,
            workers,
            cancel,
            handles: Mutex::new(handles),
            stopped: AtomicBool::new(false),
            clock,
            started_ms,
        }
    }

    /// Queue a message for the broker
    ///
    /// Waits while the queue is full. Fails only after `stop`.
    pub async fn enqueue(&self, message: Message) -> Result<(), QueueClosed> {
        self.shared.queue.push(message).await
    }

    /// Stop accepting messages and wait for in-flight produce calls
    ///
    /// Messages still queued are not drained. The producer is closed once
    /// every worker has exited. Calling `stop` again is a no-op.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shared.queue.close();
        self.cancel.cancel();

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("worker task failed: {}", e);
            }
        }

        let left = self.shared.queue.len();
        if left > 0 {
            tracing::warn!(left, "worker pool stopped with undelivered messages");
        }

        self.shared.producer.close().await;
        tracing::info!(status = %self.status(), "worker pool stopped");
    }

    pub fn status(&self) -> PoolStatus {
        let produced = self.shared.produced.load(Ordering::Relaxed);
        let uptime_ms = self.clock.now_millis().saturating_sub(self.started_ms);
        let rate_per_sec = if uptime_ms >= 1000 {
            produced as f64 * 1000.0 / uptime_ms as f64
        } else {
            0.0
        };

        PoolStatus {
            workers: self.workers,
            queue_depth: self.shared.queue.len(),
            queue_capacity: self.shared.queue.capacity(),
            produced,
            failed: self.shared.failed.load(Ordering::Relaxed),
            rate_per_sec,
        }
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workers:{} queue:{}/{} produced:{} failed:{} rate:{:.1}/s",
            self.workers,
            self.queue_depth,
            self.queue_capacity,
            self.produced,
            self.failed,
            self.rate_per_sec
        )
    }
}

async fn run_worker(id: usize, shared: Arc<Shared>, cancel: CancellationToken) {
    tracing::debug!(worker = id, "worker started");

    // Cancellation is only observed between messages, so an in-flight
    // produce call always runs to completion.
    while let Some(message) = shared.queue.pop(&cancel).await {
        let (topic, key, value) = message.into_parts();
        match shared.producer.produce(&topic, &key, &value).await {
            Ok(()) => {
                shared.produced.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                log_broker!(
                    Level::ERROR,
                    worker = id,
                    topic = %topic,
                    key = %String::from_utf8_lossy(&key),
                    "produce failed: {}",
                    e
                );
            }
        }
    }

    tracing::debug!(worker = id, "worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{message, RecordingProducer};
    use std::time::Duration;

    fn pool(workers: usize, capacity: usize, producer: Arc<RecordingProducer>) -> WorkerPool {
        WorkerPool::start(workers, capacity, producer, Arc::new(CachedClock::new()))
    }

    #[tokio::test]
    async fn test_messages_reach_producer() {
        let producer = Arc::new(RecordingProducer::new());
        let pool = pool(4, 16, producer.clone());

        for i in 0..10 {
            pool.enqueue(message("app1", "k", &format!("line-{}", i)))
                .await
                .unwrap();
        }

        producer.wait_for(10, Duration::from_secs(2)).await;
        pool.stop().await;

        let mut values: Vec<String> = producer
            .records()
            .into_iter()
            .map(|r| String::from_utf8(r.value).unwrap())
            .collect();
        values.sort();
        let mut expected: Vec<String> = (0..10).map(|i| format!("line-{}", i)).collect();
        expected.sort();
        assert_eq!(values, expected);
        assert_eq!(pool.status().produced, 10);
        assert!(producer.is_closed());
    }

    #[tokio::test]
    async fn test_produce_failure_does_not_stop_worker() {
        let producer = Arc::new(RecordingProducer::new());
        producer.fail_topic("broken");
        let pool = pool(1, 8, producer.clone());

        pool.enqueue(message("broken", "k", "a")).await.unwrap();
        pool.enqueue(message("app1", "k", "b")).await.unwrap();

        producer.wait_for(1, Duration::from_secs(2)).await;
        pool.stop().await;

        let status = pool.status();
        assert_eq!(status.failed, 1);
        assert_eq!(status.produced, 1);
        assert_eq!(producer.records()[0].value, b"b");
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_fails() {
        let producer = Arc::new(RecordingProducer::new());
        let pool = pool(2, 8, producer);
        pool.stop().await;

        assert_eq!(pool.enqueue(message("app1", "k", "a")).await, Err(QueueClosed));
        // Second stop is a no-op
        pool.stop().await;
    }

    #[tokio::test]
    async fn test_enqueue_blocks_until_worker_frees_slot() {
        let producer = Arc::new(RecordingProducer::new());
        producer.set_delay(Duration::from_millis(100));
        let pool = Arc::new(pool(1, 1, producer.clone()));

        // One message in flight at the worker, one filling the queue
        pool.enqueue(message("app1", "k", "1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.enqueue(message("app1", "k", "2")).await.unwrap();

        // Third enqueue has to wait for the worker to take message 2
        let blocked = tokio::time::timeout(
            Duration::from_millis(30),
            pool.enqueue(message("app1", "k", "3")),
        )
        .await;
        assert!(blocked.is_err());

        pool.enqueue(message("app1", "k", "3")).await.unwrap();
        producer.wait_for(3, Duration::from_secs(2)).await;
        pool.stop().await;
        assert_eq!(producer.records().len(), 3);
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_produce() {
        let producer = Arc::new(RecordingProducer::new());
        producer.set_delay(Duration::from_millis(150));
        let pool = pool(1, 8, producer.clone());

        pool.enqueue(message("app1", "k", "slow")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Worker is inside produce; stop must let it finish
        pool.stop().await;
        assert_eq!(producer.records().len(), 1);
        assert_eq!(pool.status().produced, 1);
    }

    #[tokio::test]
    async fn test_stop_does_not_drain_queue() {
        let producer = Arc::new(RecordingProducer::new());
        producer.set_delay(Duration::from_millis(100));
        let pool = pool(1, 8, producer.clone());

        for i in 0..5 {
            pool.enqueue(message("app1", "k", &i.to_string())).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.stop().await;

        assert_eq!(producer.records().len(), 1);
        assert_eq!(pool.status().queue_depth, 4);
    }

    #[tokio::test]
    async fn test_status_display() {
        let producer = Arc::new(RecordingProducer::new());
        let pool = pool(3, 32, producer);
        let line = pool.status().to_string();
        assert!(line.starts_with("workers:3 queue:0/32"));
        pool.stop().await;
    }
}
