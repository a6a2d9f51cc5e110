//! Bounded work queue with async backpressure
//!
//! Lock-free `ArrayQueue` storage plus two `Notify` handles: producers
//! park on `not_full` when the queue is at capacity, consumers park on
//! `not_empty` when it is drained. A push never drops its item: it either
//! lands in the queue or the queue has been closed.

use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Returned by `push` once the queue no longer accepts items
#[derive(Debug, Error, PartialEq, Eq)]
#[error("work queue is closed")]
pub struct QueueClosed;

/// Fixed-capacity multi-producer multi-consumer FIFO
pub struct WorkQueue<T> {
    items: ArrayQueue<T>,
    not_full: Notify,
    not_empty: Notify,
    closed: AtomicBool,
}

impl<T> WorkQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// # Panics
    /// Panics if `capacity` is zero (rejected earlier by config validation).
    pub fn new(capacity: usize) -> Self {
        Self {
            items: ArrayQueue::new(capacity),
            not_full: Notify::new(),
            not_empty: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Append an item, waiting while the queue is full
    pub async fn push(&self, item: T) -> Result<(), QueueClosed> {
        let mut item = item;
        loop {
            // Register interest before checking state so a pop that frees a
            // slot between the check and the await still wakes us.
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.closed.load(Ordering::SeqCst) {
                return Err(QueueClosed);
            }

            match self.items.push(item) {
                Ok(()) => {
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Err(rejected) => item = rejected,
            }

            notified.await;
        }
    }

    /// Take the oldest item, waiting while the queue is empty
    ///
    /// Returns `None` once `cancel` fires. Items still queued at that
    /// point are left in place.
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<T> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.items.pop() {
                self.not_full.notify_one();
                return Some(item);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }

    /// Non-blocking pop
    pub fn try_pop(&self) -> Option<T> {
        let item = self.items.pop();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Reject all further pushes and wake blocked producers
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.not_full.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Items currently queued
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }
}
