//! Cached wall clock
//!
//! The keep-alive ticker refreshes the cached value once per tick; readers
//! get a relaxed atomic load instead of a syscall.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Unix-millisecond timestamp refreshed by the keep-alive ticker
#[derive(Debug)]
pub struct CachedClock {
    now_ms: AtomicU64,
}

impl CachedClock {
    pub fn new() -> Self {
        Self {
            now_ms: AtomicU64::new(system_millis()),
        }
    }

    /// Re-read the system clock
    #[inline]
    pub fn refresh(&self) {
        self.now_ms.store(system_millis(), Ordering::Relaxed);
    }

    /// Last refreshed time (Unix millis)
    #[inline]
    pub fn now_millis(&self) -> u64 {
        self.now_ms.load(Ordering::Relaxed)
    }
}

impl Default for CachedClock {
    fn default() -> Self {
        Self::new()
    }
}

fn system_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
