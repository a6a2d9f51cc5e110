//! Ingestion statistics
//!
//! Lock-free success/error counters for both front ends.
//! Written on every request/datagram, read by the status reporter.

use crossbeam_utils::CachePadded;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-protocol success/error counters
///
/// Each counter sits on its own cache line.
#[derive(Debug, Default)]
pub struct StatCounters {
    http_success: CachePadded<AtomicU64>,
    http_error: CachePadded<AtomicU64>,
    udp_success: CachePadded<AtomicU64>,
    udp_error: CachePadded<AtomicU64>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub http_success: u64,
    pub http_error: u64,
    pub udp_success: u64,
    pub udp_error: u64,
}

impl StatCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_http_success(&self) {
        self.http_success.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_http_error(&self) {
        self.http_error.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_udp_success(&self) {
        self.udp_success.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_udp_error(&self) {
        self.udp_error.fetch_add(1, Ordering::Relaxed);
    }

    /// Current HTTP success total
    ///
    /// Also used by the HTTP handler as a fallback partition key.
    #[inline]
    pub fn http_success(&self) -> u64 {
        self.http_success.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            http_success: self.http_success.load(Ordering::Relaxed),
            http_error: self.http_error.load(Ordering::Relaxed),
            udp_success: self.udp_success.load(Ordering::Relaxed),
            udp_error: self.udp_error.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "http success:{} error:{}, udp success:{} error:{}",
            self.http_success, self.http_error, self.udp_success, self.udp_error
        )
    }
}
