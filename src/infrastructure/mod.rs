//! Infrastructure
//!
//! This module contains the plumbing around the ingestion path:
//! - Logging, stats counters and the cached clock
//! - Configuration management
//! - Work queue and worker pool
//! - PID file and graceful shutdown

pub mod clock;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod pid;
pub mod pool;
pub mod queue;
pub mod shutdown;

pub use pool::{PoolStatus, WorkerPool};
pub use queue::{QueueClosed, WorkQueue};
