//! Log ingestion gateway
//!
//! Accepts log records over HTTP (batched, optionally compressed) and UDP
//! (one record per datagram), normalizes them into topic/key/value messages
//! and relays them to Kafka through a bounded worker pool.

pub mod broker;
pub mod core;
pub mod engine;
pub mod infrastructure;
pub mod ingest;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use engine::Gateway;
pub use infrastructure::config::Config;

use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] infrastructure::config::ConfigError),

    #[error("PID file error: {0}")]
    PidFile(#[from] infrastructure::pid::PidFileError),

    #[error("Broker error: {0}")]
    Broker(#[from] broker::ProduceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;
