//! Ingestion front ends
//!
//! - `http`: batched, optionally compressed log lines over HTTP POST
//! - `udp`: one log record per datagram

pub mod form;
pub mod http;
pub mod udp;

pub use http::{HttpIngest, IngestError};
pub use udp::UdpServer;
