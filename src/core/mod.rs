//! Core types
//!
//! - Message: one topic/key/value record bound for the broker
//! - Compression: `zipType` payload codecs

pub mod compression;
pub mod message;

pub use compression::{Compression, DecodeError};
pub use message::Message;
