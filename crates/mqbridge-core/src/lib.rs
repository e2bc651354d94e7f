//! mqbridge-core — configuration, wire payloads, and correlation ids.
//! All other mqbridge crates depend on this one.

pub mod config;
pub mod correlation;
pub mod payload;

pub use correlation::{CorrelationId, CorrelationIdGenerator};
pub use payload::ReplyPayload;
