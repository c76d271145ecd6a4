//! Core library for the yourMoment monitoring pipeline.
//!
//! This crate contains the durable work-item store, the upstream session
//! registry, the rate limiter, the four stage workers, and the scheduler
//! that together drive AI-generated commentary on upstream articles.
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod scheduler;
pub mod storage;
pub mod upstream;
pub mod vault;

pub use error::*;

/// Returns the version of the yourmoment-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
