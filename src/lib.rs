//! Client for the Nucleus vulnerability management API.
//!
//! Reads are cached by request fingerprint for a configurable TTL, every
//! network call passes a sliding-window rate limiter, and concurrent misses
//! for the same request share one call. [`AsyncNucleusClient`] is the main
//! entry point; [`NucleusClient`] wraps it for blocking code.

pub mod blocking;
pub mod bulk;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod models;
pub mod rate_limit;

pub use blocking::NucleusClient;
pub use bulk::{BulkItemResult, BulkResult, gather};
pub use cache::ResponseCache;
pub use client::AsyncNucleusClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use executor::{ApiRequest, RequestExecutor};
pub use models::*;
pub use rate_limit::RateLimiter;
