//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//!
//! Logging goes through `tracing`; the subscriber is installed by the binary.

pub mod metrics;

pub use metrics::*;
