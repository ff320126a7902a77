//! Observability for the storefront offline worker.
//!
//! This crate provides:
//! - `init_logging` - tracing-subscriber setup honouring `RUST_LOG`
//! - `WorkerMetrics` - Lock-free counters recorded by the worker
//! - `MetricsSnapshot` - Point-in-time copy of the counters for reporting

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
