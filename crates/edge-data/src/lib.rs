//! Network access for the offline worker.
//!
//! This crate provides:
//! - `NetworkFetch` - The injected fetch capability every strategy calls
//! - `FetchError` - Network failure taxonomy
//! - `HttpFetch` - A reqwest-backed implementation for hosts with real network
//! - `TimeoutConfig` - Connect and total timeouts for `HttpFetch`

mod fetch;
mod http;
mod timeout;

pub use fetch::*;
pub use http::*;
pub use timeout::*;
