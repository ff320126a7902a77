//! Core abstractions for the storefront offline worker.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `FetchRequest` - An intercepted request with its declared destination
//! - `ResponseSnapshot` - An immutable response body and header snapshot
//! - `WorkerConfig` - Versioned partition, precache and classifier settings
//! - `WorkerState` - Worker lifecycle states

mod config;
mod lifecycle;
mod request;
mod response;

pub use config::*;
pub use lifecycle::*;
pub use request::*;
pub use response::*;
