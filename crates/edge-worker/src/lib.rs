//! The offline request-caching worker.
//!
//! This crate provides:
//! - `Dispatcher` - One method per platform event, called by a host adapter
//! - `ServiceWorker` - The dispatcher composing every component below
//! - `LifecycleController` - Install, activate and version cutover
//! - `SyncQueue` - Deferred work triggered by sync events
//! - `NotificationDispatcher` - Push notifications and click routing
//! - `SweepTask` - Cancelable periodic orphan sweep
//! - `ControlMessage` / `WorkerMessage` - The typed control channel

mod clients;
mod controller;
mod dispatcher;
mod error;
mod messages;
mod notify;
mod sweep;
mod sync;
mod worker;

pub use clients::*;
pub use controller::*;
pub use dispatcher::*;
pub use error::*;
pub use messages::*;
pub use notify::*;
pub use sweep::*;
pub use sync::*;
pub use worker::*;
