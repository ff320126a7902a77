//! Partitioned response cache for the storefront offline worker.
//!
//! This crate provides:
//! - `KeyedStore` / `PartitionHandle` - The storage capability, with `MemoryStore`
//! - `RequestClassifier` - Maps a request to a `ResourceClass`
//! - `PartitionManager` - Creates, populates and purges versioned partitions
//! - `StrategyEngine` - Cache-first, network-first and stale-while-revalidate
//! - `CacheExplainHeaders` - Debug headers describing how a response was served
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use edge_cache::{MemoryStore, PartitionSet, RequestClassifier, StrategyEngine};
//! use edge_core::{FetchRequest, WorkerConfig};
//!
//! let config = WorkerConfig::new("3");
//! let partitions = PartitionSet::from_config(&config);
//! let classifier = RequestClassifier::from_config(&config);
//! let engine = StrategyEngine::new(Arc::new(MemoryStore::new()), fetch);
//!
//! let request = FetchRequest::get("/static/js/main.js");
//! let class = classifier.classify(&request);
//! let served = engine.serve(&request, class, partitions.for_class(class)).await;
//! ```

mod classify;
mod error;
mod headers;
mod key;
mod partition;
mod policy;
mod store;
mod strategy;

pub use classify::*;
pub use error::*;
pub use headers::*;
pub use key::*;
pub use partition::*;
pub use policy::*;
pub use store::*;
pub use strategy::*;
