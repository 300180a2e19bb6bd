//! Capture targets: their data model, a lookup cache filled from discovery
//! responses, and completion of partial target descriptions.
//!
//! Re-exports:
//! - [`Target`], [`Cluster`]: the capture target description.
//! - [`TargetCache`]: ambiguity-aware index over a discovered target list.
//! - [`complete_target`]: fills in capture service routing from the cache.

pub mod resolver;
pub mod target_cache;
pub mod types;

pub use resolver::complete_target;
pub use target_cache::TargetCache;
pub use types::{Cluster, Target};
