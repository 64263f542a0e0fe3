//! Hash collection aliases used across the workspace.
//!
//! FxHash is faster than SipHash for the short string keys (metric names,
//! group paths) that dominate catalog and aggregation lookups.

pub use rustc_hash::{FxHashMap, FxHashSet};
