//! Cache module for the persisted franking file
//!
//! This module provides the in-memory cache model with its merge rules, and a
//! cache manager that loads the JSON file and writes it back only when the
//! serialized content actually changed. Writes go through a temp file and a
//! rename so a failed run never leaves a half-written cache behind.

mod manager;
mod model;

pub use manager::{CacheError, CacheManager, PersistOutcome};
pub use model::{merge, Cache, CacheEntry, MergeOutcome};
