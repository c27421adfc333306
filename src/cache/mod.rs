//! Cache module for storing catalog lookups on disk
//!
//! This module provides a cache store that keeps one table per endpoint,
//! entries keyed by identifier and stamped with their write time, plus the
//! TTL policy that decides whether an entry may still be served. Failures
//! reading the store are reported as misses so a broken cache never stops a
//! lookup from reaching the remote service.

mod freshness;
mod store;

pub use freshness::{is_fresh, FreshnessPolicy};
pub use store::{CacheEntry, CacheError, CacheStore};
