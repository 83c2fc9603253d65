//! Server-side shared cache for Fog Walker.
//!
//! Process-wide key/value store with per-entry TTL and lazy eviction on read.
//! Volatile: nothing survives a restart.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;

pub use cache::{CacheConfig, CacheStats, TtlCache};
