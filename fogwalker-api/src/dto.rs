//! DTOs for API requests and responses.

use fogwalker_cache::CacheStats;
use serde::{Deserialize, Serialize};

/// Query string of a content request.
#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    /// Stream newline-delimited frames instead of a JSON envelope
    #[serde(default)]
    pub stream: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Whether an upstream credential is configured
    pub upstream_configured: bool,
}

/// Server cache statistics.
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    /// Stored entries, including expired ones not yet read
    pub total: usize,
    /// Live entries
    pub live: usize,
    /// Expired entries awaiting lazy eviction
    pub expired: usize,
    /// Capacity bound, if one is configured
    pub capacity: Option<usize>,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            total: stats.total_entries,
            live: stats.live_entries,
            expired: stats.expired_entries,
            capacity: stats.capacity,
        }
    }
}
