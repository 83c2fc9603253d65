//! Pipeline constants for Fog Walker.
//!
//! Cache keys and TTLs are per content variant. The server and client tiers use
//! the same variant names but physically disjoint stores.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// SERVER CACHE KEYS
// ═══════════════════════════════════════════════════════════════════════════════

/// Server cache key for the sediment item list.
pub const SEDIMENT_CACHE_KEY: &str = "sediment_content";

/// Server cache key for the wormhole article.
pub const WORMHOLE_CACHE_KEY: &str = "wormhole_content";

/// Server cache key for the labelless prose.
pub const LABELLESS_CACHE_KEY: &str = "labelless_content";

/// Server cache key prefix for collider content; the topic is appended.
pub const COLLIDER_CACHE_KEY: &str = "collider_content";

// ═══════════════════════════════════════════════════════════════════════════════
// TTLS
// ═══════════════════════════════════════════════════════════════════════════════

/// Sediment content stays for a day.
pub const SEDIMENT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Wormhole content stays for half an hour.
pub const WORMHOLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Labelless content stays for an hour.
pub const LABELLESS_TTL: Duration = Duration::from_secs(60 * 60);

/// Collider content stays for two hours.
pub const COLLIDER_TTL: Duration = Duration::from_secs(2 * 60 * 60);

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT PERSISTED CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Key namespace for entries in the client's durable store.
pub const CLIENT_CACHE_PREFIX: &str = "fogwalker_cache_";

/// Client TTL used when a caller does not specify one.
pub const CLIENT_DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

// ═══════════════════════════════════════════════════════════════════════════════
// UPSTREAM
// ═══════════════════════════════════════════════════════════════════════════════

/// Model used when `AI_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";

/// Upstream request timeout used when `APP_TIMEOUT` is unset.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_millis(30_000);

/// System message sent ahead of every prompt.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Always respond in the requested format.";

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED USER-FACING MESSAGES
// ═══════════════════════════════════════════════════════════════════════════════

/// Shown for authentication failures.
pub const MSG_AUTH: &str = "Authentication with the content service failed. Check the API key.";

/// Shown for upstream timeouts.
pub const MSG_TIMEOUT: &str = "The content service took too long to answer. Try again shortly.";

/// Shown when the upstream rate-limits us.
pub const MSG_RATE_LIMIT: &str = "Too many requests right now. Wait a moment before retrying.";

/// Shown when the upstream is not configured.
pub const MSG_CONFIG: &str = "The content service is not configured. Set AI_API_BASE_URL and AI_API_KEY.";

/// Shown for network-level failures.
pub const MSG_NETWORK: &str = "Could not reach the content service. Check the network connection.";

/// Shown when upstream output does not match the expected payload.
pub const MSG_PARSE: &str = "The generated content came back malformed. Try again.";

/// Shown for anything else.
pub const MSG_UNKNOWN: &str = "Something went wrong while fetching content. Try again later.";
