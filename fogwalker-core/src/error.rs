//! Error types for Fog Walker.
//!
//! [`FogwalkerError`] is the single error enum used across the workspace.
//! [`ErrorKind`] is the coarse classification shown to users: the server attaches
//! it, clients only display it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    MSG_AUTH, MSG_CONFIG, MSG_NETWORK, MSG_PARSE, MSG_RATE_LIMIT, MSG_TIMEOUT, MSG_UNKNOWN,
};

/// Result type alias using `FogwalkerError`.
pub type Result<T> = std::result::Result<T, FogwalkerError>;

/// Main error type for all Fog Walker operations.
#[derive(Debug, Error)]
pub enum FogwalkerError {
    // ═══════════════════════════════════════════════════════════════════════════
    // UPSTREAM ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Upstream endpoint or credential missing.
    #[error("Upstream not configured: {0}")]
    MissingConfig(String),

    /// Upstream rejected our credentials.
    #[error("Authentication failed (401): {0}")]
    Unauthorized(String),

    /// Upstream call exceeded its deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Upstream is rate-limiting us.
    #[error("Rate limit exceeded (429): {0}")]
    RateLimited(String),

    /// Connection-level failure talking to the upstream.
    #[error("Network error: {0}")]
    Network(String),

    /// Any other upstream failure, carrying the raw upstream text.
    #[error("AI API error: {0}")]
    Upstream(String),

    /// Upstream answered without any content.
    #[error("No content received from AI API")]
    EmptyResponse,

    // ═══════════════════════════════════════════════════════════════════════════
    // PAYLOAD ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Upstream output does not match the expected payload shape.
    #[error("Invalid payload: {0}")]
    Parse(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unrecognised content variant name.
    #[error("Unknown content variant: {0}")]
    UnknownVariant(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CLIENT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Durable storage rejected an operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Durable storage quota would be exceeded.
    #[error("Storage quota exceeded: {needed} bytes needed, limit is {limit}")]
    StorageFull { needed: usize, limit: usize },

    /// Client could not talk to the content server.
    #[error("Transport error: {0}")]
    Transport(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FogwalkerError {
    /// Returns the user-facing classification of this error.
    ///
    /// Typed upstream variants map directly; untyped upstream text goes through
    /// [`ErrorKind::classify`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            FogwalkerError::MissingConfig(_) => ErrorKind::Config,
            FogwalkerError::Unauthorized(_) => ErrorKind::Auth,
            FogwalkerError::Timeout(_) => ErrorKind::Timeout,
            FogwalkerError::RateLimited(_) => ErrorKind::RateLimit,
            FogwalkerError::Network(_) | FogwalkerError::Transport(_) => ErrorKind::Network,
            FogwalkerError::Parse(_) | FogwalkerError::Json(_) => ErrorKind::Parse,
            FogwalkerError::Upstream(raw) => ErrorKind::classify(raw),
            FogwalkerError::EmptyResponse
            | FogwalkerError::UnknownVariant(_)
            | FogwalkerError::Storage(_)
            | FogwalkerError::StorageFull { .. }
            | FogwalkerError::Io(_) => ErrorKind::Unknown,
        }
    }

    /// Returns true if a retry could plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::RateLimit | ErrorKind::Network | ErrorKind::Parse
        )
    }
}

/// Coarse failure classification attached by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials rejected.
    Auth,
    /// Deadline exceeded.
    Timeout,
    /// Rate-limited by the upstream.
    RateLimit,
    /// Upstream not configured.
    Config,
    /// Connection-level failure.
    Network,
    /// Upstream output failed shape validation.
    Parse,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Classifies raw upstream error text.
    ///
    /// Checked in priority order: auth, timeout, rate limit, config, network.
    /// Never yields [`ErrorKind::Parse`]; parse failures are typed.
    pub fn classify(raw: &str) -> Self {
        let text = raw.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        if has(&["401", "authentication", "unauthorized", "invalid api key"]) {
            ErrorKind::Auth
        } else if has(&["timeout", "timed out"]) {
            ErrorKind::Timeout
        } else if has(&["429", "rate limit", "too many requests"]) {
            ErrorKind::RateLimit
        } else if has(&["not configured", "missing configuration", "missing config"]) {
            ErrorKind::Config
        } else if has(&[
            "network",
            "connection",
            "econnrefused",
            "econnreset",
            "enotfound",
            "dns",
            "fetch failed",
        ]) {
            ErrorKind::Network
        } else {
            ErrorKind::Unknown
        }
    }

    /// The one fixed message shown to users for this kind.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Auth => MSG_AUTH,
            ErrorKind::Timeout => MSG_TIMEOUT,
            ErrorKind::RateLimit => MSG_RATE_LIMIT,
            ErrorKind::Config => MSG_CONFIG,
            ErrorKind::Network => MSG_NETWORK,
            ErrorKind::Parse => MSG_PARSE,
            ErrorKind::Unknown => MSG_UNKNOWN,
        }
    }

    /// Wire name, as used in `errorType`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Config => "config",
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
