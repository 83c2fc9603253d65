//! Upstream configuration: endpoint, credential, model, timeout.

use std::fmt;
use std::time::Duration;

use url::Url;

use fogwalker_core::constants::{DEFAULT_MODEL, DEFAULT_UPSTREAM_TIMEOUT};
use fogwalker_core::error::{FogwalkerError, Result};

/// Upstream client configuration.
///
/// Missing values are tolerated here; calls fail with
/// [`FogwalkerError::MissingConfig`] instead.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: Option<String>,
    /// Bearer credential
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Deadline for a buffered call, and for each read of a stream
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: DEFAULT_MODEL.into(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

impl UpstreamConfig {
    /// Creates a config for an endpoint and credential.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Reads `AI_API_BASE_URL`, `AI_API_KEY`, `AI_MODEL` and `APP_TIMEOUT` (ms).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            base_url: non_empty("AI_API_BASE_URL"),
            api_key: non_empty("AI_API_KEY"),
            model: non_empty("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            timeout: non_empty("APP_TIMEOUT")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT),
        }
    }

    /// Overrides the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Credential, or a config error naming the missing variable.
    pub(crate) fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            FogwalkerError::MissingConfig(
                "AI API Key is not configured. Please set AI_API_KEY.".into(),
            )
        })
    }

    /// `{base_url}/chat/completions`, or a config error.
    pub(crate) fn completions_url(&self) -> Result<Url> {
        let base = self.base_url.as_deref().ok_or_else(|| {
            FogwalkerError::MissingConfig(
                "AI API Base URL is not configured. Please set AI_API_BASE_URL.".into(),
            )
        })?;
        Url::parse(&format!("{}/chat/completions", base.trim_end_matches('/'))).map_err(|e| {
            FogwalkerError::MissingConfig(format!("AI_API_BASE_URL is not a valid URL: {e}"))
        })
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogwalker_core::ErrorKind;

    #[test]
    fn test_completions_url_joins_cleanly() {
        let config = UpstreamConfig::new("https://api.example.com/v1/", "k");
        assert_eq!(
            config.completions_url().unwrap().as_str(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_missing_values_are_config_errors() {
        let config = UpstreamConfig::default();
        assert_eq!(config.require_api_key().unwrap_err().kind(), ErrorKind::Config);
        assert_eq!(config.completions_url().unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let config = UpstreamConfig::new("not a url", "k");
        assert_eq!(config.completions_url().unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = UpstreamConfig::new("https://api.example.com", "sk-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_builders() {
        let config = UpstreamConfig::default()
            .with_model("tiny")
            .with_timeout(Duration::from_millis(5));
        assert_eq!(config.model, "tiny");
        assert_eq!(config.timeout, Duration::from_millis(5));
    }
}
