//! Common traits for Fog Walker.
//!
//! The upstream text-generation service sits behind [`TextGenerator`] so that
//! endpoints and the frame encoder can be exercised without a network.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::GenerationParams;

/// Fragments of upstream output in emission order.
///
/// Dropping the stream releases the upstream connection.
pub type TextStream = BoxStream<'static, Result<String>>;

// ═══════════════════════════════════════════════════════════════════════════════
// UPSTREAM TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface to a text-generation service.
///
/// Implementations must report failures with distinguishable error variants:
/// `MissingConfig`, `Unauthorized`, `Timeout`, `RateLimited`, `Network`, and
/// `Upstream` for anything else.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates the full response in one call.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Opens a stream of response fragments.
    ///
    /// Failing to open the stream is reported here, before any fragment.
    async fn generate_stream(&self, prompt: &str, params: &GenerationParams) -> Result<TextStream>;
}
