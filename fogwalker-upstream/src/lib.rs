//! Upstream text generation for Fog Walker.
//!
//! Talks to any OpenAI-compatible `chat/completions` endpoint, either buffered
//! or as a server-sent-event stream of content deltas.

mod client;
mod config;
mod sse;

pub use client::OpenAiClient;
pub use config::UpstreamConfig;
