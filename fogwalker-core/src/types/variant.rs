//! Content variants and their per-variant settings.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::FogwalkerError;
use crate::shape::PayloadShape;

/// One of the four named content types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentVariant {
    /// Old items that survived the noise filter.
    Sediment,
    /// A deep dive into some unrelated field.
    Wormhole,
    /// Prose with the attribution stripped off.
    Labelless,
    /// Two opposing theses on one topic.
    Collider,
}

impl ContentVariant {
    /// All variants, in navigation order.
    pub const ALL: [ContentVariant; 4] = [
        ContentVariant::Sediment,
        ContentVariant::Wormhole,
        ContentVariant::Labelless,
        ContentVariant::Collider,
    ];

    /// Lowercase name used in URLs and client cache ids.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentVariant::Sediment => "sediment",
            ContentVariant::Wormhole => "wormhole",
            ContentVariant::Labelless => "labelless",
            ContentVariant::Collider => "collider",
        }
    }

    /// Expected payload shape.
    pub fn shape(self) -> PayloadShape {
        match self {
            ContentVariant::Sediment => PayloadShape::ItemList,
            ContentVariant::Wormhole => PayloadShape::Article,
            ContentVariant::Labelless => PayloadShape::Prose,
            ContentVariant::Collider => PayloadShape::Opposition,
        }
    }

    /// Lifetime of a cached payload, on both tiers.
    pub fn ttl(self) -> Duration {
        match self {
            ContentVariant::Sediment => SEDIMENT_TTL,
            ContentVariant::Wormhole => WORMHOLE_TTL,
            ContentVariant::Labelless => LABELLESS_TTL,
            ContentVariant::Collider => COLLIDER_TTL,
        }
    }

    /// Server cache key. Collider content is topic-scoped, so its key carries the topic.
    pub fn cache_key(self, topic: Option<&str>) -> String {
        match (self, topic) {
            (ContentVariant::Sediment, _) => SEDIMENT_CACHE_KEY.to_string(),
            (ContentVariant::Wormhole, _) => WORMHOLE_CACHE_KEY.to_string(),
            (ContentVariant::Labelless, _) => LABELLESS_CACHE_KEY.to_string(),
            (ContentVariant::Collider, Some(topic)) => format!("{COLLIDER_CACHE_KEY}_{topic}"),
            (ContentVariant::Collider, None) => COLLIDER_CACHE_KEY.to_string(),
        }
    }

    /// Generation parameters passed to the upstream.
    ///
    /// Sediment asks for a top-level array, which JSON-object mode cannot express,
    /// and labelless asks for prose, so neither requests structured output.
    pub fn generation_params(self) -> GenerationParams {
        match self {
            ContentVariant::Sediment => GenerationParams::new(2000, 0.7, false),
            ContentVariant::Wormhole => GenerationParams::new(3000, 0.8, true),
            ContentVariant::Labelless => GenerationParams::new(1500, 0.8, false),
            ContentVariant::Collider => GenerationParams::new(2500, 0.8, true),
        }
    }
}

impl fmt::Display for ContentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentVariant {
    type Err = FogwalkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sediment" => Ok(ContentVariant::Sediment),
            "wormhole" => Ok(ContentVariant::Wormhole),
            "labelless" => Ok(ContentVariant::Labelless),
            "collider" => Ok(ContentVariant::Collider),
            other => Err(FogwalkerError::UnknownVariant(other.to_string())),
        }
    }
}

/// Caller-specified generation parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationParams {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Ask the upstream for a JSON object.
    pub structured_output: bool,
}

impl GenerationParams {
    /// Creates a parameter set.
    pub const fn new(max_tokens: u32, temperature: f32, structured_output: bool) -> Self {
        Self {
            max_tokens,
            temperature,
            structured_output,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::new(2000, 0.7, false)
    }
}
