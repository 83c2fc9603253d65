//! Payload types and the non-stream response envelope.
//!
//! Payloads travel through the caches as `serde_json::Value`; these structs are
//! the typed view used for shape validation and rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;

/// Identifier of a sediment item; upstream emits either numbers or strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    /// Numeric id.
    Number(i64),
    /// Textual id.
    Text(String),
}

/// One entry of the sediment list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SedimentItem {
    pub id: ItemId,
    pub title: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub summary: String,
    pub category: String,
}

/// A wormhole article.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WormholeContent {
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub content: String,
    #[serde(default)]
    pub tag: String,
}

/// Prose plus the metadata drawn for it server-side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabellessContent {
    pub content: String,
    pub meta: LabellessMeta,
}

/// Request-scoped metadata attached to labelless prose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabellessMeta {
    pub author: String,
    pub source: String,
    pub likes: u32,
    pub comments: String,
}

/// One side of a collider payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thesis {
    pub title: String,
    pub content: String,
}

/// Two opposing theses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColliderData {
    pub left: Thesis,
    pub right: Thesis,
}

/// Where a non-stream payload came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Served from the server cache.
    Cache,
    /// Freshly generated.
    Api,
}

/// Body of a non-stream content response.
///
/// ```text
/// {success, data?, error?, message?, errorType?, timestamp, source?, topic?}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Raw error detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fixed user-facing message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Collider topic the payload belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl ContentEnvelope {
    /// Successful response.
    pub fn ok(data: Value, source: Source, topic: Option<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            error_type: None,
            timestamp: Utc::now(),
            source: Some(source),
            topic,
        }
    }

    /// Failed response carrying the classification and its fixed message.
    pub fn failure(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(detail.into()),
            message: Some(kind.user_message().to_string()),
            error_type: Some(kind),
            timestamp: Utc::now(),
            source: None,
            topic: None,
        }
    }
}
