//! Payload shapes: parsing and validating upstream output.
//!
//! Upstream models like to wrap JSON in Markdown code fences, so every parse
//! strips fence markers first. The same parse runs on the server once the
//! upstream stream completes and on the client after every chunk to build a
//! streaming preview.
//!
//! The client-side preview re-parses the whole accumulated text on every chunk,
//! which is quadratic in stream length. Payloads here are a few thousand
//! characters; revisit before streaming anything much larger.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{FogwalkerError, Result};
use crate::types::{ColliderData, WormholeContent};

/// Expected structure of a variant's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadShape {
    /// Top-level JSON array of items.
    ItemList,
    /// Single object with `title` and `content` (plus optional `author`, `tag`).
    Article,
    /// Plain prose, wrapped server-side as `{content, meta}`.
    Prose,
    /// Object with opposing `left` and `right` theses.
    Opposition,
}

impl PayloadShape {
    /// Whether partial output can be previewed while streaming.
    ///
    /// Arrays of unknown length are never partially rendered.
    pub fn is_incremental(self) -> bool {
        !matches!(self, PayloadShape::ItemList)
    }

    /// Whether upstream output for this shape is JSON.
    pub fn is_json(self) -> bool {
        !matches!(self, PayloadShape::Prose)
    }

    /// Parses complete upstream output into a validated payload.
    pub fn parse(self, raw: &str) -> Result<Value> {
        let cleaned = strip_fences(raw);

        let value = if self.is_json() {
            serde_json::from_str::<Value>(&cleaned).map_err(|e| {
                FogwalkerError::Parse(format!("AI response is not valid JSON format: {e}"))
            })?
        } else {
            json!({ "content": cleaned })
        };

        self.validate(&value)?;
        Ok(value)
    }

    /// Structural check of a parsed payload.
    pub fn validate(self, value: &Value) -> Result<()> {
        match self {
            PayloadShape::ItemList => {
                if !value.is_array() {
                    return Err(FogwalkerError::Parse(format!(
                        "Expected array response but got: {}",
                        json_type(value)
                    )));
                }
            }
            PayloadShape::Article => {
                WormholeContent::deserialize(value)
                    .map_err(|e| FogwalkerError::Parse(format!("Invalid article: {e}")))?;
            }
            PayloadShape::Opposition => {
                ColliderData::deserialize(value)
                    .map_err(|e| FogwalkerError::Parse(format!("Invalid collider payload: {e}")))?;
            }
            PayloadShape::Prose => {
                let content = value.get("content").and_then(Value::as_str).unwrap_or("");
                if content.trim().is_empty() {
                    return Err(FogwalkerError::Parse("Empty prose response".into()));
                }
            }
        }
        Ok(())
    }

    /// Attempts to build a streaming preview from partially received output.
    ///
    /// `None` is the normal mid-stream answer, not an error.
    pub fn preview(self, accumulated: &str) -> Option<Value> {
        if !self.is_incremental() {
            return None;
        }
        self.parse(accumulated).ok()
    }
}

/// Strips Markdown code-fence markers and surrounding whitespace.
pub fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
