//! Delivery frames: the unit of a streamed content response.
//!
//! A delivery is zero or more [`DeliveryFrame::Chunk`] frames followed by exactly
//! one terminal frame ([`DeliveryFrame::Error`] or [`DeliveryFrame::Done`]).
//!
//! # Wire Format
//!
//! One JSON object per line, newline-delimited:
//!
//! ```text
//! {"chunk":"<raw upstream text>"}
//! {"error":"<kind>","message":"<fixed message>","errorMessage":"<raw detail>"}
//! {"done":true,"data":<payload>[,"topic":"<topic>"]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, FogwalkerError, Result};

/// One frame of a streamed delivery.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(into = "RawFrame")]
pub enum DeliveryFrame {
    /// A verbatim slice of upstream output.
    Chunk {
        /// Raw text, in emission order.
        text: String,
    },
    /// Terminal failure.
    Error {
        /// Classification attached by the server.
        kind: ErrorKind,
        /// Fixed user-facing message for `kind`.
        message: String,
        /// Raw error detail.
        detail: String,
    },
    /// Terminal success carrying the validated payload.
    Done {
        /// The parsed payload.
        data: Value,
        /// Collider topic, when the variant is topic-scoped.
        topic: Option<String>,
    },
}

impl DeliveryFrame {
    /// Chunk frame.
    pub fn chunk(text: impl Into<String>) -> Self {
        DeliveryFrame::Chunk { text: text.into() }
    }

    /// Error frame for a failure, classified and carrying the fixed message.
    pub fn failure(err: &FogwalkerError) -> Self {
        let kind = err.kind();
        DeliveryFrame::Error {
            kind,
            message: kind.user_message().to_string(),
            detail: err.to_string(),
        }
    }

    /// Done frame.
    pub fn done(data: Value, topic: Option<String>) -> Self {
        DeliveryFrame::Done { data, topic }
    }

    /// Returns true for `Error` and `Done`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryFrame::Chunk { .. })
    }

    /// Encodes the frame as one newline-terminated line.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes one line (without its newline).
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim_end_matches('\r'))?)
    }
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
}

impl From<DeliveryFrame> for RawFrame {
    fn from(frame: DeliveryFrame) -> Self {
        match frame {
            DeliveryFrame::Chunk { text } => RawFrame {
                chunk: Some(text),
                ..Default::default()
            },
            DeliveryFrame::Error {
                kind,
                message,
                detail,
            } => RawFrame {
                error: Some(kind),
                message: Some(message),
                error_message: Some(detail),
                ..Default::default()
            },
            DeliveryFrame::Done { data, topic } => RawFrame {
                done: Some(true),
                data: Some(data),
                topic,
                ..Default::default()
            },
        }
    }
}

impl<'de> Deserialize<'de> for DeliveryFrame {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawFrame::deserialize(deserializer)?
            .into_frame()
            .map_err(serde::de::Error::custom)
    }
}

impl RawFrame {
    fn into_frame(self) -> std::result::Result<DeliveryFrame, &'static str> {
        if let Some(kind) = self.error {
            return Ok(DeliveryFrame::Error {
                kind,
                message: self
                    .message
                    .unwrap_or_else(|| kind.user_message().to_string()),
                detail: self.error_message.unwrap_or_default(),
            });
        }
        if self.done == Some(true) {
            let data = self.data.ok_or("done frame without data")?;
            return Ok(DeliveryFrame::Done {
                data,
                topic: self.topic,
            });
        }
        if let Some(text) = self.chunk {
            return Ok(DeliveryFrame::Chunk { text });
        }
        Err("frame is neither chunk, error nor done")
    }
}
