//! Domain types for Fog Walker.
//!
//! - [`ContentVariant`]: the four content types and their per-variant settings
//! - [`SedimentItem`], [`WormholeContent`], [`LabellessContent`], [`ColliderData`]: payloads
//! - [`DeliveryFrame`]: one line of a streamed delivery
//! - [`ContentEnvelope`]: the non-stream response body

mod content;
mod frame;
mod variant;

pub use content::*;
pub use frame::*;
pub use variant::*;
