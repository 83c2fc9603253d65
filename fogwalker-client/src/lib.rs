//! Client tier for Fog Walker.
//!
//! - [`PersistedCache`]: per-variant values in durable [`Storage`], expiring
//!   by age
//! - [`DeliveryDecoder`] / [`DeliveryReader`]: reassemble a streamed delivery
//!   into previews and a final value
//! - [`ContentPanel`]: stale-while-revalidate on mount, streaming on miss or
//!   refresh, cancellable at any point

#![forbid(unsafe_code)]

mod decoder;
mod panel;
mod persisted;
mod source;
mod storage;

pub use decoder::{DecoderEvent, DeliveryDecoder, DeliveryOutcome, DeliveryReader, LineBuffer};
pub use panel::{ContentPanel, PanelState};
pub use persisted::{CacheInfo, PersistedCache};
pub use source::{ByteStream, ContentSource, HttpContentSource};
pub use storage::{FileStorage, MemoryStorage, Storage};
