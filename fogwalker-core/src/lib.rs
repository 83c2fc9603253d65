//! # Fog Walker Core
//!
//! Core types, errors, and traits for the Fog Walker content delivery pipeline.
//!
//! This crate provides the building blocks shared by the server and client crates:
//!
//! - **Types**: content variants, payload structs, delivery frames, response envelopes
//! - **Shapes**: fence stripping, payload parsing, shape validation, streaming previews
//! - **Errors**: one error enum plus the user-facing error classification
//! - **Constants**: cache keys, TTLs, fixed messages
//! - **Traits**: the upstream text-generation seam
//!
//! ## Example
//!
//! ```rust
//! use fogwalker_core::{ContentVariant, PayloadShape};
//!
//! let shape = ContentVariant::Collider.shape();
//! let payload = shape
//!     .parse("```json\n{\"left\":{\"title\":\"A\",\"content\":\"x\"},\"right\":{\"title\":\"B\",\"content\":\"y\"}}\n```")
//!     .unwrap();
//! assert_eq!(payload["left"]["title"], "A");
//! assert_eq!(shape, PayloadShape::Opposition);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod shape;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{ErrorKind, FogwalkerError, Result};
pub use shape::{strip_fences, PayloadShape};
pub use traits::*;
pub use types::*;
