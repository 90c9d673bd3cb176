//! # Seglog DAL
//!
//! Maps log, segment and block entities onto a seglog storage engine.
//!
//! The DAL is a thin layer: it computes the engine key from an entity's
//! identity, encodes the payload with a pluggable [`Codec`], and delegates
//! to a [`seglog_storage::Tx`]. It adds no caching and no validation of
//! segment or block ordering.
//!
//! ## Keys
//!
//! - Log: `log.<name>`
//! - Segment: `segment.<uuid>`
//! - Block: `block.<uuid>.<index>`
//!
//! See [`keys`] for the exact format and [`EntityKey::parse`] for the
//! reverse mapping.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod dal;
mod entity;
mod error;
pub mod keys;

pub use codec::{CborCodec, Codec, RawBlockCodec};
pub use dal::Dal;
pub use entity::{Block, Log, Segment};
pub use error::{DalError, DalResult, EntityKind};
pub use keys::{block_key, log_key, segment_key, EntityKey};
