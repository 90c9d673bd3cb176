//! # Seglog Testkit
//!
//! Test utilities for seglog.
//!
//! This crate provides:
//! - Engine fixtures with automatic cleanup
//! - Property-based test generators using proptest
//! - A conformance suite every storage backend must pass
//!
//! ## Usage
//!
//! ```rust
//! use seglog_testkit::prelude::*;
//!
//! run_all(TestEngine::memory);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conformance;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conformance::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use conformance::*;
pub use fixtures::*;
pub use generators::*;
