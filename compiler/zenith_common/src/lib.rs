//! Shared utilities for the Zenith compiler
//!
//! This crate provides the pieces every stage of the pipeline needs:
//! - Source location tracking
//! - Phase-tagged diagnostic messages
//! - Error types and result aliases

pub mod diagnostics;
pub mod error;
pub mod span;

pub use diagnostics::*;
pub use error::*;
pub use span::*;
