//! Pipeline driver for the Zenith compiler
//!
//! Wires the stage crates into one synchronous pipeline with per-stage
//! gating and phase-partitioned diagnostics.

pub mod dump;
pub mod pipeline;

pub use dump::*;
pub use pipeline::*;
