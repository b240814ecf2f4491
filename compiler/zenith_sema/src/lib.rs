//! Semantic analysis for the Zenith language
//!
//! Two passes over the syntax tree: declaration registration (so forward
//! references resolve), then typed-IR construction with identifier
//! resolution, type inference, usage tracking and call-graph recording.

pub mod analyzer;
pub mod call_graph;
pub mod ir;
pub mod symbol;
pub mod types;

pub use analyzer::*;
pub use call_graph::*;
pub use ir::*;
pub use symbol::*;
pub use types::*;
