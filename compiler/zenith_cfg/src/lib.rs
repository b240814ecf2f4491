//! Control-flow analysis for the Zenith compiler
//!
//! Per-function control-flow graphs of basic blocks, the classical backward
//! liveness dataflow, and the interference graph the register allocator
//! colors. Blocks live in a dense arena and reference each other by id, so
//! the cyclic edge structure needs no shared ownership.

pub mod builder;
pub mod cfg;
pub mod interference;
pub mod liveness;

pub use builder::*;
pub use cfg::*;
pub use interference::*;
pub use liveness::*;
