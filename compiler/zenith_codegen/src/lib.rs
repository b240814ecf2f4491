//! Code generation for the Zenith compiler
//!
//! Instruction selection walks the typed IR and emits machine instructions
//! over virtual registers; the register allocator then colors those onto a
//! target's physical register file, spilling to stack slots when it must.
//! Targets plug in through the [`Target`] and [`CallingConvention`] traits.

pub mod callconv;
pub mod machine;
pub mod regalloc;
pub mod select;
pub mod target;
pub mod vreg;
pub mod z80;

pub use callconv::*;
pub use machine::*;
pub use regalloc::*;
pub use select::*;
pub use target::*;
pub use vreg::*;
pub use z80::*;
