//! Target architecture plug-in interface

use crate::{CallingConvention, MachineInst, Selector, VregAllocator, Z80CallingConvention};
use zenith_cfg::Cfg;
use zenith_common::{ZenithError, ZenithResult};
use zenith_sema::ir::Function;
use zenith_sema::Unit;

/// A code-generation target: a calling convention plus instruction
/// selection. One implementation per architecture.
pub trait Target: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn calling_convention(&self) -> &dyn CallingConvention;

    /// Emit virtual-register machine code for one function.
    fn select_function(
        &self,
        unit: &Unit,
        func: &Function,
        vregs: &mut VregAllocator,
    ) -> ZenithResult<Cfg<MachineInst>>;
}

/// The Z80 target
#[derive(Debug)]
pub struct Z80Target {
    conv: Z80CallingConvention,
}

impl Z80Target {
    pub fn new() -> Self {
        Self { conv: Z80CallingConvention::new() }
    }
}

impl Default for Z80Target {
    fn default() -> Self {
        Self::new()
    }
}

impl Target for Z80Target {
    fn name(&self) -> &'static str {
        "z80"
    }

    fn calling_convention(&self) -> &dyn CallingConvention {
        &self.conv
    }

    fn select_function(
        &self,
        unit: &Unit,
        func: &Function,
        vregs: &mut VregAllocator,
    ) -> ZenithResult<Cfg<MachineInst>> {
        Selector::select(unit, func, &self.conv, vregs)
    }
}

/// Resolve a target by architecture name.
pub fn create_target(arch: &str) -> ZenithResult<Box<dyn Target>> {
    match arch {
        "z80" => Ok(Box::new(Z80Target::new())),
        _ => Err(ZenithError::unsupported_target(arch)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z80_resolves_and_unknown_targets_fail() {
        assert!(create_target("z80").is_ok());
        let err = create_target("6502").unwrap_err();
        assert!(matches!(err, ZenithError::UnsupportedTarget { .. }));
    }
}
