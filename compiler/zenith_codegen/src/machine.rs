//! Target-independent machine instruction objects

use crate::VirtualRegId;
use smallvec::SmallVec;
use std::fmt;
use zenith_cfg::DefUse;

/// Instruction opcodes. These are deliberately target-neutral; a concrete
/// emitter maps them onto real encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// result ← immediate
    LoadImm,
    /// result ← address of `symbol`
    LoadAddr,
    /// result ← value of global `symbol`
    LoadGlobal,
    /// global `symbol` ← operand
    StoreGlobal,
    /// result ← operand
    Move,
    /// result ← mem[operand0]
    Load,
    /// mem[operand0] ← operand1
    Store,
    /// result ← frame slot (spill reloads and stack parameters)
    LoadSlot,
    /// frame slot ← operand (spill stores)
    StoreSlot,
    /// result ← address of a frame slot (locals with storage)
    SlotAddr,
    /// Push operand onto the stack (outgoing stack arguments).
    Push,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Neg,
    Inc,
    Dec,
    /// result (bool) ← operand0 `cond` operand1
    Compare,
    /// Conditional jump to `target` when `cond` holds for operand0.
    Branch,
    /// Unconditional jump to `target`.
    Jump,
    /// Call `symbol`; the result register is pre-bound by the convention.
    Call,
    /// Return; the return value, if any, is the single operand.
    Ret,
    /// result ← element count of the array operand
    ArrayLen,
    /// Function prologue; the immediate is the frame size.
    Enter,
    /// Function epilogue.
    Leave,
}

/// Branch and compare conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cond {
    Zero,
    NonZero,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One machine instruction over virtual registers
#[derive(Debug, Clone)]
pub struct MachineInst {
    pub opcode: Opcode,
    pub operands: SmallVec<[VirtualRegId; 2]>,
    pub result: Option<VirtualRegId>,
    /// Block label for branches.
    pub target: Option<String>,
    /// Immediate payload.
    pub imm: Option<i64>,
    /// Global or callee name.
    pub symbol: Option<String>,
    pub cond: Option<Cond>,
    /// Frame slot offset for `LoadSlot` / `StoreSlot`.
    pub slot: Option<i32>,
}

impl MachineInst {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: SmallVec::new(),
            result: None,
            target: None,
            imm: None,
            symbol: None,
            cond: None,
            slot: None,
        }
    }

    pub fn with_result(mut self, result: VirtualRegId) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_operand(mut self, operand: VirtualRegId) -> Self {
        self.operands.push(operand);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_imm(mut self, imm: i64) -> Self {
        self.imm = Some(imm);
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_cond(mut self, cond: Cond) -> Self {
        self.cond = Some(cond);
        self
    }

    pub fn with_slot(mut self, slot: i32) -> Self {
        self.slot = Some(slot);
        self
    }
}

impl DefUse for MachineInst {
    fn defs(&self) -> Vec<VirtualRegId> {
        self.result.into_iter().collect()
    }

    fn uses(&self) -> Vec<VirtualRegId> {
        self.operands.to_vec()
    }
}

impl fmt::Display for MachineInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.opcode)?;
        if let Some(cond) = self.cond {
            write!(f, ".{:?}", cond)?;
        }
        if let Some(result) = self.result {
            write!(f, " v{} ←", result)?;
        }
        for op in &self.operands {
            write!(f, " v{}", op)?;
        }
        if let Some(imm) = self.imm {
            write!(f, " #{}", imm)?;
        }
        if let Some(symbol) = &self.symbol {
            write!(f, " @{}", symbol)?;
        }
        if let Some(slot) = self.slot {
            write!(f, " [fp{:+}]", slot)?;
        }
        if let Some(target) = &self.target {
            write!(f, " → {}", target)?;
        }
        Ok(())
    }
}
