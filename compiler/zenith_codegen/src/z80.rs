//! Z80 register file and calling convention

use crate::{
    CallingConvention, Cond, MachineInst, Opcode, ParamLocation, PhysRegId, PhysicalRegister,
    RegClass, RegisterSet,
};
use zenith_sema::Type;

// Byte registers.
pub const REG_A: PhysRegId = 0;
pub const REG_B: PhysRegId = 1;
pub const REG_C: PhysRegId = 2;
pub const REG_D: PhysRegId = 3;
pub const REG_E: PhysRegId = 4;
pub const REG_H: PhysRegId = 5;
pub const REG_L: PhysRegId = 6;
// Word registers and pairs.
pub const REG_BC: PhysRegId = 7;
pub const REG_DE: PhysRegId = 8;
pub const REG_HL: PhysRegId = 9;
pub const REG_IX: PhysRegId = 10;

/// Byte-sized parameters arrive in these registers, in declaration order.
const BYTE_PARAM_REGS: [PhysRegId; 5] = [REG_A, REG_B, REG_C, REG_D, REG_E];
/// Word-sized parameters arrive in these pairs.
const WORD_PARAM_REGS: [PhysRegId; 3] = [REG_HL, REG_DE, REG_BC];

const CALLER_SAVED: [PhysRegId; 7] = [REG_A, REG_B, REG_C, REG_D, REG_E, REG_BC, REG_DE];
const CALLEE_SAVED: [PhysRegId; 4] = [REG_H, REG_L, REG_HL, REG_IX];

/// Stack parameters sit above the saved frame pointer and return address.
const STACK_PARAM_BASE: i32 = 4;

pub fn z80_register_set() -> RegisterSet {
    RegisterSet::new(vec![
        PhysicalRegister { id: REG_A, name: "a", class: RegClass::Byte, aliases: vec![] },
        PhysicalRegister { id: REG_B, name: "b", class: RegClass::Byte, aliases: vec![REG_BC] },
        PhysicalRegister { id: REG_C, name: "c", class: RegClass::Byte, aliases: vec![REG_BC] },
        PhysicalRegister { id: REG_D, name: "d", class: RegClass::Byte, aliases: vec![REG_DE] },
        PhysicalRegister { id: REG_E, name: "e", class: RegClass::Byte, aliases: vec![REG_DE] },
        PhysicalRegister { id: REG_H, name: "h", class: RegClass::Byte, aliases: vec![REG_HL] },
        PhysicalRegister { id: REG_L, name: "l", class: RegClass::Byte, aliases: vec![REG_HL] },
        PhysicalRegister {
            id: REG_BC,
            name: "bc",
            class: RegClass::Word,
            aliases: vec![REG_B, REG_C],
        },
        PhysicalRegister {
            id: REG_DE,
            name: "de",
            class: RegClass::Word,
            aliases: vec![REG_D, REG_E],
        },
        PhysicalRegister {
            id: REG_HL,
            name: "hl",
            class: RegClass::Word,
            aliases: vec![REG_H, REG_L],
        },
        PhysicalRegister { id: REG_IX, name: "ix", class: RegClass::Word, aliases: vec![] },
    ])
}

/// The Z80 ABI used by Zenith
#[derive(Debug)]
pub struct Z80CallingConvention {
    registers: RegisterSet,
}

impl Z80CallingConvention {
    pub fn new() -> Self {
        Self { registers: z80_register_set() }
    }
}

impl Default for Z80CallingConvention {
    fn default() -> Self {
        Self::new()
    }
}

impl CallingConvention for Z80CallingConvention {
    fn register_set(&self) -> &RegisterSet {
        &self.registers
    }

    fn parameter_location(&self, index: usize, ty: &Type) -> ParamLocation {
        let regs: &[PhysRegId] = if ty.byte_size() <= 1 {
            &BYTE_PARAM_REGS
        } else {
            &WORD_PARAM_REGS
        };
        match regs.get(index) {
            Some(&reg) => ParamLocation::Register(reg),
            None => ParamLocation::Stack {
                offset: STACK_PARAM_BASE + 2 * (index - regs.len()) as i32,
            },
        }
    }

    fn return_location(&self, ty: &Type) -> PhysRegId {
        if ty.byte_size() <= 1 {
            REG_A
        } else {
            REG_HL
        }
    }

    fn caller_saved(&self) -> &[PhysRegId] {
        &CALLER_SAVED
    }

    fn callee_saved(&self) -> &[PhysRegId] {
        &CALLEE_SAVED
    }

    fn emit_prologue(&self, frame_size: u16) -> Vec<MachineInst> {
        vec![MachineInst::new(Opcode::Enter).with_imm(frame_size as i64)]
    }

    fn emit_epilogue(&self, frame_size: u16) -> Vec<MachineInst> {
        vec![
            MachineInst::new(Opcode::Leave).with_imm(frame_size as i64),
            MachineInst::new(Opcode::Ret),
        ]
    }
}

/// The comparison condition a binary operator lowers to.
pub fn cond_for(op: zenith_sema::ir::BinaryOp) -> Option<Cond> {
    use zenith_sema::ir::BinaryOp;
    let cond = match op {
        BinaryOp::Equal => Cond::Eq,
        BinaryOp::NotEqual => Cond::Ne,
        BinaryOp::Less => Cond::Lt,
        BinaryOp::LessEqual => Cond::Le,
        BinaryOp::Greater => Cond::Gt,
        BinaryOp::GreaterEqual => Cond::Ge,
        _ => return None,
    };
    Some(cond)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenith_sema::{PrimitiveType, Type};

    #[test]
    fn register_classes_partition_the_file() {
        let set = z80_register_set();
        assert_eq!(set.color_count(RegClass::Byte), 7);
        assert_eq!(set.color_count(RegClass::Word), 4);
    }

    #[test]
    fn pairs_alias_their_halves() {
        let set = z80_register_set();
        assert!(set.overlaps(REG_BC, REG_B));
        assert!(set.overlaps(REG_C, REG_BC));
        assert!(set.overlaps(REG_HL, REG_L));
        assert!(!set.overlaps(REG_A, REG_BC));
        assert!(!set.overlaps(REG_HL, REG_DE));
    }

    #[test]
    fn parameters_marshal_in_order_then_spill_to_stack() {
        let conv = Z80CallingConvention::new();
        let byte = Type::Primitive(PrimitiveType::U8);
        let word = Type::Primitive(PrimitiveType::U16);

        assert_eq!(conv.parameter_location(0, &byte), ParamLocation::Register(REG_A));
        assert_eq!(conv.parameter_location(1, &byte), ParamLocation::Register(REG_B));
        assert_eq!(conv.parameter_location(0, &word), ParamLocation::Register(REG_HL));
        assert_eq!(conv.parameter_location(2, &word), ParamLocation::Register(REG_BC));
        assert_eq!(
            conv.parameter_location(5, &byte),
            ParamLocation::Stack { offset: STACK_PARAM_BASE }
        );
        assert_eq!(
            conv.parameter_location(4, &word),
            ParamLocation::Stack { offset: STACK_PARAM_BASE + 2 }
        );
    }

    #[test]
    fn returns_use_a_or_hl() {
        let conv = Z80CallingConvention::new();
        assert_eq!(conv.return_location(&Type::Primitive(PrimitiveType::U8)), REG_A);
        assert_eq!(conv.return_location(&Type::Primitive(PrimitiveType::I16)), REG_HL);
        assert_eq!(conv.return_location(&Type::Primitive(PrimitiveType::Bool)), REG_A);
    }
}
