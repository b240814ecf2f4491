//! Human-readable dumps of intermediate structures

use std::fmt::Write as _;
use zenith_cfg::Cfg;
use zenith_codegen::{Assignment, MachineInst, RegisterSet, VregAllocator};
use zenith_sema::ir::Stmt;
use zenith_sema::{PrimitiveType, SymbolKind, Unit};

use crate::{CompileOutput, FunctionCode};

/// Symbols and call graph of an analyzed unit.
pub fn dump_unit(unit: &Unit) -> String {
    let mut out = String::new();
    writeln!(out, "; symbols").unwrap();
    for (_, symbol) in unit.table.symbols() {
        if symbol.kind == SymbolKind::Type && PrimitiveType::from_name(&symbol.name).is_some() {
            continue; // builtin type names
        }
        writeln!(
            out,
            ";   {} {}: {} {:?}",
            symbol.kind, symbol.qualified_name, symbol.ty, symbol.usage
        )
        .unwrap();
    }
    writeln!(out, "; call graph").unwrap();
    for (caller, callee) in unit.call_graph.edges() {
        writeln!(out, ";   {} -> {}", caller, callee).unwrap();
    }
    out
}

/// Block structure and statement counts of a statement CFG.
pub fn dump_cfg(cfg: &Cfg<Stmt>) -> String {
    let mut out = String::new();
    for block in &cfg.blocks {
        let succs: Vec<&str> =
            block.successors.iter().map(|&s| cfg.block(s).label.as_str()).collect();
        writeln!(
            out,
            "{} (#{}): {} stmt(s) -> [{}]",
            block.label,
            block.id,
            block.instructions.len(),
            succs.join(", ")
        )
        .unwrap();
    }
    out
}

/// Machine code with physical assignments rendered against the target
/// register set.
pub fn dump_machine(
    cfg: &Cfg<MachineInst>,
    vregs: &VregAllocator,
    set: &RegisterSet,
) -> String {
    let mut out = String::new();
    for block in &cfg.blocks {
        writeln!(out, "{}:", block.label).unwrap();
        for inst in &block.instructions {
            write!(out, "    {}", inst).unwrap();
            let mentioned = inst.result.into_iter().chain(inst.operands.iter().copied());
            let mut notes = Vec::new();
            for vreg in mentioned {
                match vregs.get(vreg).assignment {
                    Some(Assignment::Register(r)) => {
                        notes.push(format!("v{}={}", vreg, set.name(r)))
                    }
                    Some(Assignment::Spill { offset }) => {
                        notes.push(format!("v{}=[fp{:+}]", vreg, offset))
                    }
                    None => {}
                }
            }
            if notes.is_empty() {
                writeln!(out).unwrap();
            } else {
                writeln!(out, "  ; {}", notes.join(" ")).unwrap();
            }
        }
    }
    out
}

/// Full text report for one compiled function.
pub fn dump_function(code: &FunctionCode, output: &CompileOutput, set: &RegisterSet) -> String {
    let mut out = String::new();
    writeln!(out, "== {} ==", code.name).unwrap();
    out.push_str(&dump_cfg(&code.cfg));
    if let (Some(machine), Some(vregs)) = (&code.machine, &output.vregs) {
        out.push('\n');
        out.push_str(&dump_machine(machine, vregs, set));
    }
    if let Some(liveness) = &code.liveness {
        writeln!(out, "; live-in/out").unwrap();
        for block in code
            .machine
            .as_ref()
            .map(|m| m.blocks.as_slice())
            .unwrap_or_default()
        {
            writeln!(
                out,
                ";   {}: in={:?} out={:?}",
                block.label, liveness.live_in[block.id], liveness.live_out[block.id]
            )
            .unwrap();
        }
    }
    out
}

/// JSON rendering of the typed IR declarations.
pub fn dump_ir_json(unit: &Unit) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&unit.decls)
}
