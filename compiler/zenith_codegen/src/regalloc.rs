//! Chaitin-style graph-coloring register allocation with spilling

use crate::{Assignment, MachineInst, Opcode, RegisterSet, VirtualRegId, VregAllocator};
use hashbrown::HashMap;
use log::debug;
use std::collections::BTreeSet;
use zenith_cfg::{Cfg, DefUse, InterferenceGraph, Liveness};
use zenith_common::{ZenithError, ZenithResult};

/// Outcome of register allocation for one function
#[derive(Debug, Clone, Default)]
pub struct AllocationResult {
    /// Registers that ended up in stack slots, in spill order.
    pub spilled: Vec<VirtualRegId>,
    /// Bytes of frame space added for spill slots.
    pub spill_size: u16,
    /// Build/color rounds it took to converge.
    pub rounds: usize,
}

/// Color every virtual register in `cfg` with a physical register, spilling
/// to stack slots when a class runs out of colors. Assignments are written
/// into `vregs`; the instruction stream is rewritten around spilled
/// registers.
pub fn allocate(
    cfg: &mut Cfg<MachineInst>,
    vregs: &mut VregAllocator,
    set: &RegisterSet,
) -> ZenithResult<AllocationResult> {
    let mut result = AllocationResult::default();
    let mut frame_size = read_frame_size(cfg);
    let base_frame = frame_size;

    // Each round spills at least one live range, so this terminates; the
    // bound only guards against an internal invariant breaking.
    const MAX_ROUNDS: usize = 32;

    loop {
        result.rounds += 1;
        if result.rounds > MAX_ROUNDS {
            return Err(ZenithError::codegen_error(
                "register allocation failed to converge",
            ));
        }

        let liveness = Liveness::compute(cfg);
        let graph = InterferenceGraph::build(cfg, &liveness);
        let counts = occurrence_counts(cfg);

        let stack = simplify(&graph, vregs, set, &counts);
        let spilled_now = select_colors(&graph, vregs, set, stack);

        if spilled_now.is_empty() {
            debug!(
                "allocation converged after {} round(s), {} spill(s)",
                result.rounds,
                result.spilled.len()
            );
            break;
        }

        for &reg in &spilled_now {
            let size = vregs.get(reg).size.max(1);
            if size > 1 && frame_size % 2 != 0 {
                frame_size += 1;
            }
            let offset = -(frame_size as i32) - size as i32;
            frame_size += size;
            vregs.assign(reg, Assignment::Spill { offset });
            rewrite_spill(cfg, vregs, reg, offset);
            result.spilled.push(reg);
        }

        // Colors handed out before the spill was discovered are invalid;
        // pinned bindings survive.
        for id in 0..vregs.len() as VirtualRegId {
            let reg = vregs.get_mut(id);
            if !reg.pinned && matches!(reg.assignment, Some(Assignment::Register(_))) {
                reg.assignment = None;
            }
        }
    }

    result.spill_size = frame_size - base_frame;
    if result.spill_size > 0 {
        patch_frame_size(cfg, frame_size);
    }
    Ok(result)
}

/// Peel nodes of degree < K onto the coloring stack; when none qualifies,
/// push the cheapest remaining node marked as a potential spill.
fn simplify(
    graph: &InterferenceGraph,
    vregs: &VregAllocator,
    set: &RegisterSet,
    counts: &HashMap<VirtualRegId, usize>,
) -> Vec<(VirtualRegId, bool)> {
    let mut remaining: BTreeSet<VirtualRegId> = graph
        .nodes()
        .filter(|&n| {
            let reg = vregs.get(n);
            !reg.pinned && reg.assignment.is_none()
        })
        .collect();

    // Pinned neighbors never leave the graph, so they stay in every degree.
    let mut degrees: HashMap<VirtualRegId, usize> = remaining
        .iter()
        .map(|&n| {
            let d = graph
                .neighbors(n)
                .filter(|&nb| remaining.contains(&nb) || vregs.get(nb).pinned)
                .count();
            (n, d)
        })
        .collect();

    let mut stack = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let simplifiable = remaining
            .iter()
            .copied()
            .find(|&n| degrees[&n] < set.color_count(vregs.get(n).class));

        let (node, potential_spill) = match simplifiable {
            Some(n) => (n, false),
            None => {
                // Cheapest live range first; ties break on ascending id,
                // which `min_by_key` preserves over the ordered set.
                let candidate = remaining
                    .iter()
                    .copied()
                    .min_by_key(|&n| (counts.get(&n).copied().unwrap_or(0), n))
                    .expect("remaining is non-empty");
                (candidate, true)
            }
        };

        remaining.remove(&node);
        stack.push((node, potential_spill));
        for nb in graph.neighbors(node) {
            if let Some(d) = degrees.get_mut(&nb) {
                *d = d.saturating_sub(1);
            }
        }
    }

    stack
}

/// Pop the stack, giving each node the lowest-numbered register of its
/// class not occupied by a colored neighbor. Returns the actual spills.
fn select_colors(
    graph: &InterferenceGraph,
    vregs: &mut VregAllocator,
    set: &RegisterSet,
    mut stack: Vec<(VirtualRegId, bool)>,
) -> Vec<VirtualRegId> {
    let mut spilled = Vec::new();

    while let Some((node, potential_spill)) = stack.pop() {
        let class = vregs.get(node).class;

        let neighbor_colors: Vec<_> = graph
            .neighbors(node)
            .filter_map(|nb| match vregs.get(nb).assignment {
                Some(Assignment::Register(r)) => Some(r),
                _ => None,
            })
            .collect();

        // A pair is occupied when either half is, and vice versa.
        let color = set
            .of_class(class)
            .find(|candidate| !neighbor_colors.iter().any(|&c| set.overlaps(candidate.id, c)))
            .map(|r| r.id);

        match color {
            Some(reg) => vregs.assign(node, Assignment::Register(reg)),
            None => {
                if !potential_spill {
                    debug!("v{} spills without being a marked candidate", node);
                }
                spilled.push(node);
            }
        }
    }

    spilled.sort_unstable();
    spilled
}

/// Replace every reference to a spilled register with a fresh short-lived
/// one, reloading before uses and storing after definitions.
fn rewrite_spill(
    cfg: &mut Cfg<MachineInst>,
    vregs: &mut VregAllocator,
    spilled: VirtualRegId,
    offset: i32,
) {
    let size = vregs.get(spilled).size;

    for block in &mut cfg.blocks {
        let old = std::mem::take(&mut block.instructions);
        let mut rewritten = Vec::with_capacity(old.len());

        for mut inst in old {
            if inst.operands.contains(&spilled) {
                let fresh = vregs.alloc(size);
                rewritten.push(
                    MachineInst::new(Opcode::LoadSlot).with_result(fresh).with_slot(offset),
                );
                for op in inst.operands.iter_mut() {
                    if *op == spilled {
                        *op = fresh;
                    }
                }
            }

            let stores_back = inst.result == Some(spilled);
            let fresh_def = if stores_back {
                let fresh = vregs.alloc(size);
                inst.result = Some(fresh);
                Some(fresh)
            } else {
                None
            };

            rewritten.push(inst);

            if let Some(fresh) = fresh_def {
                rewritten.push(
                    MachineInst::new(Opcode::StoreSlot).with_operand(fresh).with_slot(offset),
                );
            }
        }

        block.instructions = rewritten;
    }
}

fn occurrence_counts(cfg: &Cfg<MachineInst>) -> HashMap<VirtualRegId, usize> {
    let mut counts: HashMap<VirtualRegId, usize> = HashMap::new();
    for block in &cfg.blocks {
        for inst in &block.instructions {
            for r in inst.uses() {
                *counts.entry(r).or_default() += 1;
            }
            for r in inst.defs() {
                *counts.entry(r).or_default() += 1;
            }
        }
    }
    counts
}

/// Frame size as recorded in the prologue, zero if there is none.
fn read_frame_size(cfg: &Cfg<MachineInst>) -> u16 {
    cfg.blocks
        .iter()
        .flat_map(|b| b.instructions.iter())
        .find(|i| i.opcode == Opcode::Enter)
        .and_then(|i| i.imm)
        .unwrap_or(0) as u16
}

fn patch_frame_size(cfg: &mut Cfg<MachineInst>, frame_size: u16) {
    for block in &mut cfg.blocks {
        for inst in &mut block.instructions {
            if matches!(inst.opcode, Opcode::Enter | Opcode::Leave) {
                inst.imm = Some(frame_size as i64);
            }
        }
    }
}
