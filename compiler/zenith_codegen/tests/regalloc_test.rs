//! Register allocator tests over synthetic instruction streams

use zenith_cfg::{Cfg, DefUse, InterferenceGraph, Liveness};
use zenith_codegen::*;

/// def `n` registers up front, then read each one later: all `n` are
/// simultaneously live across the reads, forming an n-clique.
fn clique_cfg(vregs: &mut VregAllocator, n: usize) -> Cfg<MachineInst> {
    let mut cfg: Cfg<MachineInst> = Cfg::new();
    let body = cfg.add_block("body");
    cfg.add_edge(cfg.entry, body);
    cfg.add_edge(body, cfg.exit);

    let regs: Vec<VirtualRegId> = (0..n).map(|_| vregs.alloc(1)).collect();
    for &r in &regs {
        cfg.push(body, MachineInst::new(Opcode::LoadImm).with_result(r).with_imm(1));
    }
    for &r in &regs {
        cfg.push(body, MachineInst::new(Opcode::Push).with_operand(r));
    }
    cfg
}

fn assert_coloring_valid(cfg: &Cfg<MachineInst>, vregs: &VregAllocator, set: &RegisterSet) {
    let liveness = Liveness::compute(cfg);
    let graph = InterferenceGraph::build(cfg, &liveness);

    for u in graph.nodes() {
        assert!(
            vregs.get(u).assignment.is_some(),
            "v{} left unassigned",
            u
        );
        for v in graph.neighbors(u) {
            if let (Some(Assignment::Register(a)), Some(Assignment::Register(b))) =
                (vregs.get(u).assignment, vregs.get(v).assignment)
            {
                assert!(
                    !set.overlaps(a, b),
                    "interfering v{} and v{} share storage {} / {}",
                    u,
                    v,
                    set.name(a),
                    set.name(b)
                );
            }
        }
    }
}

#[test]
fn small_clique_colors_without_spilling() {
    let set = z80_register_set();
    let mut vregs = VregAllocator::new();
    let mut cfg = clique_cfg(&mut vregs, 4);

    let result = allocate(&mut cfg, &mut vregs, &set).unwrap();
    assert!(result.spilled.is_empty());
    assert_eq!(result.rounds, 1);
    assert_coloring_valid(&cfg, &vregs, &set);
}

#[test]
fn clique_beyond_color_count_spills() {
    let set = z80_register_set();
    assert_eq!(set.color_count(RegClass::Byte), 7);

    let mut vregs = VregAllocator::new();
    let mut cfg = clique_cfg(&mut vregs, 9);

    let result = allocate(&mut cfg, &mut vregs, &set).unwrap();
    assert!(!result.spilled.is_empty(), "nine simultaneously-live bytes need spills");
    assert!(result.spill_size > 0);
    assert_coloring_valid(&cfg, &vregs, &set);

    // Spilled registers got slots and their references were rewritten.
    for &s in &result.spilled {
        assert!(matches!(vregs.get(s).assignment, Some(Assignment::Spill { .. })));
        for block in &cfg.blocks {
            for inst in &block.instructions {
                assert!(!inst.uses().contains(&s), "spilled v{} still read directly", s);
                assert_ne!(inst.defs().first(), Some(&s), "spilled v{} still written directly", s);
            }
        }
    }
}

#[test]
fn spill_rewrite_inserts_loads_and_stores() {
    let set = z80_register_set();
    let mut vregs = VregAllocator::new();
    let mut cfg = clique_cfg(&mut vregs, 9);

    allocate(&mut cfg, &mut vregs, &set).unwrap();

    let has_reload = cfg
        .blocks
        .iter()
        .flat_map(|b| b.instructions.iter())
        .any(|i| i.opcode == Opcode::LoadSlot);
    let has_store = cfg
        .blocks
        .iter()
        .flat_map(|b| b.instructions.iter())
        .any(|i| i.opcode == Opcode::StoreSlot);
    assert!(has_reload && has_store);
}

#[test]
fn allocation_is_deterministic() {
    let set = z80_register_set();

    let run = || {
        let mut vregs = VregAllocator::new();
        let mut cfg = clique_cfg(&mut vregs, 9);
        allocate(&mut cfg, &mut vregs, &set).unwrap();
        (0..vregs.len() as VirtualRegId)
            .map(|id| vregs.get(id).assignment)
            .collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}

#[test]
fn pinned_registers_keep_their_binding_and_block_neighbors() {
    let set = z80_register_set();
    let mut vregs = VregAllocator::new();

    let mut cfg: Cfg<MachineInst> = Cfg::new();
    let body = cfg.add_block("body");
    cfg.add_edge(cfg.entry, body);
    cfg.add_edge(body, cfg.exit);

    let pinned = vregs.alloc_pinned(1, Assignment::Register(REG_A));
    let other = vregs.alloc(1);
    cfg.push(body, MachineInst::new(Opcode::LoadImm).with_result(other).with_imm(7));
    // `other` is live across a use of the pinned register.
    cfg.push(body, MachineInst::new(Opcode::Push).with_operand(pinned));
    cfg.push(body, MachineInst::new(Opcode::Push).with_operand(other));

    allocate(&mut cfg, &mut vregs, &set).unwrap();

    assert_eq!(vregs.get(pinned).assignment, Some(Assignment::Register(REG_A)));
    match vregs.get(other).assignment {
        Some(Assignment::Register(r)) => assert_ne!(r, REG_A),
        other_assignment => panic!("expected a register, got {:?}", other_assignment),
    }
}

#[test]
fn word_registers_use_the_word_class() {
    let set = z80_register_set();
    let mut vregs = VregAllocator::new();

    let mut cfg: Cfg<MachineInst> = Cfg::new();
    let body = cfg.add_block("body");
    cfg.add_edge(cfg.entry, body);
    cfg.add_edge(body, cfg.exit);

    let a = vregs.alloc(2);
    let b = vregs.alloc(2);
    cfg.push(body, MachineInst::new(Opcode::LoadImm).with_result(a).with_imm(300));
    cfg.push(body, MachineInst::new(Opcode::LoadImm).with_result(b).with_imm(400));
    cfg.push(body, MachineInst::new(Opcode::Add).with_result(a).with_operand(a).with_operand(b));
    cfg.push(body, MachineInst::new(Opcode::Push).with_operand(a));

    allocate(&mut cfg, &mut vregs, &set).unwrap();

    for id in [a, b] {
        match vregs.get(id).assignment {
            Some(Assignment::Register(r)) => {
                assert_eq!(set.register(r).class, RegClass::Word, "v{} in byte register", id)
            }
            other => panic!("expected word register for v{}, got {:?}", id, other),
        }
    }
}
