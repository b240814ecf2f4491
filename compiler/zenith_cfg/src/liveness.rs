//! Backward liveness dataflow analysis

use crate::{Cfg, DefUse, VirtualRegId};
use log::debug;
use std::collections::BTreeSet;

/// Per-block live-in / live-out sets, indexed by block id
#[derive(Debug, Clone, Default)]
pub struct Liveness {
    pub live_in: Vec<BTreeSet<VirtualRegId>>,
    pub live_out: Vec<BTreeSet<VirtualRegId>>,
}

impl Liveness {
    /// Iterate the classical backward equations to a fixpoint:
    ///
    /// ```text
    /// LiveOut[B] = ∪ LiveIn[S] over successors S
    /// LiveIn[B]  = uses(B) ∪ (LiveOut[B] \ defs(B))
    /// ```
    ///
    /// Sets only grow and the register universe is finite, so the loop
    /// terminates.
    pub fn compute<I: DefUse>(cfg: &Cfg<I>) -> Liveness {
        let n = cfg.len();
        let mut block_uses = Vec::with_capacity(n);
        let mut block_defs = Vec::with_capacity(n);

        for block in &cfg.blocks {
            // uses(B): registers read before any write in B.
            let mut uses = BTreeSet::new();
            let mut defs = BTreeSet::new();
            for instr in &block.instructions {
                for r in instr.uses() {
                    if !defs.contains(&r) {
                        uses.insert(r);
                    }
                }
                for r in instr.defs() {
                    defs.insert(r);
                }
            }
            block_uses.push(uses);
            block_defs.push(defs);
        }

        let mut live_in = vec![BTreeSet::new(); n];
        let mut live_out = vec![BTreeSet::new(); n];

        let mut changed = true;
        let mut iterations = 0usize;
        while changed {
            changed = false;
            iterations += 1;

            // Reverse order converges faster for a backward problem; the
            // fixpoint itself is order-independent.
            for id in (0..n).rev() {
                let mut out = BTreeSet::new();
                for &succ in &cfg.blocks[id].successors {
                    out.extend(live_in[succ].iter().copied());
                }

                let mut inn = block_uses[id].clone();
                for &r in &out {
                    if !block_defs[id].contains(&r) {
                        inn.insert(r);
                    }
                }

                if out != live_out[id] {
                    live_out[id] = out;
                    changed = true;
                }
                if inn != live_in[id] {
                    live_in[id] = inn;
                    changed = true;
                }
            }
        }

        debug!("liveness fixpoint reached after {} iterations", iterations);
        Liveness { live_in, live_out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cfg;

    struct TestInst {
        defs: Vec<VirtualRegId>,
        uses: Vec<VirtualRegId>,
    }

    impl TestInst {
        fn new(defs: &[VirtualRegId], uses: &[VirtualRegId]) -> Self {
            Self { defs: defs.to_vec(), uses: uses.to_vec() }
        }
    }

    impl DefUse for TestInst {
        fn defs(&self) -> Vec<VirtualRegId> {
            self.defs.clone()
        }
        fn uses(&self) -> Vec<VirtualRegId> {
            self.uses.clone()
        }
    }

    #[test]
    fn straight_line_liveness() {
        // entry: def r0; def r1   body: use r0, r1
        let mut cfg: Cfg<TestInst> = Cfg::new();
        let body = cfg.add_block("body");
        cfg.add_edge(cfg.entry, body);
        cfg.add_edge(body, cfg.exit);

        cfg.push(cfg.entry, TestInst::new(&[0], &[]));
        cfg.push(cfg.entry, TestInst::new(&[1], &[]));
        cfg.push(body, TestInst::new(&[], &[0, 1]));

        let liveness = Liveness::compute(&cfg);
        assert!(liveness.live_in[cfg.entry].is_empty());
        assert_eq!(liveness.live_out[cfg.entry], [0, 1].into());
        assert_eq!(liveness.live_in[body], [0, 1].into());
        assert!(liveness.live_out[body].is_empty());
    }

    #[test]
    fn branch_liveness_reaches_both_arms() {
        // r0 used in both arms, r1 only in the left arm.
        let mut cfg: Cfg<TestInst> = Cfg::new();
        let left = cfg.add_block("left");
        let right = cfg.add_block("right");
        cfg.add_edge(cfg.entry, left);
        cfg.add_edge(cfg.entry, right);
        cfg.add_edge(left, cfg.exit);
        cfg.add_edge(right, cfg.exit);

        cfg.push(cfg.entry, TestInst::new(&[0], &[]));
        cfg.push(cfg.entry, TestInst::new(&[1], &[]));
        cfg.push(left, TestInst::new(&[], &[0, 1]));
        cfg.push(right, TestInst::new(&[], &[0]));

        let liveness = Liveness::compute(&cfg);
        assert_eq!(liveness.live_in[left], [0, 1].into());
        assert_eq!(liveness.live_in[right], [0].into());
        assert_eq!(liveness.live_out[cfg.entry], [0, 1].into());
    }

    #[test]
    fn loop_liveness_flows_around_back_edge() {
        // cond uses r0; body redefines r0 from r0; r0 stays live around
        // the loop.
        let mut cfg: Cfg<TestInst> = Cfg::new();
        let cond = cfg.add_block("cond");
        let body = cfg.add_block("body");
        cfg.add_edge(cfg.entry, cond);
        cfg.add_edge(cond, body);
        cfg.add_edge(cond, cfg.exit);
        cfg.add_edge(body, cond);

        cfg.push(cfg.entry, TestInst::new(&[0], &[]));
        cfg.push(cond, TestInst::new(&[], &[0]));
        cfg.push(body, TestInst::new(&[0], &[0]));

        let liveness = Liveness::compute(&cfg);
        assert_eq!(liveness.live_in[cond], [0].into());
        assert_eq!(liveness.live_in[body], [0].into());
        assert_eq!(liveness.live_out[body], [0].into());
    }

    #[test]
    fn block_use_is_only_before_first_def() {
        // r0 written then read in the same block: not live-in.
        let mut cfg: Cfg<TestInst> = Cfg::new();
        let body = cfg.add_block("body");
        cfg.add_edge(cfg.entry, body);
        cfg.add_edge(body, cfg.exit);

        cfg.push(body, TestInst::new(&[0], &[]));
        cfg.push(body, TestInst::new(&[], &[0]));

        let liveness = Liveness::compute(&cfg);
        assert!(liveness.live_in[body].is_empty());
    }
}
