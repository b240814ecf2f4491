//! Interference graph construction

use crate::{Cfg, DefUse, Liveness, VirtualRegId};
use std::collections::{BTreeMap, BTreeSet};

/// Undirected graph of virtual registers that are simultaneously live.
/// Adjacency is kept in ordered maps so traversal order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct InterferenceGraph {
    adjacency: BTreeMap<VirtualRegId, BTreeSet<VirtualRegId>>,
}

impl InterferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk each block backward from its live-out set; every definition
    /// interferes with everything live across it.
    pub fn build<I: DefUse>(cfg: &Cfg<I>, liveness: &Liveness) -> Self {
        let mut graph = Self::new();

        for block in &cfg.blocks {
            let mut live: BTreeSet<VirtualRegId> = liveness.live_out[block.id].clone();

            for instr in block.instructions.iter().rev() {
                let defs = instr.defs();
                for &d in &defs {
                    graph.add_node(d);
                    for &other in live.iter() {
                        graph.add_edge(d, other);
                    }
                    // Simultaneous definitions interfere with each other.
                    for &d2 in &defs {
                        graph.add_edge(d, d2);
                    }
                }

                for d in defs {
                    live.remove(&d);
                }
                for u in instr.uses() {
                    graph.add_node(u);
                    live.insert(u);
                }
            }
        }

        graph
    }

    pub fn add_node(&mut self, node: VirtualRegId) {
        self.adjacency.entry(node).or_default();
    }

    /// Add the undirected edge (u, v); self-loops are discarded.
    pub fn add_edge(&mut self, u: VirtualRegId, v: VirtualRegId) {
        if u == v {
            return;
        }
        self.adjacency.entry(u).or_default().insert(v);
        self.adjacency.entry(v).or_default().insert(u);
    }

    pub fn interferes(&self, u: VirtualRegId, v: VirtualRegId) -> bool {
        self.adjacency.get(&u).is_some_and(|n| n.contains(&v))
    }

    pub fn neighbors(&self, node: VirtualRegId) -> impl Iterator<Item = VirtualRegId> + '_ {
        self.adjacency.get(&node).into_iter().flatten().copied()
    }

    pub fn degree(&self, node: VirtualRegId) -> usize {
        self.adjacency.get(&node).map_or(0, |n| n.len())
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = VirtualRegId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cfg, DefUse};

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

    fn diamond_graph() -> InterferenceGraph {
        // r0 and r1 are live at the same time; r2 only after both die.
        let mut cfg: Cfg<TestInst> = Cfg::new();
        let body = cfg.add_block("body");
        cfg.add_edge(cfg.entry, body);
        cfg.add_edge(body, cfg.exit);

        cfg.push(body, TestInst::new(&[0], &[]));
        cfg.push(body, TestInst::new(&[1], &[]));
        cfg.push(body, TestInst::new(&[2], &[0, 1]));
        cfg.push(body, TestInst::new(&[], &[2]));

        let liveness = Liveness::compute(&cfg);
        InterferenceGraph::build(&cfg, &liveness)
    }

    #[test]
    fn simultaneously_live_registers_interfere() {
        let graph = diamond_graph();
        assert!(graph.interferes(0, 1));
        assert!(!graph.interferes(0, 2));
        assert!(!graph.interferes(1, 2));
    }

    #[test]
    fn edges_are_symmetric_without_self_loops() {
        let graph = diamond_graph();
        for u in graph.nodes() {
            for v in graph.neighbors(u) {
                assert_ne!(u, v, "self loop on r{}", u);
                assert!(graph.interferes(v, u), "missing reverse edge ({}, {})", v, u);
            }
        }
    }

    #[test]
    fn dead_definition_still_becomes_a_node() {
        let mut cfg: Cfg<TestInst> = Cfg::new();
        let body = cfg.add_block("body");
        cfg.add_edge(cfg.entry, body);
        cfg.add_edge(body, cfg.exit);
        cfg.push(body, TestInst::new(&[7], &[]));

        let liveness = Liveness::compute(&cfg);
        let graph = InterferenceGraph::build(&cfg, &liveness);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.degree(7), 0);
    }
}
