//! Basic blocks and the per-function control-flow graph

use serde::{Deserialize, Serialize};

/// Dense index of a block within one function's CFG
pub type BlockId = usize;

/// Identifier of a virtual register; allocated by the code generator
pub type VirtualRegId = u32;

/// Instructions expose the registers they read and write so the dataflow
/// layers can stay generic over the payload.
pub trait DefUse {
    fn defs(&self) -> Vec<VirtualRegId>;
    fn uses(&self) -> Vec<VirtualRegId>;
}

/// A straight-line instruction sequence with a single entry and exit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock<I> {
    pub id: BlockId,
    pub label: String,
    pub instructions: Vec<I>,
    pub successors: Vec<BlockId>,
    pub predecessors: Vec<BlockId>,
}

/// A per-function control-flow graph. The payload type is IR statements
/// straight out of the builder and machine instructions after selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cfg<I> {
    pub blocks: Vec<BasicBlock<I>>,
    pub entry: BlockId,
    pub exit: BlockId,
}

impl<I> Cfg<I> {
    /// An empty graph with just entry and exit blocks.
    pub fn new() -> Self {
        let mut cfg = Self { blocks: Vec::new(), entry: 0, exit: 0 };
        cfg.entry = cfg.add_block("entry");
        cfg.exit = cfg.add_block("exit");
        cfg
    }

    /// Append a block; ids are dense from zero.
    pub fn add_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = self.blocks.len();
        self.blocks.push(BasicBlock {
            id,
            label: label.into(),
            instructions: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        });
        id
    }

    /// Add `from` → `to`, keeping both edge lists consistent. Duplicate
    /// edges are ignored.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        if !self.blocks[from].successors.contains(&to) {
            self.blocks[from].successors.push(to);
            self.blocks[to].predecessors.push(from);
        }
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock<I> {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock<I> {
        &mut self.blocks[id]
    }

    pub fn block_by_label(&self, label: &str) -> Option<&BasicBlock<I>> {
        self.blocks.iter().find(|b| b.label == label)
    }

    pub fn push(&mut self, block: BlockId, instruction: I) {
        self.blocks[block].instructions.push(instruction);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.blocks.iter().any(|b| b.label == label)
    }

    /// A graph with the same blocks, labels and edges but a different
    /// (empty) instruction payload. Instruction selection uses this to
    /// mirror the statement CFG into a machine-instruction CFG.
    pub fn map_structure<J>(&self) -> Cfg<J> {
        Cfg {
            blocks: self
                .blocks
                .iter()
                .map(|b| BasicBlock {
                    id: b.id,
                    label: b.label.clone(),
                    instructions: Vec::new(),
                    successors: b.successors.clone(),
                    predecessors: b.predecessors.clone(),
                })
                .collect(),
            entry: self.entry,
            exit: self.exit,
        }
    }
}

impl<I> Default for Cfg<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_stay_bidirectionally_consistent() {
        let mut cfg: Cfg<()> = Cfg::new();
        let a = cfg.add_block("a");
        cfg.add_edge(cfg.entry, a);
        cfg.add_edge(a, cfg.exit);
        cfg.add_edge(a, cfg.exit); // duplicate

        assert_eq!(cfg.block(cfg.entry).successors, vec![a]);
        assert_eq!(cfg.block(a).predecessors, vec![cfg.entry]);
        assert_eq!(cfg.block(a).successors, vec![cfg.exit]);
        assert_eq!(cfg.block(cfg.exit).predecessors, vec![a]);
    }

    #[test]
    fn block_ids_are_dense() {
        let mut cfg: Cfg<()> = Cfg::new();
        for i in 0..4 {
            cfg.add_block(format!("b{}", i));
        }
        for (expected, block) in cfg.blocks.iter().enumerate() {
            assert_eq!(block.id, expected);
        }
    }
}
