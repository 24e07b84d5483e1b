//! Immediate dominators and the dominator tree, computed with the iterative
//! algorithm from Cooper, Harvey and Kennedy, "A Simple, Fast Dominance
//! Algorithm".
//!
//! The analysis runs in three phases over a borrowed graph: reverse post-order
//! from the entry, the idom fixed point, then the parent to children lists.
//! Blocks not reachable from the entry never get an idom.

use tracing::{debug, trace, warn};

use crate::error::DomError;
use crate::graph::ControlFlowGraph;
use crate::ir::Successors;
use crate::{BlockId, BlockSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomTreeConfig {
    /// Ceiling on fixed-point passes. `None` derives it from the number of
    /// reachable blocks.
    pub max_passes: Option<usize>,
}

impl DomTreeConfig {
    fn pass_limit(&self, num_reachable: usize) -> usize {
        self.max_passes.unwrap_or(2 * num_reachable + 3)
    }
}

pub struct DominatorTree<'a, G: ControlFlowGraph> {
    graph: &'a G,
    config: DomTreeConfig,
    entry: Option<BlockId>,
    rpo: Vec<BlockId>,
    rpo_index: Vec<Option<usize>>,
    idom: Vec<Option<BlockId>>,
    children: Vec<Vec<BlockId>>,
}

impl<'a, G: ControlFlowGraph> DominatorTree<'a, G> {
    pub fn new(graph: &'a G) -> Self {
        Self::with_config(graph, DomTreeConfig::default())
    }

    pub fn with_config(graph: &'a G, config: DomTreeConfig) -> Self {
        DominatorTree {
            graph,
            config,
            entry: None,
            rpo: vec![],
            rpo_index: vec![],
            idom: vec![],
            children: vec![],
        }
    }

    pub fn graph(&self) -> &'a G {
        self.graph
    }

    /// Computes everything from scratch. Queries before a successful run see
    /// an empty tree.
    pub fn run(&mut self) -> Result<(), DomError> {
        let num_blocks = self.graph.num_blocks();
        self.entry = None;
        self.rpo.clear();
        self.rpo_index = vec![None; num_blocks];
        self.idom = vec![None; num_blocks];
        self.children = vec![vec![]; num_blocks];

        let entry = self.graph.entry().ok_or(DomError::MissingEntry)?;
        if self.graph.preds_stale() {
            return Err(DomError::StalePreds);
        }
        self.entry = Some(entry);
        self.compute_rpo(entry);
        self.compute_idoms(entry)?;
        self.build_tree();
        Ok(())
    }

    fn compute_rpo(&mut self, entry: BlockId) {
        self.po_from(entry);
        self.rpo.reverse();
        for (idx, block) in self.rpo.iter().enumerate() {
            self.rpo_index[block.0] = Some(idx);
        }
    }

    /// Depth-first post-order from `block`. Each frame holds a block, its
    /// successors and the index of the next successor to visit, so the stack
    /// lives on the heap however long the paths get.
    fn po_from(&mut self, block: BlockId) {
        let mut visited = BlockSet::new();
        let mut stack: Vec<(BlockId, Successors, usize)> = vec![];
        visited.insert(block);
        stack.push((block, self.graph.succs(block), 0));
        while let Some((current, succs, next)) = stack.last_mut() {
            if let Some(&succ) = succs.get(*next) {
                *next += 1;
                if visited.insert(succ) {
                    stack.push((succ, self.graph.succs(succ), 0));
                }
            } else {
                self.rpo.push(*current);
                stack.pop();
            }
        }
    }

    fn compute_idoms(&mut self, entry: BlockId) -> Result<(), DomError> {
        let graph = self.graph;
        let limit = self.config.pass_limit(self.rpo.len());
        self.idom[entry.0] = Some(entry);
        let mut passes = 0;
        loop {
            if passes == limit {
                warn!(passes, blocks = self.rpo.len(), "immediate dominators did not converge");
                return Err(DomError::NoConvergence { passes });
            }
            passes += 1;
            let mut changed = false;
            for idx in 0..self.rpo.len() {
                let block = self.rpo[idx];
                if block == entry { continue; }
                let mut processed = graph.preds(block).iter().copied()
                    .filter(|pred| self.idom[pred.0].is_some());
                let Some(first) = processed.next() else { continue; };
                let mut new_idom = first;
                for pred in processed {
                    if pred != new_idom {
                        new_idom = self.intersect(pred, new_idom);
                    }
                }
                if self.idom[block.0] != Some(new_idom) {
                    self.idom[block.0] = Some(new_idom);
                    changed = true;
                }
            }
            trace!(pass = passes, changed, "idom pass");
            if !changed { break; }
        }
        debug!(passes, blocks = self.rpo.len(), "immediate dominators converged");
        Ok(())
    }

    /// Nearest common dominator of two processed blocks. Each step walks the
    /// deeper finger (greater RPO index) up to its idom.
    fn intersect(&self, left: BlockId, right: BlockId) -> BlockId {
        let mut finger1 = left;
        let mut finger2 = right;
        while finger1 != finger2 {
            while self.rank(finger1) > self.rank(finger2) {
                finger1 = self.parent(finger1);
            }
            while self.rank(finger2) > self.rank(finger1) {
                finger2 = self.parent(finger2);
            }
        }
        finger1
    }

    fn rank(&self, block: BlockId) -> usize {
        match self.rpo_index[block.0] {
            Some(idx) => idx,
            None => unreachable!("{block} has an idom but is not in RPO"),
        }
    }

    fn parent(&self, block: BlockId) -> BlockId {
        match self.idom[block.0] {
            Some(idom) => idom,
            None => unreachable!("{block} is on an idom chain without an idom"),
        }
    }

    fn build_tree(&mut self) {
        for &block in &self.rpo {
            match self.idom[block.0] {
                Some(parent) if parent != block => self.children[parent.0].push(block),
                _ => {}
            }
        }
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    /// Reachable blocks in reverse post-order; the entry comes first.
    pub fn rpo(&self) -> &[BlockId] {
        &self.rpo
    }

    pub fn rpo_index(&self, block: BlockId) -> Option<usize> {
        self.rpo_index.get(block.0).copied().flatten()
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.rpo_index(block).is_some()
    }

    /// The entry is its own idom. Unreached blocks have none.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(block.0).copied().flatten()
    }

    /// Dominator tree children of `block`, in RPO order.
    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.children.get(block.0).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b { return true; }
        let Some(entry) = self.entry else { return false; };
        let mut current = b;
        while current != entry {
            match self.idom(current) {
                Some(idom) => current = idom,
                None => return false,
            }
            if current == a { return true; }
        }
        false
    }

    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// `block` and then each of its dominators up to and including the entry.
    /// Empty if `block` is unreached.
    pub fn dominators(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        let entry = self.entry;
        let first = if self.is_reachable(block) { Some(block) } else { None };
        std::iter::successors(first, move |&current| {
            if Some(current) == entry { None } else { self.idom(current) }
        })
    }

    /// Distance from the entry in the dominator tree.
    pub fn depth(&self, block: BlockId) -> Option<usize> {
        if !self.is_reachable(block) { return None; }
        Some(self.dominators(block).count() - 1)
    }
}
