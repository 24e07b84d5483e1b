use crate::ir::{Graph, Successors};
use crate::BlockId;

/// The read-only view of a control-flow graph that analyses run over.
pub trait ControlFlowGraph {
    fn entry(&self) -> Option<BlockId>;

    fn num_blocks(&self) -> usize;

    fn succs(&self, block: BlockId) -> Successors;

    fn preds(&self, block: BlockId) -> &[BlockId];

    /// Whether `preds` may disagree with `succs`.
    fn preds_stale(&self) -> bool {
        false
    }

    fn label(&self, _block: BlockId) -> Option<&str> {
        None
    }
}

impl ControlFlowGraph for Graph {
    fn entry(&self) -> Option<BlockId> {
        Graph::entry(self)
    }

    fn num_blocks(&self) -> usize {
        Graph::num_blocks(self)
    }

    fn succs(&self, block: BlockId) -> Successors {
        Graph::succs(self, block)
    }

    fn preds(&self, block: BlockId) -> &[BlockId] {
        Graph::preds(self, block)
    }

    fn preds_stale(&self) -> bool {
        Graph::preds_stale(self)
    }

    fn label(&self, block: BlockId) -> Option<&str> {
        Some(self.block(block).label.as_str())
    }
}
