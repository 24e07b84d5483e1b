use smallstr::SmallString;
use smallvec::{smallvec, SmallVec};
use tracing::debug;

use crate::{BlockId, InsnId};

pub type Operands = SmallVec<[InsnId; 2]>;
pub type Successors = SmallVec<[BlockId; 2]>;
pub type Label = SmallString<[u8; 16]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Mul,
    Cmp,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Mul => "mul",
            BinaryOp::Cmp => "cmp",
        }
    }
}

/// The operation an instruction performs. Block references live here; value
/// references live in the instruction's operand list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    Binary(BinaryOp),
    Jump(BlockId),
    CondJump(BlockId, BlockId),
    Return,
    /// Incoming blocks, parallel to the phi's operands.
    Phi(SmallVec<[BlockId; 2]>),
    Param(u32),
    Const(i64),
    Mov,
    Cast,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Binary(op) => op.mnemonic(),
            Opcode::Jump(_) => "jmp",
            Opcode::CondJump(..) => "cond_jump",
            Opcode::Return => "return",
            Opcode::Phi(_) => "phi",
            Opcode::Param(_) => "param",
            Opcode::Const(_) => "const",
            Opcode::Mov => "mov",
            Opcode::Cast => "cast",
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Opcode::Jump(_) | Opcode::CondJump(..) | Opcode::Return)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    pub id: InsnId,
    pub opcode: Opcode,
    pub operands: Operands,
}

impl Insn {
    pub fn succs(&self) -> Successors {
        match self.opcode {
            Opcode::Jump(target) => smallvec![target],
            Opcode::CondJump(iftrue, iffalse) => smallvec![iftrue, iffalse],
            _ => smallvec![],
        }
    }
}

#[derive(Debug)]
pub struct Block {
    pub id: BlockId,
    pub label: Label,
    insns: Vec<InsnId>,
    preds: Vec<BlockId>,
}

impl Block {
    fn new(id: BlockId, label: &str) -> Block {
        Block { id, label: label.into(), insns: vec![], preds: vec![] }
    }

    pub fn insns(&self) -> &[InsnId] {
        &self.insns
    }

    /// Cached predecessors, in the order [`Graph::recompute_preds`] found them.
    pub fn preds(&self) -> &[BlockId] {
        &self.preds
    }
}

/// A single function: an arena of blocks and the instructions they own.
#[derive(Debug)]
pub struct Graph {
    name: String,
    entry: Option<BlockId>,
    blocks: Vec<Block>,
    insns: Vec<Insn>,
    insn_block: Vec<BlockId>,
    preds_stale: bool,
}

impl Graph {
    pub fn new(name: &str) -> Graph {
        Graph {
            name: name.to_string(),
            entry: None,
            blocks: vec![],
            insns: vec![],
            insn_block: vec![],
            preds_stale: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn new_block(&mut self, label: &str) -> BlockId {
        let result = BlockId(self.blocks.len());
        self.blocks.push(Block::new(result, label));
        result
    }

    pub fn set_entry(&mut self, block: BlockId) {
        self.entry = Some(block);
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    pub fn block(&self, block: BlockId) -> &Block {
        &self.blocks[block.0]
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn insn(&self, insn: InsnId) -> &Insn {
        &self.insns[insn.0]
    }

    pub fn num_insns(&self) -> usize {
        self.insns.len()
    }

    /// The block that owns `insn`.
    pub fn insn_block(&self, insn: InsnId) -> BlockId {
        self.insn_block[insn.0]
    }

    /// Appends a new instruction to the end of `block`. Nothing stops a caller
    /// from appending past a terminator; [`crate::verify::verify`] reports it.
    pub fn push_insn(&mut self, block: BlockId, opcode: Opcode, operands: Operands) -> InsnId {
        let result = InsnId(self.insns.len());
        self.insns.push(Insn { id: result, opcode, operands });
        self.insn_block.push(block);
        self.blocks[block.0].insns.push(result);
        self.preds_stale = true;
        result
    }

    pub fn push_binary(&mut self, block: BlockId, op: BinaryOp, lhs: InsnId, rhs: InsnId) -> InsnId {
        self.push_insn(block, Opcode::Binary(op), smallvec![lhs, rhs])
    }

    pub fn push_const(&mut self, block: BlockId, value: i64) -> InsnId {
        self.push_insn(block, Opcode::Const(value), smallvec![])
    }

    pub fn push_param(&mut self, block: BlockId, index: u32) -> InsnId {
        self.push_insn(block, Opcode::Param(index), smallvec![])
    }

    pub fn push_mov(&mut self, block: BlockId, src: InsnId) -> InsnId {
        self.push_insn(block, Opcode::Mov, smallvec![src])
    }

    pub fn push_cast(&mut self, block: BlockId, src: InsnId) -> InsnId {
        self.push_insn(block, Opcode::Cast, smallvec![src])
    }

    pub fn push_jump(&mut self, block: BlockId, target: BlockId) -> InsnId {
        self.push_insn(block, Opcode::Jump(target), smallvec![])
    }

    pub fn push_cond_jump(&mut self, block: BlockId, cond: InsnId, iftrue: BlockId, iffalse: BlockId) -> InsnId {
        self.push_insn(block, Opcode::CondJump(iftrue, iffalse), smallvec![cond])
    }

    pub fn push_return(&mut self, block: BlockId, value: Option<InsnId>) -> InsnId {
        self.push_insn(block, Opcode::Return, value.into_iter().collect())
    }

    pub fn push_phi(&mut self, block: BlockId) -> InsnId {
        self.push_insn(block, Opcode::Phi(smallvec![]), smallvec![])
    }

    /// Registers `value` as flowing into `phi` when control arrives from `pred`.
    ///
    /// Panics if `phi` is not a phi.
    pub fn add_phi_incoming(&mut self, phi: InsnId, value: InsnId, pred: BlockId) {
        let insn = &mut self.insns[phi.0];
        match &mut insn.opcode {
            Opcode::Phi(blocks) => blocks.push(pred),
            other => panic!("{phi} is not a phi: {other:?}"),
        }
        insn.operands.push(value);
    }

    /// The `(value, pred)` pairs of `phi`, in registration order.
    ///
    /// Panics if `phi` is not a phi.
    pub fn phi_incoming(&self, phi: InsnId) -> impl Iterator<Item = (InsnId, BlockId)> + '_ {
        let insn = self.insn(phi);
        let Opcode::Phi(blocks) = &insn.opcode else {
            panic!("{phi} is not a phi: {:?}", insn.opcode);
        };
        insn.operands.iter().copied().zip(blocks.iter().copied())
    }

    /// The last instruction of `block`, whatever it is.
    pub fn terminator(&self, block: BlockId) -> Option<&Insn> {
        self.block(block).insns.last().map(|insn| self.insn(*insn))
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.terminator(block).is_some_and(|insn| insn.opcode.is_terminator())
    }

    pub fn succs(&self, block: BlockId) -> Successors {
        match self.terminator(block) {
            Some(insn) => insn.succs(),
            None => smallvec![],
        }
    }

    pub fn preds(&self, block: BlockId) -> &[BlockId] {
        self.block(block).preds()
    }

    pub fn preds_stale(&self) -> bool {
        self.preds_stale
    }

    /// Rebuilds every block's predecessor list from the terminators. Blocks are
    /// visited in creation order, so each list is ordered by predecessor id.
    pub fn recompute_preds(&mut self) {
        for block in &mut self.blocks {
            block.preds.clear();
        }
        let mut num_edges = 0;
        for idx in 0..self.blocks.len() {
            let block_id = BlockId(idx);
            for succ in self.succs(block_id) {
                self.blocks[succ.0].preds.push(block_id);
                num_edges += 1;
            }
        }
        self.preds_stale = false;
        debug!(graph = %self.name, blocks = self.blocks.len(), edges = num_edges, "recomputed predecessors");
    }
}

#[cfg(test)]
mod ir_tests {
    use super::*;

    fn diamond() -> (Graph, [BlockId; 4]) {
        let mut graph = Graph::new("diamond");
        let a = graph.new_block("a");
        let b = graph.new_block("b");
        let c = graph.new_block("c");
        let d = graph.new_block("d");
        graph.set_entry(a);
        let cond = graph.push_const(a, 1);
        graph.push_cond_jump(a, cond, b, c);
        graph.push_jump(b, d);
        graph.push_jump(c, d);
        graph.push_return(d, None);
        (graph, [a, b, c, d])
    }

    #[test]
    fn test_block_ids_are_sequential() {
        let mut graph = Graph::new("f");
        assert_eq!(usize::from(graph.new_block("x")), 0);
        assert_eq!(usize::from(graph.new_block("x")), 1);
        assert_eq!(usize::from(graph.new_block("")), 2);
        assert_eq!(graph.num_blocks(), 3);
        assert_eq!(graph.block(BlockId::from(1)).label, "x");
    }

    #[test]
    fn test_insn_ids_are_global_across_blocks() {
        let mut graph = Graph::new("f");
        let a = graph.new_block("a");
        let b = graph.new_block("b");
        let x = graph.push_const(a, 1);
        let y = graph.push_const(b, 2);
        let z = graph.push_binary(a, BinaryOp::Add, x, y);
        assert_eq!([x, y, z].map(usize::from), [0, 1, 2]);
        assert_eq!(graph.block(a).insns(), &[x, z]);
        assert_eq!(graph.block(b).insns(), &[y]);
        assert_eq!(graph.insn(z).operands.as_slice(), &[x, y]);
        assert_eq!(graph.insn_block(y), b);
    }

    #[test]
    fn test_entry_can_be_overwritten() {
        let mut graph = Graph::new("f");
        let a = graph.new_block("a");
        let b = graph.new_block("b");
        assert_eq!(graph.entry(), None);
        graph.set_entry(a);
        graph.set_entry(b);
        assert_eq!(graph.entry(), Some(b));
    }

    #[test]
    fn test_succs_follow_terminator() {
        let (graph, [a, b, c, d]) = diamond();
        assert_eq!(graph.succs(a).as_slice(), &[b, c]);
        assert_eq!(graph.succs(b).as_slice(), &[d]);
        assert!(graph.succs(d).is_empty());
    }

    #[test]
    fn test_empty_block_has_no_succs() {
        let mut graph = Graph::new("f");
        let a = graph.new_block("a");
        assert!(graph.succs(a).is_empty());
        assert!(graph.terminator(a).is_none());
        assert!(!graph.is_terminated(a));
    }

    #[test]
    fn test_non_terminator_last_has_no_succs() {
        let mut graph = Graph::new("f");
        let a = graph.new_block("a");
        let b = graph.new_block("b");
        graph.push_jump(a, b);
        graph.push_const(a, 3);
        assert!(graph.succs(a).is_empty());
        assert!(!graph.is_terminated(a));
    }

    #[test]
    fn test_cond_jump_to_same_block_keeps_duplicates() {
        let mut graph = Graph::new("f");
        let a = graph.new_block("a");
        let b = graph.new_block("b");
        let cond = graph.push_const(a, 0);
        graph.push_cond_jump(a, cond, b, b);
        graph.recompute_preds();
        assert_eq!(graph.succs(a).as_slice(), &[b, b]);
        assert_eq!(graph.preds(b), &[a, a]);
    }

    #[test]
    fn test_recompute_preds() {
        let (mut graph, [a, b, c, d]) = diamond();
        assert!(graph.preds_stale());
        graph.recompute_preds();
        assert!(!graph.preds_stale());
        assert!(graph.preds(a).is_empty());
        assert_eq!(graph.preds(b), &[a]);
        assert_eq!(graph.preds(c), &[a]);
        assert_eq!(graph.preds(d), &[b, c]);
    }

    #[test]
    fn test_recompute_preds_replaces_old_lists() {
        let (mut graph, [a, b, c, d]) = diamond();
        graph.recompute_preds();
        graph.recompute_preds();
        assert_eq!(graph.preds(d), &[b, c]);
        // Re-point c past its old jump; only the last instruction counts.
        graph.push_jump(c, b);
        assert!(graph.preds_stale());
        graph.recompute_preds();
        assert_eq!(graph.preds(b), &[a, c]);
        assert_eq!(graph.preds(d), &[b]);
    }

    #[test]
    fn test_phi_incoming() {
        let (mut graph, [_, b, c, d]) = diamond();
        let x = graph.push_const(b, 1);
        let y = graph.push_const(c, 2);
        let phi = graph.push_phi(d);
        graph.add_phi_incoming(phi, x, b);
        graph.add_phi_incoming(phi, y, c);
        assert_eq!(graph.phi_incoming(phi).collect::<Vec<_>>(), vec![(x, b), (y, c)]);
        assert_eq!(graph.insn(phi).operands.as_slice(), &[x, y]);
    }

    #[test]
    #[should_panic(expected = "is not a phi")]
    fn test_phi_incoming_on_non_phi_panics() {
        let (mut graph, [a, ..]) = diamond();
        let x = graph.push_const(a, 1);
        graph.add_phi_incoming(x, x, a);
    }

    #[test]
    fn test_return_operands() {
        let mut graph = Graph::new("f");
        let a = graph.new_block("a");
        let x = graph.push_param(a, 0);
        let ret = graph.push_return(a, Some(x));
        assert_eq!(graph.insn(ret).operands.as_slice(), &[x]);
        let bare = graph.push_return(a, None);
        assert!(graph.insn(bare).operands.is_empty());
    }
}
