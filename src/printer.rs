use std::fmt::{self, Display, Formatter};

use crate::dominators::DominatorTree;
use crate::graph::ControlFlowGraph;
use crate::ir::{Graph, Insn, Opcode};
use crate::BlockId;

const RULE: &str = "----------------------";

pub struct GraphPrinter<'a> {
    graph: &'a Graph,
}

impl<'a> GraphPrinter<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }
}

fn write_operands(f: &mut Formatter<'_>, insn: &Insn) -> fmt::Result {
    let mut sep = "";
    for operand in &insn.operands {
        write!(f, "{sep}{operand}")?;
        sep = ", ";
    }
    Ok(())
}

impl<'a> GraphPrinter<'a> {
    fn write_insn(&self, f: &mut Formatter<'_>, insn: &Insn) -> fmt::Result {
        let Insn { id, opcode, operands } = insn;
        let mnemonic = opcode.mnemonic();
        match opcode {
            Opcode::Jump(target) => write!(f, "{mnemonic} -> {target}"),
            Opcode::CondJump(iftrue, iffalse) => {
                write!(f, "{mnemonic} ")?;
                write_operands(f, insn)?;
                write!(f, " -> {iftrue}, {iffalse}")
            }
            Opcode::Return if operands.is_empty() => write!(f, "{mnemonic}"),
            Opcode::Const(value) => write!(f, "{id} = {mnemonic} {value}"),
            Opcode::Param(index) => write!(f, "{id} = {mnemonic} #{index}"),
            Opcode::Phi(_) => {
                write!(f, "{id} = {mnemonic} [ ")?;
                let mut sep = "";
                for (value, pred) in self.graph.phi_incoming(*id) {
                    write!(f, "{sep}[ {value}, %{pred} ]")?;
                    sep = ", ";
                }
                write!(f, " ]")
            }
            Opcode::Binary(_) | Opcode::Return | Opcode::Mov | Opcode::Cast => {
                write!(f, "{id} = {mnemonic} ")?;
                write_operands(f, insn)
            }
        }
    }
}

impl<'a> Display for GraphPrinter<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let graph = self.graph;
        writeln!(f, "Function Graph: {}", graph.name())?;
        writeln!(f, "{RULE}")?;
        for block in graph.blocks() {
            write!(f, "{} ({}):", block.id, block.label)?;
            let mut sep = "  ; preds = ";
            for pred in block.preds() {
                write!(f, "{sep}%{pred}")?;
                sep = ", ";
            }
            writeln!(f)?;
            for insn_id in block.insns() {
                write!(f, "  ")?;
                self.write_insn(f, graph.insn(*insn_id))?;
                writeln!(f)?;
            }
        }
        writeln!(f, "{RULE}")
    }
}

/// Dumps a tree after `run`. If the run stopped with `NoConvergence`, blocks
/// the fixed point never reached print as `(no idom)` and no children are
/// listed.
pub struct DomTreePrinter<'t, 'a, G: ControlFlowGraph> {
    tree: &'t DominatorTree<'a, G>,
}

impl<'t, 'a, G: ControlFlowGraph> DomTreePrinter<'t, 'a, G> {
    pub fn new(tree: &'t DominatorTree<'a, G>) -> Self {
        Self { tree }
    }

    fn write_block(&self, f: &mut Formatter<'_>, block: BlockId) -> fmt::Result {
        match self.tree.graph().label(block) {
            Some(label) => write!(f, "{block} ({label})"),
            None => write!(f, "{block}"),
        }
    }
}

impl<'t, 'a, G: ControlFlowGraph> Display for DomTreePrinter<'t, 'a, G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let tree = self.tree;
        writeln!(f, "Reverse Post-Order (RPO):")?;
        for &block in tree.rpo() {
            write!(f, "  ")?;
            self.write_block(f, block)?;
            writeln!(f)?;
        }
        writeln!(f)?;

        writeln!(f, "Dominator Tree (Child -> Parent):")?;
        for &block in tree.rpo() {
            match tree.idom(block) {
                Some(idom) => writeln!(f, "  {block} -> {idom}")?,
                None => writeln!(f, "  {block} -> (no idom)")?,
            }
        }
        writeln!(f)?;

        writeln!(f, "Dominator Tree (Parent -> Children):")?;
        for &block in tree.rpo() {
            write!(f, "  {block} dominates {{ ")?;
            let mut sep = "";
            for child in tree.children(block) {
                write!(f, "{sep}{child}")?;
                sep = ", ";
            }
            writeln!(f, " }}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod printer_tests {
    use super::*;
    use crate::dominators::DomTreeConfig;
    use crate::error::DomError;
    use crate::ir::BinaryOp;
    use expect_test::{expect, Expect};

    fn check_graph(graph: &Graph, expect: Expect) {
        let actual = GraphPrinter::new(graph).to_string();
        expect.assert_eq(&actual);
    }

    #[test]
    fn test_factorial() {
        let graph = crate::factorial();
        check_graph(&graph, expect![[r#"
            Function Graph: factorial
            ----------------------
            BB0 (entry):
              i0 = param #0
              i1 = const 1
              i2 = const 2
              jmp -> BB1
            BB1 (loop.header):  ; preds = %BB0, %BB2
              i4 = phi [ [ i1, %BB0 ], [ i8, %BB2 ] ]
              i5 = phi [ [ i2, %BB0 ], [ i10, %BB2 ] ]
              i6 = cmp i5, i0
              cond_jump i6 -> BB2, BB3
            BB2 (loop.body):  ; preds = %BB1
              i8 = mul i4, i5
              i9 = const 1
              i10 = add i5, i9
              jmp -> BB1
            BB3 (exit):  ; preds = %BB1
              i12 = return i4
            ----------------------
        "#]]);
    }

    #[test]
    fn test_leaves_and_bare_return() {
        let mut graph = Graph::new("leaves");
        let a = graph.new_block("");
        let x = graph.push_const(a, -7);
        let y = graph.push_mov(a, x);
        let z = graph.push_cast(a, y);
        graph.push_binary(a, BinaryOp::Mul, z, z);
        graph.push_phi(a);
        graph.push_return(a, None);
        check_graph(&graph, expect![[r#"
            Function Graph: leaves
            ----------------------
            BB0 ():
              i0 = const -7
              i1 = mov i0
              i2 = cast i1
              i3 = mul i2, i2
              i4 = phi [  ]
              return
            ----------------------
        "#]]);
    }

    #[test]
    fn test_dom_tree_dump() {
        let graph = crate::factorial();
        let mut tree = DominatorTree::new(&graph);
        tree.run().unwrap();
        let actual = DomTreePrinter::new(&tree).to_string();
        expect![[r#"
            Reverse Post-Order (RPO):
              BB0 (entry)
              BB1 (loop.header)
              BB3 (exit)
              BB2 (loop.body)

            Dominator Tree (Child -> Parent):
              BB0 -> BB0
              BB1 -> BB0
              BB3 -> BB1
              BB2 -> BB1

            Dominator Tree (Parent -> Children):
              BB0 dominates { BB1 }
              BB1 dominates { BB3, BB2 }
              BB3 dominates {  }
              BB2 dominates {  }
        "#]].assert_eq(&actual);
    }

    #[test]
    fn test_dom_tree_dump_after_no_convergence() {
        let mut graph = Graph::new("chain");
        let a = graph.new_block("a");
        let b = graph.new_block("b");
        let c = graph.new_block("c");
        graph.set_entry(a);
        graph.push_jump(a, b);
        graph.push_jump(b, c);
        graph.push_return(c, None);
        graph.recompute_preds();
        let mut tree = DominatorTree::with_config(&graph, DomTreeConfig { max_passes: Some(0) });
        assert_eq!(tree.run(), Err(DomError::NoConvergence { passes: 0 }));
        let actual = DomTreePrinter::new(&tree).to_string();
        expect![[r#"
            Reverse Post-Order (RPO):
              BB0 (a)
              BB1 (b)
              BB2 (c)

            Dominator Tree (Child -> Parent):
              BB0 -> BB0
              BB1 -> (no idom)
              BB2 -> (no idom)

            Dominator Tree (Parent -> Children):
              BB0 dominates {  }
              BB1 dominates {  }
              BB2 dominates {  }
        "#]].assert_eq(&actual);
    }
}
