//! Structural checks the graph builder does not enforce on its own: terminator
//! placement, operand counts, and phi incoming blocks against predecessors.

use tracing::warn;

use crate::error::VerifyError;
use crate::ir::{Graph, Insn, Opcode};
use crate::BlockSet;

/// Reports every problem found in `graph`. Checks that read predecessors are
/// skipped while the predecessor cache is stale.
pub fn verify(graph: &Graph) -> Result<(), Vec<VerifyError>> {
    let mut errors = vec![];
    let preds_fresh = !graph.preds_stale();
    if !preds_fresh {
        errors.push(VerifyError::StalePreds);
    }
    match graph.entry() {
        None => errors.push(VerifyError::MissingEntry),
        Some(entry) if preds_fresh && !graph.preds(entry).is_empty() => {
            errors.push(VerifyError::EntryHasPreds { entry });
        }
        Some(_) => {}
    }
    for block in graph.blocks() {
        if !graph.is_terminated(block.id) {
            errors.push(VerifyError::MissingTerminator { block: block.id });
        }
        let body = block.insns().split_last().map_or(&[][..], |(_, body)| body);
        for insn_id in body {
            if graph.insn(*insn_id).opcode.is_terminator() {
                errors.push(VerifyError::TerminatorNotLast { block: block.id, insn: *insn_id });
            }
        }
        let preds: BlockSet = block.preds().iter().copied().collect();
        for insn_id in block.insns() {
            let insn = graph.insn(*insn_id);
            if !has_valid_arity(insn) {
                errors.push(VerifyError::BadArity { insn: *insn_id });
            }
            if let Opcode::Phi(incoming) = &insn.opcode {
                let incoming: BlockSet = incoming.iter().copied().collect();
                if preds_fresh && incoming != preds {
                    errors.push(VerifyError::PhiPredMismatch { phi: *insn_id, block: block.id });
                }
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        warn!(graph = graph.name(), errors = errors.len(), "graph failed verification");
        Err(errors)
    }
}

fn has_valid_arity(insn: &Insn) -> bool {
    let num_operands = insn.operands.len();
    match &insn.opcode {
        Opcode::Binary(_) => num_operands == 2,
        Opcode::Mov | Opcode::Cast | Opcode::CondJump(..) => num_operands == 1,
        Opcode::Return => num_operands <= 1,
        Opcode::Const(_) | Opcode::Param(_) | Opcode::Jump(_) => num_operands == 0,
        Opcode::Phi(incoming) => num_operands == incoming.len(),
    }
}
