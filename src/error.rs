use thiserror::Error;

use crate::{BlockId, InsnId};

/// Reasons a dominator tree analysis refuses to produce results.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("graph has no start block")]
    MissingEntry,

    #[error("predecessor lists are stale; recompute them before running the analysis")]
    StalePreds,

    #[error("immediate dominators did not converge after {passes} passes")]
    NoConvergence { passes: usize },
}

/// A single structural problem found by [`crate::verify::verify`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("graph has no start block")]
    MissingEntry,

    #[error("predecessor lists are stale")]
    StalePreds,

    #[error("{block} does not end in a terminator")]
    MissingTerminator { block: BlockId },

    #[error("{insn} in {block} is a terminator but not the last instruction")]
    TerminatorNotLast { block: BlockId, insn: InsnId },

    #[error("start block {entry} has predecessors")]
    EntryHasPreds { entry: BlockId },

    #[error("incoming blocks of {phi} do not match the predecessors of {block}")]
    PhiPredMismatch { phi: InsnId, block: BlockId },

    #[error("{insn} has the wrong number of operands")]
    BadArity { insn: InsnId },
}
