//! CFG queries derived from terminators.
//!
//! Successor and predecessor edges are never stored; they are recomputed
//! from each block's terminator so they cannot drift out of sync with it.

use rustc_hash::FxHashSet;
use smallvec::{smallvec, SmallVec};

use crate::function::{BlockId, Function};
use crate::inst::InstKind;

/// Successor blocks of `block`, in terminator operand order.
///
/// Returns an empty list for blocks that do not (yet) end in a branch.
pub fn successors(func: &Function, block: BlockId) -> SmallVec<[BlockId; 2]> {
    let Some(term) = func.terminator(block) else {
        return SmallVec::new();
    };
    match func.kind(term) {
        InstKind::Br { target } => smallvec![*target],
        InstKind::CondBr {
            then_block,
            else_block,
            ..
        } => smallvec![*then_block, *else_block],
        _ => SmallVec::new(),
    }
}

/// Compute the predecessor list for each block (deduplicated).
///
/// Returns a vector indexed by block index, where each entry lists the
/// distinct predecessors in layout order.
pub fn compute_predecessors(func: &Function) -> Vec<Vec<BlockId>> {
    let num_blocks = func.num_blocks();
    let mut predecessors: Vec<Vec<BlockId>> = vec![Vec::new(); num_blocks];

    for block in func.blocks() {
        let mut seen = FxHashSet::default();
        for succ in successors(func, block) {
            if succ.index() < num_blocks && seen.insert(succ) {
                predecessors[succ.index()].push(block);
            }
        }
    }

    predecessors
}
