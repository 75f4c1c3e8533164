//! Merge adjacent conditional traps.
//!
//! Within a block, a run of `cond_fail` instructions with the same message
//! and nothing observable between them traps if and only if the OR of their
//! conditions is true. Each such run is replaced by one trap:
//!
//! ```text
//! cond_fail %a, "m"          %or1 = builtin "or" (%a, %b)
//! cond_fail %b, "m"    ==>   %or2 = builtin "or" (%or1, %c)
//! cond_fail %c, "m"          cond_fail %or2, "m"
//! ```
//!
//! The new trap sits right after the last trap of the run, where every
//! condition is already defined, and takes that trap's location.
//!
//! # Barriers
//!
//! A run ends at any instruction that may have side effects or may read
//! memory, since moving a trap across it could change what is observable
//! when the trap fires. A trap with a different message also ends the run
//! and starts a new one, so traps are never reordered relative to each
//! other.
//!
//! Traps on the overflow flag of checked arithmetic are left alone: the
//! `arith + jump-on-overflow` pair lowers to a single branch on the CPU
//! flag, which merging would force into a register. Such a trap still
//! acts as a barrier.

use opt_ir::{
    BlockId, BuiltinOp, EraseMode, Function, InsertPoint, InstId, InstKind, IrError, PassContext,
    ValueId,
};

use crate::runner::FunctionPass;

/// Registered as `merge-cond-fails`.
pub static MERGE_COND_FAILS: FunctionPass = FunctionPass::new("merge-cond-fails", merge_cond_fails);

/// Traps collected for merging in the current block.
#[derive(Debug, Default)]
struct Worklist {
    message: String,
    traps: Vec<InstId>,
}

/// What a single instruction means for the current run.
enum Step {
    /// A mergeable trap. `restart` is set when its message differs from the
    /// run in progress.
    Trap { restart: bool },
    /// Ends the current run.
    Barrier,
    /// Pure instruction; the run continues across it.
    Transparent,
}

/// Merge conditional-trap runs in every block of the function.
pub fn merge_cond_fails(ctx: &mut PassContext<'_>) -> Result<(), IrError> {
    let blocks: Vec<BlockId> = ctx.function().blocks().collect();
    let mut worklist = Worklist::default();

    for block in blocks {
        let mut cursor = ctx.function().first_inst(block);
        while let Some(inst) = cursor {
            // Flushing only touches instructions before `inst`.
            cursor = ctx.function().next_inst(inst);

            match classify(ctx.function(), inst, &worklist) {
                Step::Trap { restart } => {
                    if restart {
                        flush(ctx, block, &mut worklist)?;
                    }
                    if worklist.traps.is_empty() {
                        worklist.message = trap_message(ctx.function(), inst).to_owned();
                    }
                    worklist.traps.push(inst);
                }
                Step::Barrier => flush(ctx, block, &mut worklist)?,
                Step::Transparent => {}
            }
        }
        flush(ctx, block, &mut worklist)?;
    }
    Ok(())
}

fn classify(func: &Function, inst: InstId, worklist: &Worklist) -> Step {
    let kind = func.kind(inst);
    if let InstKind::CondFail { message } = kind {
        if !is_overflow_check(func, func.operand(inst, 0)) {
            let restart = !worklist.traps.is_empty() && worklist.message != *message;
            return Step::Trap { restart };
        }
    }
    if kind.may_have_side_effects() || kind.may_read_from_memory() {
        Step::Barrier
    } else {
        Step::Transparent
    }
}

fn trap_message(func: &Function, inst: InstId) -> &str {
    match func.kind(inst) {
        InstKind::CondFail { message } => message,
        _ => "",
    }
}

/// `cond` is `tuple_extract` of a multi-result builtin, i.e. the overflow
/// flag of checked arithmetic.
fn is_overflow_check(func: &Function, cond: ValueId) -> bool {
    let Some(extract) = func.defining_inst(cond) else {
        return false;
    };
    if !matches!(func.kind(extract), InstKind::TupleExtract { .. }) {
        return false;
    }
    func.defining_inst(func.operand(extract, 0))
        .is_some_and(|producer| {
            matches!(func.kind(producer), InstKind::Builtin(op) if op.is_multi_result())
        })
}

/// Replace the collected traps with one trap on the OR of their conditions.
/// Runs of fewer than two traps are dropped unchanged.
fn flush(ctx: &mut PassContext<'_>, block: BlockId, worklist: &mut Worklist) -> Result<(), IrError> {
    let traps = std::mem::take(&mut worklist.traps);
    let message = std::mem::take(&mut worklist.message);
    if traps.len() < 2 {
        return Ok(());
    }

    let func = ctx.function();
    let conditions: Vec<ValueId> = traps.iter().map(|&trap| func.operand(trap, 0)).collect();
    let (Some(&last), Some((&first, rest))) = (traps.last(), conditions.split_first()) else {
        return Ok(());
    };

    let mut builder = ctx.builder(InsertPoint::After(last));
    let mut condition = first;
    for &next in rest {
        condition = builder.create_builtin(BuiltinOp::Or, condition, next)?;
    }
    let merged = builder.create_cond_fail(condition, message.as_str())?;

    for &trap in &traps {
        ctx.erase_instruction(trap, EraseMode::InstructionOnly)?;
    }

    tracing::debug!(
        function = ctx.function().name(),
        %block,
        %merged,
        merged_count = traps.len(),
        message = %message,
        "merged conditional traps",
    );
    Ok(())
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for concise assertions")]
mod tests;
