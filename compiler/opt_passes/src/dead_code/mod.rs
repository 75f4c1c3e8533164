//! Dead code elimination.
//!
//! An instruction is trivially dead when removing it cannot be observed:
//! it has no side effects, reads no memory, is not a terminator, and every
//! use of its results is a debug-only observation. A conditional trap on
//! the literal 0 is dead as well.
//!
//! Instructions are visited in reverse layout order so users are removed
//! before their operands. The operands of each removed instruction are
//! queued again, since they may just have lost their last use.

use opt_ir::{EraseMode, Function, InstId, InstKind, IrError, PassContext};
use smallvec::SmallVec;

use crate::runner::FunctionPass;
use crate::simplify_cond_fail::constant_value;

/// Registered as `dead-code-elim`.
pub static DEAD_CODE_ELIM: FunctionPass = FunctionPass::new("dead-code-elim", eliminate_dead_code);

/// Erase every trivially dead instruction of the function.
pub fn eliminate_dead_code(ctx: &mut PassContext<'_>) -> Result<(), IrError> {
    let func = ctx.function();
    let mut worklist: Vec<InstId> = func
        .blocks()
        .flat_map(|block| func.insts(block))
        .collect();

    let mut erased = 0usize;
    while let Some(inst) = worklist.pop() {
        let func = ctx.function();
        if !func.is_live(inst) || !is_trivially_dead(func, inst) {
            continue;
        }
        let producers: SmallVec<[InstId; 4]> = func
            .operands(inst)
            .iter()
            .filter_map(|&operand| func.defining_inst(operand))
            .collect();
        ctx.erase_instruction(inst, EraseMode::IncludingDebugOnlyUses)?;
        erased += 1;
        worklist.extend(producers);
    }

    if erased > 0 {
        tracing::debug!(
            function = ctx.function().name(),
            erased,
            "removed dead instructions"
        );
    }
    Ok(())
}

/// Returns `true` if `inst` can be erased without any observable change.
pub fn is_trivially_dead(func: &Function, inst: InstId) -> bool {
    let kind = func.kind(inst);
    if let InstKind::CondFail { .. } = kind {
        return constant_value(func, func.operand(inst, 0)) == Some(0);
    }
    if kind.is_terminator()
        || kind.is_debug_only()
        || kind.may_have_side_effects()
        || kind.may_read_from_memory()
    {
        return false;
    }
    func.results(inst).iter().all(|&result| {
        func.uses(result)
            .iter()
            .all(|u| func.kind(u.user).is_debug_only())
    })
}
