//! Drop conditional traps that can never fire.

use opt_ir::{CondFailInst, EraseMode, Function, InstKind, IrError, PassContext, TypedInst, ValueId};

use crate::runner::InstructionPass;

/// Registered as `simplify-cond-fail`.
pub static SIMPLIFY_COND_FAIL: InstructionPass<CondFailInst> =
    InstructionPass::new("simplify-cond-fail", simplify_cond_fail);

/// Erase `trap` if its condition is the literal 0. A literal 1 condition
/// always traps and is kept.
pub fn simplify_cond_fail(
    trap: TypedInst<CondFailInst>,
    ctx: &mut PassContext<'_>,
) -> Result<(), IrError> {
    let func = ctx.function();
    if constant_value(func, func.operand(trap.id(), 0)) != Some(0) {
        return Ok(());
    }
    tracing::debug!(
        function = func.name(),
        trap = %trap.id(),
        "removing conditional trap on constant false",
    );
    ctx.erase_instruction(trap.id(), EraseMode::InstructionOnly)
}

/// The value of `value` if it is produced by an integer literal.
pub(crate) fn constant_value(func: &Function, value: ValueId) -> Option<i64> {
    let inst = func.defining_inst(value)?;
    match func.kind(inst) {
        InstKind::IntegerLiteral { value, .. } => Some(*value),
        _ => None,
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
