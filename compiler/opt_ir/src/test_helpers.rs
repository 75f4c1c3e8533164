//! Shared test utilities for the IR modules.
//!
//! Only compiled in test builds.

use crate::function::{BlockId, Function, InstId, Location, ValueId};
use crate::inst::{BuiltinOp, InstKind};
use crate::types::Type;

/// A function with one entry block taking `n` Boolean arguments and no
/// instructions.
pub(crate) fn bool_args_func(n: usize) -> (Function, BlockId, Vec<ValueId>) {
    let mut func = Function::new("test");
    let block = func.add_block(std::iter::repeat(Type::BOOL).take(n));
    let args = func.block_args(block).to_vec();
    (func, block, args)
}

/// Location `n..n+1`, to tell instructions apart.
pub(crate) fn loc(n: u32) -> Location {
    Location::new(n, n + 1)
}

/// Append `kind` at the end of `block`.
pub(crate) fn append(func: &mut Function, block: BlockId, kind: InstKind, ops: &[ValueId]) -> InstId {
    func.append_inst(block, kind, ops, Location::UNKNOWN)
        .unwrap_or_else(|e| panic!("append failed: {e}"))
}

pub(crate) fn append_cond_fail(func: &mut Function, block: BlockId, cond: ValueId, msg: &str) -> InstId {
    append(
        func,
        block,
        InstKind::CondFail {
            message: msg.to_owned(),
        },
        &[cond],
    )
}

pub(crate) fn append_literal(func: &mut Function, block: BlockId, value: i64, bits: u16) -> ValueId {
    let inst = append(func, block, InstKind::IntegerLiteral { value, bits }, &[]);
    func.result(inst).unwrap_or_else(|| panic!("literal has a result"))
}

pub(crate) fn append_or(func: &mut Function, block: BlockId, lhs: ValueId, rhs: ValueId) -> ValueId {
    let inst = append(func, block, InstKind::Builtin(BuiltinOp::Or), &[lhs, rhs]);
    func.result(inst).unwrap_or_else(|| panic!("builtin has a result"))
}

/// Terminate `block` with `return ()`.
pub(crate) fn append_return_unit(func: &mut Function, block: BlockId) -> InstId {
    let unit = append(func, block, InstKind::Tuple, &[]);
    let unit = func.result(unit).unwrap_or_else(|| panic!("tuple has a result"));
    append(func, block, InstKind::Return, &[unit])
}

/// Instruction mnemonics of `block`, in layout order.
pub(crate) fn mnemonics(func: &Function, block: BlockId) -> Vec<&'static str> {
    func.insts(block).map(|i| func.kind(i).mnemonic()).collect()
}
