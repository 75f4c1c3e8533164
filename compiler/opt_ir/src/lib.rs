//! Mutable basic-block IR for the optimizer.
//!
//! This crate provides:
//!
//! - **Value model** ([`Function`], [`InstKind`], [`Type`]): an arena of
//!   blocks, instructions and SSA values where every value carries a
//!   use-list kept in lockstep with instruction operands.
//!
//! - **Mutation bridge** ([`PassContext`]): the only way a pass changes IR.
//!   Each operation checks its preconditions, mutates, and reports what it
//!   invalidated through [`InvalidationListener`].
//!
//! - **Builder** ([`Builder`]): typed instruction creation at a program
//!   point, inheriting the anchor's source location.
//!
//! - **Checks and dumps** ([`verify_function`], `Display for Function`).
//!
//! # Handles
//!
//! [`BlockId`], [`InstId`] and [`ValueId`] are plain indices. Instruction
//! slots are never reused, so a handle to an erased instruction stays
//! detectably stale instead of aliasing a newer instruction.

mod builder;
mod context;
mod error;
mod function;
mod graph;
mod inst;
mod print;
mod types;
mod verify;

#[cfg(test)]
mod test_helpers;

pub use builder::Builder;
pub use context::{EraseMode, Invalidation, InvalidationListener, PassContext};
pub use error::{IrError, Violation};
pub use function::{
    BlockId, BlockInsts, Function, InsertPoint, InstId, Location, Use, ValueDef, ValueId,
};
pub use graph::{compute_predecessors, successors};
pub use inst::{
    ApplyInst, BuiltinInst, BuiltinOp, CondFailInst, InstClass, InstKind, IntPredicate,
    MemoryBehavior, ResultTypes, TypedInst,
};
pub use print::inst_to_string;
pub use types::{FunctionType, Type};
pub use verify::verify_function;
