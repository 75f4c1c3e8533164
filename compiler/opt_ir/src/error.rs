//! Invariant-violation errors raised by IR mutation.
//!
//! Nothing in this crate produces user-facing diagnostics. Every error here
//! is a pass-authoring bug: the IR was already type-checked upstream, so a
//! failure means a transform broke a contract. Bridge operations validate
//! before mutating, so an `Err` always leaves the IR untouched.

use crate::function::{BlockId, InstId, ValueId};
use crate::types::Type;

/// A broken structural invariant of the IR graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// Erasing an instruction whose results are still used by something
    /// other than debug-only observations.
    #[error("erasing instruction with live non-debug uses ({inst}, {uses} use(s))")]
    LiveUses { inst: InstId, uses: usize },

    /// Operand slot does not exist on the instruction.
    #[error("operand index {index} out of range for {inst} ({len} operand(s))")]
    OperandOutOfRange { inst: InstId, index: usize, len: usize },

    /// Handle refers to an instruction that was already erased.
    #[error("stale handle: {0} has been erased")]
    StaleInstruction(InstId),

    /// Block handle does not belong to this function.
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),

    /// Value handle does not belong to this function, or its defining
    /// instruction has been erased.
    #[error("unknown or dead value {0}")]
    UnknownValue(ValueId),

    /// Erasing a terminator would leave the block without one.
    #[error("erasing terminator {inst} of {block} without a replacement terminator")]
    MissingTerminator { block: BlockId, inst: InstId },

    /// Instruction placement would put a terminator before the end of the
    /// block, or an ordinary instruction after the terminator.
    #[error("terminator must be the last instruction of {block}")]
    TerminatorNotLast { block: BlockId },

    /// An instruction handle was narrowed to a kind it does not have.
    #[error("expected `{expected}` instruction, found `{found}` ({inst})")]
    KindMismatch {
        inst: InstId,
        expected: &'static str,
        found: &'static str,
    },

    /// Wrong number of operands for an instruction kind.
    #[error("`{kind}` expects {expected} operand(s), found {found}")]
    ArityMismatch {
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    /// An instruction that was expected to produce a value produced none.
    #[error("`{kind}` produces no result value")]
    NoResult { kind: &'static str },

    /// A value's use-list disagrees with the operands that reference it.
    #[error("use-list of {value} is out of sync with operands")]
    UseListCorrupted { value: ValueId },

    /// The block's last instruction is not a terminator.
    #[error("{0} does not end in a terminator")]
    Unterminated(BlockId),

    /// The block has no instructions at all.
    #[error("{0} is empty")]
    EmptyBlock(BlockId),

    /// Branch passes the wrong number of arguments to its target.
    #[error("branch to {target} passes {found} argument(s), block takes {expected}")]
    BranchArity {
        target: BlockId,
        expected: usize,
        found: usize,
    },

    /// Layout links (`prev`/`next`) of a block are inconsistent.
    #[error("instruction links of {0} are inconsistent")]
    BrokenLayout(BlockId),
}

/// Error raised by IR mutation, construction and verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] Violation),

    /// A value of type `found` was used where `expected` is required.
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch { expected: Type, found: Type },
}

impl IrError {
    pub(crate) fn type_mismatch(expected: &Type, found: &Type) -> Self {
        IrError::TypeMismatch {
            expected: expected.clone(),
            found: found.clone(),
        }
    }
}
