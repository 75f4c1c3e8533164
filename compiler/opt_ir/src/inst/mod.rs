//! Instruction kinds, their typing rules and their effect classification.
//!
//! Every instruction is an [`InstKind`] plus an operand list. The kind
//! decides how many operands are accepted, which types they must have, what
//! (at most one) result is produced, and how the instruction interacts with
//! memory. Passes treat [`InstKind::memory_behavior`] as an oracle: it is the
//! only source of truth for "may this be reordered across".

use std::marker::PhantomData;

use smallvec::{smallvec, SmallVec};

use crate::error::{IrError, Violation};
use crate::function::{BlockId, InstId};
use crate::types::Type;

/// Result types of an instruction. No kind produces more than one value.
pub type ResultTypes = SmallVec<[Type; 1]>;

// ── Builtins ────────────────────────────────────────────────────────

/// Integer comparison predicate for [`BuiltinOp::Cmp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl IntPredicate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Slt => "slt",
            Self::Sle => "sle",
            Self::Sgt => "sgt",
            Self::Sge => "sge",
            Self::Ult => "ult",
            Self::Ule => "ule",
            Self::Ugt => "ugt",
            Self::Uge => "uge",
        }
    }
}

/// Low-level builtin operation.
///
/// All builtins are binary over two integers of the same width. The
/// `*WithOverflow` family is multi-result: it yields `(IntN, Int1)`, the
/// wrapped value and the overflow flag, packed in a tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuiltinOp {
    And,
    Or,
    Xor,
    Add,
    Sub,
    Mul,
    Cmp(IntPredicate),
    SAddWithOverflow,
    UAddWithOverflow,
    SSubWithOverflow,
    USubWithOverflow,
    SMulWithOverflow,
    UMulWithOverflow,
}

impl BuiltinOp {
    /// Stable textual name, as printed in IR dumps.
    pub fn name(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Cmp(pred) => match pred {
                IntPredicate::Eq => "cmp_eq",
                IntPredicate::Ne => "cmp_ne",
                IntPredicate::Slt => "cmp_slt",
                IntPredicate::Sle => "cmp_sle",
                IntPredicate::Sgt => "cmp_sgt",
                IntPredicate::Sge => "cmp_sge",
                IntPredicate::Ult => "cmp_ult",
                IntPredicate::Ule => "cmp_ule",
                IntPredicate::Ugt => "cmp_ugt",
                IntPredicate::Uge => "cmp_uge",
            },
            Self::SAddWithOverflow => "sadd_with_overflow",
            Self::UAddWithOverflow => "uadd_with_overflow",
            Self::SSubWithOverflow => "ssub_with_overflow",
            Self::USubWithOverflow => "usub_with_overflow",
            Self::SMulWithOverflow => "smul_with_overflow",
            Self::UMulWithOverflow => "umul_with_overflow",
        }
    }

    /// Returns `true` for checked arithmetic producing `(value, overflow)`.
    pub fn is_multi_result(self) -> bool {
        matches!(
            self,
            Self::SAddWithOverflow
                | Self::UAddWithOverflow
                | Self::SSubWithOverflow
                | Self::USubWithOverflow
                | Self::SMulWithOverflow
                | Self::UMulWithOverflow
        )
    }

    fn result_type(self, operand: &Type) -> Type {
        match self {
            Self::Cmp(_) => Type::BOOL,
            op if op.is_multi_result() => Type::Tuple(vec![operand.clone(), Type::BOOL]),
            _ => operand.clone(),
        }
    }
}

// ── Memory behavior ─────────────────────────────────────────────────

/// How an instruction interacts with memory and the outside world.
///
/// Ordered from least to most constraining.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemoryBehavior {
    /// Pure computation.
    None,
    /// May read mutable memory.
    MayRead,
    /// May write memory.
    MayWrite,
    /// May read and write memory.
    MayReadWrite,
    /// Anything else observable: traps, calls, deallocation, refcounting.
    MayHaveSideEffects,
}

impl MemoryBehavior {
    pub fn may_read(self) -> bool {
        matches!(
            self,
            Self::MayRead | Self::MayReadWrite | Self::MayHaveSideEffects
        )
    }

    pub fn may_write(self) -> bool {
        matches!(
            self,
            Self::MayWrite | Self::MayReadWrite | Self::MayHaveSideEffects
        )
    }
}

// ── Instruction kinds ───────────────────────────────────────────────

/// The operation an instruction performs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstKind {
    /// Integer constant: `%r = integer_literal $IntN, value`.
    IntegerLiteral { value: i64, bits: u16 },
    /// Builtin operation on two integers.
    Builtin(BuiltinOp),
    /// Tuple construction from its operands.
    Tuple,
    /// Extract element `field` from a tuple operand.
    TupleExtract { field: u32 },
    /// Reference to a function symbol.
    FunctionRef { symbol: String, ty: Type },
    /// Call. Operand 0 is the callee, the rest are arguments.
    Apply,
    /// Allocate a stack slot for a value of type `ty`.
    AllocStack { ty: Type },
    /// Release a stack slot.
    DeallocStack,
    /// `%r = load %addr`.
    Load,
    /// `store %value to %addr`.
    Store,
    StrongRetain,
    StrongRelease,
    /// Keeps its operand alive up to this point.
    FixLifetime,
    /// Debug-info observation of a value. No semantic effect.
    DebugValue { name: String },
    /// Trap with `message` if the Boolean operand is true.
    CondFail { message: String },

    // ── Terminators ─────────────────────────────────────────────
    /// Unconditional branch. Operands are the target's block arguments.
    Br { target: BlockId },
    /// Conditional branch. Operand 0 is the condition, followed by
    /// `then_args` arguments for `then_block`, then the arguments for
    /// `else_block`.
    CondBr {
        then_block: BlockId,
        else_block: BlockId,
        then_args: u32,
    },
    /// Return the single operand.
    Return,
    Unreachable,
}

impl InstKind {
    /// Mnemonic used in IR dumps and error messages.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstKind::IntegerLiteral { .. } => "integer_literal",
            InstKind::Builtin(_) => "builtin",
            InstKind::Tuple => "tuple",
            InstKind::TupleExtract { .. } => "tuple_extract",
            InstKind::FunctionRef { .. } => "function_ref",
            InstKind::Apply => "apply",
            InstKind::AllocStack { .. } => "alloc_stack",
            InstKind::DeallocStack => "dealloc_stack",
            InstKind::Load => "load",
            InstKind::Store => "store",
            InstKind::StrongRetain => "strong_retain",
            InstKind::StrongRelease => "strong_release",
            InstKind::FixLifetime => "fix_lifetime",
            InstKind::DebugValue { .. } => "debug_value",
            InstKind::CondFail { .. } => "cond_fail",
            InstKind::Br { .. } => "br",
            InstKind::CondBr { .. } => "cond_br",
            InstKind::Return => "return",
            InstKind::Unreachable => "unreachable",
        }
    }

    #[inline]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Br { .. } | InstKind::CondBr { .. } | InstKind::Return | InstKind::Unreachable
        )
    }

    /// Call-like instructions affect the shape of the call graph.
    #[inline]
    pub fn is_call_like(&self) -> bool {
        matches!(self, InstKind::Apply)
    }

    /// Index of the callee operand of a call-like instruction.
    #[inline]
    pub fn callee_operand(&self) -> Option<usize> {
        self.is_call_like().then_some(0)
    }

    /// Debug-only observers have no control- or data-flow effect and may be
    /// dropped together with the value they observe.
    #[inline]
    pub fn is_debug_only(&self) -> bool {
        matches!(self, InstKind::DebugValue { .. })
    }

    pub fn memory_behavior(&self) -> MemoryBehavior {
        match self {
            InstKind::IntegerLiteral { .. }
            | InstKind::Builtin(_)
            | InstKind::Tuple
            | InstKind::TupleExtract { .. }
            | InstKind::FunctionRef { .. }
            | InstKind::AllocStack { .. }
            | InstKind::DebugValue { .. }
            | InstKind::Br { .. }
            | InstKind::CondBr { .. }
            | InstKind::Return
            | InstKind::Unreachable => MemoryBehavior::None,

            InstKind::Load => MemoryBehavior::MayRead,
            InstKind::Store => MemoryBehavior::MayWrite,

            InstKind::Apply
            | InstKind::DeallocStack
            | InstKind::StrongRetain
            | InstKind::StrongRelease
            | InstKind::FixLifetime
            | InstKind::CondFail { .. } => MemoryBehavior::MayHaveSideEffects,
        }
    }

    /// A trapping instruction or a memory write is an externally
    /// observable effect.
    #[inline]
    pub fn may_have_side_effects(&self) -> bool {
        self.memory_behavior().may_write()
    }

    #[inline]
    pub fn may_read_from_memory(&self) -> bool {
        self.memory_behavior().may_read()
    }

    #[inline]
    pub fn may_trap(&self) -> bool {
        matches!(self, InstKind::CondFail { .. })
    }

    /// Check operand types and compute the result type.
    ///
    /// Branch-argument checks need the target block's signature and are
    /// done by the function (see `Function::check_operands`).
    pub fn infer_results(&self, operands: &[&Type]) -> Result<ResultTypes, IrError> {
        match self {
            InstKind::IntegerLiteral { bits, .. } => {
                self.expect_arity(operands, 0)?;
                Ok(smallvec![Type::Int(*bits)])
            }
            InstKind::Builtin(op) => {
                self.expect_arity(operands, 2)?;
                let (lhs, rhs) = (operands[0], operands[1]);
                if lhs.int_width().is_none() {
                    return Err(IrError::type_mismatch(&Type::Int(64), lhs));
                }
                if rhs != lhs {
                    return Err(IrError::type_mismatch(lhs, rhs));
                }
                Ok(smallvec![op.result_type(lhs)])
            }
            InstKind::Tuple => Ok(smallvec![Type::Tuple(
                operands.iter().map(|&ty| ty.clone()).collect()
            )]),
            InstKind::TupleExtract { field } => {
                self.expect_arity(operands, 1)?;
                match operands[0] {
                    Type::Tuple(elems) => elems
                        .get(*field as usize)
                        .map(|elem| smallvec![elem.clone()])
                        .ok_or_else(|| IrError::type_mismatch(&Type::unit(), operands[0])),
                    other => Err(IrError::type_mismatch(&Type::unit(), other)),
                }
            }
            InstKind::FunctionRef { ty, .. } => {
                self.expect_arity(operands, 0)?;
                if !matches!(ty, Type::Function(_)) {
                    return Err(IrError::type_mismatch(
                        &Type::function(Vec::new(), Type::unit()),
                        ty,
                    ));
                }
                Ok(smallvec![ty.clone()])
            }
            InstKind::Apply => {
                let Some((callee, args)) = operands.split_first() else {
                    return Err(self.arity_error(1, 0));
                };
                let Type::Function(sig) = callee else {
                    return Err(IrError::type_mismatch(
                        &Type::function(Vec::new(), Type::unit()),
                        callee,
                    ));
                };
                if sig.params.len() != args.len() {
                    return Err(self.arity_error(sig.params.len() + 1, operands.len()));
                }
                for (param, &arg) in sig.params.iter().zip(args) {
                    if !arg.is_assignable_to(param) {
                        return Err(IrError::type_mismatch(param, arg));
                    }
                }
                Ok(smallvec![sig.result.clone()])
            }
            InstKind::AllocStack { ty } => {
                self.expect_arity(operands, 0)?;
                Ok(smallvec![Type::address_of(ty.clone())])
            }
            InstKind::DeallocStack => {
                self.expect_arity(operands, 1)?;
                expect_address(operands[0])?;
                Ok(SmallVec::new())
            }
            InstKind::Load => {
                self.expect_arity(operands, 1)?;
                Ok(smallvec![expect_address(operands[0])?.clone()])
            }
            InstKind::Store => {
                self.expect_arity(operands, 2)?;
                let pointee = expect_address(operands[1])?;
                if !operands[0].is_assignable_to(pointee) {
                    return Err(IrError::type_mismatch(pointee, operands[0]));
                }
                Ok(SmallVec::new())
            }
            InstKind::StrongRetain | InstKind::StrongRelease => {
                self.expect_arity(operands, 1)?;
                if *operands[0] != Type::Object {
                    return Err(IrError::type_mismatch(&Type::Object, operands[0]));
                }
                Ok(SmallVec::new())
            }
            InstKind::FixLifetime | InstKind::DebugValue { .. } | InstKind::Return => {
                self.expect_arity(operands, 1)?;
                Ok(SmallVec::new())
            }
            InstKind::CondFail { .. } => {
                self.expect_arity(operands, 1)?;
                if !operands[0].is_bool() {
                    return Err(IrError::type_mismatch(&Type::BOOL, operands[0]));
                }
                Ok(SmallVec::new())
            }
            InstKind::Br { .. } => Ok(SmallVec::new()),
            InstKind::CondBr { then_args, .. } => {
                let Some((cond, args)) = operands.split_first() else {
                    return Err(self.arity_error(1, 0));
                };
                if !cond.is_bool() {
                    return Err(IrError::type_mismatch(&Type::BOOL, cond));
                }
                if (*then_args as usize) > args.len() {
                    return Err(self.arity_error(*then_args as usize + 1, operands.len()));
                }
                Ok(SmallVec::new())
            }
            InstKind::Unreachable => {
                self.expect_arity(operands, 0)?;
                Ok(SmallVec::new())
            }
        }
    }

    fn expect_arity(&self, operands: &[&Type], expected: usize) -> Result<(), IrError> {
        if operands.len() == expected {
            Ok(())
        } else {
            Err(self.arity_error(expected, operands.len()))
        }
    }

    fn arity_error(&self, expected: usize, found: usize) -> IrError {
        Violation::ArityMismatch {
            kind: self.mnemonic(),
            expected,
            found,
        }
        .into()
    }
}

fn expect_address(ty: &Type) -> Result<&Type, IrError> {
    match ty {
        Type::Address(pointee) => Ok(pointee),
        other => Err(IrError::type_mismatch(&Type::address_of(other.clone()), other)),
    }
}

// ── Static instruction classes ──────────────────────────────────────

/// A statically known class of instructions.
///
/// Instruction passes declare the class they operate on; the runner narrows
/// an untyped handle to a [`TypedInst`] before invoking the pass.
pub trait InstClass {
    /// Mnemonic reported when narrowing fails.
    const NAME: &'static str;

    fn matches(kind: &InstKind) -> bool;
}

/// `cond_fail` instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CondFailInst;

impl InstClass for CondFailInst {
    const NAME: &'static str = "cond_fail";

    fn matches(kind: &InstKind) -> bool {
        matches!(kind, InstKind::CondFail { .. })
    }
}

/// `builtin` instructions of any operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinInst;

impl InstClass for BuiltinInst {
    const NAME: &'static str = "builtin";

    fn matches(kind: &InstKind) -> bool {
        matches!(kind, InstKind::Builtin(_))
    }
}

/// `apply` instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ApplyInst;

impl InstClass for ApplyInst {
    const NAME: &'static str = "apply";

    fn matches(kind: &InstKind) -> bool {
        kind.is_call_like()
    }
}

/// An instruction handle statically known to be of class `K`.
///
/// Only obtainable through `Function::narrow`, which checks the kind.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TypedInst<K> {
    id: InstId,
    marker: PhantomData<K>,
}

impl<K> TypedInst<K> {
    pub(crate) fn new(id: InstId) -> Self {
        Self {
            id,
            marker: PhantomData,
        }
    }

    /// The untyped handle.
    #[inline]
    pub fn id(&self) -> InstId {
        self.id
    }
}

impl<K> Clone for TypedInst<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for TypedInst<K> {}
