//! The mutation bridge: the only sanctioned way for a pass to change IR.
//!
//! [`PassContext`] wraps exclusive access to one [`Function`] together with
//! the host's [`InvalidationListener`]. Every mutating operation validates
//! all of its preconditions first, then mutates operands and use-lists
//! together, then tells the host which cached facts went stale:
//!
//! - [`Invalidation::INSTRUCTIONS`] after any change to the instruction stream
//! - [`Invalidation::CALLS`] when a call-like instruction or its callee changes
//! - [`Invalidation::BRANCHES`] when a terminator is added or removed
//!
//! An `Err` from any operation means nothing was changed.

use bitflags::bitflags;

use crate::builder::Builder;
use crate::error::{IrError, Violation};
use crate::function::{Function, InsertPoint, InstId, ValueId};
use crate::inst::{InstClass, InstKind, TypedInst};

bitflags! {
    /// Which cached facts about a function a mutation made stale.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Invalidation: u8 {
        /// The general instruction stream changed.
        const INSTRUCTIONS = 1 << 0;
        /// Call-graph shape changed (call added, removed or retargeted).
        const CALLS = 1 << 1;
        /// Branch/terminator structure changed.
        const BRANCHES = 1 << 2;
    }
}

impl Invalidation {
    /// Facts invalidated by inserting or erasing an instruction of `kind`.
    pub fn for_kind(kind: &InstKind) -> Self {
        let mut inv = Invalidation::INSTRUCTIONS;
        if kind.is_call_like() {
            inv |= Invalidation::CALLS;
        }
        if kind.is_terminator() {
            inv |= Invalidation::BRANCHES;
        }
        inv
    }
}

/// Receiver of invalidation notifications, implemented by the host.
pub trait InvalidationListener {
    fn invalidate(&mut self, kind: Invalidation);
}

/// Accumulates notifications into a single set.
impl InvalidationListener for Invalidation {
    fn invalidate(&mut self, kind: Invalidation) {
        *self |= kind;
    }
}

/// How [`PassContext::erase_instruction`] treats remaining uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EraseMode {
    /// The instruction's results must have no uses at all.
    InstructionOnly,
    /// Debug-only users of the results are erased first; any other use is
    /// an error.
    IncludingDebugOnlyUses,
}

/// Exclusive mutation access to one function for the duration of a pass.
pub struct PassContext<'f> {
    func: &'f mut Function,
    listener: &'f mut dyn InvalidationListener,
}

impl<'f> PassContext<'f> {
    pub fn new(func: &'f mut Function, listener: &'f mut dyn InvalidationListener) -> Self {
        Self { func, listener }
    }

    /// Read-only view of the function being transformed.
    #[inline]
    pub fn function(&self) -> &Function {
        &*self.func
    }

    /// Narrow `inst` to the instruction class `K`.
    pub fn narrow<K: InstClass>(&self, inst: InstId) -> Result<TypedInst<K>, IrError> {
        self.func.narrow(inst)
    }

    /// A builder inserting at `point`.
    ///
    /// The builder's default location is the anchor instruction's location
    /// (or the block's last instruction for [`InsertPoint::AtEnd`]).
    pub fn builder(&mut self, point: InsertPoint) -> Builder<'_, 'f> {
        Builder::new(self, point)
    }

    pub(crate) fn notify(&mut self, kind: Invalidation) {
        tracing::trace!(function = self.func.name(), ?kind, "invalidating analyses");
        self.listener.invalidate(kind);
    }

    pub(crate) fn func_mut(&mut self) -> &mut Function {
        &mut *self.func
    }

    /// Remove `inst` from its block.
    ///
    /// In [`EraseMode::IncludingDebugOnlyUses`] mode, debug-only users of
    /// the results are erased first. Erasing a terminator requires that a
    /// replacement terminator is already in place.
    pub fn erase_instruction(&mut self, inst: InstId, mode: EraseMode) -> Result<(), IrError> {
        if !self.func.is_live(inst) {
            return Err(Violation::StaleInstruction(inst).into());
        }

        let mut live_uses = 0;
        let mut debug_users: Vec<InstId> = Vec::new();
        for &result in self.func.results(inst) {
            for u in self.func.uses(result) {
                if mode == EraseMode::IncludingDebugOnlyUses && self.func.kind(u.user).is_debug_only()
                {
                    if !debug_users.contains(&u.user) {
                        debug_users.push(u.user);
                    }
                } else {
                    live_uses += 1;
                }
            }
        }
        if live_uses > 0 {
            return Err(Violation::LiveUses {
                inst,
                uses: live_uses,
            }
            .into());
        }

        let kind = self.func.kind(inst);
        if kind.is_terminator() {
            let block = self.func.inst_block(inst);
            let remaining_last = if self.func.last_inst(block) == Some(inst) {
                self.func.prev_inst(inst)
            } else {
                self.func.last_inst(block)
            };
            let replaced = remaining_last.is_some_and(|last| self.func.kind(last).is_terminator());
            if !replaced {
                return Err(Violation::MissingTerminator { block, inst }.into());
            }
        }
        let invalidation = Invalidation::for_kind(kind);

        for user in debug_users {
            self.func.remove_inst(user);
        }
        self.func.remove_inst(inst);
        self.notify(invalidation);
        Ok(())
    }

    /// Redirect every use of `of` to `with`.
    ///
    /// Afterwards `of` has no uses and `with` has gained exactly the
    /// redirected entries.
    pub fn replace_all_uses(&mut self, of: ValueId, with: ValueId) -> Result<(), IrError> {
        for value in [of, with] {
            if !self.func.is_live_value(value) {
                return Err(Violation::UnknownValue(value).into());
            }
        }
        let (expected, found) = (self.func.value_type(of), self.func.value_type(with));
        if !found.is_assignable_to(expected) {
            return Err(IrError::type_mismatch(expected, found));
        }
        if of == with || !self.func.has_uses(of) {
            return Ok(());
        }

        let moved = self.func.replace_all_uses_raw(of, with);
        let mut invalidation = Invalidation::INSTRUCTIONS;
        if moved
            .iter()
            .any(|u| self.func.kind(u.user).callee_operand() == Some(u.operand_index as usize))
        {
            invalidation |= Invalidation::CALLS;
        }
        self.notify(invalidation);
        Ok(())
    }

    /// Rebind operand `index` of `inst` to `value`.
    pub fn set_operand(&mut self, inst: InstId, index: usize, value: ValueId) -> Result<(), IrError> {
        if !self.func.is_live(inst) {
            return Err(Violation::StaleInstruction(inst).into());
        }
        let len = self.func.operands(inst).len();
        if index >= len {
            return Err(Violation::OperandOutOfRange { inst, index, len }.into());
        }
        if !self.func.is_live_value(value) {
            return Err(Violation::UnknownValue(value).into());
        }
        let old = self.func.operand(inst, index);
        let (expected, found) = (self.func.value_type(old), self.func.value_type(value));
        if !found.is_assignable_to(expected) {
            return Err(IrError::type_mismatch(expected, found));
        }
        if old == value {
            return Ok(());
        }

        let mut invalidation = Invalidation::INSTRUCTIONS;
        if self.func.kind(inst).callee_operand() == Some(index) {
            invalidation |= Invalidation::CALLS;
        }
        self.func.set_operand_raw(inst, index, value);
        self.notify(invalidation);
        Ok(())
    }
}
