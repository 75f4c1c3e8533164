//! Instruction builder.
//!
//! A [`Builder`] inserts new instructions at a fixed program point through
//! the [`PassContext`], so every insertion is type-checked and reported to
//! the host like any other mutation. It never erases anything; composing
//! "insert new, redirect uses, erase old" is up to the caller.
//!
//! With [`InsertPoint::After`], the point advances past each created
//! instruction, so a sequence of `create_*` calls lands in program order.

use crate::context::{Invalidation, PassContext};
use crate::error::{IrError, Violation};
use crate::function::{InsertPoint, InstId, Location, ValueId};
use crate::inst::{BuiltinOp, InstKind};

/// Inserts instructions at a program point with a source location.
pub struct Builder<'c, 'f> {
    ctx: &'c mut PassContext<'f>,
    point: InsertPoint,
    location: Location,
}

impl<'c, 'f> Builder<'c, 'f> {
    /// Create a builder at `point`. The location defaults to the anchor
    /// instruction's location so synthesized code stays debuggable.
    pub(crate) fn new(ctx: &'c mut PassContext<'f>, point: InsertPoint) -> Self {
        let func = ctx.function();
        let anchor = match point {
            InsertPoint::Before(inst) | InsertPoint::After(inst) => Some(inst),
            InsertPoint::AtEnd(block) => {
                if func.has_block(block) {
                    func.last_inst(block)
                } else {
                    None
                }
            }
        };
        let location = anchor
            .filter(|&inst| func.is_live(inst))
            .map_or(Location::UNKNOWN, |inst| func.location(inst));
        Self {
            ctx,
            point,
            location,
        }
    }

    /// Override the location given to created instructions.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Current insertion point.
    pub fn point(&self) -> InsertPoint {
        self.point
    }

    /// Location given to created instructions.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Insert an instruction of `kind` with `operands`.
    pub fn create(&mut self, kind: InstKind, operands: &[ValueId]) -> Result<InstId, IrError> {
        let invalidation = Invalidation::for_kind(&kind);
        let inst = self
            .ctx
            .func_mut()
            .insert_inst(self.point, kind, operands, self.location)?;
        if let InsertPoint::After(_) = self.point {
            self.point = InsertPoint::After(inst);
        }
        self.ctx.notify(invalidation);
        Ok(inst)
    }

    /// Insert an instruction and return its single result.
    pub fn create_value(&mut self, kind: InstKind, operands: &[ValueId]) -> Result<ValueId, IrError> {
        let mnemonic = kind.mnemonic();
        let inst = self.create(kind, operands)?;
        self.ctx
            .function()
            .result(inst)
            .ok_or_else(|| Violation::NoResult { kind: mnemonic }.into())
    }

    pub fn create_integer_literal(&mut self, value: i64, bits: u16) -> Result<ValueId, IrError> {
        self.create_value(InstKind::IntegerLiteral { value, bits }, &[])
    }

    pub fn create_builtin(
        &mut self,
        op: BuiltinOp,
        lhs: ValueId,
        rhs: ValueId,
    ) -> Result<ValueId, IrError> {
        self.create_value(InstKind::Builtin(op), &[lhs, rhs])
    }

    pub fn create_tuple_extract(&mut self, tuple: ValueId, field: u32) -> Result<ValueId, IrError> {
        self.create_value(InstKind::TupleExtract { field }, &[tuple])
    }

    pub fn create_cond_fail(
        &mut self,
        condition: ValueId,
        message: impl Into<String>,
    ) -> Result<InstId, IrError> {
        self.create(
            InstKind::CondFail {
                message: message.into(),
            },
            &[condition],
        )
    }
}
