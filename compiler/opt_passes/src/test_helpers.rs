//! Shared test utilities for the passes.
//!
//! Only compiled in test builds.

use opt_ir::{
    inst_to_string, BlockId, BuiltinOp, Function, InstId, InstKind, Invalidation, Location, Type,
    ValueId,
};

use crate::host::Module;
use crate::runner::Transform;

/// Builds a single-block function (`@test` unless named) with Boolean
/// block arguments.
pub(crate) struct BlockBuilder {
    func: Function,
    block: BlockId,
}

impl BlockBuilder {
    pub(crate) fn new(bool_args: usize) -> Self {
        Self::named("test", bool_args)
    }

    pub(crate) fn named(name: &str, bool_args: usize) -> Self {
        let mut func = Function::new(name);
        let block = func.add_block(std::iter::repeat(Type::BOOL).take(bool_args));
        Self { func, block }
    }

    pub(crate) fn arg(&self, index: usize) -> ValueId {
        self.func.block_args(self.block)[index]
    }

    pub(crate) fn inst(&mut self, kind: InstKind, operands: &[ValueId]) -> InstId {
        self.inst_at(kind, operands, Location::UNKNOWN)
    }

    pub(crate) fn inst_at(&mut self, kind: InstKind, operands: &[ValueId], location: Location) -> InstId {
        self.func
            .append_inst(self.block, kind, operands, location)
            .unwrap_or_else(|e| panic!("ill-formed test IR: {e}"))
    }

    pub(crate) fn value(&mut self, kind: InstKind, operands: &[ValueId]) -> ValueId {
        let inst = self.inst(kind, operands);
        self.func
            .result(inst)
            .unwrap_or_else(|| panic!("instruction has no result"))
    }

    pub(crate) fn cond_fail(&mut self, cond: ValueId, message: &str) -> InstId {
        self.cond_fail_at(cond, message, Location::UNKNOWN)
    }

    pub(crate) fn cond_fail_at(&mut self, cond: ValueId, message: &str, location: Location) -> InstId {
        self.inst_at(
            InstKind::CondFail {
                message: message.to_owned(),
            },
            &[cond],
            location,
        )
    }

    pub(crate) fn literal(&mut self, value: i64, bits: u16) -> ValueId {
        self.value(InstKind::IntegerLiteral { value, bits }, &[])
    }

    pub(crate) fn or(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.value(InstKind::Builtin(BuiltinOp::Or), &[lhs, rhs])
    }

    /// `tuple_extract (sadd_with_overflow lhs, rhs), 1` on two fresh literals.
    pub(crate) fn overflow_flag(&mut self) -> ValueId {
        let lhs = self.literal(i64::MAX, 64);
        let rhs = self.literal(1, 64);
        let pair = self.value(InstKind::Builtin(BuiltinOp::SAddWithOverflow), &[lhs, rhs]);
        self.value(InstKind::TupleExtract { field: 1 }, &[pair])
    }

    /// A Boolean stack slot.
    pub(crate) fn stack_slot(&mut self) -> ValueId {
        self.value(InstKind::AllocStack { ty: Type::BOOL }, &[])
    }

    pub(crate) fn store(&mut self, value: ValueId, slot: ValueId) -> InstId {
        self.inst(InstKind::Store, &[value, slot])
    }

    pub(crate) fn debug_value(&mut self, value: ValueId) -> InstId {
        self.inst(
            InstKind::DebugValue {
                name: "v".to_owned(),
            },
            &[value],
        )
    }

    /// Terminate with `return ()`.
    pub(crate) fn finish(mut self) -> (Function, BlockId) {
        let unit = self.value(InstKind::Tuple, &[]);
        self.inst(InstKind::Return, &[unit]);
        (self.func, self.block)
    }
}

/// Run `pass` on `func` through a one-function module.
///
/// Returns the transformed function, whether the pass reported a change,
/// and what it invalidated.
pub(crate) fn run_transform(pass: &dyn Transform, func: Function) -> (Function, bool, Invalidation) {
    let mut module = Module::new();
    let handle = module.add_function(func);
    let changed = pass
        .run_on_function(&mut module, handle)
        .unwrap_or_else(|e| panic!("{e}"));
    let invalidated = module.take_invalidations(handle);
    (module.function(handle).clone(), changed, invalidated)
}

/// Printed instructions of `block`, in layout order.
pub(crate) fn lines(func: &Function, block: BlockId) -> Vec<String> {
    func.insts(block).map(|inst| inst_to_string(func, inst)).collect()
}
