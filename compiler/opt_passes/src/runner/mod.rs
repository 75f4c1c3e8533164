//! Pass runner: adapts plain transform functions to the host protocol.
//!
//! Two adapters, neither with logic of its own:
//!
//! - [`FunctionPass`] wraps `fn(&mut PassContext) -> Result<(), IrError>` and
//!   runs it once per function handle.
//! - [`InstructionPass`] wraps `fn(TypedInst<K>, &mut PassContext)` and
//!   narrows the host's instruction handle to class `K` before calling.
//!
//! Both implement [`Transform`], the object-safe face the pipeline
//! schedules. The runner never retries; a failed run is reported as a
//! [`PassError`] and scheduling decisions stay with the driver.

use std::fmt;
use std::marker::PhantomData;

use opt_ir::{Function, InstClass, InstId, IrError, PassContext, TypedInst};

use crate::host::{FunctionHandle, InstructionHandle, Module};

/// A pass failed with an IR invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pass `{pass}` failed on function `{function}`: {source}")]
pub struct PassError {
    pub pass: &'static str,
    pub function: String,
    #[source]
    pub source: IrError,
}

impl PassError {
    fn new(pass: &'static str, func: &Function, source: IrError) -> Self {
        Self {
            pass,
            function: func.name().to_owned(),
            source,
        }
    }
}

/// A named transform the pipeline can schedule.
pub trait Transform: Sync {
    /// Stable name used in pipeline descriptions.
    fn name(&self) -> &'static str;

    /// Run on one function. Returns whether the function changed.
    fn run_on_function(
        &self,
        module: &mut Module,
        function: FunctionHandle,
    ) -> Result<bool, PassError>;
}

// ── Function passes ─────────────────────────────────────────────────

/// Body of a [`FunctionPass`].
pub type FunctionPassFn = fn(&mut PassContext<'_>) -> Result<(), IrError>;

/// A transform over a whole function.
pub struct FunctionPass {
    name: &'static str,
    run: FunctionPassFn,
}

impl FunctionPass {
    pub const fn new(name: &'static str, run: FunctionPassFn) -> Self {
        Self { name, run }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolve `function` and invoke the wrapped body exactly once.
    pub fn run(&self, module: &mut Module, function: FunctionHandle) -> Result<(), PassError> {
        let mut ctx = module.context(function);
        (self.run)(&mut ctx).map_err(|source| PassError::new(self.name, ctx.function(), source))
    }
}

impl fmt::Debug for FunctionPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionPass").field("name", &self.name).finish()
    }
}

impl Transform for FunctionPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run_on_function(
        &self,
        module: &mut Module,
        function: FunctionHandle,
    ) -> Result<bool, PassError> {
        let before = module.analyses(function).notifications();
        self.run(module, function)?;
        Ok(module.analyses(function).notifications() != before)
    }
}

// ── Instruction passes ──────────────────────────────────────────────

/// Body of an [`InstructionPass`] over class `K`.
pub type InstructionPassFn<K> = fn(TypedInst<K>, &mut PassContext<'_>) -> Result<(), IrError>;

/// A transform applied to individual instructions of class `K`.
pub struct InstructionPass<K: InstClass> {
    name: &'static str,
    run: InstructionPassFn<K>,
    marker: PhantomData<fn() -> K>,
}

impl<K: InstClass> InstructionPass<K> {
    pub const fn new(name: &'static str, run: InstructionPassFn<K>) -> Self {
        Self {
            name,
            run,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Narrow `handle` to `K` and invoke the wrapped body.
    ///
    /// Handing over an instruction of another class is a host contract
    /// violation and fails with [`opt_ir::Violation::KindMismatch`].
    pub fn run(&self, module: &mut Module, handle: InstructionHandle) -> Result<(), PassError> {
        let mut ctx = module.context(handle.function);
        let result = match ctx.narrow::<K>(handle.inst) {
            Ok(inst) => (self.run)(inst, &mut ctx),
            Err(err) => Err(err),
        };
        result.map_err(|source| PassError::new(self.name, ctx.function(), source))
    }
}

impl<K: InstClass> fmt::Debug for InstructionPass<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionPass")
            .field("name", &self.name)
            .field("class", &K::NAME)
            .finish()
    }
}

/// Instructions of class `K` in layout order.
fn collect_instructions<K: InstClass>(func: &Function) -> Vec<InstId> {
    func.blocks()
        .flat_map(|block| func.insts(block))
        .filter(|&inst| K::matches(func.kind(inst)))
        .collect()
}

impl<K: InstClass> Transform for InstructionPass<K> {
    fn name(&self) -> &'static str {
        self.name
    }

    /// Snapshots the matching instructions first, then visits each one that
    /// an earlier visit has not erased.
    fn run_on_function(
        &self,
        module: &mut Module,
        function: FunctionHandle,
    ) -> Result<bool, PassError> {
        let before = module.analyses(function).notifications();
        for inst in collect_instructions::<K>(module.function(function)) {
            if module.function(function).is_live(inst) {
                self.run(module, InstructionHandle { function, inst })?;
            }
        }
        Ok(module.analyses(function).notifications() != before)
    }
}
