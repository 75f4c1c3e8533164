//! The host side of the pass protocol.
//!
//! A [`Module`] owns the functions being optimized together with one
//! [`AnalysisCache`] per function. Passes never see either directly: the
//! runner resolves a [`FunctionHandle`] to a [`PassContext`] whose
//! invalidation listener is that function's cache.

use std::fmt;

use opt_ir::{Function, InstId, Invalidation, InvalidationListener, PassContext};

/// Opaque handle to a function in a [`Module`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FunctionHandle(u32);

impl FunctionHandle {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

/// Opaque handle to one instruction of one function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstructionHandle {
    pub function: FunctionHandle,
    pub inst: InstId,
}

/// Per-function record of which cached facts went stale.
///
/// Dominance trees, call graphs and the like would key their validity off
/// these bits; the cache itself only records the signals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalysisCache {
    invalidated: Invalidation,
    notifications: u64,
}

impl AnalysisCache {
    /// Everything invalidated since the last [`clear`](Self::clear).
    #[inline]
    pub fn invalidated(&self) -> Invalidation {
        self.invalidated
    }

    /// Total number of notifications ever received.
    #[inline]
    pub fn notifications(&self) -> u64 {
        self.notifications
    }

    /// Mark all facts as recomputed.
    pub fn clear(&mut self) {
        self.invalidated = Invalidation::empty();
    }
}

impl InvalidationListener for AnalysisCache {
    fn invalidate(&mut self, kind: Invalidation) {
        self.invalidated |= kind;
        self.notifications += 1;
    }
}

/// A compilation unit: functions plus their analysis caches.
#[derive(Clone, Debug, Default)]
pub struct Module {
    functions: Vec<Function>,
    caches: Vec<AnalysisCache>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `func` and return its handle.
    pub fn add_function(&mut self, func: Function) -> FunctionHandle {
        let raw = u32::try_from(self.functions.len())
            .unwrap_or_else(|_| panic!("function count exceeds u32::MAX"));
        self.functions.push(func);
        self.caches.push(AnalysisCache::default());
        FunctionHandle::new(raw)
    }

    #[inline]
    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    /// All function handles in module order.
    pub fn functions(&self) -> impl Iterator<Item = FunctionHandle> {
        (0..self.functions.len()).map(|i| {
            FunctionHandle::new(
                u32::try_from(i).unwrap_or_else(|_| panic!("function count exceeds u32::MAX")),
            )
        })
    }

    /// Look up a function by symbol name.
    pub fn find(&self, name: &str) -> Option<FunctionHandle> {
        self.functions()
            .find(|&handle| self.function(handle).name() == name)
    }

    /// # Panics
    ///
    /// Panics if `handle` did not come from this module.
    pub fn function(&self, handle: FunctionHandle) -> &Function {
        self.functions
            .get(handle.index())
            .unwrap_or_else(|| panic!("unknown function handle {handle}"))
    }

    /// Analysis cache of `handle`.
    pub fn analyses(&self, handle: FunctionHandle) -> &AnalysisCache {
        self.caches
            .get(handle.index())
            .unwrap_or_else(|| panic!("unknown function handle {handle}"))
    }

    /// Invalidated facts of `handle`, resetting them.
    pub fn take_invalidations(&mut self, handle: FunctionHandle) -> Invalidation {
        let cache = self
            .caches
            .get_mut(handle.index())
            .unwrap_or_else(|| panic!("unknown function handle {handle}"));
        let invalidated = cache.invalidated();
        cache.clear();
        invalidated
    }

    /// Resolve `handle` to a mutation context for one pass run.
    pub(crate) fn context(&mut self, handle: FunctionHandle) -> PassContext<'_> {
        let index = handle.index();
        match (self.functions.get_mut(index), self.caches.get_mut(index)) {
            (Some(func), Some(cache)) => {
                tracing::trace!(function = func.name(), %handle, "entering pass context");
                PassContext::new(func, cache)
            }
            _ => panic!("unknown function handle {handle}"),
        }
    }
}
