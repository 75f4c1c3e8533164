//! Pass registry and pipeline manager.
//!
//! # Example
//!
//! ```ignore
//! let config = PipelineConfig::parse("merge-cond-fails, dead-code-elim")?
//!     .with_verify_each(true);
//! let manager = PassManager::new(&PassRegistry::builtin(), &config)?;
//! let stats = manager.run(&mut module)?;
//! ```

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use opt_ir::{verify_function, IrError};

use crate::dead_code::DEAD_CODE_ELIM;
use crate::host::{FunctionHandle, Module};
use crate::merge_cond_fails::MERGE_COND_FAILS;
use crate::runner::{PassError, Transform};
use crate::simplify_cond_fail::SIMPLIFY_COND_FAIL;

/// Passes run by [`PipelineConfig::default`], in order.
pub const DEFAULT_PIPELINE: &[&str] = &["simplify-cond-fail", "merge-cond-fails", "dead-code-elim"];

/// Failure to build or run a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("unknown pass `{name}`")]
    UnknownPass { name: String },

    /// A pipeline description contained an empty entry (e.g. `"a,,b"`).
    #[error("empty pass name at position {position} in pipeline description")]
    EmptyEntry { position: usize },

    #[error(transparent)]
    Pass(#[from] PassError),

    /// `verify_each` found a broken invariant after a pass.
    #[error("IR verification failed after `{pass}` on function `{function}`: {source}")]
    Verification {
        pass: &'static str,
        function: String,
        #[source]
        source: IrError,
    },
}

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for the pass pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Pass names, in run order.
    pub passes: Vec<String>,

    /// Verify every function after every pass.
    pub verify_each: bool,

    /// Log the printed function at `trace` level after each pass that
    /// changed it.
    pub print_after_each: bool,
}

impl PipelineConfig {
    /// Create a configuration running `passes` in order.
    #[must_use]
    pub fn new<I, S>(passes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            passes: passes.into_iter().map(Into::into).collect(),
            verify_each: false,
            print_after_each: false,
        }
    }

    /// Parse a comma-separated pipeline description.
    ///
    /// Whitespace around names is ignored; empty entries are rejected.
    /// Names are checked against a registry only when the pipeline is built.
    pub fn parse(description: &str) -> Result<Self, PipelineError> {
        let mut passes = Vec::new();
        for (position, entry) in description.split(',').enumerate() {
            let name = entry.trim();
            if name.is_empty() {
                return Err(PipelineError::EmptyEntry { position });
            }
            passes.push(name.to_owned());
        }
        Ok(Self::new(passes))
    }

    /// Enable or disable verification after each pass (builder pattern).
    #[must_use]
    pub fn with_verify_each(mut self, enable: bool) -> Self {
        self.verify_each = enable;
        self
    }

    /// Enable or disable IR dumps after each pass (builder pattern).
    #[must_use]
    pub fn with_print_after_each(mut self, enable: bool) -> Self {
        self.print_after_each = enable;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PIPELINE.iter().copied())
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.passes.join(","))
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Transforms by stable name.
#[derive(Default)]
pub struct PassRegistry {
    passes: FxHashMap<&'static str, &'static dyn Transform>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every pass in this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(&SIMPLIFY_COND_FAIL);
        registry.register(&MERGE_COND_FAILS);
        registry.register(&DEAD_CODE_ELIM);
        registry
    }

    /// Register `pass` under its name, replacing any previous entry.
    pub fn register(&mut self, pass: &'static dyn Transform) {
        if self.passes.insert(pass.name(), pass).is_some() {
            tracing::debug!(pass = pass.name(), "replaced registered pass");
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static dyn Transform> {
        self.passes.get(name).copied()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.passes.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassRegistry")
            .field("passes", &self.names())
            .finish()
    }
}

// ── Manager ─────────────────────────────────────────────────────────

/// Counters from one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Pass invocations, one per pass per function.
    pub passes_run: usize,
    /// Distinct functions changed by at least one pass.
    pub functions_changed: usize,
    /// Number of functions each pass changed, in pipeline order.
    pub changes_by_pass: Vec<(&'static str, usize)>,
}

/// Runs a resolved pipeline over a module.
pub struct PassManager {
    passes: Vec<&'static dyn Transform>,
    verify_each: bool,
    print_after_each: bool,
}

impl PassManager {
    /// Resolve `config` against `registry`.
    pub fn new(registry: &PassRegistry, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let passes = config
            .passes
            .iter()
            .map(|name| {
                registry
                    .get(name)
                    .ok_or_else(|| PipelineError::UnknownPass { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            passes,
            verify_each: config.verify_each,
            print_after_each: config.print_after_each,
        })
    }

    /// Pass names, in run order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Run every pass over every function, pass by pass.
    ///
    /// Stops at the first failing pass or verification.
    pub fn run(&self, module: &mut Module) -> Result<PipelineStats, PipelineError> {
        let functions: Vec<FunctionHandle> = module.functions().collect();
        let mut stats = PipelineStats::default();
        let mut changed_functions = FxHashSet::default();

        for &pass in &self.passes {
            let mut changed_by_pass = 0;
            for &function in &functions {
                let span = tracing::debug_span!(
                    "pass",
                    pass = pass.name(),
                    function = module.function(function).name(),
                );
                let _guard = span.enter();

                let changed = pass.run_on_function(module, function)?;
                stats.passes_run += 1;
                if changed {
                    changed_by_pass += 1;
                    changed_functions.insert(function);
                    if self.print_after_each {
                        tracing::trace!("IR after {}:\n{}", pass.name(), module.function(function));
                    }
                }
                if self.verify_each {
                    verify_after(pass, module, function)?;
                }
            }
            stats.changes_by_pass.push((pass.name(), changed_by_pass));
        }

        stats.functions_changed = changed_functions.len();
        tracing::debug!(
            passes_run = stats.passes_run,
            functions_changed = stats.functions_changed,
            "pipeline finished"
        );
        Ok(stats)
    }
}

fn verify_after(
    pass: &dyn Transform,
    module: &Module,
    function: FunctionHandle,
) -> Result<(), PipelineError> {
    let func = module.function(function);
    verify_function(func).map_err(|source| PipelineError::Verification {
        pass: pass.name(),
        function: func.name().to_owned(),
        source,
    })
}

impl fmt::Debug for PassManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassManager")
            .field("passes", &self.pass_names())
            .field("verify_each", &self.verify_each)
            .field("print_after_each", &self.print_after_each)
            .finish()
    }
}
