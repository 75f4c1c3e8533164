//! Optimizer passes over the `opt_ir` representation.
//!
//! This crate provides:
//!
//! - **Pass runner** ([`FunctionPass`], [`InstructionPass`]): adapters
//!   from plain transform functions to the host protocol, both exposed as
//!   [`Transform`].
//!
//! - **Host model** ([`Module`], [`FunctionHandle`], [`AnalysisCache`]):
//!   owns the functions and records which cached facts each pass
//!   invalidated.
//!
//! - **Pipeline** ([`PassRegistry`], [`PipelineConfig`], [`PassManager`]):
//!   named passes scheduled from a comma-separated description.
//!
//! - **Transforms**:
//!   - `merge-cond-fails` ([`MERGE_COND_FAILS`]) folds runs of conditional
//!     traps into one trap on the OR of their conditions.
//!   - `simplify-cond-fail` ([`SIMPLIFY_COND_FAIL`]) drops traps on a
//!     constant false condition.
//!   - `dead-code-elim` ([`DEAD_CODE_ELIM`]) removes instructions whose
//!     results are unused.
//!
//! # Tracing
//!
//! Passes log through `tracing`. Call [`init_tracing`] once at startup and
//! set e.g. `RUST_LOG=opt_passes=debug` to see what each pass changed.

mod dead_code;
mod host;
mod merge_cond_fails;
mod pipeline;
mod runner;
mod simplify_cond_fail;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use dead_code::{eliminate_dead_code, is_trivially_dead, DEAD_CODE_ELIM};
pub use host::{AnalysisCache, FunctionHandle, InstructionHandle, Module};
pub use merge_cond_fails::{merge_cond_fails, MERGE_COND_FAILS};
pub use pipeline::{
    PassManager, PassRegistry, PipelineConfig, PipelineError, PipelineStats, DEFAULT_PIPELINE,
};
pub use runner::{
    FunctionPass, FunctionPassFn, InstructionPass, InstructionPassFn, PassError, Transform,
};
pub use simplify_cond_fail::{simplify_cond_fail, SIMPLIFY_COND_FAIL};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing subscriber for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=opt_passes=debug` or `RUST_LOG=opt_ir=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

#[cfg(test)]
mod tests;
