//! Structural IR verifier.
//!
//! Checks the invariants every pass must preserve:
//!
//! - every block is non-empty and ends in exactly one terminator
//! - layout links (`prev`/`next`) are mutually consistent
//! - every operand refers to a live value and passes the kind's typing rule
//!   (including branch arguments against the target block)
//! - every value's use-list equals the set of operands referencing it
//!
//! Returns the first violation found.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{IrError, Violation};
use crate::function::{Function, InstId, Use, ValueId};

/// Verify `func`, returning the first broken invariant.
pub fn verify_function(func: &Function) -> Result<(), IrError> {
    let mut operand_uses: FxHashSet<(ValueId, Use)> = FxHashSet::default();
    let mut operand_counts: FxHashMap<ValueId, usize> = FxHashMap::default();

    for block in func.blocks() {
        let Some(last) = func.last_inst(block) else {
            return Err(Violation::EmptyBlock(block).into());
        };

        let mut prev: Option<InstId> = None;
        let mut seen = 0usize;
        for inst in func.insts(block) {
            seen += 1;
            if seen > func.num_insts() || func.prev_inst(inst) != prev || func.inst_block(inst) != block {
                return Err(Violation::BrokenLayout(block).into());
            }
            let kind = func.kind(inst);
            match (kind.is_terminator(), inst == last) {
                (true, false) => return Err(Violation::TerminatorNotLast { block }.into()),
                (false, true) => return Err(Violation::Unterminated(block).into()),
                _ => {}
            }

            let operands = func.operands(inst);
            let results = func.check_operands(kind, operands)?;
            let actual = func.results(inst);
            if results.len() != actual.len() {
                return Err(Violation::ArityMismatch {
                    kind: kind.mnemonic(),
                    expected: results.len(),
                    found: actual.len(),
                }
                .into());
            }
            for (ty, &value) in results.iter().zip(actual) {
                if func.value_type(value) != ty {
                    return Err(IrError::type_mismatch(ty, func.value_type(value)));
                }
            }

            for (index, &operand) in operands.iter().enumerate() {
                let operand_index = u32::try_from(index)
                    .unwrap_or_else(|_| panic!("operand count exceeds u32::MAX"));
                operand_uses.insert((
                    operand,
                    Use {
                        user: inst,
                        operand_index,
                    },
                ));
                *operand_counts.entry(operand).or_default() += 1;
            }
            prev = Some(inst);
        }
        if prev != Some(last) {
            return Err(Violation::BrokenLayout(block).into());
        }
    }

    for value in func.all_values() {
        let uses = func.uses(value);
        if !uses.is_empty() && !func.is_live_value(value) {
            return Err(Violation::UseListCorrupted { value }.into());
        }
        let referenced = operand_counts.get(&value).copied().unwrap_or(0);
        if uses.len() != referenced || uses.iter().any(|u| !operand_uses.contains(&(value, *u))) {
            return Err(Violation::UseListCorrupted { value }.into());
        }
    }

    Ok(())
}
