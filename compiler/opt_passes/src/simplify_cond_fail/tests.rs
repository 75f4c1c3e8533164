use pretty_assertions::assert_eq;

use opt_ir::{Invalidation, IrError, Violation};

use crate::host::{InstructionHandle, Module};
use crate::test_helpers::{lines, run_transform, BlockBuilder};

use super::{constant_value, SIMPLIFY_COND_FAIL};

#[test]
fn trap_on_false_is_removed() {
    let mut b = BlockBuilder::new(0);
    let zero = b.literal(0, 1);
    let trap = b.cond_fail(zero, "never");
    let (func, block) = b.finish();

    let (func, changed, invalidated) = run_transform(&SIMPLIFY_COND_FAIL, func);

    assert!(changed);
    assert_eq!(invalidated, Invalidation::INSTRUCTIONS);
    assert!(!func.is_live(trap));
    // The literal is left for dead code elimination.
    assert_eq!(
        lines(&func, block),
        ["%0 = integer_literal $Int1, 0", "%1 = tuple ()", "return %1"]
    );
}

#[test]
fn trap_on_true_is_kept() {
    let mut b = BlockBuilder::new(0);
    let one = b.literal(1, 1);
    let trap = b.cond_fail(one, "always");
    let (func, _) = b.finish();

    let (func, changed, _) = run_transform(&SIMPLIFY_COND_FAIL, func);

    assert!(!changed);
    assert!(func.is_live(trap));
}

#[test]
fn trap_on_unknown_condition_is_kept() {
    let mut b = BlockBuilder::new(1);
    let trap = b.cond_fail(b.arg(0), "maybe");
    let (func, _) = b.finish();

    let (func, changed, _) = run_transform(&SIMPLIFY_COND_FAIL, func);

    assert!(!changed);
    assert!(func.is_live(trap));
}

#[test]
fn every_false_trap_is_removed() {
    let mut b = BlockBuilder::new(1);
    let zero = b.literal(0, 1);
    b.cond_fail(zero, "a");
    let kept = b.cond_fail(b.arg(0), "b");
    b.cond_fail(zero, "c");
    let (func, block) = b.finish();

    let (func, _, _) = run_transform(&SIMPLIFY_COND_FAIL, func);

    let traps: Vec<_> = func
        .insts(block)
        .filter(|&inst| func.kind(inst).may_trap())
        .collect();
    assert_eq!(traps, [kept]);
    assert!(!func.has_uses(zero));
}

#[test]
fn wrong_instruction_kind_is_a_contract_violation() {
    let mut b = BlockBuilder::new(0);
    let lit = b.literal(0, 1);
    let (func, _) = b.finish();
    let inst = func.defining_inst(lit).unwrap();

    let mut module = Module::new();
    let function = module.add_function(func);
    let err = SIMPLIFY_COND_FAIL
        .run(&mut module, InstructionHandle { function, inst })
        .unwrap_err();

    assert_eq!(err.pass, "simplify-cond-fail");
    assert_eq!(err.function, "test");
    assert_eq!(
        err.source,
        IrError::InvariantViolation(Violation::KindMismatch {
            inst,
            expected: "cond_fail",
            found: "integer_literal",
        })
    );
}

#[test]
fn constant_value_sees_only_literals() {
    let mut b = BlockBuilder::new(1);
    let lit = b.literal(-5, 64);
    let (func, _) = b.finish();
    assert_eq!(constant_value(&func, lit), Some(-5));
    assert_eq!(constant_value(&func, func.block_args(func.entry_block().unwrap())[0]), None);
}
