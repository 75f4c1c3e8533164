use pretty_assertions::assert_eq;

use opt_ir::{
    verify_function, Function, InstKind, Invalidation, Location, Type, Use, ValueId,
};

use crate::test_helpers::{lines, run_transform, BlockBuilder};

use super::MERGE_COND_FAILS;

fn merge(func: Function) -> (Function, bool, Invalidation) {
    let (func, changed, invalidated) = run_transform(&MERGE_COND_FAILS, func);
    verify_function(&func).unwrap();
    (func, changed, invalidated)
}

fn count_traps(func: &Function) -> usize {
    func.blocks()
        .flat_map(|block| func.insts(block))
        .filter(|&inst| matches!(func.kind(inst), InstKind::CondFail { .. }))
        .count()
}

// Merging

/// `[trap(a), trap(b), trap(c)]` → `[or(or(a, b), c), trap]`.
#[test]
fn three_traps_fold_left_to_right() {
    let mut b = BlockBuilder::new(3);
    let (x, y, z) = (b.arg(0), b.arg(1), b.arg(2));
    b.cond_fail(x, "msg");
    b.cond_fail(y, "msg");
    b.cond_fail(z, "msg");
    let (func, block) = b.finish();

    let (func, changed, invalidated) = merge(func);

    assert!(changed);
    assert_eq!(invalidated, Invalidation::INSTRUCTIONS);
    assert_eq!(
        lines(&func, block),
        [
            "%4 = builtin \"or\" (%0, %1) : $Int1",
            "%5 = builtin \"or\" (%4, %2) : $Int1",
            "cond_fail %5, \"msg\"",
            "%3 = tuple ()",
            "return %3",
        ]
    );
}

#[test]
fn merged_condition_uses_match_operands() {
    let mut b = BlockBuilder::new(3);
    let (x, y, z) = (b.arg(0), b.arg(1), b.arg(2));
    b.cond_fail(x, "msg");
    b.cond_fail(y, "msg");
    b.cond_fail(z, "msg");
    let (func, block) = b.finish();

    let (func, _, _) = merge(func);

    let insts: Vec<_> = func.insts(block).collect();
    let (first_or, second_or, trap) = (insts[0], insts[1], insts[2]);
    let inner = func.result(first_or).unwrap();
    let outer = func.result(second_or).unwrap();
    assert_eq!(func.operands(trap), &[outer]);
    assert_eq!(
        func.uses(outer),
        &[Use {
            user: trap,
            operand_index: 0
        }]
    );
    assert_eq!(
        func.uses(inner),
        &[Use {
            user: second_or,
            operand_index: 0
        }]
    );
    for (arg, user, index) in [(x, first_or, 0), (y, first_or, 1), (z, second_or, 1)] {
        assert_eq!(
            func.uses(arg),
            &[Use {
                user,
                operand_index: index
            }]
        );
    }
}

#[test]
fn merged_trap_takes_last_location() {
    let mut b = BlockBuilder::new(2);
    let (x, y) = (b.arg(0), b.arg(1));
    b.cond_fail_at(x, "msg", Location::new(10, 12));
    b.cond_fail_at(y, "msg", Location::new(20, 24));
    let (func, block) = b.finish();

    let (func, _, _) = merge(func);

    let insts: Vec<_> = func.insts(block).collect();
    assert_eq!(func.location(insts[0]), Location::new(20, 24));
    assert_eq!(func.location(insts[1]), Location::new(20, 24));
}

#[test]
fn pure_instructions_do_not_split_a_run() {
    let mut b = BlockBuilder::new(2);
    let (x, y) = (b.arg(0), b.arg(1));
    b.cond_fail(x, "msg");
    let either = b.or(x, y);
    b.debug_value(either);
    b.cond_fail(either, "msg");
    let (func, block) = b.finish();

    let (func, changed, _) = merge(func);

    assert!(changed);
    assert_eq!(count_traps(&func), 1);
    assert!(lines(&func, block).contains(&"%4 = builtin \"or\" (%0, %2) : $Int1".to_owned()));
}

#[test]
fn traps_in_different_blocks_do_not_merge() {
    let mut func = Function::new("two_blocks");
    let entry = func.add_block([Type::BOOL, Type::BOOL]);
    let exit = func.add_block([]);
    let args = func.block_args(entry).to_vec();
    let trap = |message: &str| InstKind::CondFail {
        message: message.to_owned(),
    };
    func.append_inst(entry, trap("msg"), &[args[0]], Location::UNKNOWN)
        .unwrap();
    func.append_inst(entry, InstKind::Br { target: exit }, &[], Location::UNKNOWN)
        .unwrap();
    func.append_inst(exit, trap("msg"), &[args[1]], Location::UNKNOWN)
        .unwrap();
    func.append_inst(exit, InstKind::Unreachable, &[], Location::UNKNOWN)
        .unwrap();

    let (func, changed, _) = merge(func);

    assert!(!changed);
    assert_eq!(count_traps(&func), 2);
}

#[test]
fn every_run_in_a_block_is_merged() {
    let mut b = BlockBuilder::new(4);
    let slot = b.stack_slot();
    b.cond_fail(b.arg(0), "msg");
    b.cond_fail(b.arg(1), "msg");
    b.store(b.arg(0), slot);
    b.cond_fail(b.arg(2), "msg");
    b.cond_fail(b.arg(3), "msg");
    let (func, block) = b.finish();

    let (func, changed, _) = merge(func);

    assert!(changed);
    assert_eq!(
        lines(&func, block),
        [
            "%4 = alloc_stack $Int1",
            "%6 = builtin \"or\" (%0, %1) : $Int1",
            "cond_fail %6, \"msg\"",
            "store %0 to %4",
            "%7 = builtin \"or\" (%2, %3) : $Int1",
            "cond_fail %7, \"msg\"",
            "%5 = tuple ()",
            "return %5",
        ]
    );
}

// Barriers

#[test]
fn store_blocks_merging() {
    let mut b = BlockBuilder::new(2);
    let slot = b.stack_slot();
    let (x, y) = (b.arg(0), b.arg(1));
    let first = b.cond_fail(x, "msg");
    b.store(x, slot);
    let second = b.cond_fail(y, "msg");
    let (func, block) = b.finish();
    let before = lines(&func, block);

    let (func, changed, invalidated) = merge(func);

    assert!(!changed);
    assert!(invalidated.is_empty());
    assert_eq!(lines(&func, block), before);
    assert!(func.is_live(first) && func.is_live(second));
}

#[test]
fn load_blocks_merging() {
    let mut b = BlockBuilder::new(2);
    let slot = b.stack_slot();
    b.cond_fail(b.arg(0), "msg");
    b.value(InstKind::Load, &[slot]);
    b.cond_fail(b.arg(1), "msg");
    let (func, _) = b.finish();

    let (func, changed, _) = merge(func);

    assert!(!changed);
    assert_eq!(count_traps(&func), 2);
}

#[test]
fn call_blocks_merging() {
    let mut b = BlockBuilder::new(2);
    let callee = b.value(
        InstKind::FunctionRef {
            symbol: "log".to_owned(),
            ty: Type::function(Vec::new(), Type::unit()),
        },
        &[],
    );
    b.cond_fail(b.arg(0), "msg");
    b.inst(InstKind::Apply, &[callee]);
    b.cond_fail(b.arg(1), "msg");
    let (func, _) = b.finish();

    let (func, changed, _) = merge(func);

    assert!(!changed);
    assert_eq!(count_traps(&func), 2);
}

// Overflow checks

#[test]
fn overflow_check_is_not_merged() {
    let mut b = BlockBuilder::new(1);
    let flag = b.overflow_flag();
    let overflow_trap = b.cond_fail(flag, "msg");
    let other = b.cond_fail(b.arg(0), "msg");
    let (func, _) = b.finish();

    let (func, changed, _) = merge(func);

    assert!(!changed);
    assert!(func.is_live(overflow_trap));
    assert!(func.is_live(other));
}

#[test]
fn overflow_check_splits_surrounding_runs() {
    let mut b = BlockBuilder::new(4);
    let flag = b.overflow_flag();
    b.cond_fail(b.arg(0), "msg");
    b.cond_fail(b.arg(1), "msg");
    let overflow_trap = b.cond_fail(flag, "msg");
    b.cond_fail(b.arg(2), "msg");
    b.cond_fail(b.arg(3), "msg");
    let (func, block) = b.finish();

    let (func, changed, _) = merge(func);

    assert!(changed);
    assert_eq!(count_traps(&func), 3);
    let traps: Vec<_> = func
        .insts(block)
        .filter(|&inst| matches!(func.kind(inst), InstKind::CondFail { .. }))
        .collect();
    assert_eq!(traps[1], overflow_trap);
}

#[test]
fn extract_from_plain_tuple_is_mergeable() {
    let mut b = BlockBuilder::new(2);
    let (x, y) = (b.arg(0), b.arg(1));
    let pair = b.value(InstKind::Tuple, &[x, y]);
    let field = b.value(InstKind::TupleExtract { field: 0 }, &[pair]);
    b.cond_fail(field, "msg");
    b.cond_fail(y, "msg");
    let (func, _) = b.finish();

    let (func, changed, _) = merge(func);

    assert!(changed);
    assert_eq!(count_traps(&func), 1);
}

// Messages

#[test]
fn different_messages_do_not_merge() {
    let mut b = BlockBuilder::new(2);
    let first = b.cond_fail(b.arg(0), "m1");
    let second = b.cond_fail(b.arg(1), "m2");
    let (func, block) = b.finish();
    let before = lines(&func, block);

    let (func, changed, _) = merge(func);

    assert!(!changed);
    assert_eq!(lines(&func, block), before);
    assert!(func.is_live(first) && func.is_live(second));
}

/// `trap(A, m1), trap(B, m2), trap(C, m1)`: each mismatch starts a new run,
/// so nothing merges and the order is kept.
#[test]
fn interleaved_messages_are_not_reordered() {
    let mut b = BlockBuilder::new(3);
    b.cond_fail(b.arg(0), "m1");
    b.cond_fail(b.arg(1), "m2");
    b.cond_fail(b.arg(2), "m1");
    let (func, block) = b.finish();
    let before = lines(&func, block);

    let (func, changed, _) = merge(func);

    assert!(!changed);
    assert_eq!(lines(&func, block), before);
}

#[test]
fn message_change_flushes_previous_run() {
    let mut b = BlockBuilder::new(4);
    b.cond_fail(b.arg(0), "m1");
    b.cond_fail(b.arg(1), "m1");
    b.cond_fail(b.arg(2), "m2");
    b.cond_fail(b.arg(3), "m2");
    let (func, block) = b.finish();

    let (func, _, _) = merge(func);

    assert_eq!(
        lines(&func, block),
        [
            "%5 = builtin \"or\" (%0, %1) : $Int1",
            "cond_fail %5, \"m1\"",
            "%6 = builtin \"or\" (%2, %3) : $Int1",
            "cond_fail %6, \"m2\"",
            "%4 = tuple ()",
            "return %4",
        ]
    );
}

// No-ops

#[test]
fn single_trap_is_untouched() {
    let mut b = BlockBuilder::new(1);
    let trap = b.cond_fail(b.arg(0), "msg");
    let (func, block) = b.finish();

    let (func, changed, invalidated) = merge(func);

    assert!(!changed);
    assert!(invalidated.is_empty());
    assert!(func.is_live(trap));
    assert_eq!(func.num_insts(), 3);
    assert_eq!(func.insts(block).next(), Some(trap));
}

#[test]
fn merging_twice_changes_nothing_more() {
    let mut b = BlockBuilder::new(3);
    b.cond_fail(b.arg(0), "msg");
    b.cond_fail(b.arg(1), "msg");
    b.cond_fail(b.arg(2), "other");
    let (func, block) = b.finish();

    let (once, changed, _) = merge(func);
    assert!(changed);
    let (twice, changed_again, _) = merge(once.clone());

    assert!(!changed_again);
    assert_eq!(lines(&twice, block), lines(&once, block));
}

#[test]
fn same_condition_twice_merges() {
    let mut b = BlockBuilder::new(1);
    let x: ValueId = b.arg(0);
    b.cond_fail(x, "msg");
    b.cond_fail(x, "msg");
    let (func, block) = b.finish();

    let (func, _, _) = merge(func);

    let printed = lines(&func, block);
    assert_eq!(
        &printed[..2],
        [
            "%2 = builtin \"or\" (%0, %0) : $Int1",
            "cond_fail %2, \"msg\"",
        ]
    );
}
