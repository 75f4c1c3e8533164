//! Function, block, instruction and value storage.
//!
//! A [`Function`] is an arena: blocks, instructions and values live in
//! vectors indexed by the [`BlockId`], [`InstId`] and [`ValueId`] newtypes.
//! Instruction slots are never reused, so an erased instruction leaves a
//! tombstone and every later access through its handle is detected as stale.
//!
//! Within a block, instructions form a doubly-linked list (`prev`/`next`),
//! which gives O(1) "insert before/after" and keeps handles stable while a
//! pass walks the block and rewrites it.
//!
//! Every value owns a use-list of `(user, operand_index)` pairs. The raw
//! mutation primitives here keep operands and use-lists in lockstep; passes
//! reach them only through [`PassContext`](crate::PassContext).

use std::fmt;

use smallvec::SmallVec;

use crate::error::{IrError, Violation};
use crate::inst::{InstClass, InstKind, ResultTypes, TypedInst};
use crate::types::Type;

// ── ID newtypes ─────────────────────────────────────────────────────

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an ID from a raw index.
            #[inline]
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Basic block within a [`Function`]. Allocated sequentially from 0;
    /// `bb0` is the entry block.
    BlockId,
    "bb"
);
define_id!(
    /// Instruction within a [`Function`]. Never reused after erasure.
    InstId,
    "inst"
);
define_id!(
    /// SSA value: an instruction result or a block argument.
    ValueId,
    "%"
);

fn next_raw(len: usize, what: &str) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("{what} count exceeds u32::MAX"))
}

// ── Source locations ────────────────────────────────────────────────

/// Opaque source-provenance token carried by every instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    pub start: u32,
    pub end: u32,
}

impl Location {
    /// Location for compiler-synthesized code with no source counterpart.
    pub const UNKNOWN: Location = Location { start: 0, end: 0 };

    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Location { start, end }
    }
}

// ── Use-lists ───────────────────────────────────────────────────────

/// One use of a value: operand `operand_index` of instruction `user`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: InstId,
    pub operand_index: u32,
}

/// Where a value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueDef {
    /// Result `index` of instruction `inst`.
    InstResult { inst: InstId, index: u32 },
    /// Argument `index` of block `block`.
    BlockArg { block: BlockId, index: u32 },
}

// ── Entity data ─────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct ValueData {
    def: ValueDef,
    ty: Type,
    uses: SmallVec<[Use; 2]>,
}

#[derive(Clone, Debug, Default)]
struct BlockData {
    args: SmallVec<[ValueId; 2]>,
    first: Option<InstId>,
    last: Option<InstId>,
}

#[derive(Clone, Debug)]
struct InstData {
    kind: InstKind,
    operands: SmallVec<[ValueId; 3]>,
    results: SmallVec<[ValueId; 1]>,
    location: Location,
    block: BlockId,
    prev: Option<InstId>,
    next: Option<InstId>,
}

/// Placement of a new instruction relative to existing ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPoint {
    /// Immediately before the given instruction.
    Before(InstId),
    /// Immediately after the given instruction.
    After(InstId),
    /// At the end of the given block.
    AtEnd(BlockId),
}

// ── Function ────────────────────────────────────────────────────────

/// A function body: blocks in layout order and everything they contain.
///
/// Blocks are laid out in creation order. The optimizer core never adds or
/// removes blocks; earlier stages build them with [`add_block`](Self::add_block)
/// and [`append_inst`](Self::append_inst).
#[derive(Clone, Debug)]
pub struct Function {
    name: String,
    blocks: Vec<BlockData>,
    insts: Vec<Option<InstData>>,
    values: Vec<ValueData>,
    live_insts: usize,
}

impl Function {
    /// Create an empty function with the given (mangled) symbol name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            insts: Vec::new(),
            values: Vec::new(),
            live_insts: 0,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Construction ────────────────────────────────────────────

    /// Append a new block with arguments of the given types.
    pub fn add_block(&mut self, arg_types: impl IntoIterator<Item = Type>) -> BlockId {
        let block = BlockId::new(next_raw(self.blocks.len(), "block"));
        let mut args = SmallVec::new();
        for (index, ty) in arg_types.into_iter().enumerate() {
            args.push(self.new_value(
                ValueDef::BlockArg {
                    block,
                    index: next_raw(index, "block argument"),
                },
                ty,
            ));
        }
        self.blocks.push(BlockData {
            args,
            first: None,
            last: None,
        });
        block
    }

    /// Append an instruction at the end of `block`.
    ///
    /// Used by earlier compiler stages to build function bodies. Operands
    /// are type-checked and registered in their use-lists.
    pub fn append_inst(
        &mut self,
        block: BlockId,
        kind: InstKind,
        operands: &[ValueId],
        location: Location,
    ) -> Result<InstId, IrError> {
        self.insert_inst(InsertPoint::AtEnd(block), kind, operands, location)
    }

    // ── Blocks ──────────────────────────────────────────────────

    /// Number of blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// The entry block, if the function has a body.
    pub fn entry_block(&self) -> Option<BlockId> {
        (!self.blocks.is_empty()).then(|| BlockId::new(0))
    }

    /// All blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len()).map(|i| BlockId::new(next_raw(i, "block")))
    }

    #[inline]
    pub fn has_block(&self, block: BlockId) -> bool {
        block.index() < self.blocks.len()
    }

    /// Block argument values.
    pub fn block_args(&self, block: BlockId) -> &[ValueId] {
        &self.block(block).args
    }

    pub fn first_inst(&self, block: BlockId) -> Option<InstId> {
        self.block(block).first
    }

    pub fn last_inst(&self, block: BlockId) -> Option<InstId> {
        self.block(block).last
    }

    /// The block's terminator, if its last instruction is one.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        self.last_inst(block)
            .filter(|&inst| self.kind(inst).is_terminator())
    }

    /// Instructions of `block` in layout order.
    pub fn insts(&self, block: BlockId) -> BlockInsts<'_> {
        BlockInsts {
            func: self,
            next: self.first_inst(block),
        }
    }

    fn block(&self, block: BlockId) -> &BlockData {
        self.blocks
            .get(block.index())
            .unwrap_or_else(|| panic!("unknown block {block} in function `{}`", self.name))
    }

    // ── Instructions ────────────────────────────────────────────

    /// Number of live (non-erased) instructions.
    #[inline]
    pub fn num_insts(&self) -> usize {
        self.live_insts
    }

    /// Returns `true` if `inst` belongs to this function and is not erased.
    #[inline]
    pub fn is_live(&self, inst: InstId) -> bool {
        matches!(self.insts.get(inst.index()), Some(Some(_)))
    }

    pub fn kind(&self, inst: InstId) -> &InstKind {
        &self.inst(inst).kind
    }

    pub fn operands(&self, inst: InstId) -> &[ValueId] {
        &self.inst(inst).operands
    }

    /// Operand `index` of `inst`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn operand(&self, inst: InstId, index: usize) -> ValueId {
        let data = self.inst(inst);
        data.operands.get(index).copied().unwrap_or_else(|| {
            panic!(
                "operand {index} out of range for {inst} ({} operand(s))",
                data.operands.len()
            )
        })
    }

    pub fn results(&self, inst: InstId) -> &[ValueId] {
        &self.inst(inst).results
    }

    /// The single result of `inst`, if it produces one.
    pub fn result(&self, inst: InstId) -> Option<ValueId> {
        self.inst(inst).results.first().copied()
    }

    pub fn location(&self, inst: InstId) -> Location {
        self.inst(inst).location
    }

    /// The block containing `inst`.
    pub fn inst_block(&self, inst: InstId) -> BlockId {
        self.inst(inst).block
    }

    pub fn next_inst(&self, inst: InstId) -> Option<InstId> {
        self.inst(inst).next
    }

    pub fn prev_inst(&self, inst: InstId) -> Option<InstId> {
        self.inst(inst).prev
    }

    /// Narrow `inst` to the statically known class `K`.
    pub fn narrow<K: InstClass>(&self, inst: InstId) -> Result<TypedInst<K>, IrError> {
        let kind = &self.try_inst(inst)?.kind;
        if K::matches(kind) {
            Ok(TypedInst::new(inst))
        } else {
            Err(Violation::KindMismatch {
                inst,
                expected: K::NAME,
                found: kind.mnemonic(),
            }
            .into())
        }
    }

    /// # Panics
    ///
    /// Panics on a stale or foreign handle. Reading through such a handle
    /// is a pass bug; mutation entry points report it as an error instead.
    fn inst(&self, inst: InstId) -> &InstData {
        match self.insts.get(inst.index()) {
            Some(Some(data)) => data,
            Some(None) => panic!("stale handle: {inst} has been erased"),
            None => panic!("unknown instruction {inst} in function `{}`", self.name),
        }
    }

    fn try_inst(&self, inst: InstId) -> Result<&InstData, IrError> {
        match self.insts.get(inst.index()) {
            Some(Some(data)) => Ok(data),
            _ => Err(Violation::StaleInstruction(inst).into()),
        }
    }

    fn inst_mut(&mut self, inst: InstId) -> &mut InstData {
        match self.insts.get_mut(inst.index()) {
            Some(Some(data)) => data,
            _ => panic!("stale handle: {inst} has been erased"),
        }
    }

    // ── Values ──────────────────────────────────────────────────

    pub fn value_type(&self, value: ValueId) -> &Type {
        &self.value(value).ty
    }

    pub fn value_def(&self, value: ValueId) -> ValueDef {
        self.value(value).def
    }

    /// Current uses of `value`.
    pub fn uses(&self, value: ValueId) -> &[Use] {
        &self.value(value).uses
    }

    #[inline]
    pub fn has_uses(&self, value: ValueId) -> bool {
        !self.value(value).uses.is_empty()
    }

    /// The instruction producing `value`, or `None` for block arguments.
    pub fn defining_inst(&self, value: ValueId) -> Option<InstId> {
        match self.value_def(value) {
            ValueDef::InstResult { inst, .. } => Some(inst),
            ValueDef::BlockArg { .. } => None,
        }
    }

    /// Returns `true` if `value` exists and its definition is still live.
    pub fn is_live_value(&self, value: ValueId) -> bool {
        match self.values.get(value.index()) {
            Some(data) => match data.def {
                ValueDef::InstResult { inst, .. } => self.is_live(inst),
                ValueDef::BlockArg { block, .. } => self.has_block(block),
            },
            None => false,
        }
    }

    /// All value IDs ever allocated, live or not.
    pub(crate) fn all_values(&self) -> impl Iterator<Item = ValueId> {
        (0..self.values.len()).map(|i| ValueId::new(next_raw(i, "value")))
    }

    fn value(&self, value: ValueId) -> &ValueData {
        self.values
            .get(value.index())
            .unwrap_or_else(|| panic!("unknown value {value} in function `{}`", self.name))
    }

    fn new_value(&mut self, def: ValueDef, ty: Type) -> ValueId {
        let id = ValueId::new(next_raw(self.values.len(), "value"));
        self.values.push(ValueData {
            def,
            ty,
            uses: SmallVec::new(),
        });
        id
    }

    // ── Validation ──────────────────────────────────────────────

    /// Type-check `operands` against `kind` and compute the result types.
    ///
    /// Includes the branch-argument checks that need the target block's
    /// signature.
    pub(crate) fn check_operands(
        &self,
        kind: &InstKind,
        operands: &[ValueId],
    ) -> Result<ResultTypes, IrError> {
        for &operand in operands {
            if !self.is_live_value(operand) {
                return Err(Violation::UnknownValue(operand).into());
            }
        }
        let types: SmallVec<[&Type; 4]> = operands.iter().map(|&v| self.value_type(v)).collect();
        let results = kind.infer_results(&types)?;

        match kind {
            InstKind::Br { target } => self.check_branch_args(*target, &types)?,
            InstKind::CondBr {
                then_block,
                else_block,
                then_args,
            } => {
                let split = 1 + *then_args as usize;
                self.check_branch_args(*then_block, &types[1..split])?;
                self.check_branch_args(*else_block, &types[split..])?;
            }
            _ => {}
        }
        Ok(results)
    }

    fn check_branch_args(&self, target: BlockId, args: &[&Type]) -> Result<(), IrError> {
        if !self.has_block(target) {
            return Err(Violation::UnknownBlock(target).into());
        }
        let params = &self.blocks[target.index()].args;
        if params.len() != args.len() {
            return Err(Violation::BranchArity {
                target,
                expected: params.len(),
                found: args.len(),
            }
            .into());
        }
        for (&param, &arg) in params.iter().zip(args) {
            let expected = self.value_type(param);
            if !arg.is_assignable_to(expected) {
                return Err(IrError::type_mismatch(expected, arg));
            }
        }
        Ok(())
    }

    /// Resolve an insertion point to `(block, prev, next)` neighbors.
    fn resolve_point(
        &self,
        point: InsertPoint,
    ) -> Result<(BlockId, Option<InstId>, Option<InstId>), IrError> {
        match point {
            InsertPoint::Before(anchor) => {
                let data = self.try_inst(anchor)?;
                Ok((data.block, data.prev, Some(anchor)))
            }
            InsertPoint::After(anchor) => {
                let data = self.try_inst(anchor)?;
                Ok((data.block, Some(anchor), data.next))
            }
            InsertPoint::AtEnd(block) => {
                if !self.has_block(block) {
                    return Err(Violation::UnknownBlock(block).into());
                }
                Ok((block, self.blocks[block.index()].last, None))
            }
        }
    }

    // ── Raw mutation (driven by PassContext and Builder) ────────

    /// Insert a new instruction at `point`.
    ///
    /// A terminator may only go at the end of a block or directly before
    /// the terminator it is about to replace. Nothing may follow a
    /// terminator, so a block holds at most the old terminator and its
    /// pending replacement.
    pub(crate) fn insert_inst(
        &mut self,
        point: InsertPoint,
        kind: InstKind,
        operands: &[ValueId],
        location: Location,
    ) -> Result<InstId, IrError> {
        let (block, prev, next) = self.resolve_point(point)?;
        let next_is_terminator = next.is_some_and(|n| self.kind(n).is_terminator());
        let prev_is_terminator = prev.is_some_and(|p| self.kind(p).is_terminator());
        let placement_ok = if kind.is_terminator() {
            !prev_is_terminator && (next.is_none() || next_is_terminator)
        } else {
            !prev_is_terminator
        };
        if !placement_ok {
            return Err(Violation::TerminatorNotLast { block }.into());
        }
        let result_types = self.check_operands(&kind, operands)?;

        let id = InstId::new(next_raw(self.insts.len(), "instruction"));
        let mut results = SmallVec::new();
        for (index, ty) in result_types.into_iter().enumerate() {
            results.push(self.new_value(
                ValueDef::InstResult {
                    inst: id,
                    index: next_raw(index, "result"),
                },
                ty,
            ));
        }
        for (index, &operand) in operands.iter().enumerate() {
            self.values[operand.index()].uses.push(Use {
                user: id,
                operand_index: next_raw(index, "operand"),
            });
        }
        self.insts.push(Some(InstData {
            kind,
            operands: operands.iter().copied().collect(),
            results,
            location,
            block,
            prev,
            next,
        }));
        self.live_insts += 1;

        match prev {
            Some(p) => self.inst_mut(p).next = Some(id),
            None => self.blocks[block.index()].first = Some(id),
        }
        match next {
            Some(n) => self.inst_mut(n).prev = Some(id),
            None => self.blocks[block.index()].last = Some(id),
        }
        Ok(id)
    }

    /// Unlink `inst` from its block, drop its operand uses and tombstone it.
    ///
    /// The caller has verified that no result of `inst` is still used.
    pub(crate) fn remove_inst(&mut self, inst: InstId) {
        let Some(data) = self.insts.get_mut(inst.index()).and_then(Option::take) else {
            panic!("stale handle: {inst} has been erased");
        };
        debug_assert!(
            data.results.iter().all(|&r| self.values[r.index()].uses.is_empty()),
            "removing {inst} while its results are still used",
        );
        for (index, &operand) in data.operands.iter().enumerate() {
            let index = next_raw(index, "operand");
            self.values[operand.index()]
                .uses
                .retain(|u| !(u.user == inst && u.operand_index == index));
        }
        match data.prev {
            Some(p) => self.inst_mut(p).next = data.next,
            None => self.blocks[data.block.index()].first = data.next,
        }
        match data.next {
            Some(n) => self.inst_mut(n).prev = data.prev,
            None => self.blocks[data.block.index()].last = data.prev,
        }
        self.live_insts -= 1;
    }

    /// Rebind operand `index` of `inst` to `value`, moving the use entry.
    pub(crate) fn set_operand_raw(&mut self, inst: InstId, index: usize, value: ValueId) {
        let old = {
            let data = self.inst_mut(inst);
            std::mem::replace(&mut data.operands[index], value)
        };
        let operand_index = next_raw(index, "operand");
        self.values[old.index()]
            .uses
            .retain(|u| !(u.user == inst && u.operand_index == operand_index));
        self.values[value.index()].uses.push(Use {
            user: inst,
            operand_index,
        });
    }

    /// Redirect every use of `of` to `with`. Returns the moved uses.
    pub(crate) fn replace_all_uses_raw(&mut self, of: ValueId, with: ValueId) -> SmallVec<[Use; 2]> {
        let moved = std::mem::take(&mut self.values[of.index()].uses);
        for u in &moved {
            let slot = &mut self.inst_mut(u.user).operands[u.operand_index as usize];
            debug_assert_eq!(*slot, of);
            *slot = with;
        }
        self.values[with.index()].uses.extend(moved.iter().copied());
        moved
    }
}

/// Iterator over a block's instructions in layout order.
pub struct BlockInsts<'f> {
    func: &'f Function,
    next: Option<InstId>,
}

impl Iterator for BlockInsts<'_> {
    type Item = InstId;

    fn next(&mut self) -> Option<InstId> {
        let current = self.next?;
        self.next = self.func.next_inst(current);
        Some(current)
    }
}
