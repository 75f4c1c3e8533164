//! Textual IR dumps.
//!
//! ```text
//! func @f {
//! bb0(%0 : $Int1, %1 : $Int1):
//!   %2 = builtin "or" (%0, %1) : $Int1
//!   cond_fail %2, "overflow"
//!   %3 = tuple ()
//!   return %3
//! }
//! ```
//!
//! Values print by their raw ID, so IDs of erased values leave gaps.

use std::fmt::{self, Write};

use crate::function::{BlockId, Function, InstId, ValueId};
use crate::inst::InstKind;

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "func @{} {{", self.name())?;
        for block in self.blocks() {
            write_block_header(self, block, f)?;
            for inst in self.insts(block) {
                f.write_str("  ")?;
                write_inst(self, inst, f)?;
                f.write_char('\n')?;
            }
        }
        writeln!(f, "}}")
    }
}

/// Render a single instruction, without indentation or newline.
pub fn inst_to_string(func: &Function, inst: InstId) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_inst(func, inst, &mut out);
    out
}

fn write_block_header(func: &Function, block: BlockId, f: &mut impl Write) -> fmt::Result {
    write!(f, "{block}")?;
    let args = func.block_args(block);
    if !args.is_empty() {
        f.write_char('(')?;
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg} : ${}", func.value_type(arg))?;
        }
        f.write_char(')')?;
    }
    f.write_str(":\n")
}

fn write_values(values: &[ValueId], f: &mut impl Write) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}

fn write_target(target: BlockId, args: &[ValueId], f: &mut impl Write) -> fmt::Result {
    write!(f, "{target}")?;
    if !args.is_empty() {
        f.write_char('(')?;
        write_values(args, f)?;
        f.write_char(')')?;
    }
    Ok(())
}

fn write_inst(func: &Function, inst: InstId, f: &mut impl Write) -> fmt::Result {
    let ops = func.operands(inst);
    if let Some(result) = func.result(inst) {
        write!(f, "{result} = ")?;
    }
    let kind = func.kind(inst);
    let mnemonic = kind.mnemonic();
    match kind {
        InstKind::IntegerLiteral { value, bits } => {
            write!(f, "{mnemonic} $Int{bits}, {value}")
        }
        InstKind::Builtin(op) => {
            write!(f, "{mnemonic} \"{}\" (", op.name())?;
            write_values(ops, f)?;
            let ty = func.result(inst).map(|r| func.value_type(r));
            match ty {
                Some(ty) => write!(f, ") : ${ty}"),
                None => f.write_char(')'),
            }
        }
        InstKind::Tuple => {
            write!(f, "{mnemonic} (")?;
            write_values(ops, f)?;
            f.write_char(')')
        }
        InstKind::TupleExtract { field } => write!(f, "{mnemonic} {}, {field}", ops[0]),
        InstKind::FunctionRef { symbol, ty } => write!(f, "{mnemonic} @{symbol} : ${ty}"),
        InstKind::Apply => {
            write!(f, "{mnemonic} {}(", ops[0])?;
            write_values(&ops[1..], f)?;
            f.write_char(')')
        }
        InstKind::AllocStack { ty } => write!(f, "{mnemonic} ${ty}"),
        InstKind::Store => write!(f, "{mnemonic} {} to {}", ops[0], ops[1]),
        InstKind::DebugValue { name } => write!(f, "{mnemonic} {}, name \"{name}\"", ops[0]),
        InstKind::CondFail { message } => write!(f, "{mnemonic} {}, \"{message}\"", ops[0]),
        InstKind::DeallocStack
        | InstKind::Load
        | InstKind::StrongRetain
        | InstKind::StrongRelease
        | InstKind::FixLifetime
        | InstKind::Return => write!(f, "{mnemonic} {}", ops[0]),
        InstKind::Br { target } => {
            write!(f, "{mnemonic} ")?;
            write_target(*target, ops, f)
        }
        InstKind::CondBr {
            then_block,
            else_block,
            then_args,
        } => {
            let split = 1 + *then_args as usize;
            write!(f, "{mnemonic} {}, ", ops[0])?;
            write_target(*then_block, &ops[1..split], f)?;
            f.write_str(", ")?;
            write_target(*else_block, &ops[split..], f)
        }
        InstKind::Unreachable => f.write_str(mnemonic),
    }
}
