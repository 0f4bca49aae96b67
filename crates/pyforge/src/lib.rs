#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional")]
#![expect(clippy::cast_possible_wrap, reason = "wrap behavior mirrors the wire formats")]

mod asm;
mod bytecode;
mod cfg;
mod code;
mod concrete;
mod constant;
mod disasm;
mod error;
pub mod exception_table;
pub mod flags;
mod instr;
pub mod lineno;
mod location;
mod op;
mod stackdepth;
mod tables;
mod version;

pub use crate::{
    asm::{DEFAULT_MAX_PASSES, assemble, assemble_with_max_passes},
    bytecode::{Bytecode, BytecodeElement, Label, TryBegin, TryEnd, TryId},
    cfg::{BasicBlock, BlockElement, BlockId, ControlFlowGraph},
    code::{CodeInfo, CodeUnit},
    concrete::{ConcreteBytecode, ConcreteInstr, extended_args_for},
    constant::{Const, ConstKey},
    disasm::disassemble,
    error::{AssembleError, DisassembleError, InstrError, StackDepthError},
    exception_table::ExceptionTableEntry,
    flags::CodeFlags,
    instr::{Instr, InstrArg, JumpTarget, MAX_RAW_ARG},
    location::InstrLocation,
    op::{BinaryOperator, CompareOperator, Intrinsic1Function, Intrinsic2Function, OpKind, Opcode},
    stackdepth::SolvedStack,
    tables::{EffectSpec, OpcodeInfo, OpcodeTable},
    version::{LineTableFormat, PythonVersion},
};
