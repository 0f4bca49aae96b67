//! Error types, one enum per pipeline stage.
//!
//! Keeping construction, disassembly, assembly, and stack-solving failures
//! distinct lets callers route recovery without string matching. Variants
//! carry the offending value (label, opcode, offset) rather than formatted
//! text.

use std::fmt;

use crate::{
    bytecode::Label,
    cfg::BlockId,
    op::{OpKind, Opcode},
    version::PythonVersion,
};

/// Error constructing or mutating an abstract instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrError {
    /// The argument variant does not match the opcode's category for the
    /// active version.
    InvalidArgumentKind {
        opcode: Opcode,
        expected: OpKind,
    },
    /// A raw argument outside `[0, 2^31)`.
    RawOutOfRange { value: u32 },
    /// A pseudo or instrumented opcode (`EXTENDED_ARG`, `CACHE`) used where
    /// only real instructions are allowed.
    InvalidInstructionUsage { opcode: Opcode },
    /// The mnemonic does not exist in the selected version.
    UnsupportedOpcode {
        opcode: Opcode,
        version: PythonVersion,
    },
}

impl fmt::Display for InstrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgumentKind { opcode, expected } => {
                write!(f, "argument of {opcode} must match category {expected}")
            }
            Self::RawOutOfRange { value } => {
                write!(f, "raw argument {value} exceeds 2**31 - 1")
            }
            Self::InvalidInstructionUsage { opcode } => {
                write!(f, "{opcode} cannot be used as an abstract instruction")
            }
            Self::UnsupportedOpcode { opcode, version } => {
                write!(f, "{opcode} does not exist in Python {version}")
            }
        }
    }
}

impl std::error::Error for InstrError {}

/// Error decoding a packed code unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisassembleError {
    /// An opcode number absent from the active version's table.
    UnknownOpcode { value: u8, version: PythonVersion },
    /// The code bytes end in the middle of an instruction.
    TruncatedCode { offset: usize },
    /// A jump argument resolves to an offset that is not an instruction
    /// boundary (or lies outside the code).
    InvalidJumpTarget { offset: u32, target: u32 },
    /// The packed line table cannot be decoded.
    MalformedLineTable { offset: usize },
    /// The packed exception table cannot be decoded.
    MalformedExceptionTable { offset: usize },
    /// An exception-table entry references offsets outside the code or not
    /// on instruction boundaries.
    InvalidExceptionEntry { start: u32, stop: u32, target: u32 },
    /// A concrete argument indexes past the end of its pool.
    PoolIndexOutOfRange {
        opcode: Opcode,
        index: u32,
        pool_len: usize,
    },
    /// A wire value with no enum member (compare operator, binary
    /// operator, intrinsic).
    InvalidOperand { opcode: Opcode, value: u32 },
}

impl fmt::Display for DisassembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { value, version } => {
                write!(f, "unknown opcode {value} for Python {version}")
            }
            Self::TruncatedCode { offset } => {
                write!(f, "code truncated at byte offset {offset}")
            }
            Self::InvalidJumpTarget { offset, target } => {
                write!(f, "jump at offset {offset} targets non-instruction offset {target}")
            }
            Self::MalformedLineTable { offset } => {
                write!(f, "malformed line table at byte {offset}")
            }
            Self::MalformedExceptionTable { offset } => {
                write!(f, "malformed exception table at byte {offset}")
            }
            Self::InvalidExceptionEntry { start, stop, target } => {
                write!(f, "exception entry {start}..={stop} -> {target} is out of bounds")
            }
            Self::PoolIndexOutOfRange { opcode, index, pool_len } => {
                write!(f, "{opcode} argument {index} exceeds pool of length {pool_len}")
            }
            Self::InvalidOperand { opcode, value } => {
                write!(f, "{opcode} operand {value} has no known meaning")
            }
        }
    }
}

impl std::error::Error for DisassembleError {}

/// Error assembling an abstract stream (or flattening a CFG) back into
/// concrete form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    /// A jump references a label that is not present in the stream.
    UnresolvedTarget(Label),
    /// A jump references a basic block that is not in the graph.
    UnresolvedBlock(BlockId),
    /// The docstring was supplied both via the header and explicitly by
    /// the stream.
    DuplicateDocstring,
    /// The `EXTENDED_ARG` fixed point did not converge within the pass
    /// budget.
    JumpsUnstable { passes: u32 },
    /// A relative jump's target lies on the wrong side of the instruction.
    NegativeJump { index: usize },
    /// An instruction's argument violates its category. Indexed by stream
    /// position.
    InvalidArgumentKind { index: usize },
    /// A `Cell`/`Free` argument names a variable absent from the header's
    /// `cellvars`/`freevars`.
    UnknownDeref { name: String, is_cell: bool },
    /// The mnemonic does not exist in the target version.
    UnsupportedOpcode {
        opcode: Opcode,
        version: PythonVersion,
    },
    /// A `TryBegin` without a recorded stack depth, with the solver
    /// bypassed by a caller-supplied stacksize.
    MissingTryDepth,
    /// The stack-depth solver rejected the stream.
    Stack(StackDepthError),
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedTarget(label) => {
                write!(f, "jump to label {label:?} which is not in the stream")
            }
            Self::UnresolvedBlock(block) => {
                write!(f, "jump to block {block:?} which is not in the graph")
            }
            Self::DuplicateDocstring => {
                f.write_str("docstring supplied both in the header and in the constants")
            }
            Self::JumpsUnstable { passes } => {
                write!(f, "jump offsets did not stabilize after {passes} passes")
            }
            Self::NegativeJump { index } => {
                write!(f, "relative jump at stream index {index} crosses in the wrong direction")
            }
            Self::InvalidArgumentKind { index } => {
                write!(f, "instruction at stream index {index} carries a mismatched argument")
            }
            Self::UnknownDeref { name, is_cell } => {
                let space = if *is_cell { "cellvars" } else { "freevars" };
                write!(f, "variable {name:?} is not in {space}")
            }
            Self::UnsupportedOpcode { opcode, version } => {
                write!(f, "{opcode} does not exist in Python {version}")
            }
            Self::MissingTryDepth => {
                f.write_str("TryBegin has no stack depth and the solver was bypassed")
            }
            Self::Stack(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AssembleError {}

impl From<StackDepthError> for AssembleError {
    fn from(err: StackDepthError) -> Self {
        Self::Stack(err)
    }
}

/// Error from the operand-stack depth solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackDepthError {
    /// An instruction requires more operands than the stack holds on some
    /// path. `instr` is the index inside the block.
    StackUnderflow { block: BlockId, instr: usize },
    /// A block is entered at contradictory depths via explicit exception
    /// seeds.
    InconsistentStack { block: BlockId },
}

impl fmt::Display for StackDepthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackUnderflow { block, instr } => {
                write!(f, "stack underflow in block {block:?} at instruction {instr}")
            }
            Self::InconsistentStack { block } => {
                write!(f, "block {block:?} entered at inconsistent stack depths")
            }
        }
    }
}

impl std::error::Error for StackDepthError {}
