//! Opcode mnemonics, argument categories, and operand enums.
//!
//! [`Opcode`] is the union of the mnemonics used by CPython 3.8 through 3.12.
//! Whether a given mnemonic exists in a given release, which number it
//! carries there, and how its argument is interpreted is the business of
//! [`crate::tables`]; this module only names things.

use strum::{Display, EnumString, FromRepr, IntoStaticStr};

/// A bytecode mnemonic.
///
/// Display and parsing use the interpreter spelling (`LOAD_CONST`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    // Stack manipulation
    PopTop,
    RotTwo,
    RotThree,
    RotFour,
    RotN,
    DupTop,
    DupTopTwo,
    Copy,
    Swap,
    PushNull,
    Nop,
    Cache,

    // Unary operators
    UnaryPositive,
    UnaryNegative,
    UnaryNot,
    UnaryInvert,

    // Binary operators (dedicated opcodes through 3.10)
    BinaryPower,
    BinaryMultiply,
    BinaryMatrixMultiply,
    BinaryModulo,
    BinaryAdd,
    BinarySubtract,
    BinaryFloorDivide,
    BinaryTrueDivide,
    BinaryLshift,
    BinaryRshift,
    BinaryAnd,
    BinaryXor,
    BinaryOr,
    InplacePower,
    InplaceMultiply,
    InplaceMatrixMultiply,
    InplaceModulo,
    InplaceAdd,
    InplaceSubtract,
    InplaceFloorDivide,
    InplaceTrueDivide,
    InplaceLshift,
    InplaceRshift,
    InplaceAnd,
    InplaceXor,
    InplaceOr,
    // Single parameterized opcode from 3.11
    BinaryOp,

    // Subscripts and slices
    BinarySubscr,
    StoreSubscr,
    DeleteSubscr,
    BinarySlice,
    StoreSlice,
    BuildSlice,

    // Comparisons
    CompareOp,
    IsOp,
    ContainsOp,

    // Constants, names, locals
    LoadConst,
    ReturnConst,
    LoadName,
    StoreName,
    DeleteName,
    LoadGlobal,
    StoreGlobal,
    DeleteGlobal,
    LoadFast,
    LoadFastCheck,
    LoadFastAndClear,
    StoreFast,
    DeleteFast,
    LoadAttr,
    StoreAttr,
    DeleteAttr,
    LoadMethod,
    LoadSuperAttr,
    LoadLocals,
    LoadFromDictOrGlobals,
    LoadFromDictOrDeref,

    // Cells and free variables
    LoadDeref,
    StoreDeref,
    DeleteDeref,
    LoadClosure,
    LoadClassderef,
    MakeCell,
    CopyFreeVars,

    // Jumps
    JumpForward,
    JumpAbsolute,
    JumpBackward,
    JumpBackwardNoInterrupt,
    JumpIfFalseOrPop,
    JumpIfTrueOrPop,
    PopJumpIfFalse,
    PopJumpIfTrue,
    PopJumpIfNone,
    PopJumpIfNotNone,
    PopJumpForwardIfFalse,
    PopJumpForwardIfTrue,
    PopJumpForwardIfNone,
    PopJumpForwardIfNotNone,
    PopJumpBackwardIfFalse,
    PopJumpBackwardIfTrue,
    PopJumpBackwardIfNone,
    PopJumpBackwardIfNotNone,
    JumpIfNotExcMatch,

    // Iteration
    GetIter,
    GetYieldFromIter,
    ForIter,
    EndFor,

    // Calls
    CallFunction,
    CallFunctionKw,
    CallFunctionEx,
    CallMethod,
    Precall,
    Call,
    KwNames,
    #[strum(serialize = "CALL_INTRINSIC_1")]
    CallIntrinsic1,
    #[strum(serialize = "CALL_INTRINSIC_2")]
    CallIntrinsic2,
    MakeFunction,

    // Returns and yields
    ReturnValue,
    ReturnGenerator,
    YieldValue,
    YieldFrom,
    GetAwaitable,
    GetAiter,
    GetAnext,
    EndSend,
    Send,
    GenStart,
    Resume,
    InterpreterExit,

    // Exception handling
    PopBlock,
    PopExcept,
    AsyncGenWrap,
    PrepReraiseStar,
    PushExcInfo,
    CheckExcMatch,
    CheckEgMatch,
    Reraise,
    RaiseVarargs,
    WithExceptStart,
    SetupFinally,
    SetupWith,
    SetupAsyncWith,
    BeginFinally,
    EndFinally,
    CallFinally,
    PopFinally,
    WithCleanupStart,
    WithCleanupFinish,
    LoadAssertionError,
    CleanupThrow,
    BeforeWith,
    BeforeAsyncWith,
    EndAsyncFor,

    // Collection construction
    BuildTuple,
    BuildList,
    BuildSet,
    BuildMap,
    BuildConstKeyMap,
    BuildString,
    BuildTupleUnpack,
    BuildTupleUnpackWithCall,
    BuildListUnpack,
    BuildSetUnpack,
    BuildMapUnpack,
    BuildMapUnpackWithCall,
    ListAppend,
    SetAdd,
    MapAdd,
    ListExtend,
    SetUpdate,
    DictMerge,
    DictUpdate,
    ListToTuple,

    // Unpacking
    UnpackSequence,
    UnpackEx,

    // Imports
    ImportName,
    ImportFrom,
    ImportStar,

    // Pattern matching (3.10+)
    GetLen,
    MatchMapping,
    MatchSequence,
    MatchKeys,
    MatchClass,
    CopyDictWithoutKeys,

    // Misc
    PrintExpr,
    LoadBuildClass,
    SetupAnnotations,
    FormatValue,
    ExtendedArg,
}

/// The argument category of an opcode, per version.
///
/// The category decides which [`crate::instr::InstrArg`] variants an abstract
/// instruction may carry and how the disassembler interprets the raw integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, serde::Serialize, serde::Deserialize)]
pub enum OpKind {
    /// No argument; the concrete arg byte is ignored (and emitted as 0).
    NoArg,
    /// Jump with an absolute target, in jump units.
    JumpAbs,
    /// Jump relative forward from the end of the instruction.
    JumpFwd,
    /// Jump relative backward from the end of the instruction.
    JumpBack,
    /// Index into `varnames`.
    Local,
    /// Index into `names`.
    Name,
    /// Index into `cellvars ++ freevars`; one category covers both because
    /// a single opcode (`LOAD_DEREF` and friends) addresses either list.
    Deref,
    /// Index into `consts`.
    Const,
    /// A [`CompareOperator`] member.
    Compare,
    /// A [`BinaryOperator`] member (3.11+ `BINARY_OP`).
    Binary,
    /// A [`Intrinsic1Function`] member (3.12 `CALL_INTRINSIC_1`).
    Intrinsic1,
    /// A [`Intrinsic2Function`] member (3.12 `CALL_INTRINSIC_2`).
    Intrinsic2,
    /// 3.11+ `LOAD_GLOBAL`: `names` index in the high bits, push-NULL flag
    /// in bit 0.
    LoadGlobal,
    /// 3.12 `LOAD_ATTR`: `names` index in the high bits, method-load flag
    /// in bit 0.
    LoadAttr,
    /// 3.12 `LOAD_SUPER_ATTR`: `names` index in the high bits, push-NULL
    /// flag in bit 1, method-load flag in bit 0.
    LoadSuperAttr,
    /// An opaque small integer (counts, flag words, cache hints).
    Raw,
    /// Not expressible abstractly: `EXTENDED_ARG`, `CACHE`, instrumented
    /// variants. Concrete streams may carry these; abstract ones may not.
    Pseudo,
}

impl OpKind {
    /// Whether this category addresses another instruction.
    #[must_use]
    pub fn is_jump(self) -> bool {
        matches!(self, Self::JumpAbs | Self::JumpFwd | Self::JumpBack)
    }

    /// Whether the concrete argument indexes the `names` pool.
    #[must_use]
    pub fn uses_names(self) -> bool {
        matches!(self, Self::Name | Self::LoadGlobal | Self::LoadAttr | Self::LoadSuperAttr)
    }
}

/// Comparison operators carried by `COMPARE_OP`.
///
/// The wire value differs per release: an index into the interpreter's
/// comparison list through 3.11, and the same index shifted past a
/// specialization mask in 3.12. [`crate::tables`] performs the mapping.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    FromRepr,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(u8)]
pub enum CompareOperator {
    #[strum(serialize = "<")]
    Lt = 0,
    #[strum(serialize = "<=")]
    Le = 1,
    #[strum(serialize = "==")]
    Eq = 2,
    #[strum(serialize = "!=")]
    Ne = 3,
    #[strum(serialize = ">")]
    Gt = 4,
    #[strum(serialize = ">=")]
    Ge = 5,
    /// 3.8 only; a dedicated `CONTAINS_OP` exists from 3.9.
    #[strum(serialize = "in")]
    In = 6,
    /// 3.8 only.
    #[strum(serialize = "not in")]
    NotIn = 7,
    /// 3.8 only; a dedicated `IS_OP` exists from 3.9.
    #[strum(serialize = "is")]
    Is = 8,
    /// 3.8 only.
    #[strum(serialize = "is not")]
    IsNot = 9,
    /// 3.8 only; `JUMP_IF_NOT_EXC_MATCH` and later `CHECK_EXC_MATCH`
    /// replace it.
    #[strum(serialize = "exception match")]
    ExcMatch = 10,
}

impl CompareOperator {
    /// The 3.12 wire value: the comparison in the high nibble, the
    /// specialization mask (less/greater/equal bits) in the low nibble.
    ///
    /// `None` for the members that stopped being comparisons after 3.8.
    #[must_use]
    pub fn to_arg_312(self) -> Option<u32> {
        let mask: u32 = match self {
            Self::Lt => 2,
            Self::Le => 10,
            Self::Eq => 8,
            Self::Ne => 6,
            Self::Gt => 4,
            Self::Ge => 12,
            Self::In | Self::NotIn | Self::Is | Self::IsNot | Self::ExcMatch => return None,
        };
        Some(((self as u32) << 4) | mask)
    }

    /// Inverse of [`Self::to_arg_312`]; the mask bits are ignored.
    #[must_use]
    pub fn from_arg_312(arg: u32) -> Option<Self> {
        u8::try_from(arg >> 4).ok().and_then(Self::from_repr)
    }
}

/// Operations carried by the 3.11+ `BINARY_OP` opcode.
///
/// Discriminants are the `NB_*` wire values.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    FromRepr,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum BinaryOperator {
    Add = 0,
    And = 1,
    FloorDivide = 2,
    Lshift = 3,
    MatrixMultiply = 4,
    Multiply = 5,
    Remainder = 6,
    Or = 7,
    Power = 8,
    Rshift = 9,
    Subtract = 10,
    TrueDivide = 11,
    Xor = 12,
    InplaceAdd = 13,
    InplaceAnd = 14,
    InplaceFloorDivide = 15,
    InplaceLshift = 16,
    InplaceMatrixMultiply = 17,
    InplaceMultiply = 18,
    InplaceRemainder = 19,
    InplaceOr = 20,
    InplacePower = 21,
    InplaceRshift = 22,
    InplaceSubtract = 23,
    InplaceTrueDivide = 24,
    InplaceXor = 25,
}

/// Functions carried by the 3.12 `CALL_INTRINSIC_1` opcode.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    FromRepr,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Intrinsic1Function {
    Invalid = 0,
    Print = 1,
    ImportStar = 2,
    StopiterationError = 3,
    AsyncGenWrap = 4,
    UnaryPositive = 5,
    ListToTuple = 6,
    Typevar = 7,
    Paramspec = 8,
    Typevartuple = 9,
    SubscriptGeneric = 10,
    Typealias = 11,
}

/// Functions carried by the 3.12 `CALL_INTRINSIC_2` opcode.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    FromRepr,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Intrinsic2Function {
    Invalid = 0,
    PrepReraiseStar = 1,
    TypevarWithBound = 2,
    TypevarWithConstraints = 3,
    SetFunctionTypeParams = 4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_display_uses_interpreter_spelling() {
        assert_eq!(Opcode::LoadConst.to_string(), "LOAD_CONST");
        assert_eq!(Opcode::PopJumpIfFalse.to_string(), "POP_JUMP_IF_FALSE");
        assert_eq!("EXTENDED_ARG".parse::<Opcode>().unwrap(), Opcode::ExtendedArg);
    }

    #[test]
    fn compare_operator_312_wire_values() {
        assert_eq!(CompareOperator::Eq.to_arg_312(), Some(40));
        assert_eq!(CompareOperator::Gt.to_arg_312(), Some(68));
        assert_eq!(CompareOperator::ExcMatch.to_arg_312(), None);
        assert_eq!(CompareOperator::from_arg_312(40), Some(CompareOperator::Eq));
        assert_eq!(CompareOperator::from_arg_312(2), Some(CompareOperator::Lt));
    }

    #[test]
    fn binary_operator_wire_values_are_nb_constants() {
        assert_eq!(BinaryOperator::Add as u8, 0);
        assert_eq!(BinaryOperator::InplaceXor as u8, 25);
        assert_eq!(BinaryOperator::from_repr(10), Some(BinaryOperator::Subtract));
    }
}
