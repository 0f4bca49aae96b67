//! Abstract instructions: an opcode plus a semantic argument.
//!
//! The argument variant and the opcode's category are locked together at
//! construction; there is no way to set the opcode without re-deriving the
//! argument. This makes "a jump carrying a name index" unrepresentable
//! instead of merely checked downstream.

use crate::{
    bytecode::Label,
    cfg::BlockId,
    constant::Const,
    error::InstrError,
    location::InstrLocation,
    op::{BinaryOperator, CompareOperator, Intrinsic1Function, Intrinsic2Function, OpKind, Opcode},
    tables::OpcodeTable,
    version::PythonVersion,
};

/// Where a jump goes: a label inside an abstract stream, or a block inside
/// a CFG.
///
/// Both are opaque identities, never positions; editing the stream cannot
/// invalidate them, only removing the labelled point can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum JumpTarget {
    Label(Label),
    Block(BlockId),
}

/// The semantic argument of an abstract instruction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum InstrArg {
    /// For opcodes that take no argument.
    None,
    /// An opaque small integer in `[0, 2^31)`: counts, flag words.
    Raw(u32),
    Jump(JumpTarget),
    /// A variable in `varnames`.
    Local(String),
    /// A name in `names`.
    Name(String),
    /// A cell variable. Distinct from [`Self::Free`] even for the same
    /// spelling: one code unit may carry both.
    Cell(String),
    /// A free variable.
    Free(String),
    Const(Const),
    Compare(CompareOperator),
    Binary(BinaryOperator),
    Intrinsic1(Intrinsic1Function),
    Intrinsic2(Intrinsic2Function),
    /// 3.11+ `LOAD_GLOBAL`.
    LoadGlobal { push_null: bool, name: String },
    /// 3.12 `LOAD_ATTR`.
    LoadAttr { call_as_method: bool, name: String },
    /// 3.12 `LOAD_SUPER_ATTR`.
    LoadSuperAttr {
        call_as_method: bool,
        push_null: bool,
        name: String,
    },
}

impl InstrArg {
    /// Whether this variant satisfies an opcode category.
    #[must_use]
    pub fn matches(&self, kind: OpKind) -> bool {
        match self {
            Self::None => kind == OpKind::NoArg,
            Self::Raw(_) => kind == OpKind::Raw,
            Self::Jump(_) => kind.is_jump(),
            Self::Local(_) => kind == OpKind::Local,
            Self::Name(_) => kind == OpKind::Name,
            Self::Cell(_) | Self::Free(_) => kind == OpKind::Deref,
            Self::Const(_) => kind == OpKind::Const,
            Self::Compare(_) => kind == OpKind::Compare,
            Self::Binary(_) => kind == OpKind::Binary,
            Self::Intrinsic1(_) => kind == OpKind::Intrinsic1,
            Self::Intrinsic2(_) => kind == OpKind::Intrinsic2,
            Self::LoadGlobal { .. } => kind == OpKind::LoadGlobal,
            Self::LoadAttr { .. } => kind == OpKind::LoadAttr,
            Self::LoadSuperAttr { .. } => kind == OpKind::LoadSuperAttr,
        }
    }

    /// The argument value fed to arg-dependent stack effects.
    ///
    /// Pool indexes are unknown before assembly, but effects only ever look
    /// at counts and low flag bits, so the flag bits are enough.
    #[must_use]
    pub(crate) fn effect_arg(&self) -> u32 {
        match self {
            Self::Raw(v) => *v,
            Self::Compare(op) => *op as u32,
            Self::Binary(op) => *op as u32,
            Self::Intrinsic1(f) => *f as u32,
            Self::Intrinsic2(f) => *f as u32,
            Self::LoadGlobal { push_null, .. } => u32::from(*push_null),
            Self::LoadAttr { call_as_method, .. } => u32::from(*call_as_method),
            Self::LoadSuperAttr {
                call_as_method,
                push_null,
                ..
            } => u32::from(*call_as_method) | (u32::from(*push_null) << 1),
            _ => 0,
        }
    }
}

/// One abstract instruction.
///
/// `opcode` and `arg` are private so they can only change together through
/// [`Instr::replace`], keeping the category invariant intact. The location
/// is free to edit.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Instr {
    opcode: Opcode,
    arg: InstrArg,
    pub location: InstrLocation,
}

/// Raw arguments stay below 2^31 so offset arithmetic never overflows the
/// interpreter's signed int.
pub const MAX_RAW_ARG: u32 = (1 << 31) - 1;

impl Instr {
    /// Builds an instruction, checking the argument against the opcode's
    /// category in `version`.
    pub fn new(version: PythonVersion, opcode: Opcode, arg: InstrArg) -> Result<Self, InstrError> {
        Self::check(version, opcode, &arg)?;
        Ok(Self {
            opcode,
            arg,
            location: InstrLocation::NONE,
        })
    }

    /// Same as [`Instr::new`] with a location attached.
    pub fn with_location(
        version: PythonVersion,
        opcode: Opcode,
        arg: InstrArg,
        location: InstrLocation,
    ) -> Result<Self, InstrError> {
        let mut instr = Self::new(version, opcode, arg)?;
        instr.location = location;
        Ok(instr)
    }

    fn check(version: PythonVersion, opcode: Opcode, arg: &InstrArg) -> Result<(), InstrError> {
        let table = OpcodeTable::get(version);
        let info = table
            .entry(opcode)
            .ok_or(InstrError::UnsupportedOpcode { opcode, version })?;
        if info.kind == OpKind::Pseudo {
            return Err(InstrError::InvalidInstructionUsage { opcode });
        }
        if let InstrArg::Raw(value) = arg
            && *value > MAX_RAW_ARG
        {
            return Err(InstrError::RawOutOfRange { value: *value });
        }
        if !arg.matches(info.kind) {
            return Err(InstrError::InvalidArgumentKind {
                opcode,
                expected: info.kind,
            });
        }
        Ok(())
    }

    /// Atomically replaces opcode and argument. The only mutation path for
    /// either.
    pub fn replace(&mut self, version: PythonVersion, opcode: Opcode, arg: InstrArg) -> Result<(), InstrError> {
        Self::check(version, opcode, &arg)?;
        self.opcode = opcode;
        self.arg = arg;
        Ok(())
    }

    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    #[must_use]
    pub fn arg(&self) -> &InstrArg {
        &self.arg
    }

    /// The jump target, if this instruction is a jump.
    #[must_use]
    pub fn jump_target(&self) -> Option<JumpTarget> {
        match &self.arg {
            InstrArg::Jump(target) => Some(*target),
            _ => None,
        }
    }

    /// Rewrites the jump target in place. Only valid on jumps.
    pub(crate) fn set_jump_target(&mut self, target: JumpTarget) {
        debug_assert!(matches!(self.arg, InstrArg::Jump(_)));
        self.arg = InstrArg::Jump(target);
    }

    /// Whether this instruction never falls through: return, raise,
    /// unconditional jump, re-raise.
    #[must_use]
    pub fn is_final(&self, version: PythonVersion) -> bool {
        OpcodeTable::get(version)
            .entry(self.opcode)
            .is_some_and(crate::tables::OpcodeInfo::is_final)
    }

    /// Whether this is a jump that may also fall through.
    #[must_use]
    pub fn is_cond_jump(&self, version: PythonVersion) -> bool {
        matches!(self.arg, InstrArg::Jump(_)) && !self.is_final(version)
    }

    /// Whether this is an unconditional jump.
    #[must_use]
    pub fn is_uncond_jump(&self, version: PythonVersion) -> bool {
        matches!(self.arg, InstrArg::Jump(_)) && self.is_final(version)
    }

    /// `(pre, post)` stack effect, on the taken branch if `jump`.
    pub fn stack_effect(&self, version: PythonVersion, jump: bool) -> Result<(u32, i32), InstrError> {
        let info = OpcodeTable::get(version).entry(self.opcode).ok_or({
            InstrError::UnsupportedOpcode {
                opcode: self.opcode,
                version,
            }
        })?;
        Ok(info.stack_effect(self.arg.effect_arg(), jump))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V310: PythonVersion = PythonVersion::Py310;
    const V312: PythonVersion = PythonVersion::Py312;

    #[test]
    fn argument_must_match_category() {
        let err = Instr::new(V310, Opcode::LoadConst, InstrArg::Name("x".into())).unwrap_err();
        assert_eq!(
            err,
            InstrError::InvalidArgumentKind {
                opcode: Opcode::LoadConst,
                expected: OpKind::Const,
            }
        );
        assert!(Instr::new(V310, Opcode::LoadConst, InstrArg::Const(Const::None)).is_ok());
    }

    #[test]
    fn pseudo_opcodes_are_rejected() {
        let err = Instr::new(V310, Opcode::ExtendedArg, InstrArg::Raw(1)).unwrap_err();
        assert_eq!(
            err,
            InstrError::InvalidInstructionUsage {
                opcode: Opcode::ExtendedArg
            }
        );
    }

    #[test]
    fn raw_argument_range_is_enforced() {
        assert!(Instr::new(V310, Opcode::CallFunction, InstrArg::Raw(MAX_RAW_ARG)).is_ok());
        let err = Instr::new(V310, Opcode::CallFunction, InstrArg::Raw(MAX_RAW_ARG + 1)).unwrap_err();
        assert_eq!(err, InstrError::RawOutOfRange { value: 1 << 31 });
    }

    #[test]
    fn opcodes_are_version_checked() {
        let err = Instr::new(V310, Opcode::BinaryOp, InstrArg::Binary(BinaryOperator::Add)).unwrap_err();
        assert!(matches!(err, InstrError::UnsupportedOpcode { .. }));
        assert!(Instr::new(V312, Opcode::BinaryOp, InstrArg::Binary(BinaryOperator::Add)).is_ok());
    }

    #[test]
    fn cell_and_free_both_satisfy_deref_opcodes() {
        assert!(Instr::new(V310, Opcode::LoadDeref, InstrArg::Cell("x".into())).is_ok());
        assert!(Instr::new(V310, Opcode::LoadDeref, InstrArg::Free("x".into())).is_ok());
        assert!(Instr::new(V310, Opcode::LoadDeref, InstrArg::Local("x".into())).is_err());
    }

    #[test]
    fn replace_is_atomic() {
        let mut instr = Instr::new(V310, Opcode::LoadName, InstrArg::Name("print".into())).unwrap();
        // A mismatched replacement leaves the instruction untouched.
        assert!(instr.replace(V310, Opcode::LoadConst, InstrArg::Name("x".into())).is_err());
        assert_eq!(instr.opcode(), Opcode::LoadName);
        instr.replace(V310, Opcode::LoadConst, InstrArg::Const(Const::Int(3))).unwrap();
        assert_eq!(instr.opcode(), Opcode::LoadConst);
    }

    #[test]
    fn load_global_effect_depends_on_push_null() {
        let version = PythonVersion::Py311;
        let plain = Instr::new(
            version,
            Opcode::LoadGlobal,
            InstrArg::LoadGlobal {
                push_null: false,
                name: "f".into(),
            },
        )
        .unwrap();
        assert_eq!(plain.stack_effect(version, false).unwrap(), (0, 1));
        let with_null = Instr::new(
            version,
            Opcode::LoadGlobal,
            InstrArg::LoadGlobal {
                push_null: true,
                name: "f".into(),
            },
        )
        .unwrap();
        assert_eq!(with_null.stack_effect(version, false).unwrap(), (0, 2));
    }
}
