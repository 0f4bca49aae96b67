//! Per-version opcode metadata.
//!
//! Each supported release gets one table mapping mnemonics to numbers,
//! argument categories, inline-cache slot counts, and stack effects. Tables
//! are built once behind a `LazyLock` and are immutable afterwards; the rest
//! of the crate selects a table per code unit and never branches on the
//! version again.
//!
//! Stack effects are split into `pre` (operands an instruction requires
//! below it) and `post` (net change it applies), with a distinct `post` for
//! the taken branch of conditional jumps.

use std::sync::LazyLock;

use ahash::AHashMap;

use crate::{
    op::{OpKind, Opcode},
    version::PythonVersion,
};

mod py38;
mod py39;
mod py310;
mod py311;
mod py312;

/// Stack-effect specification of one opcode.
#[derive(Debug, Clone, Copy)]
pub enum EffectSpec {
    /// Same effect regardless of branch.
    Fixed { pre: u32, post: i32 },
    /// Conditional jumps whose taken branch differs.
    FixedJump { pre: u32, post: i32, post_jump: i32 },
    /// Effect computed from the raw argument (calls, builds, unpacks). The
    /// bool is the taken-branch flag.
    Arg(fn(u32, bool) -> (u32, i32)),
}

/// Metadata for one opcode in one version.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub opcode: Opcode,
    pub number: u8,
    pub kind: OpKind,
    /// Inline-cache code units following the instruction (0 before 3.11).
    pub cache_slots: u8,
    effect: EffectSpec,
}

impl OpcodeInfo {
    /// `(pre, post)` for this opcode with raw argument `arg`, on the taken
    /// branch if `jump`.
    #[must_use]
    pub fn stack_effect(&self, arg: u32, jump: bool) -> (u32, i32) {
        match self.effect {
            EffectSpec::Fixed { pre, post } => (pre, post),
            EffectSpec::FixedJump { pre, post, post_jump } => (pre, if jump { post_jump } else { post }),
            EffectSpec::Arg(f) => f(arg, jump),
        }
    }

    /// Whether the opcode ends its basic block: returns, raises, and
    /// unconditional jumps.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(
            self.opcode,
            Opcode::ReturnValue
                | Opcode::ReturnConst
                | Opcode::RaiseVarargs
                | Opcode::Reraise
                | Opcode::JumpForward
                | Opcode::JumpAbsolute
                | Opcode::JumpBackward
                | Opcode::JumpBackwardNoInterrupt
                | Opcode::InterpreterExit
        )
    }

    /// Whether the opcode is a jump that may fall through.
    #[must_use]
    pub fn is_cond_jump(&self) -> bool {
        self.kind.is_jump() && !self.is_final()
    }
}

/// One version's complete opcode table.
#[derive(Debug)]
pub struct OpcodeTable {
    version: PythonVersion,
    entries: Vec<OpcodeInfo>,
    by_number: [u16; 256],
    by_opcode: AHashMap<Opcode, u16>,
}

impl OpcodeTable {
    fn build(version: PythonVersion, raw: &[(Opcode, u8, OpKind, u8)]) -> Self {
        let mut entries = Vec::with_capacity(raw.len());
        let mut by_number = [u16::MAX; 256];
        let mut by_opcode = AHashMap::with_capacity(raw.len());
        for &(opcode, number, kind, cache_slots) in raw {
            let index = u16::try_from(entries.len()).expect("opcode table exceeds u16 indices");
            debug_assert_eq!(
                by_number[number as usize],
                u16::MAX,
                "duplicate opcode number {number} in {version} table",
            );
            entries.push(OpcodeInfo {
                opcode,
                number,
                kind,
                cache_slots,
                effect: base_effect(version, opcode),
            });
            by_number[number as usize] = index;
            by_opcode.insert(opcode, index);
        }
        Self {
            version,
            entries,
            by_number,
            by_opcode,
        }
    }

    /// The table for a release.
    #[must_use]
    pub fn get(version: PythonVersion) -> &'static Self {
        static PY38: LazyLock<OpcodeTable> = LazyLock::new(|| OpcodeTable::build(PythonVersion::Py38, py38::ENTRIES));
        static PY39: LazyLock<OpcodeTable> = LazyLock::new(|| OpcodeTable::build(PythonVersion::Py39, py39::ENTRIES));
        static PY310: LazyLock<OpcodeTable> =
            LazyLock::new(|| OpcodeTable::build(PythonVersion::Py310, py310::ENTRIES));
        static PY311: LazyLock<OpcodeTable> =
            LazyLock::new(|| OpcodeTable::build(PythonVersion::Py311, py311::ENTRIES));
        static PY312: LazyLock<OpcodeTable> =
            LazyLock::new(|| OpcodeTable::build(PythonVersion::Py312, py312::ENTRIES));
        match version {
            PythonVersion::Py38 => &PY38,
            PythonVersion::Py39 => &PY39,
            PythonVersion::Py310 => &PY310,
            PythonVersion::Py311 => &PY311,
            PythonVersion::Py312 => &PY312,
        }
    }

    #[must_use]
    pub fn version(&self) -> PythonVersion {
        self.version
    }

    /// Metadata for a mnemonic, `None` if the mnemonic does not exist in
    /// this release.
    #[must_use]
    pub fn entry(&self, opcode: Opcode) -> Option<&OpcodeInfo> {
        self.by_opcode.get(&opcode).map(|&i| &self.entries[i as usize])
    }

    /// Metadata for an opcode number.
    #[must_use]
    pub fn by_number(&self, number: u8) -> Option<&OpcodeInfo> {
        let index = self.by_number[number as usize];
        (index != u16::MAX).then(|| &self.entries[index as usize])
    }

    /// All entries, in table order.
    pub fn entries(&self) -> impl Iterator<Item = &OpcodeInfo> {
        self.entries.iter()
    }
}

// Argument-dependent effects. The taken-branch flag is unused by most.

fn eff_call_function(arg: u32, _: bool) -> (u32, i32) {
    (arg + 1, -(arg as i32))
}

fn eff_call_function_kw(arg: u32, _: bool) -> (u32, i32) {
    (arg + 2, -(arg as i32) - 1)
}

fn eff_call_method(arg: u32, _: bool) -> (u32, i32) {
    (arg + 2, -(arg as i32) - 1)
}

fn eff_call_function_ex_legacy(arg: u32, _: bool) -> (u32, i32) {
    let extra = arg & 1;
    (2 + extra, -1 - extra as i32)
}

fn eff_call_function_ex_null(arg: u32, _: bool) -> (u32, i32) {
    let extra = arg & 1;
    (3 + extra, -2 - extra as i32)
}

fn eff_precall(arg: u32, _: bool) -> (u32, i32) {
    (arg + 2, -(arg as i32))
}

fn eff_call_311(_: u32, _: bool) -> (u32, i32) {
    (2, -1)
}

fn eff_call_312(arg: u32, _: bool) -> (u32, i32) {
    (arg + 2, -(arg as i32) - 1)
}

fn eff_build(arg: u32, _: bool) -> (u32, i32) {
    (arg, 1 - arg as i32)
}

fn eff_build_map(arg: u32, _: bool) -> (u32, i32) {
    (2 * arg, 1 - 2 * arg as i32)
}

fn eff_build_const_key_map(arg: u32, _: bool) -> (u32, i32) {
    (arg + 1, -(arg as i32))
}

fn eff_unpack_sequence(arg: u32, _: bool) -> (u32, i32) {
    (1, arg as i32 - 1)
}

fn eff_unpack_ex(arg: u32, _: bool) -> (u32, i32) {
    let before = arg & 0xff;
    let after = arg >> 8;
    (1, (before + after) as i32)
}

fn eff_raise_varargs(arg: u32, _: bool) -> (u32, i32) {
    (arg, -(arg as i32))
}

fn eff_rot_n(arg: u32, _: bool) -> (u32, i32) {
    (arg, 0)
}

fn eff_copy(arg: u32, _: bool) -> (u32, i32) {
    (arg, 1)
}

fn eff_swap(arg: u32, _: bool) -> (u32, i32) {
    (arg, 0)
}

fn eff_container_add(arg: u32, _: bool) -> (u32, i32) {
    (arg + 1, -1)
}

fn eff_map_add(arg: u32, _: bool) -> (u32, i32) {
    (arg + 2, -2)
}

fn eff_format_value(arg: u32, _: bool) -> (u32, i32) {
    if arg & 0x4 == 0 { (1, 0) } else { (2, -1) }
}

fn eff_make_function_legacy(arg: u32, _: bool) -> (u32, i32) {
    let extras = (arg & 0xf).count_ones();
    (2 + extras, -1 - extras as i32)
}

fn eff_make_function_312(arg: u32, _: bool) -> (u32, i32) {
    let extras = (arg & 0xf).count_ones();
    (1 + extras, -(extras as i32))
}

fn eff_load_global_null(arg: u32, _: bool) -> (u32, i32) {
    (0, 1 + (arg & 1) as i32)
}

fn eff_load_attr_method(arg: u32, _: bool) -> (u32, i32) {
    (1, (arg & 1) as i32)
}

fn eff_load_super_attr(arg: u32, _: bool) -> (u32, i32) {
    (3, -2 + (arg & 1) as i32)
}

/// The default `(pre, post)` metadata for a mnemonic in a given release.
///
/// Only the handful of opcodes whose effect changed between releases branch
/// on `version` here.
#[expect(clippy::too_many_lines, reason = "one arm per opcode is the readable shape")]
fn base_effect(version: PythonVersion, opcode: Opcode) -> EffectSpec {
    use EffectSpec::{Arg, Fixed, FixedJump};
    use Opcode as O;
    match opcode {
        // Stack manipulation
        O::PopTop | O::PrintExpr | O::ImportStar => Fixed { pre: 1, post: -1 },
        O::RotTwo => Fixed { pre: 2, post: 0 },
        O::RotThree => Fixed { pre: 3, post: 0 },
        O::RotFour => Fixed { pre: 4, post: 0 },
        O::RotN => Arg(eff_rot_n),
        O::DupTop => Fixed { pre: 1, post: 1 },
        O::DupTopTwo => Fixed { pre: 2, post: 2 },
        O::Copy => Arg(eff_copy),
        O::Swap => Arg(eff_swap),
        O::PushNull | O::LoadBuildClass | O::LoadAssertionError | O::LoadLocals => Fixed { pre: 0, post: 1 },
        O::Nop | O::Cache | O::ExtendedArg | O::Resume | O::SetupAnnotations | O::MakeCell | O::CopyFreeVars => {
            Fixed { pre: 0, post: 0 }
        }

        // Unary operators
        O::UnaryPositive | O::UnaryNegative | O::UnaryNot | O::UnaryInvert => Fixed { pre: 1, post: 0 },

        // Binary operators
        O::BinaryPower
        | O::BinaryMultiply
        | O::BinaryMatrixMultiply
        | O::BinaryModulo
        | O::BinaryAdd
        | O::BinarySubtract
        | O::BinaryFloorDivide
        | O::BinaryTrueDivide
        | O::BinaryLshift
        | O::BinaryRshift
        | O::BinaryAnd
        | O::BinaryXor
        | O::BinaryOr
        | O::InplacePower
        | O::InplaceMultiply
        | O::InplaceMatrixMultiply
        | O::InplaceModulo
        | O::InplaceAdd
        | O::InplaceSubtract
        | O::InplaceFloorDivide
        | O::InplaceTrueDivide
        | O::InplaceLshift
        | O::InplaceRshift
        | O::InplaceAnd
        | O::InplaceXor
        | O::InplaceOr
        | O::BinaryOp
        | O::BinarySubscr => Fixed { pre: 2, post: -1 },

        // Subscripts and slices
        O::StoreSubscr => Fixed { pre: 3, post: -3 },
        O::DeleteSubscr => Fixed { pre: 2, post: -2 },
        O::BinarySlice => Fixed { pre: 3, post: -2 },
        O::StoreSlice => Fixed { pre: 4, post: -4 },
        O::BuildSlice => Arg(eff_build),

        // Comparisons
        O::CompareOp | O::IsOp | O::ContainsOp => Fixed { pre: 2, post: -1 },

        // Loads and stores
        O::LoadConst
        | O::LoadName
        | O::LoadFast
        | O::LoadFastCheck
        | O::LoadFastAndClear
        | O::LoadDeref
        | O::LoadClassderef
        | O::LoadClosure => Fixed { pre: 0, post: 1 },
        O::LoadGlobal => {
            if version >= PythonVersion::Py311 {
                Arg(eff_load_global_null)
            } else {
                Fixed { pre: 0, post: 1 }
            }
        }
        O::LoadAttr => {
            if version >= PythonVersion::Py312 {
                Arg(eff_load_attr_method)
            } else {
                Fixed { pre: 1, post: 0 }
            }
        }
        O::LoadSuperAttr => Arg(eff_load_super_attr),
        O::LoadMethod => Fixed { pre: 1, post: 1 },
        O::LoadFromDictOrGlobals | O::LoadFromDictOrDeref => Fixed { pre: 1, post: 0 },
        O::StoreName | O::StoreGlobal | O::StoreFast | O::StoreDeref => Fixed { pre: 1, post: -1 },
        O::DeleteName | O::DeleteGlobal | O::DeleteFast | O::DeleteDeref => Fixed { pre: 0, post: 0 },
        O::StoreAttr => Fixed { pre: 2, post: -2 },
        O::DeleteAttr => Fixed { pre: 1, post: -1 },

        // Jumps
        O::JumpForward | O::JumpAbsolute | O::JumpBackward | O::JumpBackwardNoInterrupt => Fixed { pre: 0, post: 0 },
        O::JumpIfFalseOrPop | O::JumpIfTrueOrPop => FixedJump {
            pre: 1,
            post: -1,
            post_jump: 0,
        },
        O::PopJumpIfFalse
        | O::PopJumpIfTrue
        | O::PopJumpIfNone
        | O::PopJumpIfNotNone
        | O::PopJumpForwardIfFalse
        | O::PopJumpForwardIfTrue
        | O::PopJumpForwardIfNone
        | O::PopJumpForwardIfNotNone
        | O::PopJumpBackwardIfFalse
        | O::PopJumpBackwardIfTrue
        | O::PopJumpBackwardIfNone
        | O::PopJumpBackwardIfNotNone => FixedJump {
            pre: 1,
            post: -1,
            post_jump: -1,
        },
        O::JumpIfNotExcMatch => FixedJump {
            pre: 2,
            post: -2,
            post_jump: -2,
        },

        // Iteration
        O::GetIter | O::GetYieldFromIter | O::GetAiter => Fixed { pre: 1, post: 0 },
        O::GetAnext => Fixed { pre: 1, post: 1 },
        O::ForIter => {
            // Exhaustion pops the iterator through 3.11; 3.12 leaves it for
            // END_FOR and pushes a sentinel instead.
            let post_jump = if version >= PythonVersion::Py312 { 1 } else { -1 };
            FixedJump {
                pre: 1,
                post: 1,
                post_jump,
            }
        }
        O::EndFor => Fixed { pre: 2, post: -2 },

        // Calls
        O::CallFunction => Arg(eff_call_function),
        O::CallFunctionKw => Arg(eff_call_function_kw),
        O::CallFunctionEx => {
            if version >= PythonVersion::Py311 {
                Arg(eff_call_function_ex_null)
            } else {
                Arg(eff_call_function_ex_legacy)
            }
        }
        O::CallMethod => Arg(eff_call_method),
        O::Precall => Arg(eff_precall),
        O::Call => {
            if version >= PythonVersion::Py312 {
                Arg(eff_call_312)
            } else {
                Arg(eff_call_311)
            }
        }
        O::KwNames => Fixed { pre: 0, post: 0 },
        O::CallIntrinsic1 => Fixed { pre: 1, post: 0 },
        O::CallIntrinsic2 => Fixed { pre: 2, post: -1 },
        O::MakeFunction => {
            if version >= PythonVersion::Py312 {
                Arg(eff_make_function_312)
            } else {
                Arg(eff_make_function_legacy)
            }
        }

        // Returns and yields
        O::ReturnValue | O::InterpreterExit => Fixed { pre: 1, post: -1 },
        O::ReturnConst => Fixed { pre: 0, post: 0 },
        O::ReturnGenerator => Fixed { pre: 0, post: 0 },
        O::YieldValue => Fixed { pre: 1, post: 0 },
        O::YieldFrom => Fixed { pre: 2, post: -1 },
        O::GetAwaitable => Fixed { pre: 1, post: 0 },
        O::EndSend => Fixed { pre: 2, post: -1 },
        O::Send => FixedJump {
            pre: 2,
            post: 0,
            post_jump: -1,
        },
        O::GenStart => Fixed { pre: 1, post: -1 },
        O::AsyncGenWrap => Fixed { pre: 1, post: 0 },

        // Exception handling
        O::PopBlock => Fixed { pre: 0, post: 0 },
        O::PopExcept => {
            if version >= PythonVersion::Py311 {
                Fixed { pre: 1, post: -1 }
            } else {
                Fixed { pre: 3, post: -3 }
            }
        }
        O::PushExcInfo => Fixed { pre: 1, post: 1 },
        O::CheckExcMatch => Fixed { pre: 2, post: -1 },
        O::CheckEgMatch => Fixed { pre: 2, post: 0 },
        O::PrepReraiseStar => Fixed { pre: 2, post: -1 },
        O::Reraise => Fixed { pre: 1, post: -1 },
        O::RaiseVarargs => Arg(eff_raise_varargs),
        O::WithExceptStart => Fixed { pre: 4, post: 1 },
        O::SetupFinally => FixedJump {
            pre: 0,
            post: 0,
            post_jump: 6,
        },
        O::SetupWith => FixedJump {
            pre: 1,
            post: 1,
            post_jump: 6,
        },
        O::SetupAsyncWith => FixedJump {
            pre: 1,
            post: 0,
            post_jump: 6,
        },
        O::BeginFinally => Fixed { pre: 0, post: 6 },
        O::EndFinally => Fixed { pre: 6, post: -6 },
        O::CallFinally => FixedJump {
            pre: 0,
            post: 1,
            post_jump: 1,
        },
        O::PopFinally => Fixed { pre: 6, post: -6 },
        O::WithCleanupStart => Fixed { pre: 1, post: 1 },
        O::WithCleanupFinish => Fixed { pre: 2, post: -2 },
        O::CleanupThrow => Fixed { pre: 3, post: -2 },
        O::BeforeWith => Fixed { pre: 1, post: 1 },
        O::BeforeAsyncWith => Fixed { pre: 1, post: 1 },
        O::EndAsyncFor => Fixed { pre: 2, post: -2 },

        // Collection construction
        O::BuildTuple
        | O::BuildList
        | O::BuildSet
        | O::BuildString
        | O::BuildTupleUnpack
        | O::BuildTupleUnpackWithCall
        | O::BuildListUnpack
        | O::BuildSetUnpack
        | O::BuildMapUnpack
        | O::BuildMapUnpackWithCall => Arg(eff_build),
        O::BuildMap => Arg(eff_build_map),
        O::BuildConstKeyMap => Arg(eff_build_const_key_map),
        O::ListAppend | O::SetAdd | O::ListExtend | O::SetUpdate | O::DictMerge | O::DictUpdate => {
            Arg(eff_container_add)
        }
        O::MapAdd => Arg(eff_map_add),
        O::ListToTuple => Fixed { pre: 1, post: 0 },

        // Unpacking
        O::UnpackSequence => Arg(eff_unpack_sequence),
        O::UnpackEx => Arg(eff_unpack_ex),

        // Imports
        O::ImportName => Fixed { pre: 2, post: -1 },
        O::ImportFrom => Fixed { pre: 1, post: 1 },

        // Pattern matching
        O::GetLen | O::MatchMapping | O::MatchSequence => Fixed { pre: 1, post: 1 },
        O::MatchKeys => {
            if version >= PythonVersion::Py311 {
                Fixed { pre: 2, post: 1 }
            } else {
                Fixed { pre: 2, post: 2 }
            }
        }
        O::MatchClass => {
            if version >= PythonVersion::Py311 {
                Fixed { pre: 3, post: -2 }
            } else {
                Fixed { pre: 3, post: -1 }
            }
        }
        O::CopyDictWithoutKeys => Fixed { pre: 2, post: 0 },

        // Misc
        O::FormatValue => Arg(eff_format_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_version_builds_a_consistent_table() {
        for version in [
            PythonVersion::Py38,
            PythonVersion::Py39,
            PythonVersion::Py310,
            PythonVersion::Py311,
            PythonVersion::Py312,
        ] {
            let table = OpcodeTable::get(version);
            assert_eq!(table.version(), version);
            for info in table.entries() {
                // Round trip both indexes.
                assert_eq!(table.by_number(info.number).unwrap().opcode, info.opcode);
                assert_eq!(table.entry(info.opcode).unwrap().number, info.number);
                // Caches only exist from 3.11 on.
                if !version.has_inline_cache() {
                    assert_eq!(info.cache_slots, 0, "{:?} has caches in {version}", info.opcode);
                }
            }
            assert!(table.entry(Opcode::ExtendedArg).is_some());
            assert!(table.entry(Opcode::LoadConst).is_some());
        }
    }

    #[test]
    fn version_gated_opcodes() {
        assert!(OpcodeTable::get(PythonVersion::Py38).entry(Opcode::BinaryOp).is_none());
        assert!(OpcodeTable::get(PythonVersion::Py311).entry(Opcode::BinaryAdd).is_none());
        assert!(
            OpcodeTable::get(PythonVersion::Py312)
                .entry(Opcode::LoadSuperAttr)
                .is_some()
        );
        assert!(
            OpcodeTable::get(PythonVersion::Py310)
                .entry(Opcode::JumpAbsolute)
                .is_some()
        );
        assert!(
            OpcodeTable::get(PythonVersion::Py311)
                .entry(Opcode::JumpAbsolute)
                .is_none()
        );
    }

    #[test]
    fn stack_effects_respect_the_taken_branch() {
        let table = OpcodeTable::get(PythonVersion::Py310);
        let info = table.entry(Opcode::JumpIfFalseOrPop).unwrap();
        assert_eq!(info.stack_effect(0, false), (1, -1));
        assert_eq!(info.stack_effect(0, true), (1, 0));

        let call = table.entry(Opcode::CallFunction).unwrap();
        assert_eq!(call.stack_effect(2, false), (3, -2));
    }

    #[test]
    fn load_global_grows_a_null_slot_in_311() {
        let old = OpcodeTable::get(PythonVersion::Py310)
            .entry(Opcode::LoadGlobal)
            .unwrap();
        assert_eq!(old.stack_effect(0, false), (0, 1));
        let new = OpcodeTable::get(PythonVersion::Py311)
            .entry(Opcode::LoadGlobal)
            .unwrap();
        assert_eq!(new.stack_effect(1, false), (0, 2));
    }
}
