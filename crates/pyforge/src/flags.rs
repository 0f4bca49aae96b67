//! Compiler flags and the subset of them inferable from an instruction
//! stream.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::op::Opcode;

/// The `co_flags` bit set of a code unit.
///
/// Bit values match the interpreter's. Only the five flags documented on
/// [`infer`] are ever recomputed by this crate; the rest pass through
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, serde::Serialize, serde::Deserialize)]
pub struct CodeFlags(u32);

impl CodeFlags {
    pub const OPTIMIZED: Self = Self(0x1);
    pub const NEWLOCALS: Self = Self(0x2);
    pub const VARARGS: Self = Self(0x4);
    pub const VARKEYWORDS: Self = Self(0x8);
    pub const NESTED: Self = Self(0x10);
    pub const GENERATOR: Self = Self(0x20);
    pub const NOFREE: Self = Self(0x40);
    pub const COROUTINE: Self = Self(0x80);
    pub const ITERABLE_COROUTINE: Self = Self(0x100);
    pub const ASYNC_GENERATOR: Self = Self(0x200);

    /// An empty flag set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a flag set from a raw `co_flags` word, keeping unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw `co_flags` word.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Removes the bits of `other`.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for CodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CodeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for CodeFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for CodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Recomputes the instruction-determined flags of a stream.
///
/// `OPTIMIZED`, `GENERATOR`, `NOFREE`, `COROUTINE`, and `ASYNC_GENERATOR`
/// are re-derived; everything else in `current` is preserved. `is_async`
/// forces (`Some(true)`), forbids (`Some(false)`), or infers from `current`
/// (`None`) the coroutine classification. `has_free` reports whether the
/// unit has any cell or free variables.
#[must_use]
pub fn infer(
    opcodes: impl IntoIterator<Item = Opcode>,
    current: CodeFlags,
    has_free: bool,
    is_async: Option<bool>,
) -> CodeFlags {
    let mut uses_name_scope = false;
    let mut has_yield = false;
    let mut has_yield_from = false;
    for op in opcodes {
        match op {
            Opcode::LoadName | Opcode::StoreName | Opcode::DeleteName => uses_name_scope = true,
            Opcode::YieldValue => has_yield = true,
            Opcode::YieldFrom => has_yield_from = true,
            _ => {}
        }
    }

    let mut flags = current.without(
        CodeFlags::OPTIMIZED
            | CodeFlags::GENERATOR
            | CodeFlags::NOFREE
            | CodeFlags::COROUTINE
            | CodeFlags::ASYNC_GENERATOR,
    );

    if !uses_name_scope {
        flags |= CodeFlags::OPTIMIZED;
    }
    if !has_free {
        flags |= CodeFlags::NOFREE;
    }

    let is_async = is_async.unwrap_or_else(|| {
        current.contains(CodeFlags::COROUTINE)
            || current.contains(CodeFlags::ASYNC_GENERATOR)
            || current.contains(CodeFlags::ITERABLE_COROUTINE)
    });
    if is_async {
        if has_yield {
            flags |= CodeFlags::ASYNC_GENERATOR;
        } else {
            flags |= CodeFlags::COROUTINE;
        }
    } else if has_yield || has_yield_from {
        flags |= CodeFlags::GENERATOR;
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_function_gets_optimized_and_nofree() {
        let flags = infer([Opcode::LoadFast, Opcode::ReturnValue], CodeFlags::empty(), false, None);
        assert!(flags.contains(CodeFlags::OPTIMIZED));
        assert!(flags.contains(CodeFlags::NOFREE));
        assert!(!flags.contains(CodeFlags::GENERATOR));
    }

    #[test]
    fn name_scope_clears_optimized() {
        let flags = infer([Opcode::LoadName], CodeFlags::OPTIMIZED, false, None);
        assert!(!flags.contains(CodeFlags::OPTIMIZED));
    }

    #[test]
    fn yield_makes_a_generator_unless_async() {
        let ops = [Opcode::YieldValue, Opcode::ReturnValue];
        let sync = infer(ops, CodeFlags::empty(), false, Some(false));
        assert!(sync.contains(CodeFlags::GENERATOR));

        let asynch = infer(ops, CodeFlags::empty(), false, Some(true));
        assert!(asynch.contains(CodeFlags::ASYNC_GENERATOR));
        assert!(!asynch.contains(CodeFlags::GENERATOR));
    }

    #[test]
    fn async_without_yield_is_a_coroutine() {
        let flags = infer([Opcode::ReturnValue], CodeFlags::empty(), false, Some(true));
        assert!(flags.contains(CodeFlags::COROUTINE));
    }

    #[test]
    fn inference_is_idempotent() {
        let ops = [Opcode::YieldValue, Opcode::LoadName, Opcode::ReturnValue];
        let once = infer(ops, CodeFlags::NESTED, true, None);
        let twice = infer(ops, once, true, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn caller_owned_flags_pass_through() {
        let current = CodeFlags::VARARGS | CodeFlags::NESTED;
        let flags = infer([Opcode::ReturnValue], current, false, None);
        assert!(flags.contains(CodeFlags::VARARGS));
        assert!(flags.contains(CodeFlags::NESTED));
    }
}
