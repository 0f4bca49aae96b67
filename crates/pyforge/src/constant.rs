//! Constant values and the structural key used to deduplicate them.
//!
//! The constants pool deduplicates by [`ConstKey`], not by `==`: Python's
//! `1 == 1.0 == True` must still occupy three pool slots, `+0.0` and `-0.0`
//! are distinct constants, and equal-but-distinct tuples collapse while
//! tuples of equal-but-differently-typed elements do not. Nested code units
//! compare by identity, never structurally.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::code::CodeUnit;

/// A constant value in a code unit's `consts` pool.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Const {
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    /// Integer outside `i64` range.
    BigInt(BigInt),
    Float(f64),
    Complex { real: f64, imag: f64 },
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<Const>),
    FrozenSet(Vec<Const>),
    /// A nested compiled unit. Keyed by identity: two structurally equal
    /// units stay two pool entries.
    Code(Box<CodeUnit>),
}

impl Const {
    /// The dedup key for this constant.
    #[must_use]
    pub fn key(&self) -> ConstKey {
        match self {
            Self::None => ConstKey::None,
            Self::Ellipsis => ConstKey::Ellipsis,
            Self::Bool(b) => ConstKey::Bool(*b),
            Self::Int(i) => ConstKey::Int(*i),
            // Normalize: a big integer that fits i64 is the same Python int.
            Self::BigInt(b) => match b.to_i64() {
                Some(i) => ConstKey::Int(i),
                None => ConstKey::BigInt(b.clone()),
            },
            Self::Float(f) => ConstKey::Float(f.to_bits()),
            Self::Complex { real, imag } => ConstKey::Complex(real.to_bits(), imag.to_bits()),
            Self::Str(s) => ConstKey::Str(s.clone()),
            Self::Bytes(b) => ConstKey::Bytes(b.clone()),
            Self::Tuple(items) => ConstKey::Tuple(items.iter().map(Const::key).collect()),
            Self::FrozenSet(items) => ConstKey::FrozenSet(items.iter().map(Const::key).collect()),
            Self::Code(unit) => ConstKey::Code(unit.identity()),
        }
    }
}

impl From<&str> for Const {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Const {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Const {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Const {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Const {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<BigInt> for Const {
    fn from(value: BigInt) -> Self {
        Self::BigInt(value)
    }
}

/// Structural identity of a constant.
///
/// Floats are keyed by bit pattern, so `-0.0` and `+0.0` differ and NaN is
/// equal to itself; booleans, integers, and floats of equal numeric value
/// are all distinct variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ConstKey {
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Float(u64),
    Complex(u64, u64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<ConstKey>),
    FrozenSet(Vec<ConstKey>),
    Code(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_type_equal_values_have_distinct_keys() {
        assert_ne!(Const::Int(1).key(), Const::Float(1.0).key());
        assert_ne!(Const::Int(1).key(), Const::Bool(true).key());
        assert_ne!(Const::Int(0).key(), Const::Bool(false).key());
    }

    #[test]
    fn signed_zero_floats_are_distinct() {
        assert_ne!(Const::Float(0.0).key(), Const::Float(-0.0).key());
        assert_eq!(Const::Float(0.0).key(), Const::Float(0.0).key());
    }

    #[test]
    fn nan_is_self_identical() {
        assert_eq!(Const::Float(f64::NAN).key(), Const::Float(f64::NAN).key());
    }

    #[test]
    fn tuples_key_recursively() {
        let a = Const::Tuple(vec![Const::Int(1), Const::Str("x".into())]);
        let b = Const::Tuple(vec![Const::Int(1), Const::Str("x".into())]);
        let c = Const::Tuple(vec![Const::Float(1.0), Const::Str("x".into())]);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn small_bigint_normalizes_to_int() {
        assert_eq!(Const::BigInt(BigInt::from(7)).key(), Const::Int(7).key());
        let huge = BigInt::from(i64::MAX) * 2;
        assert_ne!(Const::BigInt(huge).key(), Const::Int(i64::MAX).key());
    }

    #[test]
    fn complex_distinguishes_zero_signs() {
        let a = Const::Complex { real: 0.0, imag: 0.0 };
        let b = Const::Complex { real: 0.0, imag: -0.0 };
        assert_ne!(a.key(), b.key());
    }
}
