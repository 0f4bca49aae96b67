//! Interpreter version selection.
//!
//! The opcode table, the line-table codec, and the exception-table codec are
//! the only version-sensitive pieces of the library. Everything else asks a
//! [`PythonVersion`] the handful of questions below and stays version-free.

use std::fmt;

/// A CPython feature release supported by this crate.
///
/// The variant order is the release order, so `Ord` comparisons read
/// naturally (`version >= PythonVersion::Py311`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum PythonVersion {
    #[strum(serialize = "3.8")]
    Py38,
    #[strum(serialize = "3.9")]
    Py39,
    #[strum(serialize = "3.10")]
    Py310,
    #[strum(serialize = "3.11")]
    Py311,
    #[strum(serialize = "3.12")]
    Py312,
}

impl PythonVersion {
    /// Unit of jump arguments in bytes: byte offsets before 3.10, 2-byte
    /// code units from 3.10 on.
    #[must_use]
    pub fn jump_unit(self) -> u32 {
        if self >= Self::Py310 { 2 } else { 1 }
    }

    /// Whether instructions are followed by inline-cache code units (3.11+).
    #[must_use]
    pub fn has_inline_cache(self) -> bool {
        self >= Self::Py311
    }

    /// Whether code units carry a packed exception table (3.11+).
    #[must_use]
    pub fn has_exception_table(self) -> bool {
        self >= Self::Py311
    }

    /// Whether code units carry a qualified name distinct from the plain
    /// name (3.11+).
    #[must_use]
    pub fn has_qualname(self) -> bool {
        self >= Self::Py311
    }

    /// The line-table encoding this release uses.
    #[must_use]
    pub fn line_table_format(self) -> LineTableFormat {
        match self {
            Self::Py38 | Self::Py39 => LineTableFormat::Lnotab,
            Self::Py310 => LineTableFormat::Linetable,
            Self::Py311 | Self::Py312 => LineTableFormat::Locations,
        }
    }
}

/// The three wire formats the packed line table has gone through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LineTableFormat {
    /// `(u8 byte delta, i8 line delta)` pairs, non-negative line deltas
    /// saturated across pairs (3.8, 3.9).
    Lnotab,
    /// `(u8 byte delta, i8 line delta)` pairs with negative deltas and a
    /// no-line sentinel (3.10).
    Linetable,
    /// Variable-length location entries with end-line and column spans
    /// (3.11+).
    Locations,
}

impl fmt::Display for LineTableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lnotab => f.write_str("lnotab"),
            Self::Linetable => f.write_str("linetable"),
            Self::Locations => f.write_str("locations"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_order_matches_release_order() {
        assert!(PythonVersion::Py38 < PythonVersion::Py312);
        assert!(PythonVersion::Py310 >= PythonVersion::Py310);
    }

    #[test]
    fn jump_unit_widens_at_310() {
        assert_eq!(PythonVersion::Py39.jump_unit(), 1);
        assert_eq!(PythonVersion::Py310.jump_unit(), 2);
        assert_eq!(PythonVersion::Py312.jump_unit(), 2);
    }

    #[test]
    fn caches_and_exception_table_arrive_at_311() {
        assert!(!PythonVersion::Py310.has_inline_cache());
        assert!(PythonVersion::Py311.has_inline_cache());
        assert!(PythonVersion::Py311.has_exception_table());
    }

    #[test]
    fn version_parses_from_dotted_form() {
        assert_eq!("3.11".parse::<PythonVersion>().unwrap(), PythonVersion::Py311);
        assert!("3.7".parse::<PythonVersion>().is_err());
    }
}
