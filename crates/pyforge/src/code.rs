//! The opaque compiled code unit and the header shared by all three layers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{constant::Const, flags::CodeFlags, version::PythonVersion};

/// Allocator for code-unit identities.
///
/// Nested code constants are deduplicated by identity, never structurally,
/// so every unit gets a process-unique id at construction.
static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

fn next_unit_id() -> u64 {
    NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A compiled code unit: the packed, interpreter-shaped form.
///
/// This is what a host hands to the disassembler and receives back from the
/// assembler. The packed `linetable` and `exceptiontable` fields use the
/// bit-exact per-version encodings; `code` is the raw instruction stream
/// including `EXTENDED_ARG` prefixes and inline-cache padding.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CodeUnit {
    pub version: PythonVersion,
    pub code: Vec<u8>,
    pub consts: Vec<Const>,
    pub names: Vec<String>,
    pub varnames: Vec<String>,
    pub cellvars: Vec<String>,
    pub freevars: Vec<String>,
    pub filename: String,
    pub name: String,
    /// Qualified name; mirrors `name` before 3.11.
    pub qualname: String,
    pub first_lineno: u32,
    pub flags: CodeFlags,
    pub argcount: u32,
    pub posonlyargcount: u32,
    pub kwonlyargcount: u32,
    pub stacksize: u32,
    pub linetable: Vec<u8>,
    /// Empty before 3.11.
    pub exceptiontable: Vec<u8>,
    /// Identity for constant deduplication. Copied by `Clone` (a clone is
    /// the same constant), refreshed on deserialization.
    #[serde(skip, default = "next_unit_id")]
    uid: u64,
}

impl CodeUnit {
    /// An empty unit for the given version, with the conventional
    /// `<module>` naming.
    #[must_use]
    pub fn new(version: PythonVersion) -> Self {
        Self {
            version,
            code: Vec::new(),
            consts: Vec::new(),
            names: Vec::new(),
            varnames: Vec::new(),
            cellvars: Vec::new(),
            freevars: Vec::new(),
            filename: "<string>".to_owned(),
            name: "<module>".to_owned(),
            qualname: "<module>".to_owned(),
            first_lineno: 1,
            flags: CodeFlags::empty(),
            argcount: 0,
            posonlyargcount: 0,
            kwonlyargcount: 0,
            stacksize: 0,
            linetable: Vec::new(),
            exceptiontable: Vec::new(),
            uid: next_unit_id(),
        }
    }

    /// The identity used by [`crate::constant::ConstKey::Code`].
    #[must_use]
    pub fn identity(&self) -> u64 {
        self.uid
    }
}

/// The header of a code unit, carried unchanged through the concrete,
/// abstract, and CFG layers.
///
/// `argnames` seeds `varnames` on assembly; `cellvars`/`freevars` define the
/// deref index space; `docstring`, when set, becomes constants slot 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CodeInfo {
    pub argcount: u32,
    pub posonlyargcount: u32,
    pub kwonlyargcount: u32,
    pub flags: CodeFlags,
    pub first_lineno: u32,
    pub filename: String,
    pub name: String,
    pub qualname: String,
    pub argnames: Vec<String>,
    pub cellvars: Vec<String>,
    pub freevars: Vec<String>,
    pub docstring: Option<Const>,
}

impl Default for CodeInfo {
    fn default() -> Self {
        Self {
            argcount: 0,
            posonlyargcount: 0,
            kwonlyargcount: 0,
            flags: CodeFlags::empty(),
            first_lineno: 1,
            filename: "<string>".to_owned(),
            name: "<module>".to_owned(),
            qualname: "<module>".to_owned(),
            argnames: Vec::new(),
            cellvars: Vec::new(),
            freevars: Vec::new(),
            docstring: None,
        }
    }
}

impl CodeInfo {
    /// Extracts the header from a packed unit.
    #[must_use]
    pub fn from_unit(unit: &CodeUnit) -> Self {
        Self {
            argcount: unit.argcount,
            posonlyargcount: unit.posonlyargcount,
            kwonlyargcount: unit.kwonlyargcount,
            flags: unit.flags,
            first_lineno: unit.first_lineno,
            filename: unit.filename.clone(),
            name: unit.name.clone(),
            qualname: unit.qualname.clone(),
            argnames: unit.varnames.get(..unit.argnames_len()).unwrap_or(&unit.varnames).to_vec(),
            cellvars: unit.cellvars.clone(),
            freevars: unit.freevars.clone(),
            docstring: None,
        }
    }

    /// Whether the unit has any cell or free variables.
    #[must_use]
    pub fn has_free(&self) -> bool {
        !self.cellvars.is_empty() || !self.freevars.is_empty()
    }
}

impl CodeUnit {
    /// Number of leading `varnames` entries that are parameters.
    ///
    /// `*args` and `**kwargs` each add one slot beyond the declared counts.
    #[must_use]
    pub fn argnames_len(&self) -> usize {
        let mut n = (self.argcount + self.kwonlyargcount) as usize;
        if self.flags.contains(CodeFlags::VARARGS) {
            n += 1;
        }
        if self.flags.contains(CodeFlags::VARKEYWORDS) {
            n += 1;
        }
        n.min(self.varnames.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_have_distinct_identities() {
        let a = CodeUnit::new(PythonVersion::Py311);
        let b = CodeUnit::new(PythonVersion::Py311);
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn clone_preserves_identity() {
        let a = CodeUnit::new(PythonVersion::Py310);
        let b = a.clone();
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn argnames_include_star_slots() {
        let mut unit = CodeUnit::new(PythonVersion::Py310);
        unit.argcount = 2;
        unit.flags = CodeFlags::VARARGS;
        unit.varnames = vec!["a".into(), "b".into(), "args".into(), "tmp".into()];
        assert_eq!(unit.argnames_len(), 3);
        let info = CodeInfo::from_unit(&unit);
        assert_eq!(info.argnames, vec!["a", "b", "args"]);
    }
}
