//! The concrete instruction stream: opcodes with raw integer arguments.
//!
//! This layer is bit-faithful to the packed form. `EXTENDED_ARG` runs are
//! folded into their terminal instruction's `arg` on decode and re-emitted
//! on encode, with one deliberate exception: prefixes terminated by a `NOP`
//! are kept as explicit instructions, because producers use them to carry
//! side-effect-free offset information that folding would destroy. The
//! abstract layer drops them; this one must not.

use crate::{
    code::{CodeInfo, CodeUnit},
    constant::Const,
    error::{AssembleError, DisassembleError},
    exception_table::{self, ExceptionTableEntry},
    lineno::{self, LineEntry},
    location::InstrLocation,
    op::Opcode,
    tables::OpcodeTable,
    version::{LineTableFormat, PythonVersion},
};

/// One concrete instruction.
///
/// `arg` may exceed a byte; the encoder emits the needed `EXTENDED_ARG`
/// prefixes. Inline-cache code units are implied by the opcode and version,
/// not stored.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConcreteInstr {
    pub opcode: Opcode,
    pub arg: u32,
    pub location: InstrLocation,
}

impl ConcreteInstr {
    #[must_use]
    pub fn new(opcode: Opcode, arg: u32) -> Self {
        Self {
            opcode,
            arg,
            location: InstrLocation::NONE,
        }
    }

    /// Number of `EXTENDED_ARG` prefixes `arg` requires.
    #[must_use]
    pub fn extended_args(&self) -> u32 {
        extended_args_for(self.arg)
    }

    /// Encoded size in bytes, inline caches included.
    #[must_use]
    pub fn size(&self, table: &OpcodeTable) -> u32 {
        let caches = table.entry(self.opcode).map_or(0, |info| u32::from(info.cache_slots));
        2 * (1 + self.extended_args() + caches)
    }
}

/// Number of `EXTENDED_ARG` prefixes needed to encode `arg`.
#[must_use]
pub fn extended_args_for(arg: u32) -> u32 {
    match arg {
        0..=0xff => 0,
        0x100..=0xffff => 1,
        0x1_0000..=0xff_ffff => 2,
        _ => 3,
    }
}

/// The concrete layer of a code unit: instructions plus the pools and
/// tables they index.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConcreteBytecode {
    version: PythonVersion,
    pub info: CodeInfo,
    pub instrs: Vec<ConcreteInstr>,
    pub consts: Vec<Const>,
    pub names: Vec<String>,
    pub varnames: Vec<String>,
    /// Byte-offset exception regions; empty before 3.11.
    pub exception_table: Vec<ExceptionTableEntry>,
}

impl ConcreteBytecode {
    #[must_use]
    pub fn new(version: PythonVersion) -> Self {
        Self {
            version,
            info: CodeInfo::default(),
            instrs: Vec::new(),
            consts: Vec::new(),
            names: Vec::new(),
            varnames: Vec::new(),
            exception_table: Vec::new(),
        }
    }

    #[must_use]
    pub fn version(&self) -> PythonVersion {
        self.version
    }

    /// Byte offset of each instruction, in order.
    #[must_use]
    pub fn byte_offsets(&self) -> Vec<u32> {
        let table = OpcodeTable::get(self.version);
        let mut offsets = Vec::with_capacity(self.instrs.len());
        let mut offset = 0;
        for instr in &self.instrs {
            offsets.push(offset);
            offset += instr.size(table);
        }
        offsets
    }

    /// Total encoded length in bytes.
    #[must_use]
    pub fn code_len(&self) -> u32 {
        let table = OpcodeTable::get(self.version);
        self.instrs.iter().map(|instr| instr.size(table)).sum()
    }

    /// Decodes a packed unit: unpacks instructions, folds `EXTENDED_ARG`
    /// runs, attaches locations from the line table, and decodes the
    /// exception table.
    pub fn from_code_unit(unit: &CodeUnit) -> Result<Self, DisassembleError> {
        let version = unit.version;
        let table = OpcodeTable::get(version);
        let mut instrs = Vec::new();
        let mut offsets = Vec::new();

        let code = &unit.code;
        let mut pos = 0usize;
        let mut ext_value = 0u32;
        let mut ext_run: Vec<(usize, u8)> = Vec::new();
        while pos < code.len() {
            if pos + 1 >= code.len() {
                return Err(DisassembleError::TruncatedCode { offset: pos });
            }
            let number = code[pos];
            let arg_byte = code[pos + 1];
            let info = table
                .by_number(number)
                .ok_or(DisassembleError::UnknownOpcode { value: number, version })?;
            if info.opcode == Opcode::ExtendedArg {
                ext_value = (ext_value << 8) | u32::from(arg_byte);
                ext_run.push((pos, arg_byte));
                pos += 2;
                continue;
            }
            let run_start = ext_run.first().map_or(pos, |(p, _)| *p);
            if info.opcode == Opcode::Nop && !ext_run.is_empty() {
                // Keep the prefixes verbatim; their folded value is offset
                // padding, not an argument.
                for (ext_pos, byte) in ext_run.drain(..) {
                    offsets.push(ext_pos as u32);
                    instrs.push(ConcreteInstr::new(Opcode::ExtendedArg, u32::from(byte)));
                }
                offsets.push(pos as u32);
                instrs.push(ConcreteInstr::new(Opcode::Nop, u32::from(arg_byte)));
            } else {
                let arg = (ext_value << 8) | u32::from(arg_byte);
                offsets.push(run_start as u32);
                instrs.push(ConcreteInstr::new(info.opcode, arg));
                ext_run.clear();
            }
            ext_value = 0;
            pos += 2 + 2 * usize::from(info.cache_slots);
        }
        if !ext_run.is_empty() {
            return Err(DisassembleError::TruncatedCode { offset: code.len() });
        }

        // Attach locations.
        let line_entries = decode_line_table(unit)?;
        let mut cursor = 0usize;
        for (instr, &offset) in instrs.iter_mut().zip(&offsets) {
            while cursor < line_entries.len() && line_entries[cursor].end <= offset {
                cursor += 1;
            }
            if let Some(entry) = line_entries.get(cursor)
                && entry.start <= offset
            {
                instr.location = entry.location;
            }
        }

        let exception_table = if version.has_exception_table() {
            exception_table::decode(&unit.exceptiontable)?
        } else {
            Vec::new()
        };

        Ok(Self {
            version,
            info: CodeInfo::from_unit(unit),
            instrs,
            consts: unit.consts.clone(),
            names: unit.names.clone(),
            varnames: unit.varnames.clone(),
            exception_table,
        })
    }

    /// Packs this stream into a code unit.
    ///
    /// The concrete layer cannot solve for stack depth (labels are gone),
    /// so `stacksize` is the caller's to supply; [`crate::Bytecode`] runs
    /// the solver and passes the result through.
    ///
    /// Constant indexes are final here, so a docstring must already *be*
    /// constants slot 0; a header docstring alongside one is the
    /// supplied-twice error (the abstract assembler consumes the header
    /// field when it seeds the pool).
    pub fn to_code_unit(&self, stacksize: u32) -> Result<CodeUnit, AssembleError> {
        let table = OpcodeTable::get(self.version);

        if let Some(docstring) = &self.info.docstring
            && self.consts.first().map(Const::key) == Some(docstring.key())
        {
            return Err(AssembleError::DuplicateDocstring);
        }

        let mut code = Vec::with_capacity(self.instrs.len() * 2);
        let mut sized: Vec<(u32, InstrLocation)> = Vec::with_capacity(self.instrs.len());
        for instr in &self.instrs {
            let info = table.entry(instr.opcode).ok_or(AssembleError::UnsupportedOpcode {
                opcode: instr.opcode,
                version: self.version,
            })?;
            let ext = instr.extended_args();
            for i in (1..=ext).rev() {
                code.push(extended_arg_number(table));
                code.push(((instr.arg >> (8 * i)) & 0xff) as u8);
            }
            code.push(info.number);
            code.push((instr.arg & 0xff) as u8);
            for _ in 0..info.cache_slots {
                code.push(0);
                code.push(0);
            }
            sized.push((2 * (1 + ext + u32::from(info.cache_slots)), instr.location));
        }

        let linetable = match self.version.line_table_format() {
            LineTableFormat::Lnotab => lineno::encode_lnotab(self.info.first_lineno, &sized),
            LineTableFormat::Linetable => lineno::encode_linetable_310(self.info.first_lineno, &sized),
            LineTableFormat::Locations => lineno::encode_locations_311(self.info.first_lineno, &sized),
        };

        let exceptiontable = if self.version.has_exception_table() {
            let mut entries = self.exception_table.clone();
            entries.sort_by_key(|entry| (entry.start, entry.stop));
            exception_table::encode(&entries)
        } else {
            Vec::new()
        };

        let mut unit = CodeUnit::new(self.version);
        unit.code = code;
        unit.consts = self.consts.clone();
        unit.names = self.names.clone();
        unit.varnames = self.varnames.clone();
        unit.cellvars = self.info.cellvars.clone();
        unit.freevars = self.info.freevars.clone();
        unit.filename = self.info.filename.clone();
        unit.name = self.info.name.clone();
        unit.qualname = self.info.qualname.clone();
        unit.first_lineno = self.info.first_lineno;
        unit.flags = self.info.flags;
        unit.argcount = self.info.argcount;
        unit.posonlyargcount = self.info.posonlyargcount;
        unit.kwonlyargcount = self.info.kwonlyargcount;
        unit.stacksize = stacksize;
        unit.linetable = linetable;
        unit.exceptiontable = exceptiontable;
        Ok(unit)
    }
}

fn extended_arg_number(table: &OpcodeTable) -> u8 {
    table
        .entry(Opcode::ExtendedArg)
        .map_or(144, |info| info.number)
}

fn decode_line_table(unit: &CodeUnit) -> Result<Vec<LineEntry>, DisassembleError> {
    let code_len = unit.code.len() as u32;
    match unit.version.line_table_format() {
        LineTableFormat::Lnotab => lineno::decode_lnotab(&unit.linetable, unit.first_lineno, code_len),
        LineTableFormat::Linetable => lineno::decode_linetable_310(&unit.linetable, unit.first_lineno, code_len),
        LineTableFormat::Locations => lineno::decode_locations_311(&unit.linetable, unit.first_lineno, code_len),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn small_args_encode_to_one_code_unit() {
        let mut concrete = ConcreteBytecode::new(PythonVersion::Py310);
        concrete.consts.push(Const::None);
        concrete.instrs.push(ConcreteInstr::new(Opcode::LoadConst, 0));
        concrete.instrs.push(ConcreteInstr::new(Opcode::ReturnValue, 0));
        let unit = concrete.to_code_unit(1).unwrap();
        assert_eq!(unit.code, vec![100, 0, 83, 0]);
    }

    #[test]
    fn wide_args_get_extended_arg_prefixes() {
        let mut concrete = ConcreteBytecode::new(PythonVersion::Py310);
        concrete.instrs.push(ConcreteInstr::new(Opcode::LoadConst, 0x0001_0203));
        let unit = concrete.to_code_unit(1).unwrap();
        assert_eq!(unit.code, vec![144, 1, 144, 2, 100, 3]);

        let decoded = ConcreteBytecode::from_code_unit(&unit).unwrap();
        assert_eq!(decoded.instrs.len(), 1);
        assert_eq!(decoded.instrs[0].arg, 0x0001_0203);
    }

    #[test]
    fn caches_pad_specialized_instructions() {
        let mut concrete = ConcreteBytecode::new(PythonVersion::Py311);
        concrete.instrs.push(ConcreteInstr::new(Opcode::BinaryOp, 0));
        let unit = concrete.to_code_unit(2).unwrap();
        // BINARY_OP + one cache unit.
        assert_eq!(unit.code.len(), 4);
        assert_eq!(unit.code[2], 0);

        let decoded = ConcreteBytecode::from_code_unit(&unit).unwrap();
        assert_eq!(decoded.instrs.len(), 1);
        assert_eq!(decoded.instrs[0].opcode, Opcode::BinaryOp);
    }

    #[test]
    fn extended_arg_before_nop_survives_verbatim() {
        let mut concrete = ConcreteBytecode::new(PythonVersion::Py310);
        concrete.instrs.push(ConcreteInstr::new(Opcode::ExtendedArg, 3));
        concrete.instrs.push(ConcreteInstr::new(Opcode::Nop, 0));
        let unit = concrete.to_code_unit(0).unwrap();
        assert_eq!(unit.code, vec![144, 3, 9, 0]);

        let decoded = ConcreteBytecode::from_code_unit(&unit).unwrap();
        let opcodes: Vec<_> = decoded.instrs.iter().map(|i| i.opcode).collect();
        assert_eq!(opcodes, vec![Opcode::ExtendedArg, Opcode::Nop]);
        assert_eq!(decoded.instrs[0].arg, 3);
    }

    #[test]
    fn locations_survive_a_concrete_round_trip() {
        let mut concrete = ConcreteBytecode::new(PythonVersion::Py311);
        concrete.consts.push(Const::None);
        let mut load = ConcreteInstr::new(Opcode::LoadConst, 0);
        load.location = InstrLocation::span(3, 3, 0, 7);
        let mut ret = ConcreteInstr::new(Opcode::ReturnValue, 0);
        ret.location = InstrLocation::line(4);
        concrete.instrs.push(load);
        concrete.instrs.push(ret);

        let unit = concrete.to_code_unit(1).unwrap();
        let decoded = ConcreteBytecode::from_code_unit(&unit).unwrap();
        assert_eq!(decoded.instrs[0].location, InstrLocation::span(3, 3, 0, 7));
        assert_eq!(decoded.instrs[1].location.start_line, Some(4));
    }

    #[test]
    fn truncated_code_is_rejected() {
        let mut unit = CodeUnit::new(PythonVersion::Py310);
        unit.code = vec![100];
        assert!(matches!(
            ConcreteBytecode::from_code_unit(&unit),
            Err(DisassembleError::TruncatedCode { offset: 0 })
        ));
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let mut unit = CodeUnit::new(PythonVersion::Py310);
        unit.code = vec![255, 0];
        assert!(matches!(
            ConcreteBytecode::from_code_unit(&unit),
            Err(DisassembleError::UnknownOpcode { value: 255, .. })
        ));
    }

    #[test]
    fn docstring_in_both_places_is_an_error() {
        let mut concrete = ConcreteBytecode::new(PythonVersion::Py310);
        concrete.consts.push(Const::Str("doc".into()));
        concrete.info.docstring = Some(Const::Str("doc".into()));
        assert_eq!(concrete.to_code_unit(0).unwrap_err(), AssembleError::DuplicateDocstring);
    }
}
