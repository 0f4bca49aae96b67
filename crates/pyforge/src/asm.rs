//! The assembler: abstract stream to concrete stream.
//!
//! Three passes. Pool construction interns constants and names in
//! first-occurrence order. The encoding pass resolves semantic arguments to
//! integers, leaving placeholders for jumps. The fixed-point pass then
//! resolves jump offsets: the width of an instruction depends on how many
//! `EXTENDED_ARG` prefixes it needs, which depends on the argument value,
//! which for jumps depends on instruction widths. Prefix counts only ever
//! grow, so iteration terminates; a pass that grows nothing is the fixed
//! point.

use ahash::AHashMap;
use indexmap::{IndexMap, IndexSet};

use crate::{
    bytecode::{Bytecode, BytecodeElement, Label, TryId},
    concrete::{ConcreteBytecode, ConcreteInstr, extended_args_for},
    constant::{Const, ConstKey},
    error::AssembleError,
    exception_table::ExceptionTableEntry,
    instr::{InstrArg, JumpTarget},
    location::InstrLocation,
    op::{CompareOperator, OpKind},
    tables::OpcodeTable,
    version::PythonVersion,
};

/// Default bound on fixed-point passes. Realistic streams converge in five
/// or fewer; the bound exists so malformed inputs fail instead of spinning.
pub const DEFAULT_MAX_PASSES: u32 = 10;

/// Assembles with the default pass budget.
pub fn assemble(bytecode: &Bytecode) -> Result<ConcreteBytecode, AssembleError> {
    assemble_with_max_passes(bytecode, DEFAULT_MAX_PASSES)
}

/// One pending jump: concrete instruction index, category, and target.
struct JumpFixup {
    index: usize,
    kind: OpKind,
    label: Label,
}

/// An exception region being collected from `TryBegin`/`TryEnd` pairs.
struct OpenRegion {
    id: TryId,
    target: Label,
    push_lasti: bool,
    stack_depth: Option<u32>,
    start_index: usize,
}

struct ClosedRegion {
    target: Label,
    push_lasti: bool,
    stack_depth: Option<u32>,
    start_index: usize,
    stop_index: usize,
}

/// Assembles an abstract stream into concrete form.
///
/// Jumps must target labels present in the stream; `TryBegin`s must carry
/// stack depths when the target version packs an exception table (the
/// [`Bytecode::to_code_unit`] entry point fills them from the solver).
pub fn assemble_with_max_passes(bytecode: &Bytecode, max_passes: u32) -> Result<ConcreteBytecode, AssembleError> {
    let version = bytecode.version();
    let table = OpcodeTable::get(version);
    let step = version.jump_unit();

    // Pool construction. Constants dedup under the structural key; names
    // and varnames under plain string identity. First occurrence wins the
    // slot, and argument names pre-seed varnames.
    let mut consts: IndexMap<ConstKey, Const> = IndexMap::new();
    let mut names: IndexSet<String> = IndexSet::new();
    let mut varnames: IndexSet<String> = bytecode.info.argnames.iter().cloned().collect();
    if let Some(docstring) = &bytecode.info.docstring {
        consts.insert(docstring.key(), docstring.clone());
    }
    let cellvars = &bytecode.info.cellvars;
    let freevars = &bytecode.info.freevars;

    let mut instrs: Vec<ConcreteInstr> = Vec::new();
    let mut jumps: Vec<JumpFixup> = Vec::new();
    let mut label_pos: AHashMap<Label, usize> = AHashMap::new();
    let mut open_regions: Vec<OpenRegion> = Vec::new();
    let mut closed_regions: Vec<ClosedRegion> = Vec::new();
    let mut current_line: Option<u32> = None;

    for (element_index, element) in bytecode.elements().iter().enumerate() {
        match element {
            BytecodeElement::Label(label) => {
                label_pos.insert(*label, instrs.len());
            }
            BytecodeElement::SetLineno(line) => current_line = Some(*line),
            BytecodeElement::TryBegin(begin) => {
                let target = match begin.target {
                    JumpTarget::Label(label) => label,
                    JumpTarget::Block(block) => return Err(AssembleError::UnresolvedBlock(block)),
                };
                open_regions.push(OpenRegion {
                    id: begin.id,
                    target,
                    push_lasti: begin.push_lasti,
                    stack_depth: begin.stack_depth,
                    start_index: instrs.len(),
                });
            }
            BytecodeElement::TryEnd(end) => {
                // Ends for regions that already closed on another path are
                // flattening artifacts; skip them.
                if let Some(pos) = open_regions.iter().position(|region| region.id == end.begin) {
                    let region = open_regions.remove(pos);
                    close_region(&mut closed_regions, region, instrs.len());
                }
            }
            BytecodeElement::Instr(instr) => {
                let info = table
                    .entry(instr.opcode())
                    .ok_or(AssembleError::UnsupportedOpcode {
                        opcode: instr.opcode(),
                        version,
                    })?;
                if !instr.arg().matches(info.kind) {
                    return Err(AssembleError::InvalidArgumentKind { index: element_index });
                }
                let raw_arg = match instr.arg() {
                    InstrArg::None => 0,
                    InstrArg::Raw(value) => *value,
                    InstrArg::Local(name) => varnames.insert_full(name.clone()).0 as u32,
                    InstrArg::Name(name) => names.insert_full(name.clone()).0 as u32,
                    InstrArg::Cell(name) => {
                        deref_index(cellvars, name, true)? // cell slots come first
                    }
                    InstrArg::Free(name) => cellvars.len() as u32 + deref_index(freevars, name, false)?,
                    InstrArg::Const(value) => {
                        let (index, _) = consts.insert_full(value.key(), value.clone());
                        index as u32
                    }
                    InstrArg::Compare(op) => compare_arg(*op, version, element_index)?,
                    InstrArg::Binary(op) => *op as u32,
                    InstrArg::Intrinsic1(f) => *f as u32,
                    InstrArg::Intrinsic2(f) => *f as u32,
                    InstrArg::LoadGlobal { push_null, name } => {
                        ((names.insert_full(name.clone()).0 as u32) << 1) | u32::from(*push_null)
                    }
                    InstrArg::LoadAttr { call_as_method, name } => {
                        ((names.insert_full(name.clone()).0 as u32) << 1) | u32::from(*call_as_method)
                    }
                    InstrArg::LoadSuperAttr {
                        call_as_method,
                        push_null,
                        name,
                    } => {
                        ((names.insert_full(name.clone()).0 as u32) << 2)
                            | (u32::from(*push_null) << 1)
                            | u32::from(*call_as_method)
                    }
                    InstrArg::Jump(target) => {
                        let label = match target {
                            JumpTarget::Label(label) => *label,
                            JumpTarget::Block(block) => return Err(AssembleError::UnresolvedBlock(*block)),
                        };
                        jumps.push(JumpFixup {
                            index: instrs.len(),
                            kind: info.kind,
                            label,
                        });
                        0
                    }
                };
                let location = if instr.location.is_none() {
                    current_line.map_or(InstrLocation::NONE, InstrLocation::line)
                } else {
                    instr.location
                };
                instrs.push(ConcreteInstr {
                    opcode: instr.opcode(),
                    arg: raw_arg,
                    location,
                });
            }
        }
    }
    // A region with no end closes at the end of the stream.
    for region in open_regions.drain(..) {
        close_region(&mut closed_regions, region, instrs.len());
    }

    // Jump fixed point. `extra[i]` is the number of EXTENDED_ARG prefixes
    // instruction `i` carries; it starts at the natural width for
    // non-jumps and zero for jumps, and only ever grows.
    let caches: Vec<u32> = instrs
        .iter()
        .map(|instr| {
            table
                .entry(instr.opcode)
                .map_or(0, |info| u32::from(info.cache_slots))
        })
        .collect();
    let mut extra: Vec<u32> = instrs.iter().map(|instr| extended_args_for(instr.arg)).collect();
    let mut offsets: Vec<u32> = vec![0; instrs.len() + 1];

    let mut converged = false;
    for _ in 0..max_passes {
        let mut offset = 0u32;
        for (i, slot) in offsets.iter_mut().take(instrs.len()).enumerate() {
            *slot = offset;
            offset += 2 * (1 + extra[i] + caches[i]);
        }
        offsets[instrs.len()] = offset;

        let mut changed = false;
        for jump in &jumps {
            let target_index = *label_pos
                .get(&jump.label)
                .ok_or(AssembleError::UnresolvedTarget(jump.label))?;
            let target_offset = offsets[target_index];
            let instr_offset = offsets[jump.index];
            let size = 2 * (1 + extra[jump.index] + caches[jump.index]);
            let arg = match jump.kind {
                OpKind::JumpAbs => target_offset / step,
                OpKind::JumpFwd => target_offset
                    .checked_sub(instr_offset + size)
                    .ok_or(AssembleError::NegativeJump { index: jump.index })?
                    / step,
                OpKind::JumpBack => (instr_offset + size)
                    .checked_sub(target_offset)
                    .ok_or(AssembleError::NegativeJump { index: jump.index })?
                    / step,
                _ => unreachable!("jump fixup recorded for non-jump kind"),
            };
            instrs[jump.index].arg = arg;
            let needed = extended_args_for(arg);
            if needed > extra[jump.index] {
                extra[jump.index] = needed;
                changed = true;
            }
        }
        if !changed {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(AssembleError::JumpsUnstable { passes: max_passes });
    }

    // Exception table. Regions that cover no instruction encode nothing.
    let mut exception_table = Vec::new();
    if version.has_exception_table() {
        for region in &closed_regions {
            if region.stop_index <= region.start_index {
                continue;
            }
            let stack_depth = region.stack_depth.ok_or(AssembleError::MissingTryDepth)?;
            let target_index = *label_pos
                .get(&region.target)
                .ok_or(AssembleError::UnresolvedTarget(region.target))?;
            exception_table.push(ExceptionTableEntry {
                start: offsets[region.start_index],
                stop: offsets[region.stop_index],
                target: offsets[target_index],
                push_lasti: region.push_lasti,
                stack_depth,
            });
        }
        exception_table.sort_by_key(|entry: &ExceptionTableEntry| (entry.start, entry.stop));
    }

    let mut concrete = ConcreteBytecode::new(version);
    concrete.info = bytecode.info.clone();
    // The docstring now lives in consts slot 0.
    concrete.info.docstring = None;
    concrete.instrs = instrs;
    concrete.consts = consts.into_values().collect();
    concrete.names = names.into_iter().collect();
    concrete.varnames = varnames.into_iter().collect();
    concrete.exception_table = exception_table;
    Ok(concrete)
}

fn close_region(closed: &mut Vec<ClosedRegion>, region: OpenRegion, stop_index: usize) {
    closed.push(ClosedRegion {
        target: region.target,
        push_lasti: region.push_lasti,
        stack_depth: region.stack_depth,
        start_index: region.start_index,
        stop_index,
    });
}

fn deref_index(pool: &[String], name: &str, is_cell: bool) -> Result<u32, AssembleError> {
    pool.iter()
        .position(|candidate| candidate == name)
        .map(|index| index as u32)
        .ok_or_else(|| AssembleError::UnknownDeref {
            name: name.to_owned(),
            is_cell,
        })
}

fn compare_arg(op: CompareOperator, version: PythonVersion, index: usize) -> Result<u32, AssembleError> {
    if version >= PythonVersion::Py312 {
        return op.to_arg_312().ok_or(AssembleError::InvalidArgumentKind { index });
    }
    let raw = op as u32;
    // The membership and identity members folded into dedicated opcodes in
    // 3.9; they only encode on 3.8.
    if raw >= 6 && version > PythonVersion::Py38 {
        return Err(AssembleError::InvalidArgumentKind { index });
    }
    Ok(raw)
}
