//! The disassembler: concrete stream to abstract stream.
//!
//! Raw integer arguments become semantic values, jump offsets become
//! labels, and exception-table entries become `TryBegin`/`TryEnd` pairs
//! placed around the instructions they cover. `EXTENDED_ARG` prefixes are
//! dropped here — their information already lives in the folded arguments —
//! which is the one lossy step of the lift (the concrete layer preserves
//! prefix-before-`NOP` runs, this layer does not).

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::{
    bytecode::{Bytecode, BytecodeElement, Label, TryBegin, TryEnd},
    concrete::ConcreteBytecode,
    error::DisassembleError,
    instr::{Instr, InstrArg, JumpTarget},
    op::{BinaryOperator, CompareOperator, Intrinsic1Function, Intrinsic2Function, OpKind, Opcode},
    tables::OpcodeTable,
    version::PythonVersion,
};

/// Lifts a concrete stream into abstract form.
pub fn disassemble(concrete: &ConcreteBytecode) -> Result<Bytecode, DisassembleError> {
    let version = concrete.version();
    let table = OpcodeTable::get(version);
    let step = version.jump_unit();

    let offsets = concrete.byte_offsets();
    let code_len = concrete.code_len();
    let mut index_of_offset: AHashMap<u32, usize> = AHashMap::with_capacity(offsets.len());
    for (index, &offset) in offsets.iter().enumerate() {
        index_of_offset.insert(offset, index);
    }

    let mut bytecode = Bytecode::new(version);
    bytecode.info = concrete.info.clone();

    // Resolve every jump to a target instruction index and materialize one
    // label per distinct target.
    let mut labels: AHashMap<usize, Label> = AHashMap::new();
    let mut jump_targets: AHashMap<usize, usize> = AHashMap::new();
    for (index, instr) in concrete.instrs.iter().enumerate() {
        let info = table
            .entry(instr.opcode)
            .ok_or(DisassembleError::UnknownOpcode { value: 0, version })?;
        if !info.kind.is_jump() {
            continue;
        }
        let offset = offsets[index];
        let size = instr.size(table);
        let target = match info.kind {
            OpKind::JumpAbs => instr.arg.checked_mul(step),
            OpKind::JumpFwd => instr.arg.checked_mul(step).map(|delta| offset + size + delta),
            OpKind::JumpBack => instr
                .arg
                .checked_mul(step)
                .and_then(|delta| (offset + size).checked_sub(delta)),
            _ => unreachable!(),
        }
        .ok_or(DisassembleError::InvalidJumpTarget {
            offset,
            target: u32::MAX,
        })?;
        let target_index = *index_of_offset
            .get(&target)
            .ok_or(DisassembleError::InvalidJumpTarget { offset, target })?;
        labels.entry(target_index).or_insert_with(|| bytecode.new_label());
        jump_targets.insert(index, target_index);
    }

    // Turn exception entries into paired pseudo-instructions. Entries that
    // share a start nest outermost-first (descending stop), so the pairs
    // nest on the stream even though the packed entries do not. Almost
    // every instruction borders at most one region, hence the inline
    // vectors.
    let mut begins_at: Vec<SmallVec<[TryBegin; 1]>> = vec![SmallVec::new(); concrete.instrs.len()];
    let mut ends_at: Vec<SmallVec<[(u32, TryEnd); 1]>> = vec![SmallVec::new(); concrete.instrs.len()];
    let mut entries = concrete.exception_table.clone();
    entries.sort_by_key(|entry| (entry.start, std::cmp::Reverse(entry.stop)));
    for entry in &entries {
        let start_index = *index_of_offset
            .get(&entry.start)
            .ok_or(DisassembleError::InvalidExceptionEntry {
                start: entry.start,
                stop: entry.stop,
                target: entry.target,
            })?;
        let target_index = *index_of_offset
            .get(&entry.target)
            .ok_or(DisassembleError::InvalidExceptionEntry {
                start: entry.start,
                stop: entry.stop,
                target: entry.target,
            })?;
        // The last covered instruction is the one that ends at `stop`.
        if entry.stop <= entry.start || entry.stop > code_len {
            return Err(DisassembleError::InvalidExceptionEntry {
                start: entry.start,
                stop: entry.stop,
                target: entry.target,
            });
        }
        let stop_index = match index_of_offset.get(&entry.stop) {
            Some(&next) => next - 1,
            None if entry.stop == code_len => concrete.instrs.len() - 1,
            None => {
                return Err(DisassembleError::InvalidExceptionEntry {
                    start: entry.start,
                    stop: entry.stop,
                    target: entry.target,
                });
            }
        };
        let target_label = *labels
            .entry(target_index)
            .or_insert_with(|| bytecode.new_label());
        let mut begin = bytecode.new_try_begin(JumpTarget::Label(target_label), entry.push_lasti);
        begin.stack_depth = Some(entry.stack_depth);
        ends_at[stop_index].push((entry.start, TryEnd { begin: begin.id }));
        begins_at[start_index].push(begin);
    }
    // Inner regions close first when several end on the same instruction.
    for ends in &mut ends_at {
        ends.sort_by_key(|(start, _)| std::cmp::Reverse(*start));
    }

    for (index, instr) in concrete.instrs.iter().enumerate() {
        if let Some(label) = labels.get(&index) {
            bytecode.push_label(*label);
        }
        for begin in begins_at[index].drain(..) {
            bytecode.push(BytecodeElement::TryBegin(begin));
        }
        if instr.opcode != Opcode::ExtendedArg {
            let arg = classify_arg(concrete, version, instr.opcode, instr.arg, index, &labels, &jump_targets)?;
            let abstract_instr = Instr::with_location(version, instr.opcode, arg, instr.location).map_err(|_| {
                DisassembleError::InvalidOperand {
                    opcode: instr.opcode,
                    value: instr.arg,
                }
            })?;
            bytecode.push_instr(abstract_instr);
        }
        for (_, end) in ends_at[index].drain(..) {
            bytecode.push(BytecodeElement::TryEnd(end));
        }
    }
    Ok(bytecode)
}

/// Rewrites one raw argument into its semantic form.
fn classify_arg(
    concrete: &ConcreteBytecode,
    version: PythonVersion,
    opcode: Opcode,
    arg: u32,
    index: usize,
    labels: &AHashMap<usize, Label>,
    jump_targets: &AHashMap<usize, usize>,
) -> Result<InstrArg, DisassembleError> {
    let table = OpcodeTable::get(version);
    let info = table
        .entry(opcode)
        .ok_or(DisassembleError::UnknownOpcode { value: 0, version })?;
    let invalid = |value| DisassembleError::InvalidOperand { opcode, value };
    Ok(match info.kind {
        OpKind::NoArg => InstrArg::None,
        OpKind::Raw => InstrArg::Raw(arg),
        OpKind::Local => InstrArg::Local(pool_name(&concrete.varnames, arg, opcode)?),
        OpKind::Name => InstrArg::Name(pool_name(&concrete.names, arg, opcode)?),
        OpKind::Deref => {
            let cellvars = &concrete.info.cellvars;
            let freevars = &concrete.info.freevars;
            if let Some(name) = cellvars.get(arg as usize) {
                InstrArg::Cell(name.clone())
            } else {
                let free_index = arg as usize - cellvars.len();
                let name = freevars
                    .get(free_index)
                    .ok_or(DisassembleError::PoolIndexOutOfRange {
                        opcode,
                        index: arg,
                        pool_len: cellvars.len() + freevars.len(),
                    })?;
                InstrArg::Free(name.clone())
            }
        }
        OpKind::Const => {
            let value = concrete
                .consts
                .get(arg as usize)
                .ok_or(DisassembleError::PoolIndexOutOfRange {
                    opcode,
                    index: arg,
                    pool_len: concrete.consts.len(),
                })?;
            InstrArg::Const(value.clone())
        }
        OpKind::Compare => {
            let op = if version >= PythonVersion::Py312 {
                CompareOperator::from_arg_312(arg)
            } else {
                u8::try_from(arg).ok().and_then(CompareOperator::from_repr).filter(|op| {
                    // Membership and identity comparisons are 3.8-only.
                    (*op as u8) < 6 || version == PythonVersion::Py38
                })
            };
            InstrArg::Compare(op.ok_or(invalid(arg))?)
        }
        OpKind::Binary => {
            let op = u8::try_from(arg).ok().and_then(BinaryOperator::from_repr);
            InstrArg::Binary(op.ok_or(invalid(arg))?)
        }
        OpKind::Intrinsic1 => {
            let f = u8::try_from(arg).ok().and_then(Intrinsic1Function::from_repr);
            InstrArg::Intrinsic1(f.ok_or(invalid(arg))?)
        }
        OpKind::Intrinsic2 => {
            let f = u8::try_from(arg).ok().and_then(Intrinsic2Function::from_repr);
            InstrArg::Intrinsic2(f.ok_or(invalid(arg))?)
        }
        OpKind::LoadGlobal => InstrArg::LoadGlobal {
            push_null: arg & 1 != 0,
            name: pool_name(&concrete.names, arg >> 1, opcode)?,
        },
        OpKind::LoadAttr => InstrArg::LoadAttr {
            call_as_method: arg & 1 != 0,
            name: pool_name(&concrete.names, arg >> 1, opcode)?,
        },
        OpKind::LoadSuperAttr => InstrArg::LoadSuperAttr {
            call_as_method: arg & 1 != 0,
            push_null: arg & 2 != 0,
            name: pool_name(&concrete.names, arg >> 2, opcode)?,
        },
        OpKind::JumpAbs | OpKind::JumpFwd | OpKind::JumpBack => {
            // Targets were resolved and labelled in the first pass.
            let label = jump_targets
                .get(&index)
                .and_then(|target_index| labels.get(target_index))
                .copied()
                .ok_or(invalid(arg))?;
            InstrArg::Jump(JumpTarget::Label(label))
        }
        OpKind::Pseudo => {
            return Err(invalid(arg));
        }
    })
}

fn pool_name(pool: &[String], index: u32, opcode: Opcode) -> Result<String, DisassembleError> {
    pool.get(index as usize)
        .cloned()
        .ok_or(DisassembleError::PoolIndexOutOfRange {
            opcode,
            index,
            pool_len: pool.len(),
        })
}
