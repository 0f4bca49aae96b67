//! Worklist solver for maximum operand-stack depth.
//!
//! Each instruction contributes a `pre` (operands it requires) and a `post`
//! (net change), with a distinct taken-branch `post` for conditional jumps.
//! Depths propagate along fallthrough and jump edges from an entry seed of
//! zero; encountering a `TryBegin` seeds its handler block with the depth
//! the interpreter restores on unwinding (`depth + 1`, plus one more when
//! the instruction offset is pushed). Re-entry at a larger depth reprocesses
//! a block, so recorded depths grow monotonically and the walk terminates.
//! Unreachable blocks contribute nothing.

use ahash::AHashMap;

use crate::{
    bytecode::TryId,
    cfg::{BlockElement, BlockId, ControlFlowGraph},
    error::StackDepthError,
    instr::JumpTarget,
};

/// The solver's results: the frame's stack requirement and the depth
/// recorded at every reachable `TryBegin`.
#[derive(Debug, Clone)]
pub struct SolvedStack {
    pub maxdepth: u32,
    pub try_depths: AHashMap<TryId, u32>,
}

pub(crate) fn solve(graph: &ControlFlowGraph, check_underflow: bool) -> Result<SolvedStack, StackDepthError> {
    let version = graph.version();
    let Some(entry) = graph.entry() else {
        return Ok(SolvedStack {
            maxdepth: 0,
            try_depths: AHashMap::new(),
        });
    };

    // Fallthrough successors follow layout order when a block carries no
    // explicit link.
    let order: Vec<BlockId> = graph.blocks().map(|(id, _)| id).collect();
    let mut layout_next: AHashMap<BlockId, BlockId> = AHashMap::new();
    for pair in order.windows(2) {
        layout_next.insert(pair[0], pair[1]);
    }

    let mut entry_depth: AHashMap<BlockId, i64> = AHashMap::new();
    let mut handler_seeds: AHashMap<BlockId, (TryId, i64)> = AHashMap::new();
    let mut try_depths: AHashMap<TryId, u32> = AHashMap::new();
    let mut maxdepth: i64 = 0;
    let mut worklist: Vec<(BlockId, i64)> = vec![(entry, 0)];

    while let Some((id, depth_at_entry)) = worklist.pop() {
        if entry_depth.get(&id).is_some_and(|&d| d >= depth_at_entry) {
            continue;
        }
        entry_depth.insert(id, depth_at_entry);
        maxdepth = maxdepth.max(depth_at_entry);

        let Some(block) = graph.block(id) else { continue };
        let mut depth = depth_at_entry;
        let mut fell_through = true;
        for (index, element) in block.elements.iter().enumerate() {
            match element {
                BlockElement::SetLineno(_) | BlockElement::TryEnd(_) => {}
                BlockElement::TryBegin(begin) => {
                    try_depths.insert(begin.id, depth.max(0) as u32);
                    let seed = depth + 1 + i64::from(begin.push_lasti);
                    if let JumpTarget::Block(handler) = begin.target {
                        if let Some((other, other_depth)) = handler_seeds.get(&handler)
                            && *other != begin.id
                            && *other_depth != seed
                        {
                            return Err(StackDepthError::InconsistentStack { block: handler });
                        }
                        handler_seeds.insert(handler, (begin.id, seed));
                        maxdepth = maxdepth.max(seed);
                        worklist.push((handler, seed));
                    }
                }
                BlockElement::Instr(instr) => {
                    let (pre, post) = instr.stack_effect(version, false).unwrap_or((0, 0));
                    if check_underflow && depth < i64::from(pre) {
                        return Err(StackDepthError::StackUnderflow { block: id, instr: index });
                    }
                    if let Some(JumpTarget::Block(target)) = instr.jump_target() {
                        let (_, post_jump) = instr.stack_effect(version, true).unwrap_or((0, 0));
                        let taken = (depth + i64::from(post_jump)).max(0);
                        maxdepth = maxdepth.max(taken);
                        worklist.push((target, taken));
                    }
                    if instr.is_final(version) {
                        fell_through = false;
                        break;
                    }
                    depth = (depth + i64::from(post)).max(0);
                    maxdepth = maxdepth.max(depth);
                }
            }
        }
        if fell_through && let Some(next) = block.next_block.or_else(|| layout_next.get(&id).copied()) {
            worklist.push((next, depth));
        }
    }

    Ok(SolvedStack {
        maxdepth: maxdepth.max(0) as u32,
        try_depths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{Bytecode, BytecodeElement},
        constant::Const,
        instr::{Instr, InstrArg},
        op::Opcode,
        version::PythonVersion,
    };

    fn instr(version: PythonVersion, opcode: Opcode, arg: InstrArg) -> Instr {
        Instr::new(version, opcode, arg).unwrap()
    }

    #[test]
    fn straight_line_depth() {
        let version = PythonVersion::Py310;
        let mut code = Bytecode::new(version);
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(1))));
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(2))));
        code.push_instr(instr(version, Opcode::BinaryAdd, InstrArg::None));
        code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));
        assert_eq!(code.compute_stacksize(true).unwrap(), 2);
    }

    #[test]
    fn branches_take_the_maximum() {
        let version = PythonVersion::Py310;
        let mut code = Bytecode::new(version);
        let else_label = code.new_label();
        code.push_instr(instr(version, Opcode::LoadName, InstrArg::Name("flag".into())));
        code.push_instr(instr(
            version,
            Opcode::PopJumpIfFalse,
            InstrArg::Jump(JumpTarget::Label(else_label)),
        ));
        // Deep branch: three values built into a tuple.
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(1))));
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(2))));
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(3))));
        code.push_instr(instr(version, Opcode::BuildTuple, InstrArg::Raw(3)));
        code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));
        // Shallow branch.
        code.push_label(else_label);
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::None)));
        code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));
        assert_eq!(code.compute_stacksize(true).unwrap(), 3);
    }

    #[test]
    fn underflow_is_detected() {
        let version = PythonVersion::Py310;
        let mut code = Bytecode::new(version);
        code.push_instr(instr(version, Opcode::BinaryAdd, InstrArg::None));
        let err = code.compute_stacksize(true).unwrap_err();
        assert!(matches!(
            err,
            crate::error::AssembleError::Stack(StackDepthError::StackUnderflow { .. })
        ));
        // The check can be disabled for trusted input.
        assert!(code.compute_stacksize(false).is_ok());
    }

    #[test]
    fn exception_handler_is_seeded_past_the_region_depth() {
        let version = PythonVersion::Py311;
        let mut code = Bytecode::new(version);
        let handler = code.new_label();
        let done = code.new_label();
        let begin = code.new_try_begin(JumpTarget::Label(handler), true);
        code.push(BytecodeElement::TryBegin(begin.clone()));
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(1))));
        code.push_instr(instr(version, Opcode::PopTop, InstrArg::None));
        code.push(BytecodeElement::TryEnd(crate::bytecode::TryEnd { begin: begin.id }));
        code.push_instr(instr(
            version,
            Opcode::JumpForward,
            InstrArg::Jump(JumpTarget::Label(done)),
        ));
        // Handler: lasti + exception pushed by the interpreter.
        code.push_label(handler);
        code.push_instr(instr(version, Opcode::PushExcInfo, InstrArg::None));
        code.push_instr(instr(version, Opcode::PopTop, InstrArg::None));
        code.push_instr(instr(version, Opcode::PopExcept, InstrArg::None));
        code.push_instr(instr(version, Opcode::PopTop, InstrArg::None));
        code.push_label(done);
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::None)));
        code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));

        let cfg = crate::cfg::ControlFlowGraph::from_bytecode(&code).unwrap();
        let solved = cfg.compute_stacksize(true).unwrap();
        // Region entered at depth 0; push_lasti seeds the handler at 2,
        // and PUSH_EXC_INFO takes it to 3.
        assert_eq!(solved.try_depths[&begin.id], 0);
        assert_eq!(solved.maxdepth, 3);
    }

    #[test]
    fn unreachable_blocks_are_ignored() {
        let version = PythonVersion::Py310;
        let mut code = Bytecode::new(version);
        let end = code.new_label();
        code.push_instr(instr(
            version,
            Opcode::JumpAbsolute,
            InstrArg::Jump(JumpTarget::Label(end)),
        ));
        // Dead code that would otherwise dominate the depth.
        for _ in 0..10 {
            code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(0))));
        }
        code.push_label(end);
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::None)));
        code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));
        assert_eq!(code.compute_stacksize(true).unwrap(), 1);
    }
}
