//! The control-flow-graph layer.
//!
//! Blocks live in an arena and reference each other by stable [`BlockId`];
//! jump arguments and fallthrough links carry ids, never pointers, so
//! deleting a block cannot dangle — a jump to a removed block is caught at
//! flatten time. Arena order is layout order: a block's fallthrough
//! successor is the next live block.

use ahash::AHashMap;

use crate::{
    bytecode::{Bytecode, BytecodeElement, Label, TryBegin, TryEnd, TryId},
    code::CodeInfo,
    error::{AssembleError, StackDepthError},
    instr::{Instr, JumpTarget},
    stackdepth::{self, SolvedStack},
    version::PythonVersion,
};

/// Stable identity of a basic block inside one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlockId(pub(crate) u32);

/// One element of a basic block. The same stream elements as the abstract
/// layer minus labels, which the graph replaces with block identity.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BlockElement {
    Instr(Instr),
    SetLineno(u32),
    TryBegin(TryBegin),
    TryEnd(TryEnd),
}

/// A straight-line run of instructions.
///
/// Only the last instruction may jump. `next_block` names the fallthrough
/// successor; it is `None` after a final instruction.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BasicBlock {
    pub elements: Vec<BlockElement>,
    pub next_block: Option<BlockId>,
}

impl BasicBlock {
    /// The instructions of the block, skipping pseudo-elements.
    pub fn instrs(&self) -> impl Iterator<Item = &Instr> {
        self.elements.iter().filter_map(|element| match element {
            BlockElement::Instr(instr) => Some(instr),
            _ => None,
        })
    }

    /// The jump target of the last instruction, if it jumps.
    #[must_use]
    pub fn exit_target(&self) -> Option<JumpTarget> {
        self.instrs().last().and_then(Instr::jump_target)
    }
}

/// A code unit as an arena of basic blocks.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControlFlowGraph {
    version: PythonVersion,
    pub info: CodeInfo,
    blocks: Vec<Option<BasicBlock>>,
    next_label: u32,
    next_try: u32,
}

impl ControlFlowGraph {
    #[must_use]
    pub fn new(version: PythonVersion) -> Self {
        Self {
            version,
            info: CodeInfo::default(),
            blocks: Vec::new(),
            next_label: 0,
            next_try: 0,
        }
    }

    #[must_use]
    pub fn version(&self) -> PythonVersion {
        self.version
    }

    /// Appends an empty block and returns its id.
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Some(BasicBlock::default()));
        id
    }

    /// Removes a block. Jumps that still reference it fail at flatten
    /// time with [`AssembleError::UnresolvedBlock`].
    pub fn remove_block(&mut self, id: BlockId) {
        if let Some(slot) = self.blocks.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Live blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|block| (BlockId(index as u32), block)))
    }

    /// The entry block, when the graph is non-empty.
    #[must_use]
    pub fn entry(&self) -> Option<BlockId> {
        self.blocks().next().map(|(id, _)| id)
    }

    /// Builds the graph from an abstract stream.
    ///
    /// Boundaries open at every label, after every final instruction, and
    /// after every conditional jump. A conditional jump taken from inside
    /// an exception region plants a `TryEnd` at the head of its target
    /// block, so the region's extent survives the split; the flattener
    /// collapses the duplicates this can create.
    pub fn from_bytecode(bytecode: &Bytecode) -> Result<Self, AssembleError> {
        let version = bytecode.version();
        let mut graph = Self::new(version);
        graph.info = bytecode.info.clone();
        let (next_label, next_try) = bytecode.counters();
        graph.set_counters(next_label, next_try);

        // First pass: a block index for every boundary. Labels map to the
        // block that starts at them.
        let mut label_block: AHashMap<Label, BlockId> = AHashMap::new();
        let mut current = graph.add_block();
        let mut current_empty = true;
        for element in bytecode.elements() {
            match element {
                BytecodeElement::Label(label) => {
                    let block = if current_empty {
                        current
                    } else {
                        let block = graph.add_block();
                        graph.link_fallthrough(current, block);
                        current = block;
                        current_empty = true;
                        block
                    };
                    label_block.insert(*label, block);
                }
                BytecodeElement::Instr(instr) => {
                    current_empty = false;
                    let is_final = instr.is_final(version);
                    let splits = is_final || instr.is_cond_jump(version);
                    graph.push_element(current, BlockElement::Instr(instr.clone()));
                    if splits {
                        let block = graph.add_block();
                        if !is_final {
                            graph.link_fallthrough(current, block);
                        }
                        current = block;
                        current_empty = true;
                    }
                }
                BytecodeElement::SetLineno(line) => {
                    graph.push_element(current, BlockElement::SetLineno(*line));
                }
                BytecodeElement::TryBegin(begin) => {
                    current_empty = false;
                    graph.push_element(current, BlockElement::TryBegin(begin.clone()));
                }
                BytecodeElement::TryEnd(end) => {
                    graph.push_element(current, BlockElement::TryEnd(*end));
                }
            }
        }

        // Second pass: rewrite label targets to block targets, and plant
        // region ends at the targets of conditional exits.
        let mut active_try: Option<TryBegin> = None;
        let mut pending_ends: Vec<(BlockId, TryEnd)> = Vec::new();
        for (_, block) in graph.blocks() {
            for element in &block.elements {
                match element {
                    BlockElement::TryBegin(begin) => active_try = Some(begin.clone()),
                    BlockElement::TryEnd(_) => active_try = None,
                    BlockElement::Instr(instr) => {
                        if let Some(JumpTarget::Label(label)) = instr.jump_target() {
                            let target = *label_block
                                .get(&label)
                                .ok_or(AssembleError::UnresolvedTarget(label))?;
                            if instr.is_cond_jump(version)
                                && let Some(begin) = &active_try
                            {
                                pending_ends.push((target, TryEnd { begin: begin.id }));
                            }
                        }
                    }
                    BlockElement::SetLineno(_) => {}
                }
            }
        }
        for slot in &mut graph.blocks {
            if let Some(block) = slot {
                for element in &mut block.elements {
                    if let BlockElement::Instr(instr) = element
                        && let Some(JumpTarget::Label(label)) = instr.jump_target()
                    {
                        let target = label_block[&label];
                        instr.set_jump_target(JumpTarget::Block(target));
                    }
                }
            }
        }
        for (target, end) in pending_ends {
            if let Some(block) = graph.block_mut(target) {
                let already = block
                    .elements
                    .first()
                    .is_some_and(|element| matches!(element, BlockElement::TryEnd(e) if e.begin == end.begin));
                if !already {
                    block.elements.insert(0, BlockElement::TryEnd(end));
                }
            }
        }
        // Rewrite TryBegin handler targets as well.
        for slot in &mut graph.blocks {
            if let Some(block) = slot {
                for element in &mut block.elements {
                    if let BlockElement::TryBegin(begin) = element
                        && let JumpTarget::Label(label) = begin.target
                    {
                        let target = *label_block
                            .get(&label)
                            .ok_or(AssembleError::UnresolvedTarget(label))?;
                        begin.target = JumpTarget::Block(target);
                    }
                }
            }
        }
        Ok(graph)
    }

    /// Flattens the graph back into an abstract stream.
    ///
    /// Every live block gets a fresh label; jumps are rewritten from block
    /// ids to those labels. `TryEnd`s whose region is not active at their
    /// position — duplicates planted by the conditional-exit rule — are
    /// dropped.
    pub fn to_bytecode(&self) -> Result<Bytecode, AssembleError> {
        let mut bytecode = Bytecode::new(self.version);
        bytecode.info = self.info.clone();
        bytecode.set_counters(self.next_label, self.next_try);

        let mut block_label: AHashMap<BlockId, Label> = AHashMap::new();
        for (id, _) in self.blocks() {
            block_label.insert(id, bytecode.new_label());
        }

        let resolve = |target: JumpTarget, block_label: &AHashMap<BlockId, Label>| match target {
            JumpTarget::Label(label) => Ok(label),
            JumpTarget::Block(id) => block_label
                .get(&id)
                .copied()
                .ok_or(AssembleError::UnresolvedBlock(id)),
        };

        let mut active_try: Option<TryId> = None;
        for (id, block) in self.blocks() {
            bytecode.push_label(block_label[&id]);
            for element in &block.elements {
                match element {
                    BlockElement::SetLineno(line) => bytecode.push(BytecodeElement::SetLineno(*line)),
                    BlockElement::TryBegin(begin) => {
                        let mut begin = begin.clone();
                        begin.target = JumpTarget::Label(resolve(begin.target, &block_label)?);
                        active_try = Some(begin.id);
                        bytecode.push(BytecodeElement::TryBegin(begin));
                    }
                    BlockElement::TryEnd(end) => {
                        if active_try == Some(end.begin) {
                            active_try = None;
                            bytecode.push(BytecodeElement::TryEnd(*end));
                        }
                    }
                    BlockElement::Instr(instr) => {
                        let mut instr = instr.clone();
                        if let Some(target) = instr.jump_target() {
                            instr.set_jump_target(JumpTarget::Label(resolve(target, &block_label)?));
                        }
                        bytecode.push_instr(instr);
                    }
                }
            }
        }
        Ok(bytecode)
    }

    /// Runs the operand-stack depth solver over the graph.
    pub fn compute_stacksize(&self, check_underflow: bool) -> Result<SolvedStack, StackDepthError> {
        stackdepth::solve(self, check_underflow)
    }

    pub(crate) fn set_counters(&mut self, next_label: u32, next_try: u32) {
        self.next_label = next_label;
        self.next_try = next_try;
    }

    fn link_fallthrough(&mut self, from: BlockId, to: BlockId) {
        if let Some(block) = self.block_mut(from) {
            block.next_block = Some(to);
        }
    }

    fn push_element(&mut self, id: BlockId, element: BlockElement) {
        if let Some(block) = self.block_mut(id) {
            block.elements.push(element);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constant::Const, instr::InstrArg, op::Opcode};

    fn instr(version: PythonVersion, opcode: Opcode, arg: InstrArg) -> Instr {
        Instr::new(version, opcode, arg).unwrap()
    }

    #[test]
    fn conditional_jump_splits_blocks() {
        let version = PythonVersion::Py310;
        let mut code = Bytecode::new(version);
        let target = code.new_label();
        code.push_instr(instr(version, Opcode::LoadName, InstrArg::Name("x".into())));
        code.push_instr(instr(
            version,
            Opcode::PopJumpIfFalse,
            InstrArg::Jump(JumpTarget::Label(target)),
        ));
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(1))));
        code.push_label(target);
        code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));

        let graph = ControlFlowGraph::from_bytecode(&code).unwrap();
        let blocks: Vec<_> = graph.blocks().collect();
        assert_eq!(blocks.len(), 3);
        // Block 0 ends with the conditional jump and falls through to 1.
        assert_eq!(blocks[0].1.instrs().count(), 2);
        assert_eq!(blocks[0].1.next_block, Some(blocks[1].0));
        // The jump now references the target block.
        assert_eq!(blocks[0].1.exit_target(), Some(JumpTarget::Block(blocks[2].0)));
    }

    #[test]
    fn final_instruction_cuts_fallthrough() {
        let version = PythonVersion::Py310;
        let mut code = Bytecode::new(version);
        let exit = code.new_label();
        code.push_instr(instr(
            version,
            Opcode::JumpAbsolute,
            InstrArg::Jump(JumpTarget::Label(exit)),
        ));
        code.push_label(exit);
        code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));

        let graph = ControlFlowGraph::from_bytecode(&code).unwrap();
        let blocks: Vec<_> = graph.blocks().collect();
        assert_eq!(blocks[0].1.next_block, None);
    }

    #[test]
    fn round_trips_through_the_graph() {
        let version = PythonVersion::Py310;
        let mut code = Bytecode::new(version);
        let else_label = code.new_label();
        code.push_instr(instr(version, Opcode::LoadName, InstrArg::Name("flag".into())));
        code.push_instr(instr(
            version,
            Opcode::PopJumpIfFalse,
            InstrArg::Jump(JumpTarget::Label(else_label)),
        ));
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Str("yes".into()))));
        code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));
        code.push_label(else_label);
        code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Str("no".into()))));
        code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));

        let graph = ControlFlowGraph::from_bytecode(&code).unwrap();
        let flat = graph.to_bytecode().unwrap();
        // Instruction order survives the round trip.
        let opcodes: Vec<_> = flat.instrs().map(Instr::opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                Opcode::LoadName,
                Opcode::PopJumpIfFalse,
                Opcode::LoadConst,
                Opcode::ReturnValue,
                Opcode::LoadConst,
                Opcode::ReturnValue,
            ]
        );
        // And the stream assembles.
        assert!(flat.to_concrete().is_ok());
    }

    #[test]
    fn jump_to_removed_block_fails_at_flatten() {
        let version = PythonVersion::Py310;
        let mut graph = ControlFlowGraph::new(version);
        let a = graph.add_block();
        let b = graph.add_block();
        graph
            .block_mut(a)
            .unwrap()
            .elements
            .push(BlockElement::Instr(instr(
                version,
                Opcode::JumpAbsolute,
                InstrArg::Jump(JumpTarget::Block(b)),
            )));
        graph.remove_block(b);
        assert_eq!(graph.to_bytecode().unwrap_err(), AssembleError::UnresolvedBlock(b));
    }

    #[test]
    fn unresolved_label_fails_at_graph_build() {
        let version = PythonVersion::Py310;
        let mut code = Bytecode::new(version);
        let dangling = code.new_label();
        code.push_instr(instr(
            version,
            Opcode::JumpAbsolute,
            InstrArg::Jump(JumpTarget::Label(dangling)),
        ));
        assert_eq!(
            ControlFlowGraph::from_bytecode(&code).unwrap_err(),
            AssembleError::UnresolvedTarget(dangling)
        );
    }
}
