//! The abstract instruction stream.
//!
//! A [`Bytecode`] is an ordered sequence of instructions and pseudo-elements
//! (labels, line markers, exception-region delimiters) plus the code-unit
//! header. Pseudo-elements occupy stream positions but encode to nothing;
//! their value is identity, which survives arbitrary splicing around them.

use crate::{
    asm,
    cfg::ControlFlowGraph,
    code::{CodeInfo, CodeUnit},
    concrete::ConcreteBytecode,
    disasm,
    error::{AssembleError, DisassembleError},
    flags,
    instr::{Instr, JumpTarget},
    version::PythonVersion,
};

/// A jump target identity inside an abstract stream.
///
/// Labels are handles, not positions: moving or editing the stream never
/// invalidates one, and a label is resolved to an offset only at assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Label(pub(crate) u32);

/// Identity of a `TryBegin`, referenced by its `TryEnd`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TryId(pub(crate) u32);

/// Start of an exception-covered region.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TryBegin {
    pub id: TryId,
    /// The handler the interpreter jumps to when the region unwinds.
    pub target: JumpTarget,
    /// Whether the instruction offset is pushed before the exception on
    /// unwinding.
    pub push_lasti: bool,
    /// Operand-stack depth at which the handler runs. Filled by the depth
    /// solver when absent.
    pub stack_depth: Option<u32>,
}

/// End of an exception-covered region, pointing back at its begin.
///
/// A region may own several reachable ends when conditional jumps exit it;
/// the assembler closes the region at the first one reached in stream
/// order and ignores the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TryEnd {
    pub begin: TryId,
}

/// One element of an abstract stream.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BytecodeElement {
    Instr(Instr),
    Label(Label),
    /// Sets the line attributed to following instructions that carry no
    /// location of their own, until the next marker.
    SetLineno(u32),
    TryBegin(TryBegin),
    TryEnd(TryEnd),
}

/// An abstract instruction stream plus its header.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bytecode {
    version: PythonVersion,
    pub info: CodeInfo,
    elements: Vec<BytecodeElement>,
    next_label: u32,
    next_try: u32,
}

impl Bytecode {
    /// An empty stream targeting `version`.
    #[must_use]
    pub fn new(version: PythonVersion) -> Self {
        Self {
            version,
            info: CodeInfo::default(),
            elements: Vec::new(),
            next_label: 0,
            next_try: 0,
        }
    }

    #[must_use]
    pub fn version(&self) -> PythonVersion {
        self.version
    }

    /// Allocates a fresh label. The label marks nothing until it is pushed
    /// into the stream.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Allocates a fresh exception region aimed at `target`.
    pub fn new_try_begin(&mut self, target: JumpTarget, push_lasti: bool) -> TryBegin {
        let id = TryId(self.next_try);
        self.next_try += 1;
        TryBegin {
            id,
            target,
            push_lasti,
            stack_depth: None,
        }
    }

    pub fn push(&mut self, element: BytecodeElement) {
        self.elements.push(element);
    }

    pub fn push_instr(&mut self, instr: Instr) {
        self.elements.push(BytecodeElement::Instr(instr));
    }

    pub fn push_label(&mut self, label: Label) {
        self.elements.push(BytecodeElement::Label(label));
    }

    #[must_use]
    pub fn elements(&self) -> &[BytecodeElement] {
        &self.elements
    }

    /// Mutable access for splicing. Labels and try ids are identities, so
    /// reordering is always safe; dangling jump targets surface at
    /// assembly, never before.
    pub fn elements_mut(&mut self) -> &mut Vec<BytecodeElement> {
        &mut self.elements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterates the real instructions, skipping pseudo-elements.
    pub fn instrs(&self) -> impl Iterator<Item = &Instr> {
        self.elements.iter().filter_map(|element| match element {
            BytecodeElement::Instr(instr) => Some(instr),
            _ => None,
        })
    }

    /// Recomputes the instruction-determined compiler flags in place.
    pub fn update_flags(&mut self, is_async: Option<bool>) {
        let opcodes: Vec<_> = self.instrs().map(Instr::opcode).collect();
        self.info.flags = flags::infer(opcodes, self.info.flags, self.info.has_free(), is_async);
    }

    /// Computes the maximum operand-stack depth by building a transient CFG
    /// and running the worklist solver over it.
    pub fn compute_stacksize(&self, check_underflow: bool) -> Result<u32, AssembleError> {
        let cfg = ControlFlowGraph::from_bytecode(self)?;
        let solved = cfg.compute_stacksize(check_underflow)?;
        Ok(solved.maxdepth)
    }

    /// Assembles into the concrete layer. Pools are rebuilt in
    /// first-occurrence order and jumps are resolved to offsets.
    pub fn to_concrete(&self) -> Result<ConcreteBytecode, AssembleError> {
        asm::assemble(self)
    }

    /// Assembles all the way to a packed code unit.
    ///
    /// `stacksize`, when given, bypasses the depth solver; every `TryBegin`
    /// must then already carry a depth. Without it the solver runs once,
    /// producing both the frame's stack requirement and the per-region
    /// depths the exception table needs.
    pub fn to_code_unit(&self, stacksize: Option<u32>) -> Result<CodeUnit, AssembleError> {
        if let Some(stacksize) = stacksize {
            return asm::assemble(self)?.to_code_unit(stacksize);
        }
        let cfg = ControlFlowGraph::from_bytecode(self)?;
        let solved = cfg.compute_stacksize(true)?;
        let mut stream = self.clone();
        for element in stream.elements_mut() {
            if let BytecodeElement::TryBegin(begin) = element
                && let Some(depth) = solved.try_depths.get(&begin.id)
            {
                begin.stack_depth = Some(*depth);
            }
        }
        asm::assemble(&stream)?.to_code_unit(solved.maxdepth)
    }

    /// Disassembles a packed unit into abstract form.
    pub fn from_code_unit(unit: &CodeUnit) -> Result<Self, DisassembleError> {
        disasm::disassemble(&ConcreteBytecode::from_code_unit(unit)?)
    }

    /// Lifts an already-decoded concrete stream into abstract form.
    pub fn from_concrete(concrete: &ConcreteBytecode) -> Result<Self, DisassembleError> {
        disasm::disassemble(concrete)
    }

    pub(crate) fn set_counters(&mut self, next_label: u32, next_try: u32) {
        self.next_label = next_label;
        self.next_try = next_try;
    }

    pub(crate) fn counters(&self) -> (u32, u32) {
        (self.next_label, self.next_try)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constant::Const, instr::InstrArg, op::Opcode};

    #[test]
    fn labels_are_unique_per_stream() {
        let mut code = Bytecode::new(PythonVersion::Py310);
        let a = code.new_label();
        let b = code.new_label();
        assert_ne!(a, b);
    }

    #[test]
    fn instrs_skips_pseudo_elements() {
        let version = PythonVersion::Py310;
        let mut code = Bytecode::new(version);
        let label = code.new_label();
        code.push(BytecodeElement::SetLineno(3));
        code.push_label(label);
        code.push_instr(Instr::new(version, Opcode::LoadConst, InstrArg::Const(Const::None)).unwrap());
        code.push_instr(Instr::new(version, Opcode::ReturnValue, InstrArg::None).unwrap());
        assert_eq!(code.len(), 4);
        assert_eq!(code.instrs().count(), 2);
    }

    #[test]
    fn update_flags_runs_on_the_stream() {
        let version = PythonVersion::Py310;
        let mut code = Bytecode::new(version);
        code.push_instr(Instr::new(version, Opcode::LoadFast, InstrArg::Local("x".into())).unwrap());
        code.push_instr(Instr::new(version, Opcode::ReturnValue, InstrArg::None).unwrap());
        code.update_flags(None);
        assert!(code.info.flags.contains(crate::flags::CodeFlags::OPTIMIZED));
        assert!(code.info.flags.contains(crate::flags::CodeFlags::NOFREE));
    }
}
