//! Disassemble/reassemble round trips: code bytes, pools, line tables, and
//! exception tables must survive structurally across every supported
//! version.

use pretty_assertions::assert_eq;
use pyforge::{
    Bytecode, BytecodeElement, Const, ConcreteBytecode, Instr, InstrArg, InstrLocation, JumpTarget, Opcode,
    PythonVersion,
};

fn instr(version: PythonVersion, opcode: Opcode, arg: InstrArg) -> Instr {
    Instr::new(version, opcode, arg).unwrap()
}

fn located(version: PythonVersion, opcode: Opcode, arg: InstrArg, location: InstrLocation) -> Instr {
    Instr::with_location(version, opcode, arg, location).unwrap()
}

/// A branchy stream reassembles to identical code bytes on every
/// pre-exception-table version.
#[test]
fn branchy_stream_round_trips_bit_exact() {
    for version in [PythonVersion::Py38, PythonVersion::Py39, PythonVersion::Py310] {
        let mut code = Bytecode::new(version);
        let l_else = code.new_label();
        let l_end = code.new_label();
        code.push_instr(located(
            version,
            Opcode::LoadName,
            InstrArg::Name("flag".into()),
            InstrLocation::line(1),
        ));
        code.push_instr(instr(
            version,
            Opcode::PopJumpIfFalse,
            InstrArg::Jump(JumpTarget::Label(l_else)),
        ));
        code.push_instr(located(
            version,
            Opcode::LoadConst,
            InstrArg::Const("yes".into()),
            InstrLocation::line(2),
        ));
        code.push_instr(instr(version, Opcode::JumpForward, InstrArg::Jump(JumpTarget::Label(l_end))));
        code.push_label(l_else);
        code.push_instr(located(
            version,
            Opcode::LoadConst,
            InstrArg::Const("no".into()),
            InstrLocation::line(4),
        ));
        code.push_label(l_end);
        code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));

        let unit = code.to_code_unit(None).unwrap();
        let lifted = Bytecode::from_code_unit(&unit).unwrap();
        let unit2 = lifted.to_code_unit(None).unwrap();
        assert_eq!(unit2.code, unit.code, "code bytes changed on {version}");
        assert_eq!(unit2.consts, unit.consts);
        assert_eq!(unit2.names, unit.names);
        assert_eq!(unit2.linetable, unit.linetable, "line table changed on {version}");
    }
}

/// The 3.11 exception table survives a full round trip bit-exactly, and
/// the reconstructed pairs carry the recorded depth and lasti flag.
#[test]
fn exception_table_round_trips_bit_exact() {
    let version = PythonVersion::Py311;
    let mut code = Bytecode::new(version);
    let handler = code.new_label();
    let done = code.new_label();
    let begin = code.new_try_begin(JumpTarget::Label(handler), false);
    code.push(BytecodeElement::TryBegin(begin.clone()));
    code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(1))));
    code.push_instr(instr(version, Opcode::StoreName, InstrArg::Name("a".into())));
    code.push(BytecodeElement::TryEnd(pyforge::TryEnd { begin: begin.id }));
    code.push_instr(instr(version, Opcode::JumpForward, InstrArg::Jump(JumpTarget::Label(done))));
    code.push_label(handler);
    code.push_instr(instr(version, Opcode::PushExcInfo, InstrArg::None));
    code.push_instr(instr(version, Opcode::PopTop, InstrArg::None));
    code.push_instr(instr(version, Opcode::PopExcept, InstrArg::None));
    code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(2))));
    code.push_instr(instr(version, Opcode::StoreName, InstrArg::Name("a".into())));
    code.push_label(done);
    code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::None)));
    code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));

    let unit = code.to_code_unit(None).unwrap();
    assert!(!unit.exceptiontable.is_empty());

    let lifted = Bytecode::from_code_unit(&unit).unwrap();
    // The reconstructed region carries the packed depth and flag.
    let begins: Vec<_> = lifted
        .elements()
        .iter()
        .filter_map(|e| match e {
            BytecodeElement::TryBegin(b) => Some(b),
            _ => None,
        })
        .collect();
    assert_eq!(begins.len(), 1);
    assert_eq!(begins[0].stack_depth, Some(0));
    assert!(!begins[0].push_lasti);

    let unit2 = lifted.to_code_unit(None).unwrap();
    assert_eq!(unit2.code, unit.code);
    assert_eq!(unit2.exceptiontable, unit.exceptiontable);
}

/// One spelling naming both a cell and a free variable: the semantic tag
/// decides the concrete index, and both survive the round trip.
#[test]
fn cell_and_free_with_same_spelling_keep_their_tags() {
    let version = PythonVersion::Py310;
    let mut code = Bytecode::new(version);
    code.info.cellvars = vec!["x".into()];
    code.info.freevars = vec!["x".into()];
    code.push_instr(instr(version, Opcode::LoadDeref, InstrArg::Cell("x".into())));
    code.push_instr(instr(version, Opcode::PopTop, InstrArg::None));
    code.push_instr(instr(version, Opcode::LoadDeref, InstrArg::Free("x".into())));
    code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));

    let unit = code.to_code_unit(None).unwrap();
    let concrete = ConcreteBytecode::from_code_unit(&unit).unwrap();
    // Cells index first, frees follow.
    assert_eq!(concrete.instrs[0].arg, 0);
    assert_eq!(concrete.instrs[2].arg, 1);

    let lifted = Bytecode::from_code_unit(&unit).unwrap();
    let args: Vec<_> = lifted.instrs().map(Instr::arg).cloned().collect();
    assert_eq!(args[0], InstrArg::Cell("x".into()));
    assert_eq!(args[2], InstrArg::Free("x".into()));

    let unit2 = lifted.to_code_unit(None).unwrap();
    assert_eq!(unit2.code, unit.code);
}

/// `EXTENDED_ARG` before `NOP` is preserved by the concrete layer and
/// dropped by the abstract one.
#[test]
fn extended_arg_nop_is_concrete_only() {
    let version = PythonVersion::Py310;
    let mut concrete = ConcreteBytecode::new(version);
    concrete.instrs.push(pyforge::ConcreteInstr::new(Opcode::ExtendedArg, 5));
    concrete.instrs.push(pyforge::ConcreteInstr::new(Opcode::Nop, 0));
    concrete.consts.push(Const::None);
    concrete.instrs.push(pyforge::ConcreteInstr::new(Opcode::LoadConst, 0));
    concrete.instrs.push(pyforge::ConcreteInstr::new(Opcode::ReturnValue, 0));

    let unit = concrete.to_code_unit(1).unwrap();
    // Concrete round trip keeps the prefix.
    let reparsed = ConcreteBytecode::from_code_unit(&unit).unwrap();
    let opcodes: Vec<_> = reparsed.instrs.iter().map(|i| i.opcode).collect();
    assert_eq!(
        opcodes,
        vec![Opcode::ExtendedArg, Opcode::Nop, Opcode::LoadConst, Opcode::ReturnValue]
    );

    // The abstract lift drops it.
    let lifted = Bytecode::from_code_unit(&unit).unwrap();
    let opcodes: Vec<_> = lifted.instrs().map(Instr::opcode).collect();
    assert_eq!(opcodes, vec![Opcode::Nop, Opcode::LoadConst, Opcode::ReturnValue]);

    // And reassembling the abstract form writes the shorter stream.
    let unit2 = lifted.to_code_unit(None).unwrap();
    assert_eq!(unit2.code.len(), unit.code.len() - 2);
}

/// Every jump in a disassembled stream targets a label that appears
/// exactly once.
#[test]
fn disassembly_produces_unique_labels() {
    let version = PythonVersion::Py310;
    let mut code = Bytecode::new(version);
    let top = code.new_label();
    let out = code.new_label();
    code.push_label(top);
    code.push_instr(instr(version, Opcode::LoadName, InstrArg::Name("cond".into())));
    code.push_instr(instr(version, Opcode::PopJumpIfFalse, InstrArg::Jump(JumpTarget::Label(out))));
    code.push_instr(instr(version, Opcode::JumpAbsolute, InstrArg::Jump(JumpTarget::Label(top))));
    code.push_label(out);
    code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::None)));
    code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));

    let unit = code.to_code_unit(None).unwrap();
    let lifted = Bytecode::from_code_unit(&unit).unwrap();

    let mut label_positions = std::collections::HashMap::new();
    for element in lifted.elements() {
        if let BytecodeElement::Label(label) = element {
            *label_positions.entry(*label).or_insert(0) += 1;
        }
    }
    for element in lifted.elements() {
        if let BytecodeElement::Instr(i) = element
            && let Some(JumpTarget::Label(label)) = i.jump_target()
        {
            assert_eq!(label_positions.get(&label), Some(&1));
        }
    }
}

/// A 3.12 stream exercising the packed-flag argument forms round trips
/// with tags intact.
#[test]
fn packed_flag_arguments_round_trip_on_312() {
    let version = PythonVersion::Py312;
    let mut code = Bytecode::new(version);
    code.push_instr(instr(version, Opcode::Resume, InstrArg::Raw(0)));
    code.push_instr(instr(
        version,
        Opcode::LoadGlobal,
        InstrArg::LoadGlobal {
            push_null: true,
            name: "print".into(),
        },
    ));
    code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const("hi".into())));
    code.push_instr(instr(version, Opcode::Call, InstrArg::Raw(1)));
    code.push_instr(instr(version, Opcode::PopTop, InstrArg::None));
    // A receiver for the method-style LOAD_ATTR.
    code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const("s".into())));
    code.push_instr(instr(
        version,
        Opcode::LoadAttr,
        InstrArg::LoadAttr {
            call_as_method: true,
            name: "upper".into(),
        },
    ));
    code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));

    let unit = code.to_code_unit(None).unwrap();
    let lifted = Bytecode::from_code_unit(&unit).unwrap();
    let args: Vec<_> = lifted.instrs().map(Instr::arg).cloned().collect();
    assert!(matches!(&args[1], InstrArg::LoadGlobal { push_null: true, name } if name == "print"));
    assert!(matches!(&args[6], InstrArg::LoadAttr { call_as_method: true, name } if name == "upper"));

    let unit2 = lifted.to_code_unit(None).unwrap();
    assert_eq!(unit2.code, unit.code);
}

/// The CFG round trip (stream → graph → stream) preserves assembled
/// bytes.
#[test]
fn cfg_round_trip_preserves_code_bytes() {
    let version = PythonVersion::Py310;
    let mut code = Bytecode::new(version);
    let l_else = code.new_label();
    code.push_instr(instr(version, Opcode::LoadName, InstrArg::Name("x".into())));
    code.push_instr(instr(
        version,
        Opcode::PopJumpIfFalse,
        InstrArg::Jump(JumpTarget::Label(l_else)),
    ));
    code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(1))));
    code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));
    code.push_label(l_else);
    code.push_instr(instr(version, Opcode::LoadConst, InstrArg::Const(Const::Int(2))));
    code.push_instr(instr(version, Opcode::ReturnValue, InstrArg::None));

    let direct = code.to_code_unit(None).unwrap();
    let graph = pyforge::ControlFlowGraph::from_bytecode(&code).unwrap();
    let flattened = graph.to_bytecode().unwrap();
    let via_graph = flattened.to_code_unit(None).unwrap();
    assert_eq!(via_graph.code, direct.code);
    assert_eq!(via_graph.consts, direct.consts);
}
