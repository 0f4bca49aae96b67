//! Opcode numbers, argument categories, and inline-cache widths for
//! Python 3.12.

use crate::op::{OpKind as K, Opcode as O};

pub(super) static ENTRIES: &[(O, u8, K, u8)] = &[
    (O::Cache, 0, K::Pseudo, 0),
    (O::PopTop, 1, K::NoArg, 0),
    (O::PushNull, 2, K::NoArg, 0),
    (O::InterpreterExit, 3, K::NoArg, 0),
    (O::EndFor, 4, K::NoArg, 0),
    (O::EndSend, 5, K::NoArg, 0),
    (O::Nop, 9, K::NoArg, 0),
    (O::UnaryNegative, 11, K::NoArg, 0),
    (O::UnaryNot, 12, K::NoArg, 0),
    (O::UnaryInvert, 15, K::NoArg, 0),
    (O::BinarySubscr, 25, K::NoArg, 1),
    (O::BinarySlice, 26, K::NoArg, 0),
    (O::StoreSlice, 27, K::NoArg, 0),
    (O::GetLen, 30, K::NoArg, 0),
    (O::MatchMapping, 31, K::NoArg, 0),
    (O::MatchSequence, 32, K::NoArg, 0),
    (O::MatchKeys, 33, K::NoArg, 0),
    (O::PushExcInfo, 35, K::NoArg, 0),
    (O::CheckExcMatch, 36, K::NoArg, 0),
    (O::CheckEgMatch, 37, K::NoArg, 0),
    (O::WithExceptStart, 49, K::NoArg, 0),
    (O::GetAiter, 50, K::NoArg, 0),
    (O::GetAnext, 51, K::NoArg, 0),
    (O::BeforeAsyncWith, 52, K::NoArg, 0),
    (O::BeforeWith, 53, K::NoArg, 0),
    (O::EndAsyncFor, 54, K::NoArg, 0),
    (O::CleanupThrow, 55, K::NoArg, 0),
    (O::StoreSubscr, 60, K::NoArg, 1),
    (O::DeleteSubscr, 61, K::NoArg, 0),
    (O::GetIter, 68, K::NoArg, 0),
    (O::GetYieldFromIter, 69, K::NoArg, 0),
    (O::LoadBuildClass, 71, K::NoArg, 0),
    (O::LoadAssertionError, 74, K::NoArg, 0),
    (O::ReturnGenerator, 75, K::NoArg, 0),
    (O::ReturnValue, 83, K::NoArg, 0),
    (O::SetupAnnotations, 85, K::NoArg, 0),
    (O::LoadLocals, 87, K::NoArg, 0),
    (O::PopExcept, 89, K::NoArg, 0),
    (O::StoreName, 90, K::Name, 0),
    (O::DeleteName, 91, K::Name, 0),
    (O::UnpackSequence, 92, K::Raw, 1),
    (O::ForIter, 93, K::JumpFwd, 1),
    (O::UnpackEx, 94, K::Raw, 0),
    (O::StoreAttr, 95, K::Name, 4),
    (O::DeleteAttr, 96, K::Name, 0),
    (O::StoreGlobal, 97, K::Name, 0),
    (O::DeleteGlobal, 98, K::Name, 0),
    (O::Swap, 99, K::Raw, 0),
    (O::LoadConst, 100, K::Const, 0),
    (O::LoadName, 101, K::Name, 0),
    (O::BuildTuple, 102, K::Raw, 0),
    (O::BuildList, 103, K::Raw, 0),
    (O::BuildSet, 104, K::Raw, 0),
    (O::BuildMap, 105, K::Raw, 0),
    (O::LoadAttr, 106, K::LoadAttr, 9),
    (O::CompareOp, 107, K::Compare, 1),
    (O::ImportName, 108, K::Name, 0),
    (O::ImportFrom, 109, K::Name, 0),
    (O::JumpForward, 110, K::JumpFwd, 0),
    (O::PopJumpIfFalse, 114, K::JumpFwd, 0),
    (O::PopJumpIfTrue, 115, K::JumpFwd, 0),
    (O::LoadGlobal, 116, K::LoadGlobal, 4),
    (O::IsOp, 117, K::Raw, 0),
    (O::ContainsOp, 118, K::Raw, 0),
    (O::Reraise, 119, K::Raw, 0),
    (O::Copy, 120, K::Raw, 0),
    (O::ReturnConst, 121, K::Const, 0),
    (O::BinaryOp, 122, K::Binary, 1),
    (O::Send, 123, K::JumpFwd, 1),
    (O::LoadFast, 124, K::Local, 0),
    (O::StoreFast, 125, K::Local, 0),
    (O::DeleteFast, 126, K::Local, 0),
    (O::LoadFastCheck, 127, K::Local, 0),
    (O::PopJumpIfNotNone, 128, K::JumpFwd, 0),
    (O::PopJumpIfNone, 129, K::JumpFwd, 0),
    (O::RaiseVarargs, 130, K::Raw, 0),
    (O::GetAwaitable, 131, K::Raw, 0),
    (O::MakeFunction, 132, K::Raw, 0),
    (O::BuildSlice, 133, K::Raw, 0),
    (O::JumpBackwardNoInterrupt, 134, K::JumpBack, 0),
    (O::MakeCell, 135, K::Deref, 0),
    (O::LoadClosure, 136, K::Deref, 0),
    (O::LoadDeref, 137, K::Deref, 0),
    (O::StoreDeref, 138, K::Deref, 0),
    (O::DeleteDeref, 139, K::Deref, 0),
    (O::JumpBackward, 140, K::JumpBack, 0),
    (O::LoadSuperAttr, 141, K::LoadSuperAttr, 1),
    (O::CallFunctionEx, 142, K::Raw, 0),
    (O::LoadFastAndClear, 143, K::Local, 0),
    (O::ExtendedArg, 144, K::Pseudo, 0),
    (O::ListAppend, 145, K::Raw, 0),
    (O::SetAdd, 146, K::Raw, 0),
    (O::MapAdd, 147, K::Raw, 0),
    (O::CopyFreeVars, 149, K::Raw, 0),
    (O::YieldValue, 150, K::Raw, 0),
    (O::Resume, 151, K::Raw, 0),
    (O::MatchClass, 152, K::Raw, 0),
    (O::FormatValue, 155, K::Raw, 0),
    (O::BuildConstKeyMap, 156, K::Raw, 0),
    (O::BuildString, 157, K::Raw, 0),
    (O::ListExtend, 162, K::Raw, 0),
    (O::SetUpdate, 163, K::Raw, 0),
    (O::DictMerge, 164, K::Raw, 0),
    (O::DictUpdate, 165, K::Raw, 0),
    (O::Call, 171, K::Raw, 3),
    (O::KwNames, 172, K::Raw, 0),
    (O::CallIntrinsic1, 173, K::Intrinsic1, 0),
    (O::CallIntrinsic2, 174, K::Intrinsic2, 0),
    (O::LoadFromDictOrGlobals, 175, K::Name, 0),
    (O::LoadFromDictOrDeref, 176, K::Deref, 0),
];
