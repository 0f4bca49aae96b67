//! Opcode numbers, argument categories, and inline-cache widths for
//! Python 3.11.
//!
//! The renumbering release: all jumps became relative, calls moved to the
//! `PRECALL`/`CALL` pair, and specializable instructions grew inline-cache
//! code units.

use crate::op::{OpKind as K, Opcode as O};

pub(super) static ENTRIES: &[(O, u8, K, u8)] = &[
    (O::Cache, 0, K::Pseudo, 0),
    (O::PopTop, 1, K::NoArg, 0),
    (O::PushNull, 2, K::NoArg, 0),
    (O::Nop, 9, K::NoArg, 0),
    (O::UnaryPositive, 10, K::NoArg, 0),
    (O::UnaryNegative, 11, K::NoArg, 0),
    (O::UnaryNot, 12, K::NoArg, 0),
    (O::UnaryInvert, 15, K::NoArg, 0),
    (O::BinarySubscr, 25, K::NoArg, 4),
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
    (O::StoreSubscr, 60, K::NoArg, 1),
    (O::DeleteSubscr, 61, K::NoArg, 0),
    (O::GetIter, 68, K::NoArg, 0),
    (O::GetYieldFromIter, 69, K::NoArg, 0),
    (O::PrintExpr, 70, K::NoArg, 0),
    (O::LoadBuildClass, 71, K::NoArg, 0),
    (O::LoadAssertionError, 74, K::NoArg, 0),
    (O::ReturnGenerator, 75, K::NoArg, 0),
    (O::ListToTuple, 82, K::NoArg, 0),
    (O::ReturnValue, 83, K::NoArg, 0),
    (O::ImportStar, 84, K::NoArg, 0),
    (O::SetupAnnotations, 85, K::NoArg, 0),
    (O::YieldValue, 86, K::NoArg, 0),
    (O::AsyncGenWrap, 87, K::NoArg, 0),
    (O::PrepReraiseStar, 88, K::NoArg, 0),
    (O::PopExcept, 89, K::NoArg, 0),
    (O::StoreName, 90, K::Name, 0),
    (O::DeleteName, 91, K::Name, 0),
    (O::UnpackSequence, 92, K::Raw, 1),
    (O::ForIter, 93, K::JumpFwd, 0),
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
    (O::LoadAttr, 106, K::Name, 4),
    (O::CompareOp, 107, K::Compare, 2),
    (O::ImportName, 108, K::Name, 0),
    (O::ImportFrom, 109, K::Name, 0),
    (O::JumpForward, 110, K::JumpFwd, 0),
    (O::JumpIfFalseOrPop, 111, K::JumpFwd, 0),
    (O::JumpIfTrueOrPop, 112, K::JumpFwd, 0),
    (O::PopJumpForwardIfFalse, 114, K::JumpFwd, 0),
    (O::PopJumpForwardIfTrue, 115, K::JumpFwd, 0),
    (O::LoadGlobal, 116, K::LoadGlobal, 5),
    (O::IsOp, 117, K::Raw, 0),
    (O::ContainsOp, 118, K::Raw, 0),
    (O::Reraise, 119, K::Raw, 0),
    (O::Copy, 120, K::Raw, 0),
    (O::BinaryOp, 122, K::Binary, 1),
    (O::Send, 123, K::JumpFwd, 0),
    (O::LoadFast, 124, K::Local, 0),
    (O::StoreFast, 125, K::Local, 0),
    (O::DeleteFast, 126, K::Local, 0),
    (O::PopJumpForwardIfNotNone, 128, K::JumpFwd, 0),
    (O::PopJumpForwardIfNone, 129, K::JumpFwd, 0),
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
    (O::CallFunctionEx, 142, K::Raw, 0),
    (O::ExtendedArg, 144, K::Pseudo, 0),
    (O::ListAppend, 145, K::Raw, 0),
    (O::SetAdd, 146, K::Raw, 0),
    (O::MapAdd, 147, K::Raw, 0),
    (O::LoadClassderef, 148, K::Deref, 0),
    (O::CopyFreeVars, 149, K::Raw, 0),
    (O::Resume, 151, K::Raw, 0),
    (O::MatchClass, 152, K::Raw, 0),
    (O::FormatValue, 155, K::Raw, 0),
    (O::BuildConstKeyMap, 156, K::Raw, 0),
    (O::BuildString, 157, K::Raw, 0),
    (O::LoadMethod, 160, K::Name, 10),
    (O::ListExtend, 162, K::Raw, 0),
    (O::SetUpdate, 163, K::Raw, 0),
    (O::DictMerge, 164, K::Raw, 0),
    (O::DictUpdate, 165, K::Raw, 0),
    (O::Precall, 166, K::Raw, 1),
    (O::Call, 171, K::Raw, 4),
    (O::KwNames, 172, K::Raw, 0),
    (O::PopJumpBackwardIfNotNone, 173, K::JumpBack, 0),
    (O::PopJumpBackwardIfNone, 174, K::JumpBack, 0),
    (O::PopJumpBackwardIfFalse, 175, K::JumpBack, 0),
    (O::PopJumpBackwardIfTrue, 176, K::JumpBack, 0),
];
