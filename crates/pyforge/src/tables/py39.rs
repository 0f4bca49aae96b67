//! Opcode numbers and argument categories for Python 3.9.

use crate::op::{OpKind as K, Opcode as O};

pub(super) static ENTRIES: &[(O, u8, K, u8)] = &[
    (O::PopTop, 1, K::NoArg, 0),
    (O::RotTwo, 2, K::NoArg, 0),
    (O::RotThree, 3, K::NoArg, 0),
    (O::DupTop, 4, K::NoArg, 0),
    (O::DupTopTwo, 5, K::NoArg, 0),
    (O::RotFour, 6, K::NoArg, 0),
    (O::Nop, 9, K::NoArg, 0),
    (O::UnaryPositive, 10, K::NoArg, 0),
    (O::UnaryNegative, 11, K::NoArg, 0),
    (O::UnaryNot, 12, K::NoArg, 0),
    (O::UnaryInvert, 15, K::NoArg, 0),
    (O::BinaryMatrixMultiply, 16, K::NoArg, 0),
    (O::InplaceMatrixMultiply, 17, K::NoArg, 0),
    (O::BinaryPower, 19, K::NoArg, 0),
    (O::BinaryMultiply, 20, K::NoArg, 0),
    (O::BinaryModulo, 22, K::NoArg, 0),
    (O::BinaryAdd, 23, K::NoArg, 0),
    (O::BinarySubtract, 24, K::NoArg, 0),
    (O::BinarySubscr, 25, K::NoArg, 0),
    (O::BinaryFloorDivide, 26, K::NoArg, 0),
    (O::BinaryTrueDivide, 27, K::NoArg, 0),
    (O::InplaceFloorDivide, 28, K::NoArg, 0),
    (O::InplaceTrueDivide, 29, K::NoArg, 0),
    (O::Reraise, 48, K::NoArg, 0),
    (O::WithExceptStart, 49, K::NoArg, 0),
    (O::GetAiter, 50, K::NoArg, 0),
    (O::GetAnext, 51, K::NoArg, 0),
    (O::BeforeAsyncWith, 52, K::NoArg, 0),
    (O::EndAsyncFor, 54, K::NoArg, 0),
    (O::InplaceAdd, 55, K::NoArg, 0),
    (O::InplaceSubtract, 56, K::NoArg, 0),
    (O::InplaceMultiply, 57, K::NoArg, 0),
    (O::InplaceModulo, 59, K::NoArg, 0),
    (O::StoreSubscr, 60, K::NoArg, 0),
    (O::DeleteSubscr, 61, K::NoArg, 0),
    (O::BinaryLshift, 62, K::NoArg, 0),
    (O::BinaryRshift, 63, K::NoArg, 0),
    (O::BinaryAnd, 64, K::NoArg, 0),
    (O::BinaryXor, 65, K::NoArg, 0),
    (O::BinaryOr, 66, K::NoArg, 0),
    (O::InplacePower, 67, K::NoArg, 0),
    (O::GetIter, 68, K::NoArg, 0),
    (O::GetYieldFromIter, 69, K::NoArg, 0),
    (O::PrintExpr, 70, K::NoArg, 0),
    (O::LoadBuildClass, 71, K::NoArg, 0),
    (O::YieldFrom, 72, K::NoArg, 0),
    (O::GetAwaitable, 73, K::NoArg, 0),
    (O::LoadAssertionError, 74, K::NoArg, 0),
    (O::InplaceLshift, 75, K::NoArg, 0),
    (O::InplaceRshift, 76, K::NoArg, 0),
    (O::InplaceAnd, 77, K::NoArg, 0),
    (O::InplaceXor, 78, K::NoArg, 0),
    (O::InplaceOr, 79, K::NoArg, 0),
    (O::ListToTuple, 82, K::NoArg, 0),
    (O::ReturnValue, 83, K::NoArg, 0),
    (O::ImportStar, 84, K::NoArg, 0),
    (O::SetupAnnotations, 85, K::NoArg, 0),
    (O::YieldValue, 86, K::NoArg, 0),
    (O::PopBlock, 87, K::NoArg, 0),
    (O::PopExcept, 89, K::NoArg, 0),
    (O::StoreName, 90, K::Name, 0),
    (O::DeleteName, 91, K::Name, 0),
    (O::UnpackSequence, 92, K::Raw, 0),
    (O::ForIter, 93, K::JumpFwd, 0),
    (O::UnpackEx, 94, K::Raw, 0),
    (O::StoreAttr, 95, K::Name, 0),
    (O::DeleteAttr, 96, K::Name, 0),
    (O::StoreGlobal, 97, K::Name, 0),
    (O::DeleteGlobal, 98, K::Name, 0),
    (O::LoadConst, 100, K::Const, 0),
    (O::LoadName, 101, K::Name, 0),
    (O::BuildTuple, 102, K::Raw, 0),
    (O::BuildList, 103, K::Raw, 0),
    (O::BuildSet, 104, K::Raw, 0),
    (O::BuildMap, 105, K::Raw, 0),
    (O::LoadAttr, 106, K::Name, 0),
    (O::CompareOp, 107, K::Compare, 0),
    (O::ImportName, 108, K::Name, 0),
    (O::ImportFrom, 109, K::Name, 0),
    (O::JumpForward, 110, K::JumpFwd, 0),
    (O::JumpIfFalseOrPop, 111, K::JumpAbs, 0),
    (O::JumpIfTrueOrPop, 112, K::JumpAbs, 0),
    (O::JumpAbsolute, 113, K::JumpAbs, 0),
    (O::PopJumpIfFalse, 114, K::JumpAbs, 0),
    (O::PopJumpIfTrue, 115, K::JumpAbs, 0),
    (O::LoadGlobal, 116, K::Name, 0),
    (O::IsOp, 117, K::Raw, 0),
    (O::ContainsOp, 118, K::Raw, 0),
    (O::JumpIfNotExcMatch, 121, K::JumpAbs, 0),
    (O::SetupFinally, 122, K::JumpFwd, 0),
    (O::LoadFast, 124, K::Local, 0),
    (O::StoreFast, 125, K::Local, 0),
    (O::DeleteFast, 126, K::Local, 0),
    (O::RaiseVarargs, 130, K::Raw, 0),
    (O::CallFunction, 131, K::Raw, 0),
    (O::MakeFunction, 132, K::Raw, 0),
    (O::BuildSlice, 133, K::Raw, 0),
    (O::LoadClosure, 135, K::Deref, 0),
    (O::LoadDeref, 136, K::Deref, 0),
    (O::StoreDeref, 137, K::Deref, 0),
    (O::DeleteDeref, 138, K::Deref, 0),
    (O::CallFunctionKw, 141, K::Raw, 0),
    (O::CallFunctionEx, 142, K::Raw, 0),
    (O::SetupWith, 143, K::JumpFwd, 0),
    (O::ExtendedArg, 144, K::Pseudo, 0),
    (O::ListAppend, 145, K::Raw, 0),
    (O::SetAdd, 146, K::Raw, 0),
    (O::MapAdd, 147, K::Raw, 0),
    (O::LoadClassderef, 148, K::Deref, 0),
    (O::SetupAsyncWith, 154, K::JumpFwd, 0),
    (O::FormatValue, 155, K::Raw, 0),
    (O::BuildConstKeyMap, 156, K::Raw, 0),
    (O::BuildString, 157, K::Raw, 0),
    (O::LoadMethod, 160, K::Name, 0),
    (O::CallMethod, 161, K::Raw, 0),
    (O::ListExtend, 162, K::Raw, 0),
    (O::SetUpdate, 163, K::Raw, 0),
    (O::DictMerge, 164, K::Raw, 0),
    (O::DictUpdate, 165, K::Raw, 0),
];
