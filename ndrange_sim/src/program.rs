// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Program model consumed by the interpreter.
//!
//! A [`Program`] is a read-only graph of functions, basic blocks, and instructions in SSA form. It
//! does not depend on any compiler IR library: a front end lowers its own representation into
//! these types (or uses the [`builder`](crate::builder)), and the interpreter only ever dispatches
//! on [`Op`].
//!
//! SSA results are identified by dense per-function [`ValueId`]s, so a work-item's live values are
//! a plain indexed arena rather than a map keyed by instruction identity.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::types::{AddressSpace, Type};
use crate::value::TypedValue;

/// Dense SSA value id, unique within a function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

/// Basic block index within a function. Block 0 is the entry block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Function index within a program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// Program-scope variable index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub u32);

/// An instruction operand.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Result of an earlier instruction.
    Value(ValueId),
    /// Parameter of the current function.
    Arg(u32),
    /// Compile-time constant.
    Const(TypedValue),
    /// Address of a program-scope variable.
    Global(GlobalId),
}

impl Operand {
    /// `i1` constant.
    #[must_use]
    pub fn bool(b: bool) -> Self {
        Self::Const(TypedValue::from_bool(b))
    }

    /// `i32` constant.
    #[must_use]
    pub fn i32(v: i32) -> Self {
        Self::Const(TypedValue::from_i32(v))
    }

    /// `u32` constant.
    #[must_use]
    pub fn u32(v: u32) -> Self {
        Self::Const(TypedValue::from_u32(v))
    }

    /// `i64`/`u64` constant.
    #[must_use]
    pub fn u64(v: u64) -> Self {
        Self::Const(TypedValue::from_u64(v))
    }

    /// `float` constant.
    #[must_use]
    pub fn f32(v: f32) -> Self {
        Self::Const(TypedValue::from_f32(v))
    }

    /// `double` constant.
    #[must_use]
    pub fn f64(v: f64) -> Self {
        Self::Const(TypedValue::from_f64(v))
    }
}

/// Two-operand arithmetic and bitwise operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// Wrapping integer add.
    Add,
    /// Wrapping integer subtract.
    Sub,
    /// Wrapping integer multiply.
    Mul,
    /// Unsigned divide.
    UDiv,
    /// Signed divide.
    SDiv,
    /// Unsigned remainder.
    URem,
    /// Signed remainder.
    SRem,
    /// Shift left.
    Shl,
    /// Logical shift right.
    LShr,
    /// Arithmetic shift right.
    AShr,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise xor.
    Xor,
    /// Float add.
    FAdd,
    /// Float subtract.
    FSub,
    /// Float multiply.
    FMul,
    /// Float divide.
    FDiv,
    /// Float remainder (truncated, like C `fmod`).
    FRem,
}

/// Conversion operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    /// Integer truncate.
    Trunc,
    /// Integer zero-extend.
    ZExt,
    /// Integer sign-extend.
    SExt,
    /// Float narrow.
    FpTrunc,
    /// Float widen.
    FpExt,
    /// Float to unsigned integer.
    FpToUi,
    /// Float to signed integer.
    FpToSi,
    /// Unsigned integer to float.
    UiToFp,
    /// Signed integer to float.
    SiToFp,
    /// Pointer to integer.
    PtrToInt,
    /// Integer to pointer.
    IntToPtr,
    /// Reinterpret bits.
    BitCast,
    /// Change pointer address space.
    AddrSpaceCast,
}

/// Integer comparison predicates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs, reason = "predicate names are self-describing")]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

/// Float comparison predicates. `O*` are false when either operand is NaN, `U*` are true.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs, reason = "predicate names are self-describing")]
pub enum FloatPredicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

/// Call target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callee {
    /// A function defined in the program.
    Function(FuncId),
    /// An external (builtin) function, by mangled symbol name.
    External(Box<str>),
}

/// A call argument with its static type.
#[derive(Clone, Debug, PartialEq)]
pub struct CallArg {
    /// Argument value.
    pub value: Operand,
    /// Static type (builtins use it for address spaces and lane layout).
    pub ty: Type,
}

/// Instruction operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Lane-wise binary operation; scalar operands broadcast.
    Binary {
        /// Operation.
        op: BinOp,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// Float negation.
    FNeg {
        /// Operand.
        value: Operand,
    },
    /// Integer (or pointer) comparison.
    ICmp {
        /// Predicate.
        pred: IntPredicate,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
        /// Operand type.
        operand_ty: Type,
    },
    /// Float comparison.
    FCmp {
        /// Predicate.
        pred: FloatPredicate,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// Conversion from `from` to the instruction's type.
    Cast {
        /// Operation.
        op: CastOp,
        /// Source value.
        value: Operand,
        /// Source type.
        from: Type,
    },
    /// `cond ? if_true : if_false`, lane-wise when `cond` is a vector.
    Select {
        /// Condition.
        cond: Operand,
        /// Value when true.
        if_true: Operand,
        /// Value when false.
        if_false: Operand,
    },
    /// Allocates private memory for one `allocated` and yields its address.
    Alloca {
        /// Allocated type.
        allocated: Type,
    },
    /// Loads a value of the instruction's type.
    Load {
        /// Address.
        ptr: Operand,
        /// Declared alignment (0 means the type's natural alignment).
        align: u32,
    },
    /// Stores a value.
    Store {
        /// Value to store.
        value: Operand,
        /// Address.
        ptr: Operand,
        /// Type of the stored value.
        value_ty: Type,
        /// Declared alignment (0 means the type's natural alignment).
        align: u32,
    },
    /// Address arithmetic: `base + indices` scaled through `source`.
    Gep {
        /// Base pointer.
        base: Operand,
        /// Type the first index strides over.
        source: Type,
        /// Indices (the first strides over whole `source` values).
        indices: Vec<Operand>,
    },
    /// Reads one lane of a vector.
    ExtractElement {
        /// Vector.
        vector: Operand,
        /// Lane index.
        index: Operand,
    },
    /// Replaces one lane of a vector.
    InsertElement {
        /// Vector.
        vector: Operand,
        /// New lane value.
        element: Operand,
        /// Lane index.
        index: Operand,
    },
    /// Builds a vector from lanes of two vectors. `None` mask entries produce zero.
    ShuffleVector {
        /// First source.
        lhs: Operand,
        /// Second source (indices past `lhs`'s length select from here).
        rhs: Operand,
        /// Lane selectors.
        mask: Vec<Option<u32>>,
    },
    /// Reads a member of an aggregate.
    ExtractValue {
        /// Aggregate.
        aggregate: Operand,
        /// Aggregate type.
        aggregate_ty: Type,
        /// Member path.
        indices: Vec<u32>,
    },
    /// Replaces a member of an aggregate.
    InsertValue {
        /// Aggregate.
        aggregate: Operand,
        /// New member value.
        element: Operand,
        /// Aggregate type.
        aggregate_ty: Type,
        /// Member path.
        indices: Vec<u32>,
    },
    /// Selects a value by predecessor block.
    Phi {
        /// `(predecessor, value)` pairs.
        incoming: Vec<(BlockId, Operand)>,
    },
    /// Function call.
    Call {
        /// Target.
        callee: Callee,
        /// Arguments.
        args: Vec<CallArg>,
    },
    /// Unconditional branch.
    Br {
        /// Target.
        target: BlockId,
    },
    /// Conditional branch.
    CondBr {
        /// `i1` condition.
        cond: Operand,
        /// Target when true.
        if_true: BlockId,
        /// Target when false.
        if_false: BlockId,
    },
    /// Multi-way branch.
    Switch {
        /// Integer selector.
        value: Operand,
        /// Target when no case matches.
        default: BlockId,
        /// `(case value, target)` pairs.
        cases: Vec<(u64, BlockId)>,
    },
    /// Return from the current function.
    Ret {
        /// Returned value, if any.
        value: Option<Operand>,
    },
    /// Marks unreachable code; executing it is fatal.
    Unreachable,
    /// An instruction the front end could not express; executing it reports a diagnostic and
    /// yields a zero-filled result.
    Unsupported {
        /// Original instruction name.
        name: Box<str>,
    },
}

/// Stable instruction kind tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
#[allow(missing_docs, reason = "variants mirror `Op`")]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    FNeg,
    ICmp,
    FCmp,
    Trunc,
    ZExt,
    SExt,
    FpTrunc,
    FpExt,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    PtrToInt,
    IntToPtr,
    BitCast,
    AddrSpaceCast,
    Select,
    Alloca,
    Load,
    Store,
    Gep,
    ExtractElement,
    InsertElement,
    ShuffleVector,
    ExtractValue,
    InsertValue,
    Phi,
    Call,
    Br,
    Switch,
    Ret,
    Unreachable,
    Unsupported,
}

impl Opcode {
    /// Number of opcodes.
    pub const COUNT: usize = Self::Unsupported as usize + 1;

    /// Dense index in `0..COUNT`.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lowercase mnemonic.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::UDiv => "udiv",
            Self::SDiv => "sdiv",
            Self::URem => "urem",
            Self::SRem => "srem",
            Self::Shl => "shl",
            Self::LShr => "lshr",
            Self::AShr => "ashr",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::FAdd => "fadd",
            Self::FSub => "fsub",
            Self::FMul => "fmul",
            Self::FDiv => "fdiv",
            Self::FRem => "frem",
            Self::FNeg => "fneg",
            Self::ICmp => "icmp",
            Self::FCmp => "fcmp",
            Self::Trunc => "trunc",
            Self::ZExt => "zext",
            Self::SExt => "sext",
            Self::FpTrunc => "fptrunc",
            Self::FpExt => "fpext",
            Self::FpToUi => "fptoui",
            Self::FpToSi => "fptosi",
            Self::UiToFp => "uitofp",
            Self::SiToFp => "sitofp",
            Self::PtrToInt => "ptrtoint",
            Self::IntToPtr => "inttoptr",
            Self::BitCast => "bitcast",
            Self::AddrSpaceCast => "addrspacecast",
            Self::Select => "select",
            Self::Alloca => "alloca",
            Self::Load => "load",
            Self::Store => "store",
            Self::Gep => "getelementptr",
            Self::ExtractElement => "extractelement",
            Self::InsertElement => "insertelement",
            Self::ShuffleVector => "shufflevector",
            Self::ExtractValue => "extractvalue",
            Self::InsertValue => "insertvalue",
            Self::Phi => "phi",
            Self::Call => "call",
            Self::Br => "br",
            Self::Switch => "switch",
            Self::Ret => "ret",
            Self::Unreachable => "unreachable",
            Self::Unsupported => "unsupported",
        }
    }

    /// Inverse of [`Opcode::index`].
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// All opcodes in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::UDiv,
        Self::SDiv,
        Self::URem,
        Self::SRem,
        Self::Shl,
        Self::LShr,
        Self::AShr,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::FAdd,
        Self::FSub,
        Self::FMul,
        Self::FDiv,
        Self::FRem,
        Self::FNeg,
        Self::ICmp,
        Self::FCmp,
        Self::Trunc,
        Self::ZExt,
        Self::SExt,
        Self::FpTrunc,
        Self::FpExt,
        Self::FpToUi,
        Self::FpToSi,
        Self::UiToFp,
        Self::SiToFp,
        Self::PtrToInt,
        Self::IntToPtr,
        Self::BitCast,
        Self::AddrSpaceCast,
        Self::Select,
        Self::Alloca,
        Self::Load,
        Self::Store,
        Self::Gep,
        Self::ExtractElement,
        Self::InsertElement,
        Self::ShuffleVector,
        Self::ExtractValue,
        Self::InsertValue,
        Self::Phi,
        Self::Call,
        Self::Br,
        Self::Switch,
        Self::Ret,
        Self::Unreachable,
        Self::Unsupported,
    ];
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Op {
    /// Instruction kind tag.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Binary { op, .. } => match op {
                BinOp::Add => Opcode::Add,
                BinOp::Sub => Opcode::Sub,
                BinOp::Mul => Opcode::Mul,
                BinOp::UDiv => Opcode::UDiv,
                BinOp::SDiv => Opcode::SDiv,
                BinOp::URem => Opcode::URem,
                BinOp::SRem => Opcode::SRem,
                BinOp::Shl => Opcode::Shl,
                BinOp::LShr => Opcode::LShr,
                BinOp::AShr => Opcode::AShr,
                BinOp::And => Opcode::And,
                BinOp::Or => Opcode::Or,
                BinOp::Xor => Opcode::Xor,
                BinOp::FAdd => Opcode::FAdd,
                BinOp::FSub => Opcode::FSub,
                BinOp::FMul => Opcode::FMul,
                BinOp::FDiv => Opcode::FDiv,
                BinOp::FRem => Opcode::FRem,
            },
            Self::FNeg { .. } => Opcode::FNeg,
            Self::ICmp { .. } => Opcode::ICmp,
            Self::FCmp { .. } => Opcode::FCmp,
            Self::Cast { op, .. } => match op {
                CastOp::Trunc => Opcode::Trunc,
                CastOp::ZExt => Opcode::ZExt,
                CastOp::SExt => Opcode::SExt,
                CastOp::FpTrunc => Opcode::FpTrunc,
                CastOp::FpExt => Opcode::FpExt,
                CastOp::FpToUi => Opcode::FpToUi,
                CastOp::FpToSi => Opcode::FpToSi,
                CastOp::UiToFp => Opcode::UiToFp,
                CastOp::SiToFp => Opcode::SiToFp,
                CastOp::PtrToInt => Opcode::PtrToInt,
                CastOp::IntToPtr => Opcode::IntToPtr,
                CastOp::BitCast => Opcode::BitCast,
                CastOp::AddrSpaceCast => Opcode::AddrSpaceCast,
            },
            Self::Select { .. } => Opcode::Select,
            Self::Alloca { .. } => Opcode::Alloca,
            Self::Load { .. } => Opcode::Load,
            Self::Store { .. } => Opcode::Store,
            Self::Gep { .. } => Opcode::Gep,
            Self::ExtractElement { .. } => Opcode::ExtractElement,
            Self::InsertElement { .. } => Opcode::InsertElement,
            Self::ShuffleVector { .. } => Opcode::ShuffleVector,
            Self::ExtractValue { .. } => Opcode::ExtractValue,
            Self::InsertValue { .. } => Opcode::InsertValue,
            Self::Phi { .. } => Opcode::Phi,
            Self::Call { .. } => Opcode::Call,
            Self::Br { .. } | Self::CondBr { .. } => Opcode::Br,
            Self::Switch { .. } => Opcode::Switch,
            Self::Ret { .. } => Opcode::Ret,
            Self::Unreachable => Opcode::Unreachable,
            Self::Unsupported { .. } => Opcode::Unsupported,
        }
    }

    /// Returns `true` for block terminators.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Br { .. }
                | Self::CondBr { .. }
                | Self::Switch { .. }
                | Self::Ret { .. }
                | Self::Unreachable
        )
    }

    /// Successor blocks of a terminator.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Self::Br { target } => alloc::vec![*target],
            Self::CondBr {
                if_true, if_false, ..
            } => alloc::vec![*if_true, *if_false],
            Self::Switch { default, cases, .. } => core::iter::once(*default)
                .chain(cases.iter().map(|(_, b)| *b))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// One instruction.
#[derive(Clone, Debug, PartialEq)]
pub struct Instr {
    /// SSA result, if the instruction produces one.
    pub result: Option<ValueId>,
    /// Static result type (`Void` when there is no result).
    pub ty: Type,
    /// Operation.
    pub op: Op,
}

/// A basic block: straight-line instructions ending in one terminator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    /// Instructions. The last one is the terminator.
    pub instrs: Vec<Instr>,
}

/// A function parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Name (informational).
    pub name: Box<str>,
    /// Static type.
    pub ty: Type,
}

/// A function.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    /// Symbol name.
    pub name: Box<str>,
    /// Parameters.
    pub params: Vec<Param>,
    /// Basic blocks; block 0 is the entry.
    pub blocks: Vec<Block>,
    /// Number of SSA values (all `ValueId`s are below this).
    pub value_count: u32,
    /// Whether this function is a kernel entry point.
    pub is_kernel: bool,
}

impl Function {
    /// Block by id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize)
    }
}

/// A program-scope variable.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalVar {
    /// Name.
    pub name: Box<str>,
    /// Address space the variable lives in.
    pub space: AddressSpace,
    /// Type of the variable.
    pub ty: Type,
    /// Initial bytes (zero-filled when `None` or short).
    pub init: Option<Vec<u8>>,
}

/// A complete program.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    /// Functions.
    pub functions: Vec<Function>,
    /// Program-scope variables.
    pub globals: Vec<GlobalVar>,
}

impl Program {
    /// Function by id.
    #[must_use]
    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }

    /// Looks a function up by name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| &*f.name == name)
            .map(|i| FuncId(u32::try_from(i).unwrap_or(u32::MAX)))
    }

    /// Names of all kernel entry points.
    pub fn kernels(&self) -> impl Iterator<Item = &str> {
        self.functions
            .iter()
            .filter(|f| f.is_kernel)
            .map(|f| &*f.name)
    }
}

/// Program validation errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramError {
    /// A function has no blocks.
    EmptyFunction {
        /// Function name.
        function: Box<str>,
    },
    /// A block does not end in a terminator, or has one in the middle.
    MissingTerminator {
        /// Function name.
        function: Box<str>,
        /// Block.
        block: BlockId,
    },
    /// A branch or phi names a block that does not exist.
    BadBlock {
        /// Function name.
        function: Box<str>,
        /// Block.
        block: BlockId,
    },
    /// A phi appears after a non-phi instruction.
    PhiAfterNonPhi {
        /// Function name.
        function: Box<str>,
        /// Block.
        block: BlockId,
    },
    /// An argument operand index is past the parameter list.
    BadArgIndex {
        /// Function name.
        function: Box<str>,
        /// Index.
        index: u32,
    },
    /// A call or global operand names something that does not exist.
    BadReference {
        /// Function name.
        function: Box<str>,
    },
    /// Two functions share a name.
    DuplicateFunction {
        /// Name.
        name: Box<str>,
    },
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFunction { function } => write!(f, "function {function} has no blocks"),
            Self::MissingTerminator { function, block } => write!(
                f,
                "block {} of {function} is not terminated by exactly one terminator",
                block.0
            ),
            Self::BadBlock { function, block } => {
                write!(f, "{function} references missing block {}", block.0)
            }
            Self::PhiAfterNonPhi { function, block } => {
                write!(f, "block {} of {function} has a phi after a non-phi", block.0)
            }
            Self::BadArgIndex { function, index } => {
                write!(f, "{function} uses argument {index} past its parameter list")
            }
            Self::BadReference { function } => {
                write!(f, "{function} references a missing function or global")
            }
            Self::DuplicateFunction { name } => write!(f, "duplicate function name: {name}"),
        }
    }
}

impl core::error::Error for ProgramError {}
