// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small assembler for [`Program`]s.
//!
//! The builder assigns dense [`ValueId`]s, tracks the current insertion block, and validates
//! block structure when a function is finished. It is how tests, benchmarks, and simple front ends
//! construct kernels without a compiler.
//!
//! ```
//! use ndrange_sim::builder::{FunctionBuilder, ProgramBuilder};
//! use ndrange_sim::program::{BinOp, Operand};
//! use ndrange_sim::{AddressSpace, Type};
//!
//! let mut f = FunctionBuilder::kernel("inc", [Type::ptr(AddressSpace::Global, Type::I32)]);
//! let gid = f.call_builtin("get_global_id", "j", Type::I64, [(Operand::u32(0), Type::I32)]);
//! let p = f.gep(Type::I32, f.arg(0), [gid]);
//! let v = f.load(Type::I32, p.clone());
//! let v = f.binary(BinOp::Add, Type::I32, v, Operand::i32(1));
//! f.store(Type::I32, v, p);
//! f.ret_void();
//!
//! let mut program = ProgramBuilder::new();
//! program.add_function(f).unwrap();
//! let program = program.finish().unwrap();
//! assert_eq!(program.kernels().count(), 1);
//! ```

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::program::{
    BinOp, Block, BlockId, CallArg, Callee, CastOp, FloatPredicate, FuncId, Function, GlobalId,
    GlobalVar, Instr, IntPredicate, Op, Operand, Param, Program, ProgramError, ValueId,
};
use crate::types::{AddressSpace, Type};

/// Returns the mangled symbol for builtin `name` with overload suffix `overload`
/// (`_Z<len><name><overload>`).
#[must_use]
pub fn mangle(name: &str, overload: &str) -> String {
    format!("_Z{}{name}{overload}", name.len())
}

/// Builds one function.
#[derive(Debug)]
pub struct FunctionBuilder {
    name: Box<str>,
    params: Vec<Param>,
    blocks: Vec<Block>,
    current: BlockId,
    next_value: u32,
    is_kernel: bool,
}

impl FunctionBuilder {
    /// Starts a kernel entry point with the given parameter types.
    #[must_use]
    pub fn kernel(name: &str, params: impl IntoIterator<Item = Type>) -> Self {
        let mut b = Self::function(name, params);
        b.is_kernel = true;
        b
    }

    /// Starts a non-kernel helper function.
    #[must_use]
    pub fn function(name: &str, params: impl IntoIterator<Item = Type>) -> Self {
        let params = params
            .into_iter()
            .enumerate()
            .map(|(i, ty)| Param {
                name: format!("arg{i}").into_boxed_str(),
                ty,
            })
            .collect();
        Self {
            name: name.into(),
            params,
            blocks: alloc::vec![Block::default()],
            current: BlockId(0),
            next_value: 0,
            is_kernel: false,
        }
    }

    /// Operand for parameter `index`.
    #[must_use]
    pub fn arg(&self, index: u32) -> Operand {
        Operand::Arg(index)
    }

    /// Creates a new (empty) block without switching to it.
    pub fn new_block(&mut self) -> BlockId {
        self.blocks.push(Block::default());
        BlockId(u32::try_from(self.blocks.len() - 1).unwrap_or(u32::MAX))
    }

    /// Makes `block` the insertion point.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    /// Current insertion block.
    #[must_use]
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Appends an instruction. Returns its result operand when `ty` is not `Void`.
    pub fn push(&mut self, ty: Type, op: Op) -> Operand {
        let result = if ty == Type::Void {
            None
        } else {
            let id = ValueId(self.next_value);
            self.next_value += 1;
            Some(id)
        };
        if let Some(block) = self.blocks.get_mut(self.current.0 as usize) {
            block.instrs.push(Instr {
                result,
                ty,
                op,
            });
        }
        result.map_or(Operand::Const(crate::TypedValue::default()), Operand::Value)
    }

    /// Binary operation.
    pub fn binary(&mut self, op: BinOp, ty: Type, lhs: Operand, rhs: Operand) -> Operand {
        self.push(ty, Op::Binary { op, lhs, rhs })
    }

    /// Float negation.
    pub fn fneg(&mut self, ty: Type, value: Operand) -> Operand {
        self.push(ty, Op::FNeg { value })
    }

    /// Integer comparison of two `operand_ty` values. Vectors produce a vector of `i1`.
    pub fn icmp(
        &mut self,
        pred: IntPredicate,
        operand_ty: Type,
        lhs: Operand,
        rhs: Operand,
    ) -> Operand {
        let ty = bool_like(&operand_ty);
        self.push(
            ty,
            Op::ICmp {
                pred,
                lhs,
                rhs,
                operand_ty,
            },
        )
    }

    /// Float comparison of two `operand_ty` values.
    pub fn fcmp(
        &mut self,
        pred: FloatPredicate,
        operand_ty: &Type,
        lhs: Operand,
        rhs: Operand,
    ) -> Operand {
        self.push(bool_like(operand_ty), Op::FCmp { pred, lhs, rhs })
    }

    /// Conversion from `from` to `to`.
    pub fn cast(&mut self, op: CastOp, from: Type, to: Type, value: Operand) -> Operand {
        self.push(to, Op::Cast { op, value, from })
    }

    /// `cond ? a : b`.
    pub fn select(&mut self, ty: Type, cond: Operand, a: Operand, b: Operand) -> Operand {
        self.push(
            ty,
            Op::Select {
                cond,
                if_true: a,
                if_false: b,
            },
        )
    }

    /// Private-memory allocation of one `allocated`.
    pub fn alloca(&mut self, allocated: Type) -> Operand {
        let ty = Type::ptr(AddressSpace::Private, allocated.clone());
        self.push(ty, Op::Alloca { allocated })
    }

    /// Load of a `ty` from `ptr` at natural alignment.
    pub fn load(&mut self, ty: Type, ptr: Operand) -> Operand {
        self.push(ty, Op::Load { ptr, align: 0 })
    }

    /// Store of a `ty` to `ptr` at natural alignment.
    pub fn store(&mut self, ty: Type, value: Operand, ptr: Operand) {
        self.push(
            Type::Void,
            Op::Store {
                value,
                ptr,
                value_ty: ty,
                align: 0,
            },
        );
    }

    /// Store with an explicit alignment.
    pub fn store_aligned(&mut self, ty: Type, value: Operand, ptr: Operand, align: u32) {
        self.push(
            Type::Void,
            Op::Store {
                value,
                ptr,
                value_ty: ty,
                align,
            },
        );
    }

    /// Element pointer: `base + indices[0] * size(source) + ...`.
    ///
    /// The result is a pointer into `base`'s address space; its pointee is the type reached by
    /// the indices (falls back to `source`).
    pub fn gep(
        &mut self,
        source: Type,
        base: Operand,
        indices: impl IntoIterator<Item = Operand>,
    ) -> Operand {
        self.gep_in(AddressSpace::Global, source, base, indices)
    }

    /// Like [`FunctionBuilder::gep`] with an explicit result address space.
    pub fn gep_in(
        &mut self,
        space: AddressSpace,
        source: Type,
        base: Operand,
        indices: impl IntoIterator<Item = Operand>,
    ) -> Operand {
        let indices: Vec<Operand> = indices.into_iter().collect();
        let mut pointee = source.clone();
        for index in indices.iter().skip(1) {
            let next = match index {
                Operand::Const(c) => pointee.field(c.get_u(0) as usize).cloned(),
                _ => pointee.element().cloned(),
            };
            pointee = next.unwrap_or(pointee);
        }
        self.push(
            Type::ptr(space, pointee),
            Op::Gep {
                base,
                source,
                indices,
            },
        )
    }

    /// Reads lane `index` of `vector`.
    pub fn extract_element(&mut self, elem: Type, vector: Operand, index: Operand) -> Operand {
        self.push(elem, Op::ExtractElement { vector, index })
    }

    /// Replaces lane `index` of `vector`.
    pub fn insert_element(
        &mut self,
        ty: Type,
        vector: Operand,
        element: Operand,
        index: Operand,
    ) -> Operand {
        self.push(
            ty,
            Op::InsertElement {
                vector,
                element,
                index,
            },
        )
    }

    /// Vector shuffle.
    pub fn shuffle_vector(
        &mut self,
        ty: Type,
        lhs: Operand,
        rhs: Operand,
        mask: Vec<Option<u32>>,
    ) -> Operand {
        self.push(ty, Op::ShuffleVector { lhs, rhs, mask })
    }

    /// Aggregate member read.
    pub fn extract_value(
        &mut self,
        ty: Type,
        aggregate_ty: Type,
        aggregate: Operand,
        indices: Vec<u32>,
    ) -> Operand {
        self.push(
            ty,
            Op::ExtractValue {
                aggregate,
                aggregate_ty,
                indices,
            },
        )
    }

    /// Aggregate member write.
    pub fn insert_value(
        &mut self,
        aggregate_ty: Type,
        aggregate: Operand,
        element: Operand,
        indices: Vec<u32>,
    ) -> Operand {
        self.push(
            aggregate_ty.clone(),
            Op::InsertValue {
                aggregate,
                element,
                aggregate_ty,
                indices,
            },
        )
    }

    /// Phi node; must precede every non-phi instruction of the block.
    pub fn phi(&mut self, ty: Type, incoming: Vec<(BlockId, Operand)>) -> Operand {
        self.push(ty, Op::Phi { incoming })
    }

    /// Adds an incoming edge to a phi created earlier with [`FunctionBuilder::phi`].
    pub fn add_incoming(&mut self, phi: &Operand, block: BlockId, value: Operand) {
        let Operand::Value(id) = phi else { return };
        for b in &mut self.blocks {
            for instr in &mut b.instrs {
                if instr.result == Some(*id) {
                    if let Op::Phi { incoming } = &mut instr.op {
                        incoming.push((block, value));
                    }
                    return;
                }
            }
        }
    }

    /// Call to builtin `name` with mangled overload suffix `overload`.
    pub fn call_builtin(
        &mut self,
        name: &str,
        overload: &str,
        ret: Type,
        args: impl IntoIterator<Item = (Operand, Type)>,
    ) -> Operand {
        self.call_external(&mangle(name, overload), ret, args)
    }

    /// Call to an external symbol used verbatim (LLVM intrinsics, pre-mangled names).
    pub fn call_external(
        &mut self,
        symbol: &str,
        ret: Type,
        args: impl IntoIterator<Item = (Operand, Type)>,
    ) -> Operand {
        let args = args
            .into_iter()
            .map(|(value, ty)| CallArg { value, ty })
            .collect();
        self.push(
            ret,
            Op::Call {
                callee: Callee::External(symbol.into()),
                args,
            },
        )
    }

    /// Call to a function defined in the program.
    pub fn call(
        &mut self,
        func: FuncId,
        ret: Type,
        args: impl IntoIterator<Item = (Operand, Type)>,
    ) -> Operand {
        let args = args
            .into_iter()
            .map(|(value, ty)| CallArg { value, ty })
            .collect();
        self.push(
            ret,
            Op::Call {
                callee: Callee::Function(func),
                args,
            },
        )
    }

    /// `barrier(flags)`.
    pub fn barrier(&mut self, flags: u32) {
        self.call_builtin("barrier", "j", Type::Void, [(Operand::u32(flags), Type::I32)]);
    }

    /// Unconditional branch.
    pub fn br(&mut self, target: BlockId) {
        self.push(Type::Void, Op::Br { target });
    }

    /// Conditional branch.
    pub fn cond_br(&mut self, cond: Operand, if_true: BlockId, if_false: BlockId) {
        self.push(
            Type::Void,
            Op::CondBr {
                cond,
                if_true,
                if_false,
            },
        );
    }

    /// Multi-way branch.
    pub fn switch(&mut self, value: Operand, default: BlockId, cases: Vec<(u64, BlockId)>) {
        self.push(
            Type::Void,
            Op::Switch {
                value,
                default,
                cases,
            },
        );
    }

    /// `ret <value>`.
    pub fn ret(&mut self, value: Operand) {
        self.push(Type::Void, Op::Ret { value: Some(value) });
    }

    /// `ret void`.
    pub fn ret_void(&mut self) {
        self.push(Type::Void, Op::Ret { value: None });
    }

    /// `unreachable`.
    pub fn unreachable(&mut self) {
        self.push(Type::Void, Op::Unreachable);
    }

    /// Validates block structure and returns the function.
    pub fn finish(self) -> Result<Function, ProgramError> {
        let name = self.name.clone();
        if self.blocks.is_empty() {
            return Err(ProgramError::EmptyFunction { function: name });
        }
        let block_count = self.blocks.len();
        let param_count = self.params.len();
        for (bi, block) in self.blocks.iter().enumerate() {
            let id = BlockId(u32::try_from(bi).unwrap_or(u32::MAX));
            let Some((last, body)) = block.instrs.split_last() else {
                return Err(ProgramError::MissingTerminator {
                    function: name,
                    block: id,
                });
            };
            if !last.op.is_terminator() || body.iter().any(|i| i.op.is_terminator()) {
                return Err(ProgramError::MissingTerminator {
                    function: name,
                    block: id,
                });
            }
            let mut seen_non_phi = false;
            for instr in &block.instrs {
                match &instr.op {
                    Op::Phi { incoming } => {
                        if seen_non_phi {
                            return Err(ProgramError::PhiAfterNonPhi {
                                function: name,
                                block: id,
                            });
                        }
                        if let Some((bad, _)) =
                            incoming.iter().find(|(b, _)| b.0 as usize >= block_count)
                        {
                            return Err(ProgramError::BadBlock {
                                function: name,
                                block: *bad,
                            });
                        }
                    }
                    _ => seen_non_phi = true,
                }
                if let Some(bad) = instr
                    .op
                    .successors()
                    .into_iter()
                    .find(|b| b.0 as usize >= block_count)
                {
                    return Err(ProgramError::BadBlock {
                        function: name,
                        block: bad,
                    });
                }
                if let Some(index) = max_arg_index(&instr.op)
                    && index as usize >= param_count
                {
                    return Err(ProgramError::BadArgIndex {
                        function: name,
                        index,
                    });
                }
            }
        }
        Ok(Function {
            name: self.name,
            params: self.params,
            blocks: self.blocks,
            value_count: self.next_value,
            is_kernel: self.is_kernel,
        })
    }
}

// Vector comparisons produce vectors of i1; scalars produce i1.
fn bool_like(operand_ty: &Type) -> Type {
    match operand_ty {
        Type::Vector { len, .. } => Type::vector(Type::BOOL, *len),
        _ => Type::BOOL,
    }
}

fn operands(op: &Op) -> Vec<&Operand> {
    match op {
        Op::Binary { lhs, rhs, .. } | Op::ICmp { lhs, rhs, .. } | Op::FCmp { lhs, rhs, .. } => {
            alloc::vec![lhs, rhs]
        }
        Op::ShuffleVector { lhs, rhs, .. } => alloc::vec![lhs, rhs],
        Op::FNeg { value } | Op::Cast { value, .. } => alloc::vec![value],
        Op::Select {
            cond,
            if_true,
            if_false,
        } => alloc::vec![cond, if_true, if_false],
        Op::Load { ptr, .. } => alloc::vec![ptr],
        Op::Store { value, ptr, .. } => alloc::vec![value, ptr],
        Op::Gep { base, indices, .. } => core::iter::once(base).chain(indices).collect(),
        Op::ExtractElement { vector, index } => alloc::vec![vector, index],
        Op::InsertElement {
            vector,
            element,
            index,
        } => alloc::vec![vector, element, index],
        Op::ExtractValue { aggregate, .. } => alloc::vec![aggregate],
        Op::InsertValue {
            aggregate, element, ..
        } => alloc::vec![aggregate, element],
        Op::Phi { incoming } => incoming.iter().map(|(_, v)| v).collect(),
        Op::Call { args, .. } => args.iter().map(|a| &a.value).collect(),
        Op::CondBr { cond, .. } => alloc::vec![cond],
        Op::Switch { value, .. } => alloc::vec![value],
        Op::Ret { value } => value.iter().collect(),
        Op::Alloca { .. } | Op::Br { .. } | Op::Unreachable | Op::Unsupported { .. } => {
            Vec::new()
        }
    }
}

fn max_arg_index(op: &Op) -> Option<u32> {
    operands(op)
        .into_iter()
        .filter_map(|o| match o {
            Operand::Arg(i) => Some(*i),
            _ => None,
        })
        .max()
}

/// Builds a [`Program`] from functions and program-scope variables.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    functions: Vec<Function>,
    globals: Vec<GlobalVar>,
}

impl ProgramBuilder {
    /// Empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next added function will receive (for forward calls).
    #[must_use]
    pub fn next_function_id(&self) -> FuncId {
        FuncId(u32::try_from(self.functions.len()).unwrap_or(u32::MAX))
    }

    /// Validates and adds a function.
    pub fn add_function(&mut self, function: FunctionBuilder) -> Result<FuncId, ProgramError> {
        let function = function.finish()?;
        if self.functions.iter().any(|f| f.name == function.name) {
            return Err(ProgramError::DuplicateFunction {
                name: function.name,
            });
        }
        let id = self.next_function_id();
        self.functions.push(function);
        Ok(id)
    }

    /// Adds a program-scope variable and returns its id.
    pub fn add_global(
        &mut self,
        name: &str,
        space: AddressSpace,
        ty: Type,
        init: Option<Vec<u8>>,
    ) -> GlobalId {
        self.globals.push(GlobalVar {
            name: name.into(),
            space,
            ty,
            init,
        });
        GlobalId(u32::try_from(self.globals.len() - 1).unwrap_or(u32::MAX))
    }

    /// Checks cross-function references and returns the program.
    pub fn finish(self) -> Result<Program, ProgramError> {
        let function_count = self.functions.len();
        let global_count = self.globals.len();
        for function in &self.functions {
            for instr in function.blocks.iter().flat_map(|b| &b.instrs) {
                let bad_call = matches!(
                    &instr.op,
                    Op::Call { callee: Callee::Function(f), .. } if f.0 as usize >= function_count
                );
                let bad_global = operands(&instr.op)
                    .into_iter()
                    .any(|o| matches!(o, Operand::Global(g) if g.0 as usize >= global_count));
                if bad_call || bad_global {
                    return Err(ProgramError::BadReference {
                        function: function.name.clone(),
                    });
                }
            }
        }
        Ok(Program {
            functions: self.functions,
            globals: self.globals,
        })
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn mangle_prefixes_length() {
        assert_eq!(mangle("get_global_id", "j"), "_Z13get_global_idj");
    }

    #[test]
    fn dense_value_ids() {
        let mut f = FunctionBuilder::kernel("k", [Type::I32]);
        let a = f.binary(BinOp::Add, Type::I32, f.arg(0), Operand::i32(1));
        let b = f.binary(BinOp::Mul, Type::I32, a.clone(), a);
        f.ret_void();
        assert_eq!(b, Operand::Value(ValueId(1)));
        let func = f.finish().unwrap();
        assert_eq!(func.value_count, 2);
        assert!(func.is_kernel);
    }

    #[test]
    fn unterminated_block_is_rejected() {
        let mut f = FunctionBuilder::kernel("k", []);
        let next = f.new_block();
        f.br(next);
        let err = f.finish().unwrap_err();
        assert_eq!(
            err,
            ProgramError::MissingTerminator {
                function: "k".into(),
                block: BlockId(1)
            }
        );
    }

    #[test]
    fn bad_targets_and_args_are_rejected() {
        let mut f = FunctionBuilder::kernel("k", []);
        f.br(BlockId(7));
        assert!(matches!(f.finish(), Err(ProgramError::BadBlock { .. })));

        let mut f = FunctionBuilder::kernel("k", [Type::I32]);
        f.binary(BinOp::Add, Type::I32, Operand::Arg(3), Operand::i32(0));
        f.ret_void();
        assert!(matches!(
            f.finish(),
            Err(ProgramError::BadArgIndex { index: 3, .. })
        ));
    }

    #[test]
    fn phi_must_lead_block() {
        let mut f = FunctionBuilder::kernel("k", []);
        let _ = f.binary(BinOp::Add, Type::I32, Operand::i32(1), Operand::i32(1));
        let _ = f.phi(Type::I32, alloc::vec![(BlockId(0), Operand::i32(0))]);
        f.ret_void();
        assert!(matches!(
            f.finish(),
            Err(ProgramError::PhiAfterNonPhi { .. })
        ));
    }

    #[test]
    fn duplicate_and_dangling_references() {
        let mut p = ProgramBuilder::new();
        let mut f = FunctionBuilder::kernel("k", []);
        f.ret_void();
        p.add_function(f).unwrap();
        let mut g = FunctionBuilder::kernel("k", []);
        g.ret_void();
        assert!(matches!(
            p.add_function(g),
            Err(ProgramError::DuplicateFunction { .. })
        ));

        let mut h = FunctionBuilder::kernel("h", []);
        h.call(FuncId(9), Type::Void, []);
        h.ret_void();
        p.add_function(h).unwrap();
        assert!(matches!(p.finish(), Err(ProgramError::BadReference { .. })));
    }

    #[test]
    fn gep_tracks_pointee() {
        let s = Type::Struct {
            fields: alloc::vec![Type::I8, Type::Float],
        };
        let mut f = FunctionBuilder::kernel("k", [Type::ptr(AddressSpace::Global, s.clone())]);
        let _ = f.gep(s, f.arg(0), [Operand::i32(0), Operand::i32(1)]);
        f.ret_void();
        let func = f.finish().unwrap();
        assert_eq!(
            func.blocks[0].instrs[0].ty,
            Type::ptr(AddressSpace::Global, Type::Float)
        );
    }
}
