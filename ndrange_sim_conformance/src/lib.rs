// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures for the `ndrange_sim` conformance tests.
//!
//! The kernels here are assembled with [`ndrange_sim::builder`] so the tests exercise the whole
//! engine (builtin resolution, scheduling, memory) without a compiler front end.

use ndrange_sim::builder::{FunctionBuilder, ProgramBuilder};
use ndrange_sim::error::Diagnostic;
use ndrange_sim::program::{BinOp, CastOp, IntPredicate, Operand, Program, ProgramError};
use ndrange_sim::{AddressSpace, EventMask, ItemIds, Observer, Type};

/// `CLK_LOCAL_MEM_FENCE`.
pub const LOCAL_FENCE: u32 = 1;
/// `CLK_GLOBAL_MEM_FENCE`.
pub const GLOBAL_FENCE: u32 = 2;

/// Collects diagnostics and kernel output.
#[derive(Debug, Default)]
pub struct Capture {
    /// Every diagnostic, in report order.
    pub diagnostics: Vec<Diagnostic>,
    /// Concatenated `printf` output.
    pub output: String,
}

impl Observer for Capture {
    fn mask(&self) -> EventMask {
        EventMask::DIAGNOSTIC | EventMask::OUTPUT
    }

    fn diagnostic(&mut self, _ids: Option<&ItemIds>, diagnostic: &Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
    }

    fn output(&mut self, text: &str) {
        self.output.push_str(text);
    }
}

/// Global pointer to `elem`.
#[must_use]
pub fn global_ptr(elem: Type) -> Type {
    Type::ptr(AddressSpace::Global, elem)
}

/// Local pointer to `elem`.
#[must_use]
pub fn local_ptr(elem: Type) -> Type {
    Type::ptr(AddressSpace::Local, elem)
}

/// Emits a call to one of the `get_*_id`/`get_*_size` queries for dimension `dim`.
pub fn query(f: &mut FunctionBuilder, name: &str, dim: u32) -> Operand {
    f.call_builtin(name, "j", Type::I64, [(Operand::u32(dim), Type::I32)])
}

/// Finishes `f` (which must already be terminated) into a one-kernel program.
pub fn single(f: FunctionBuilder) -> Result<Program, ProgramError> {
    let mut pb = ProgramBuilder::new();
    pb.add_function(f)?;
    pb.finish()
}

/// `c[i] = a[i] + b[i]` over floats.
pub fn vector_add() -> Result<Program, ProgramError> {
    let p = global_ptr(Type::Float);
    let mut f = FunctionBuilder::kernel("vector_add", [p.clone(), p.clone(), p]);
    let i = query(&mut f, "get_global_id", 0);
    let pa = f.gep(Type::Float, f.arg(0), [i.clone()]);
    let pb = f.gep(Type::Float, f.arg(1), [i.clone()]);
    let pc = f.gep(Type::Float, f.arg(2), [i]);
    let a = f.load(Type::Float, pa);
    let b = f.load(Type::Float, pb);
    let c = f.binary(BinOp::FAdd, Type::Float, a, b);
    f.store(Type::Float, c, pc);
    f.ret_void();
    single(f)
}

/// Each group copies its 4-float slice of `src` into local scratch with
/// `async_work_group_copy`, waits, and writes `scratch[lid]` to `dst[gid]`.
///
/// Expects a local size of 4 and a 16-byte local argument at index 1.
pub fn async_copy_through_local() -> Result<Program, ProgramError> {
    let mut f = FunctionBuilder::kernel(
        "stage",
        [
            global_ptr(Type::Float),
            local_ptr(Type::Float),
            global_ptr(Type::Float),
        ],
    );
    let group = query(&mut f, "get_group_id", 0);
    let base = f.binary(BinOp::Mul, Type::I64, group, Operand::u64(4));
    let src = f.gep(Type::Float, f.arg(0), [base]);
    let event = f.call_builtin(
        "async_work_group_copy",
        "PU3AS3fPU3AS1Kfm9ocl_event",
        Type::I64,
        [
            (f.arg(1), local_ptr(Type::Float)),
            (src, global_ptr(Type::Float)),
            (Operand::u64(4), Type::I64),
            (Operand::u64(0), Type::I64),
        ],
    );
    let events = f.alloca(Type::I64);
    f.store(Type::I64, event, events.clone());
    f.call_builtin(
        "wait_group_events",
        "iP9ocl_event",
        Type::Void,
        [
            (Operand::i32(1), Type::I32),
            (events, Type::ptr(AddressSpace::Private, Type::I64)),
        ],
    );
    let lid = query(&mut f, "get_local_id", 0);
    let gid = query(&mut f, "get_global_id", 0);
    let from = f.gep_in(AddressSpace::Local, Type::Float, f.arg(1), [lid]);
    let v = f.load(Type::Float, from);
    let to = f.gep(Type::Float, f.arg(2), [gid]);
    f.store(Type::Float, v, to);
    f.ret_void();
    single(f)
}

/// Work-group sum: every item writes `src[gid]` to `scratch[lid]`, then after a barrier item 0
/// adds up the scratch slots and writes the total to `sums[group]`.
///
/// Expects a local argument at index 1 of at least `4 * local_size` bytes.
pub fn group_sum() -> Result<Program, ProgramError> {
    let mut f = FunctionBuilder::kernel(
        "group_sum",
        [
            global_ptr(Type::I32),
            local_ptr(Type::I32),
            global_ptr(Type::I32),
        ],
    );
    let gid = query(&mut f, "get_global_id", 0);
    let lid = query(&mut f, "get_local_id", 0);
    let size = query(&mut f, "get_local_size", 0);
    let group = query(&mut f, "get_group_id", 0);
    let from = f.gep(Type::I32, f.arg(0), [gid]);
    let v = f.load(Type::I32, from);
    let slot = f.gep_in(AddressSpace::Local, Type::I32, f.arg(1), [lid.clone()]);
    f.store(Type::I32, v, slot);
    f.barrier(LOCAL_FENCE);

    let is_first = f.icmp(IntPredicate::Eq, Type::I64, lid, Operand::u64(0));
    let sum_block = f.new_block();
    let done = f.new_block();
    f.cond_br(is_first, sum_block, done);

    f.switch_to(sum_block);
    let entry = sum_block;
    let header = f.new_block();
    let body = f.new_block();
    let exit = f.new_block();
    f.br(header);

    f.switch_to(header);
    let i = f.phi(Type::I64, vec![(entry, Operand::u64(0))]);
    let acc = f.phi(Type::I32, vec![(entry, Operand::i32(0))]);
    let more = f.icmp(IntPredicate::Ult, Type::I64, i.clone(), size);
    f.cond_br(more, body, exit);

    f.switch_to(body);
    let p = f.gep_in(AddressSpace::Local, Type::I32, f.arg(1), [i.clone()]);
    let x = f.load(Type::I32, p);
    let next_acc = f.binary(BinOp::Add, Type::I32, acc.clone(), x);
    let next_i = f.binary(BinOp::Add, Type::I64, i.clone(), Operand::u64(1));
    f.add_incoming(&i, body, next_i);
    f.add_incoming(&acc, body, next_acc);
    f.br(header);

    f.switch_to(exit);
    let out = f.gep(Type::I32, f.arg(2), [group]);
    f.store(Type::I32, acc, out);
    f.br(done);

    f.switch_to(done);
    f.ret_void();
    single(f)
}

/// `atomic_add(counter, gid + 1)` from every work-item.
pub fn atomic_accumulate() -> Result<Program, ProgramError> {
    let mut f = FunctionBuilder::kernel("accumulate", [global_ptr(Type::I32)]);
    let gid = query(&mut f, "get_global_id", 0);
    let delta = f.cast(CastOp::Trunc, Type::I64, Type::I32, gid);
    let delta = f.binary(BinOp::Add, Type::I32, delta, Operand::i32(1));
    f.call_builtin(
        "atomic_add",
        "PU3AS1Vii",
        Type::I32,
        [(f.arg(0), global_ptr(Type::I32)), (delta, Type::I32)],
    );
    f.ret_void();
    single(f)
}

/// Little-endian bytes of `values`.
#[must_use]
pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Floats decoded from little-endian `bytes`.
#[must_use]
pub fn f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Little-endian bytes of `values`.
#[must_use]
pub fn i32_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// `i32`s decoded from little-endian `bytes`.
#[must_use]
pub fn i32s(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
