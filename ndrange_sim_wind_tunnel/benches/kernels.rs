// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use ndrange_sim::builder::{FunctionBuilder, ProgramBuilder};
use ndrange_sim::program::{BinOp, Instr, IntPredicate, Operand, Program};
use ndrange_sim::{
    Address, AddressSpace, EventMask, ItemIds, Kernel, KernelArg, NdRange, Observer, SimConfig,
    Simulator, Type, TypedValue,
};

/// Entry point for `ndrange_sim` wind-tunnel benchmarks.
///
/// Each scenario isolates one cost of the interpreter: straight-line dispatch, barrier
/// rendezvous, atomic traffic, builtin calls in a loop, and observer notification.
fn bench_kernels(c: &mut Criterion) {
    bench_vector_add(c);
    bench_group_reduce(c);
    bench_atomic_contention(c);
    bench_builtin_loop(c);
    bench_observer_tax(c);
}

fn global_id(f: &mut FunctionBuilder) -> Operand {
    f.call_builtin("get_global_id", "j", Type::I64, [(Operand::u32(0), Type::I32)])
}

fn finish(f: FunctionBuilder) -> Program {
    let mut pb = ProgramBuilder::new();
    pb.add_function(f).unwrap();
    pb.finish().unwrap()
}

fn vector_add_program() -> Program {
    let p = Type::ptr(AddressSpace::Global, Type::Float);
    let mut f = FunctionBuilder::kernel("vector_add", [p.clone(), p.clone(), p]);
    let i = global_id(&mut f);
    let pa = f.gep(Type::Float, f.arg(0), [i.clone()]);
    let pb = f.gep(Type::Float, f.arg(1), [i.clone()]);
    let pc = f.gep(Type::Float, f.arg(2), [i]);
    let a = f.load(Type::Float, pa);
    let b = f.load(Type::Float, pb);
    let c = f.binary(BinOp::FAdd, Type::Float, a, b);
    f.store(Type::Float, c, pc);
    f.ret_void();
    finish(f)
}

/// Binds `count` fresh global buffers of `bytes` each to the leading kernel arguments.
fn bind_buffers(sim: &mut Simulator, kernel: &mut Kernel<'_>, count: usize, bytes: u64) {
    for i in 0..count {
        let buf = sim.create_buffer(bytes).unwrap();
        kernel.set_arg(i, KernelArg::Buffer(buf)).unwrap();
    }
}

/// One load-add-store per work-item.
///
/// Measures per-item setup plus straight-line dispatch; should scale linearly with item count.
fn bench_vector_add(c: &mut Criterion) {
    let program = vector_add_program();
    let mut group = c.benchmark_group("vector_add");
    for &n in &[256_usize, 1_024, 4_096] {
        let mut sim = Simulator::new(SimConfig::default());
        let mut kernel = Kernel::new(&program, "vector_add").unwrap();
        bind_buffers(&mut sim, &mut kernel, 3, 4 * n as u64);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let summary = sim.run(&kernel, NdRange::new_1d(n, 64), None).unwrap();
                black_box(summary);
            });
        });
    }
    group.finish();
}

/// Local-memory tree reduction with `log2(local)` barrier rounds.
fn group_reduce_program() -> Program {
    let mut f = FunctionBuilder::kernel(
        "reduce",
        [
            Type::ptr(AddressSpace::Global, Type::I32),
            Type::ptr(AddressSpace::Local, Type::I32),
        ],
    );
    let gid = global_id(&mut f);
    let lid = f.call_builtin("get_local_id", "j", Type::I64, [(Operand::u32(0), Type::I32)]);
    let size = f.call_builtin("get_local_size", "j", Type::I64, [(Operand::u32(0), Type::I32)]);
    let src = f.gep(Type::I32, f.arg(0), [gid.clone()]);
    let v = f.load(Type::I32, src);
    let mine = f.gep_in(AddressSpace::Local, Type::I32, f.arg(1), [lid.clone()]);
    f.store(Type::I32, v, mine.clone());
    f.barrier(1);
    let entry = f.current_block();
    let half = f.binary(BinOp::LShr, Type::I64, size, Operand::u64(1));

    let header = f.new_block();
    let active = f.new_block();
    let sync = f.new_block();
    let exit = f.new_block();
    f.br(header);

    f.switch_to(header);
    let stride = f.phi(Type::I64, vec![(entry, half)]);
    let more = f.icmp(IntPredicate::Ne, Type::I64, stride.clone(), Operand::u64(0));
    let work = f.new_block();
    f.cond_br(more, work, exit);

    f.switch_to(work);
    let lower = f.icmp(IntPredicate::Ult, Type::I64, lid.clone(), stride.clone());
    f.cond_br(lower, active, sync);

    f.switch_to(active);
    let other_index = f.binary(BinOp::Add, Type::I64, lid.clone(), stride.clone());
    let other = f.gep_in(AddressSpace::Local, Type::I32, f.arg(1), [other_index]);
    let a = f.load(Type::I32, mine.clone());
    let b = f.load(Type::I32, other);
    let s = f.binary(BinOp::Add, Type::I32, a, b);
    f.store(Type::I32, s, mine);
    f.br(sync);

    f.switch_to(sync);
    f.barrier(1);
    let next = f.binary(BinOp::LShr, Type::I64, stride.clone(), Operand::u64(1));
    f.add_incoming(&stride, sync, next);
    f.br(header);

    f.switch_to(exit);
    // Every item writes its group's total back over its input.
    let first = f.gep_in(AddressSpace::Local, Type::I32, f.arg(1), [Operand::u64(0)]);
    let total = f.load(Type::I32, first);
    let dst = f.gep(Type::I32, f.arg(0), [gid]);
    f.store(Type::I32, total, dst);
    f.ret_void();
    finish(f)
}

/// Barrier-heavy reduction over 1024 items.
///
/// Larger groups mean fewer groups but more items per rendezvous and more rounds.
fn bench_group_reduce(c: &mut Criterion) {
    let program = group_reduce_program();
    let mut group = c.benchmark_group("group_reduce");
    for &local in &[16_usize, 64, 256] {
        let mut sim = Simulator::new(SimConfig::default());
        let mut kernel = Kernel::new(&program, "reduce").unwrap();
        let data = sim.create_buffer(4 * 1_024).unwrap();
        kernel.set_arg(0, KernelArg::Buffer(data)).unwrap();
        kernel
            .set_arg(1, KernelArg::Local { size: 4 * local as u64 })
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(local), &local, |b, &local| {
            b.iter(|| {
                sim.run(&kernel, NdRange::new_1d(1_024, local), None).unwrap();
            });
        });
    }
    group.finish();
}

/// Every work-item increments one shared counter.
fn bench_atomic_contention(c: &mut Criterion) {
    let mut f = FunctionBuilder::kernel("count", [Type::ptr(AddressSpace::Global, Type::I32)]);
    f.call_builtin(
        "atomic_inc",
        "PU3AS1Vi",
        Type::I32,
        [(f.arg(0), Type::ptr(AddressSpace::Global, Type::I32))],
    );
    f.ret_void();
    let program = finish(f);

    let mut group = c.benchmark_group("atomic_contention");
    for &n in &[256_usize, 4_096] {
        let mut sim = Simulator::new(SimConfig::default());
        let mut kernel = Kernel::new(&program, "count").unwrap();
        bind_buffers(&mut sim, &mut kernel, 1, 4);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                sim.run(&kernel, NdRange::new_1d(n, 64), None).unwrap();
            });
        });
    }
    group.finish();
}

/// A per-item loop calling `sin` and `fma`; dominated by builtin resolution and dispatch.
fn builtin_loop_program(iterations: u64) -> Program {
    let mut f = FunctionBuilder::kernel("wave", [Type::ptr(AddressSpace::Global, Type::Float)]);
    let gid = global_id(&mut f);
    let entry = f.current_block();
    let header = f.new_block();
    let body = f.new_block();
    let exit = f.new_block();
    f.br(header);

    f.switch_to(header);
    let i = f.phi(Type::I64, vec![(entry, Operand::u64(0))]);
    let acc = f.phi(Type::Float, vec![(entry, Operand::f32(0.0))]);
    let more = f.icmp(IntPredicate::Ult, Type::I64, i.clone(), Operand::u64(iterations));
    f.cond_br(more, body, exit);

    f.switch_to(body);
    let s = f.call_builtin("sin", "f", Type::Float, [(acc.clone(), Type::Float)]);
    let next_acc = f.call_builtin(
        "fma",
        "fff",
        Type::Float,
        [
            (s, Type::Float),
            (Operand::f32(0.5), Type::Float),
            (Operand::f32(0.25), Type::Float),
        ],
    );
    let next_i = f.binary(BinOp::Add, Type::I64, i.clone(), Operand::u64(1));
    f.add_incoming(&i, body, next_i);
    f.add_incoming(&acc, body, next_acc);
    f.br(header);

    f.switch_to(exit);
    let p = f.gep(Type::Float, f.arg(0), [gid]);
    f.store(Type::Float, acc, p);
    f.ret_void();
    finish(f)
}

fn bench_builtin_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("builtin_loop");
    for &iterations in &[16_u64, 128] {
        let program = builtin_loop_program(iterations);
        let mut sim = Simulator::new(SimConfig::default());
        let mut kernel = Kernel::new(&program, "wave").unwrap();
        bind_buffers(&mut sim, &mut kernel, 1, 4 * 256);
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &iterations,
            |b, _| {
                b.iter(|| {
                    sim.run(&kernel, NdRange::new_1d(256, 64), None).unwrap();
                });
            },
        );
    }
    group.finish();
}

#[derive(Debug, Default)]
struct CountingObserver {
    events: u64,
}

impl Observer for CountingObserver {
    fn instruction_executed(&mut self, _ids: &ItemIds, _instr: &Instr, _result: Option<&TypedValue>) {
        self.events += 1;
    }

    fn memory_load(&mut self, _ids: Option<&ItemIds>, _address: Address, _size: u64) {
        self.events += 1;
    }
}

/// The same launch with no observer, with an observer that masks everything off, and with one
/// that receives every event.
///
/// The first two should be indistinguishable.
fn bench_observer_tax(c: &mut Criterion) {
    struct Muted;
    impl Observer for Muted {
        fn mask(&self) -> EventMask {
            EventMask::NONE
        }
    }

    let program = vector_add_program();
    let mut sim = Simulator::new(SimConfig::default());
    let mut kernel = Kernel::new(&program, "vector_add").unwrap();
    bind_buffers(&mut sim, &mut kernel, 3, 4 * 1_024);
    let nd = NdRange::new_1d(1_024, 64);

    let mut group = c.benchmark_group("observer_tax");
    group.bench_function("none", |b| {
        b.iter(|| sim.run(&kernel, nd, None).unwrap());
    });
    group.bench_function("masked", |b| {
        let mut muted = Muted;
        b.iter(|| sim.run(&kernel, nd, Some(&mut muted)).unwrap());
    });
    group.bench_function("all", |b| {
        let mut counting = CountingObserver::default();
        b.iter(|| sim.run(&kernel, nd, Some(&mut counting)).unwrap());
        black_box(counting.events);
    });
    group.finish();
}

criterion_group!(benches, bench_kernels);
criterion_main!(benches);
