// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Barriers, atomics, and forward-progress checks.

use ndrange_sim::builder::FunctionBuilder;
use ndrange_sim::config::DEFAULT_MAX_STEPS;
use ndrange_sim::error::{Diagnostic, StuckReason};
use ndrange_sim::program::{IntPredicate, Operand, Program};
use ndrange_sim::{Kernel, KernelArg, NdRange, SimConfig, SimError, Simulator, Size3, Type};
use ndrange_sim_conformance::{
    Capture, GLOBAL_FENCE, LOCAL_FENCE, atomic_accumulate, global_ptr, group_sum, i32_bytes,
    i32s, query, single,
};

fn run_on_scratch(
    program: &Program,
    name: &str,
    ndrange: NdRange,
    config: SimConfig,
) -> (Result<(), SimError>, Capture) {
    let mut sim = Simulator::new(config);
    let buf = sim.create_buffer(64).unwrap();
    let mut kernel = Kernel::new(program, name).unwrap();
    kernel.set_arg(0, KernelArg::Buffer(buf)).unwrap();
    let mut capture = Capture::default();
    let result = sim.run(&kernel, ndrange, Some(&mut capture)).map(|_| ());
    (result, capture)
}

/// Starts a kernel over one global int buffer and returns `lid == 0`.
fn first_item_kernel(name: &str) -> (FunctionBuilder, Operand) {
    let mut f = FunctionBuilder::kernel(name, [global_ptr(Type::I32)]);
    let lid = query(&mut f, "get_local_id", 0);
    let is_first = f.icmp(IntPredicate::Eq, Type::I64, lid, Operand::u64(0));
    (f, is_first)
}

#[test]
fn barrier_releases_all_items_together() {
    let program = group_sum().unwrap();
    let mut sim = Simulator::new(SimConfig::default());
    let input: Vec<i32> = (1..=12).collect();
    let src = sim.create_buffer_init(&i32_bytes(&input)).unwrap();
    let sums = sim.create_buffer(12).unwrap();
    let mut kernel = Kernel::new(&program, "group_sum").unwrap();
    kernel.set_arg(0, KernelArg::Buffer(src)).unwrap();
    kernel.set_arg(1, KernelArg::Local { size: 16 }).unwrap();
    kernel.set_arg(2, KernelArg::Buffer(sums)).unwrap();

    let mut capture = Capture::default();
    sim.run(&kernel, NdRange::new_1d(12, 4), Some(&mut capture))
        .unwrap();
    assert!(capture.diagnostics.is_empty(), "{:?}", capture.diagnostics);
    assert_eq!(i32s(&sim.read_buffer(sums, 12).unwrap()), [10, 26, 42]);
}

#[test]
fn items_at_different_barriers_diverge() {
    let (mut f, is_first) = first_item_kernel("split");
    let a = f.new_block();
    let b = f.new_block();
    let join = f.new_block();
    f.cond_br(is_first, a, b);
    f.switch_to(a);
    f.barrier(LOCAL_FENCE);
    f.br(join);
    f.switch_to(b);
    f.barrier(LOCAL_FENCE);
    f.br(join);
    f.switch_to(join);
    f.ret_void();
    let program = single(f).unwrap();

    let (result, _) =
        run_on_scratch(&program, "split", NdRange::new_1d(4, 4), SimConfig::default());
    assert_eq!(
        result,
        Err(SimError::DivergentBarrier {
            group: Size3::new(0, 0, 0),
            reason: "work-items reached different barriers",
        })
    );
}

#[test]
fn mismatched_fence_flags_diverge() {
    let (mut f, is_first) = first_item_kernel("flags");
    let flags = f.select(
        Type::I32,
        is_first,
        Operand::u32(LOCAL_FENCE),
        Operand::u32(GLOBAL_FENCE),
    );
    f.call_builtin("barrier", "j", Type::Void, [(flags, Type::I32)]);
    f.ret_void();
    let program = single(f).unwrap();

    let (result, _) =
        run_on_scratch(&program, "flags", NdRange::new_1d(4, 4), SimConfig::default());
    assert!(
        matches!(
            result,
            Err(SimError::DivergentBarrier {
                reason: "fence flags differ",
                ..
            })
        ),
        "{result:?}"
    );
}

#[test]
fn early_exit_before_barrier_is_reported() {
    // Item 0 returns immediately; the rest wait at a barrier.
    let (mut f, is_first) = first_item_kernel("early");
    let leave = f.new_block();
    let wait = f.new_block();
    f.cond_br(is_first, leave, wait);
    f.switch_to(leave);
    f.ret_void();
    f.switch_to(wait);
    f.barrier(LOCAL_FENCE | GLOBAL_FENCE);
    f.ret_void();
    let program = single(f).unwrap();

    let (result, capture) =
        run_on_scratch(&program, "early", NdRange::new_1d(4, 4), SimConfig::default());
    result.unwrap();
    assert_eq!(
        capture.diagnostics,
        [Diagnostic::PartialBarrier {
            waiting: 3,
            total: 4
        }]
    );
}

#[test]
fn atomic_add_is_order_independent() {
    let program = atomic_accumulate().unwrap();
    for (global, local) in [(16, 1), (16, 4), (16, 16), (64, 8)] {
        let mut sim = Simulator::new(SimConfig::default());
        let counter = sim.create_buffer_init(&i32_bytes(&[100])).unwrap();
        let mut kernel = Kernel::new(&program, "accumulate").unwrap();
        kernel.set_arg(0, KernelArg::Buffer(counter)).unwrap();
        sim.run(&kernel, NdRange::new_1d(global, local), None).unwrap();
        let expected = 100 + (global * (global + 1) / 2) as i32;
        assert_eq!(
            i32s(&sim.read_buffer(counter, 4).unwrap()),
            [expected],
            "global {global}, local {local}"
        );
    }
}

fn spin() -> Program {
    let mut f = FunctionBuilder::kernel("spin", [global_ptr(Type::I32)]);
    let body = f.new_block();
    f.br(body);
    f.switch_to(body);
    f.br(body);
    single(f).unwrap()
}

#[test]
fn infinite_loop_hits_the_step_limit() {
    let program = spin();

    let config = SimConfig::default().with_max_steps(1_000);
    let (result, _) = run_on_scratch(&program, "spin", NdRange::new_1d(2, 2), config);
    assert_eq!(
        result,
        Err(SimError::StuckKernel {
            group: Size3::new(0, 0, 0),
            reason: StuckReason::StepLimit {
                local_id: Size3::new(0, 0, 0),
                limit: 1_000,
            },
        })
    );
}

#[test]
fn default_config_stops_a_spinning_kernel() {
    let program = spin();
    let (result, _) = run_on_scratch(&program, "spin", NdRange::new_1d(1, 1), SimConfig::default());
    assert_eq!(
        result,
        Err(SimError::StuckKernel {
            group: Size3::new(0, 0, 0),
            reason: StuckReason::StepLimit {
                local_id: Size3::new(0, 0, 0),
                limit: DEFAULT_MAX_STEPS,
            },
        })
    );
}
