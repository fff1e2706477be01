// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Whole-kernel scenarios.

use ndrange_sim::builder::FunctionBuilder;
use ndrange_sim::program::{BinOp, CastOp, Operand};
use ndrange_sim::{Kernel, KernelArg, NdRange, SimConfig, SimError, Simulator, Size3, Type};
use ndrange_sim_conformance::{
    Capture, async_copy_through_local, f32_bytes, f32s, global_ptr, i32s, query, single,
    vector_add,
};

#[test]
fn vector_add_sums_elementwise() {
    let program = vector_add().unwrap();
    let mut sim = Simulator::new(SimConfig::default());
    let a = sim
        .create_buffer_init(&f32_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]))
        .unwrap();
    let b = sim
        .create_buffer_init(&f32_bytes(&[8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]))
        .unwrap();
    let c = sim.create_buffer(32).unwrap();

    let mut kernel = Kernel::new(&program, "vector_add").unwrap();
    kernel.set_arg(0, KernelArg::Buffer(a)).unwrap();
    kernel.set_arg(1, KernelArg::Buffer(b)).unwrap();
    kernel.set_arg(2, KernelArg::Buffer(c)).unwrap();

    for local in [1, 2, 4, 8] {
        let summary = sim.run(&kernel, NdRange::new_1d(8, local), None).unwrap();
        assert_eq!(summary.work_items, 8, "local size {local}");
        assert_eq!(summary.diagnostics, 0, "local size {local}");
        assert_eq!(f32s(&sim.read_buffer(c, 32).unwrap()), [9.0; 8]);
        sim.write_buffer(c, &[0; 32]).unwrap();
    }
}

#[test]
fn async_copy_is_visible_after_wait() {
    let program = async_copy_through_local().unwrap();
    let mut sim = Simulator::new(SimConfig::default());
    let input: Vec<f32> = (1..=8).map(|i| i as f32 * 1.5).collect();
    let src = sim.create_buffer_init(&f32_bytes(&input)).unwrap();
    let dst = sim.create_buffer(32).unwrap();

    let mut kernel = Kernel::new(&program, "stage").unwrap();
    kernel.set_arg(0, KernelArg::Buffer(src)).unwrap();
    kernel.set_arg(1, KernelArg::Local { size: 16 }).unwrap();
    kernel.set_arg(2, KernelArg::Buffer(dst)).unwrap();

    let mut capture = Capture::default();
    let summary = sim
        .run(&kernel, NdRange::new_1d(8, 4), Some(&mut capture))
        .unwrap();
    assert!(capture.diagnostics.is_empty(), "{:?}", capture.diagnostics);
    assert_eq!(summary.groups, 2);
    assert_eq!(f32s(&sim.read_buffer(dst, 32).unwrap()), input);
}

#[test]
fn global_offset_shifts_ids() {
    // out[gid - offset] = gid, and linear id ignores the offset.
    let mut f = FunctionBuilder::kernel("ids", [global_ptr(Type::I32), global_ptr(Type::I32)]);
    let gid = query(&mut f, "get_global_id", 0);
    let offset = query(&mut f, "get_global_offset", 0);
    let linear = f.call_builtin("get_global_linear_id", "", Type::I64, []);
    let index = f.binary(BinOp::Sub, Type::I64, gid.clone(), offset);
    let gid32 = f.cast(CastOp::Trunc, Type::I64, Type::I32, gid);
    let linear32 = f.cast(CastOp::Trunc, Type::I64, Type::I32, linear);
    let p = f.gep(Type::I32, f.arg(0), [index.clone()]);
    f.store(Type::I32, gid32, p);
    let q = f.gep(Type::I32, f.arg(1), [index]);
    f.store(Type::I32, linear32, q);
    f.ret_void();
    let program = single(f).unwrap();

    let mut sim = Simulator::new(SimConfig::default());
    let ids = sim.create_buffer(16).unwrap();
    let linear = sim.create_buffer(16).unwrap();
    let mut kernel = Kernel::new(&program, "ids").unwrap();
    kernel.set_arg(0, KernelArg::Buffer(ids)).unwrap();
    kernel.set_arg(1, KernelArg::Buffer(linear)).unwrap();
    let nd = NdRange::new_1d(4, 2).with_offset(Size3::new(10, 0, 0));
    sim.run(&kernel, nd, None).unwrap();
    assert_eq!(i32s(&sim.read_buffer(ids, 16).unwrap()), [10, 11, 12, 13]);
    assert_eq!(i32s(&sim.read_buffer(linear, 16).unwrap()), [0, 1, 2, 3]);
}

#[test]
fn two_dimensional_ranges_visit_every_item() {
    // out[y * width + x] = x + 100 * y
    let mut f = FunctionBuilder::kernel("grid", [global_ptr(Type::I32)]);
    let x = query(&mut f, "get_global_id", 0);
    let y = query(&mut f, "get_global_id", 1);
    let width = query(&mut f, "get_global_size", 0);
    let row = f.binary(BinOp::Mul, Type::I64, y.clone(), width);
    let index = f.binary(BinOp::Add, Type::I64, row, x.clone());
    let hundred_y = f.binary(BinOp::Mul, Type::I64, y, Operand::u64(100));
    let value = f.binary(BinOp::Add, Type::I64, x, hundred_y);
    let value = f.cast(CastOp::Trunc, Type::I64, Type::I32, value);
    let p = f.gep(Type::I32, f.arg(0), [index]);
    f.store(Type::I32, value, p);
    f.ret_void();
    let program = single(f).unwrap();

    let mut sim = Simulator::new(SimConfig::default());
    let out = sim.create_buffer(4 * 12).unwrap();
    let mut kernel = Kernel::new(&program, "grid").unwrap();
    kernel.set_arg(0, KernelArg::Buffer(out)).unwrap();
    let summary = sim
        .run(&kernel, NdRange::new_2d([4, 3], [2, 1]), None)
        .unwrap();
    assert_eq!(summary.groups, 6);
    assert_eq!(
        i32s(&sim.read_buffer(out, 48).unwrap()),
        [0, 1, 2, 3, 100, 101, 102, 103, 200, 201, 202, 203]
    );
}

#[test]
fn quick_mode_runs_first_and_last_group() {
    let program = vector_add().unwrap();
    let mut sim = Simulator::new(SimConfig::default().with_quick_mode(true));
    let a = sim.create_buffer_init(&f32_bytes(&[1.0; 8])).unwrap();
    let b = sim.create_buffer_init(&f32_bytes(&[2.0; 8])).unwrap();
    let c = sim.create_buffer(32).unwrap();
    let mut kernel = Kernel::new(&program, "vector_add").unwrap();
    kernel.set_arg(0, KernelArg::Buffer(a)).unwrap();
    kernel.set_arg(1, KernelArg::Buffer(b)).unwrap();
    kernel.set_arg(2, KernelArg::Buffer(c)).unwrap();
    let summary = sim.run(&kernel, NdRange::new_1d(8, 2), None).unwrap();
    assert_eq!(summary.groups, 2);
    assert_eq!(
        f32s(&sim.read_buffer(c, 32).unwrap()),
        [3.0, 3.0, 0.0, 0.0, 0.0, 0.0, 3.0, 3.0]
    );
}

#[test]
fn launch_errors_are_reported_before_running() {
    let program = vector_add().unwrap();
    let mut sim = Simulator::new(SimConfig::default());
    let a = sim.create_buffer(32).unwrap();
    let mut kernel = Kernel::new(&program, "vector_add").unwrap();
    kernel.set_arg(0, KernelArg::Buffer(a)).unwrap();
    kernel.set_arg(1, KernelArg::Buffer(a)).unwrap();

    // Third argument missing.
    assert!(matches!(
        sim.run(&kernel, NdRange::new_1d(8, 4), None),
        Err(SimError::InvalidArgument { index: 2, .. })
    ));
    kernel.set_arg(2, KernelArg::Buffer(a)).unwrap();

    assert!(matches!(
        sim.run(&kernel, NdRange::new_1d(10, 4), None),
        Err(SimError::InvalidNdRange { .. })
    ));
    assert!(matches!(
        sim.run(&kernel, NdRange::new_1d(0, 1), None),
        Err(SimError::InvalidNdRange { .. })
    ));
    assert_eq!(
        sim.run(
            &kernel,
            NdRange::new_1d(2, 1).with_offset(Size3::new(usize::MAX, 0, 0)),
            None
        )
        .err(),
        Some(SimError::InvalidNdRange {
            reason: "global offset overflows"
        })
    );
    assert!(matches!(
        Kernel::new(&program, "missing"),
        Err(SimError::UnknownKernel { .. })
    ));
    assert!(matches!(
        kernel.set_arg(0, KernelArg::Local { size: 16 }),
        Err(SimError::InvalidArgument { index: 0, .. })
    ));
}
