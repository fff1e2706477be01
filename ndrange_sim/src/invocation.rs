// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! NDRange geometry, kernel argument binding, and the per-invocation driver.

use alloc::vec;
use alloc::vec::Vec;

use crate::address::Address;
use crate::builtins::BuiltinTable;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::memory::Memory;
use crate::observer::{EventMask, Notifier, Observer};
use crate::program::{FuncId, GlobalVar, Program};
use crate::types::{AddressSpace, Type};
use crate::value::TypedValue;
use crate::work_group::{GroupEnv, WorkGroup};
use crate::work_item::Size3;

/// Index space of one kernel invocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NdRange {
    /// Number of dimensions in use (1 to 3).
    pub work_dim: u32,
    /// Offset added to every global id.
    pub global_offset: Size3,
    /// Total work-items per dimension.
    pub global_size: Size3,
    /// Work-items per work-group per dimension.
    pub local_size: Size3,
}

impl NdRange {
    /// One-dimensional range of `global` work-items in groups of `local`.
    #[must_use]
    pub const fn new_1d(global: usize, local: usize) -> Self {
        Self {
            work_dim: 1,
            global_offset: Size3::new(0, 0, 0),
            global_size: Size3::new(global, 1, 1),
            local_size: Size3::new(local, 1, 1),
        }
    }

    /// Two-dimensional range.
    #[must_use]
    pub const fn new_2d(global: [usize; 2], local: [usize; 2]) -> Self {
        Self {
            work_dim: 2,
            global_offset: Size3::new(0, 0, 0),
            global_size: Size3::new(global[0], global[1], 1),
            local_size: Size3::new(local[0], local[1], 1),
        }
    }

    /// Three-dimensional range.
    #[must_use]
    pub const fn new_3d(global: [usize; 3], local: [usize; 3]) -> Self {
        Self {
            work_dim: 3,
            global_offset: Size3::new(0, 0, 0),
            global_size: Size3::new(global[0], global[1], global[2]),
            local_size: Size3::new(local[0], local[1], local[2]),
        }
    }

    /// Sets the global work offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: Size3) -> Self {
        self.global_offset = offset;
        self
    }

    /// Checks dimension count, sizes, and that every local size divides its global size.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(1..=3).contains(&self.work_dim) {
            return Err(SimError::InvalidNdRange {
                reason: "work_dim must be 1, 2, or 3",
            });
        }
        for dim in 0..3 {
            let global = self.global_size.get(dim).unwrap_or(0);
            let local = self.local_size.get(dim).unwrap_or(0);
            if global == 0 || local == 0 {
                return Err(SimError::InvalidNdRange {
                    reason: "sizes must be non-zero",
                });
            }
            if global % local != 0 {
                return Err(SimError::InvalidNdRange {
                    reason: "local size does not divide global size",
                });
            }
            let offset = self.global_offset.get(dim).unwrap_or(0);
            if offset.checked_add(global).is_none() {
                return Err(SimError::InvalidNdRange {
                    reason: "global offset overflows",
                });
            }
        }
        if self.global_size.volume().is_none() {
            return Err(SimError::InvalidNdRange {
                reason: "global size overflows",
            });
        }
        Ok(())
    }

    /// Work-groups per dimension. Only meaningful after [`validate`](Self::validate).
    #[must_use]
    pub fn num_groups(&self) -> Size3 {
        let g = self.global_size;
        let l = self.local_size;
        Size3::new(
            g.x.checked_div(l.x).unwrap_or(0),
            g.y.checked_div(l.y).unwrap_or(0),
            g.z.checked_div(l.z).unwrap_or(0),
        )
    }

    /// Total work-items.
    #[must_use]
    pub fn work_items(&self) -> usize {
        self.global_size.volume().unwrap_or(0)
    }
}

/// A value bound to a kernel parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelArg {
    /// A global or constant buffer.
    Buffer(Address),
    /// A local-memory buffer of `size` bytes, allocated per work-group.
    Local {
        /// Size in bytes.
        size: u64,
    },
    /// A by-value scalar, vector, or struct.
    Value(TypedValue),
}

/// A kernel entry point with its argument bindings.
#[derive(Clone, Debug)]
pub struct Kernel<'p> {
    program: &'p Program,
    func: FuncId,
    args: Vec<Option<KernelArg>>,
}

impl<'p> Kernel<'p> {
    /// Looks up the kernel `name` in `program`.
    pub fn new(program: &'p Program, name: &str) -> Result<Self, SimError> {
        let func = program
            .function_by_name(name)
            .filter(|id| program.function(*id).is_some_and(|f| f.is_kernel))
            .ok_or_else(|| SimError::UnknownKernel { name: name.into() })?;
        let params = program.function(func).map_or(0, |f| f.params.len());
        Ok(Self {
            program,
            func,
            args: vec![None; params],
        })
    }

    /// Kernel name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.program.function(self.func).map_or("", |f| &f.name)
    }

    /// The program the kernel belongs to.
    #[must_use]
    pub fn program(&self) -> &'p Program {
        self.program
    }

    /// Number of parameters.
    #[must_use]
    pub fn num_args(&self) -> usize {
        self.args.len()
    }

    /// Binds argument `index`.
    ///
    /// Pointer parameters accept [`KernelArg::Buffer`] (global and constant pointers) or
    /// [`KernelArg::Local`] (local pointers); other parameters accept a [`KernelArg::Value`] of
    /// the parameter's byte size.
    pub fn set_arg(&mut self, index: usize, arg: KernelArg) -> Result<(), SimError> {
        let ty = self
            .program
            .function(self.func)
            .and_then(|f| f.params.get(index))
            .map(|p| &p.ty)
            .ok_or(SimError::InvalidArgument {
                index,
                reason: "no such parameter",
            })?;
        check_arg(ty, &arg).map_err(|reason| SimError::InvalidArgument { index, reason })?;
        if let Some(slot) = self.args.get_mut(index) {
            *slot = Some(arg);
        }
        Ok(())
    }

    /// Total bytes of local memory requested through [`KernelArg::Local`] arguments.
    #[must_use]
    pub fn local_memory_size(&self) -> u64 {
        self.args
            .iter()
            .map(|a| match a {
                Some(KernelArg::Local { size }) => *size,
                _ => 0,
            })
            .sum()
    }

    fn bound_args(&self) -> Result<Vec<KernelArg>, SimError> {
        self.args
            .iter()
            .enumerate()
            .map(|(index, arg)| {
                arg.clone().ok_or(SimError::InvalidArgument {
                    index,
                    reason: "argument not set",
                })
            })
            .collect()
    }
}

fn check_arg(ty: &Type, arg: &KernelArg) -> Result<(), &'static str> {
    match (ty, arg) {
        (Type::Ptr { space, .. }, KernelArg::Buffer(address)) => {
            if *space == AddressSpace::Local || *space == AddressSpace::Private {
                Err("buffer bound to a non-global pointer")
            } else if !address.is_null()
                && !matches!(address.space(), AddressSpace::Global | AddressSpace::Constant)
            {
                Err("buffer is not in global memory")
            } else {
                Ok(())
            }
        }
        (Type::Ptr { space, .. }, KernelArg::Local { size }) => {
            if *space != AddressSpace::Local {
                Err("local size bound to a non-local pointer")
            } else if *size == 0 {
                Err("local buffer size must be non-zero")
            } else {
                Ok(())
            }
        }
        (Type::Ptr { .. }, KernelArg::Value(_)) => Err("value bound to a pointer parameter"),
        (_, KernelArg::Value(value)) => {
            if value.len() == ty.shape().bytes() {
                Ok(())
            } else {
                Err("value size does not match the parameter")
            }
        }
        _ => Err("buffer bound to a by-value parameter"),
    }
}

/// Totals for one kernel invocation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Work-groups executed.
    pub groups: usize,
    /// Work-items executed.
    pub work_items: usize,
    /// Instructions executed across all work-items.
    pub instructions: u64,
    /// Diagnostics reported.
    pub diagnostics: u64,
}

/// Allocates and initializes one program-scope variable in `memory`.
pub(crate) fn materialize_global(
    memory: &mut Memory,
    space: AddressSpace,
    var: &GlobalVar,
) -> Result<Address, SimError> {
    let size = var.ty.size().max(1);
    let address = memory.allocate_in(space, size as u64)?;
    if let Some(init) = &var.init {
        let n = init.len().min(size);
        memory.store(address, &init[..n])?;
    }
    Ok(address)
}

/// Runs `kernel` over `ndrange`, allocating program globals in `global` for the duration.
pub(crate) fn run(
    kernel: &Kernel<'_>,
    ndrange: &NdRange,
    global: &mut Memory,
    builtins: &BuiltinTable,
    config: &SimConfig,
    observer: Option<&mut dyn Observer>,
) -> Result<RunSummary, SimError> {
    ndrange.validate()?;
    let args = kernel.bound_args()?;
    let name = kernel.name();
    let mut notify = Notifier::new(observer);
    tracing::debug!(kernel = name, work_items = ndrange.work_items(), "kernel begin");
    if let Some(o) = notify.wants(EventMask::KERNEL) {
        o.kernel_begin(name, ndrange);
    }

    let mut globals = Vec::with_capacity(kernel.program.globals.len());
    let mut summary = RunSummary::default();
    let env = GroupEnv {
        program: kernel.program,
        builtins,
        config,
        ndrange,
    };
    let result = run_groups(
        &env,
        kernel.func,
        &args,
        global,
        &mut globals,
        &mut notify,
        &mut summary,
    );

    for address in globals.into_iter().flatten() {
        if global.free(address).is_ok() {
            notify.freed(address.space(), address);
        }
    }
    summary.diagnostics = notify.diagnostic_count();
    tracing::debug!(
        kernel = name,
        instructions = summary.instructions,
        diagnostics = summary.diagnostics,
        ok = result.is_ok(),
        "kernel end"
    );
    if let Some(o) = notify.wants(EventMask::KERNEL) {
        o.kernel_end(name, &summary);
    }
    result.map(|()| summary)
}

fn run_groups(
    env: &GroupEnv<'_>,
    kernel: FuncId,
    args: &[KernelArg],
    global: &mut Memory,
    globals: &mut Vec<Option<Address>>,
    notify: &mut Notifier<'_>,
    summary: &mut RunSummary,
) -> Result<(), SimError> {
    for var in &env.program.globals {
        let slot = match var.space {
            AddressSpace::Global | AddressSpace::Constant => {
                let address = materialize_global(global, var.space, var)?;
                notify.allocated(var.space, address, var.ty.size() as u64);
                Some(address)
            }
            AddressSpace::Local | AddressSpace::Private => None,
        };
        globals.push(slot);
    }
    for group_id in group_order(env.ndrange.num_groups(), env.config.quick_mode) {
        let mut group = WorkGroup::new(env, kernel, group_id, args, globals, notify)?;
        summary.instructions += group.run(env, global, notify)?;
        summary.groups += 1;
        summary.work_items += env.ndrange.local_size.volume().unwrap_or(0);
    }
    Ok(())
}

/// Group ids in z, y, x order; only the first and last in quick mode.
fn group_order(groups: Size3, quick: bool) -> Vec<Size3> {
    let mut order = Vec::new();
    for z in 0..groups.z {
        for y in 0..groups.y {
            for x in 0..groups.x {
                order.push(Size3::new(x, y, z));
            }
        }
    }
    if quick && order.len() > 2 {
        let last = order.len() - 1;
        order.swap(1, last);
        order.truncate(2);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{FunctionBuilder, ProgramBuilder};

    #[test]
    fn validate_rejects_bad_geometry() {
        assert!(NdRange::new_1d(8, 4).validate().is_ok());
        assert_eq!(
            NdRange::new_1d(10, 4).validate(),
            Err(SimError::InvalidNdRange {
                reason: "local size does not divide global size"
            })
        );
        assert!(NdRange::new_2d([4, 0], [1, 1]).validate().is_err());
        let mut bad = NdRange::new_1d(4, 4);
        bad.work_dim = 4;
        assert!(bad.validate().is_err());
        assert_eq!(
            NdRange::new_1d(2, 1)
                .with_offset(Size3::new(usize::MAX, 0, 0))
                .validate(),
            Err(SimError::InvalidNdRange {
                reason: "global offset overflows"
            })
        );
        assert!(
            NdRange::new_1d(2, 1)
                .with_offset(Size3::new(usize::MAX - 2, 0, 0))
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn geometry() {
        let nd = NdRange::new_3d([8, 6, 4], [2, 3, 4]);
        assert_eq!(nd.num_groups(), Size3::new(4, 2, 1));
        assert_eq!(nd.work_items(), 192);
    }

    #[test]
    fn quick_mode_keeps_first_and_last() {
        let order = group_order(Size3::new(3, 2, 1), true);
        assert_eq!(order, [Size3::new(0, 0, 0), Size3::new(2, 1, 0)]);
        assert_eq!(group_order(Size3::new(3, 2, 1), false).len(), 6);
        assert_eq!(group_order(Size3::new(1, 1, 1), true).len(), 1);
    }

    #[test]
    fn arguments_are_checked_against_parameters() {
        let mut f = FunctionBuilder::kernel(
            "k",
            [
                Type::ptr(AddressSpace::Global, Type::Float),
                Type::ptr(AddressSpace::Local, Type::Float),
                Type::I32,
            ],
        );
        f.ret_void();
        let mut p = ProgramBuilder::new();
        p.add_function(f).unwrap();
        let program = p.finish().unwrap();

        assert!(matches!(
            Kernel::new(&program, "missing"),
            Err(SimError::UnknownKernel { .. })
        ));
        let mut k = Kernel::new(&program, "k").unwrap();
        assert_eq!(k.num_args(), 3);
        let buf = Address::new(AddressSpace::Global, 1, 0);
        assert!(k.set_arg(0, KernelArg::Buffer(buf)).is_ok());
        assert!(k.set_arg(1, KernelArg::Buffer(buf)).is_err());
        assert!(k.set_arg(1, KernelArg::Local { size: 64 }).is_ok());
        assert!(k.set_arg(2, KernelArg::Value(TypedValue::from_u64(1))).is_err());
        assert!(k.bound_args().is_err(), "argument 2 still unset");
        assert!(k.set_arg(2, KernelArg::Value(TypedValue::from_i32(1))).is_ok());
        assert!(k.set_arg(3, KernelArg::Local { size: 4 }).is_err());
        assert_eq!(k.local_memory_size(), 64);
        assert_eq!(k.bound_args().unwrap().len(), 3);
    }
}
