// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative work-group scheduler.
//!
//! All work-items of a group share one local memory. The scheduler runs every ready work-item
//! until it finishes or parks at a barrier; once nobody is ready, it checks that the parked
//! work-items agree on the barrier, completes the async copies they waited for, and releases them.
//!
//! Async copies are recorded when the first work-item issues them and performed lazily when a
//! `wait_group_events` (or the end of the group) names their event. Later work-items issuing the
//! same copy are matched against the recorded parameters.

use alloc::vec::Vec;
use core::fmt;
use core::ops::BitOr;

use hashbrown::HashSet;

use crate::address::{Address, MAX_OFFSET};
use crate::builtins::BuiltinTable;
use crate::config::SimConfig;
use crate::error::{AccessKind, Diagnostic, SimError};
use crate::invocation::{KernelArg, NdRange, materialize_global};
use crate::memory::{Memory, MemoryError};
use crate::observer::{EventMask, Notifier};
use crate::program::{FuncId, Program};
use crate::types::AddressSpace;
use crate::value::TypedValue;
use crate::work_item::{Exec, ItemIds, Location, Size3, WorkItem, WorkItemState};

/// Memory fence flags passed to `barrier`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FenceFlags(u32);

impl FenceFlags {
    /// No fence.
    pub const NONE: Self = Self(0);
    /// `CLK_LOCAL_MEM_FENCE`.
    pub const LOCAL: Self = Self(1);
    /// `CLK_GLOBAL_MEM_FENCE`.
    pub const GLOBAL: Self = Self(2);

    /// Flags from their raw encoding.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw encoding.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every flag of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FenceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for FenceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.contains(Self::LOCAL), self.contains(Self::GLOBAL)) {
            (true, true) => f.write_str("local|global"),
            (true, false) => f.write_str("local"),
            (false, true) => f.write_str("global"),
            (false, false) => f.write_str("none"),
        }
    }
}

/// Parameters of one `async_work_group_(strided_)copy` call.
///
/// Strides are in elements.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct CopyRequest {
    pub(crate) location: Location,
    pub(crate) dst: Address,
    pub(crate) src: Address,
    pub(crate) elem_size: u64,
    pub(crate) num: u64,
    pub(crate) src_stride: u64,
    pub(crate) dst_stride: u64,
    /// Event passed in by the caller, 0 for none.
    pub(crate) event: u64,
}

impl CopyRequest {
    /// First parameter that differs from `other`.
    fn diverges_from(&self, other: &Self) -> Option<&'static str> {
        if self.location != other.location {
            Some("location")
        } else if self.dst != other.dst {
            Some("destination")
        } else if self.src != other.src {
            Some("source")
        } else if self.elem_size != other.elem_size {
            Some("element size")
        } else if self.num != other.num {
            Some("element count")
        } else if self.src_stride != other.src_stride {
            Some("source stride")
        } else if self.dst_stride != other.dst_stride {
            Some("destination stride")
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct AsyncCopy {
    request: CopyRequest,
    event: u64,
    registered: HashSet<usize>,
}

/// State shared by every work-item of one group.
#[derive(Debug)]
pub(crate) struct GroupShared {
    pub(crate) group_id: Size3,
    pub(crate) group_size: Size3,
    pub(crate) local: Memory,
    copies: Vec<AsyncCopy>,
    next_event: u64,
}

impl GroupShared {
    pub(crate) fn new(group_id: Size3, group_size: Size3) -> Self {
        Self {
            group_id,
            group_size,
            local: Memory::new(AddressSpace::Local),
            copies: Vec::new(),
            next_event: 1,
        }
    }

    /// Matches `request` against the copies already issued, or records a new one.
    ///
    /// Returns the copy's event and, if this work-item's parameters differ from the recorded
    /// ones, the name of the first differing parameter.
    pub(crate) fn register_copy(
        &mut self,
        item: usize,
        request: CopyRequest,
    ) -> (u64, Option<&'static str>) {
        if let Some(copy) = self
            .copies
            .iter_mut()
            .find(|c| !c.registered.contains(&item))
        {
            copy.registered.insert(item);
            return (copy.event, copy.request.diverges_from(&request));
        }
        let event = if request.event != 0 {
            request.event
        } else {
            let event = self.next_event;
            self.next_event += 1;
            event
        };
        let mut registered = HashSet::new();
        registered.insert(item);
        self.copies.push(AsyncCopy {
            request,
            event,
            registered,
        });
        (event, None)
    }

    /// Returns `true` if some outstanding copy carries `event`.
    pub(crate) fn has_event(&self, event: u64) -> bool {
        self.copies.iter().any(|c| c.event == event)
    }

    /// Number of copies not yet performed.
    pub(crate) fn pending_copies(&self) -> usize {
        self.copies.len()
    }

    /// Performs every outstanding copy whose event is in `events`.
    pub(crate) fn complete_events(
        &mut self,
        events: &[u64],
        global: &mut Memory,
        notify: &mut Notifier<'_>,
        total: usize,
    ) {
        let (done, pending): (Vec<_>, Vec<_>) = core::mem::take(&mut self.copies)
            .into_iter()
            .partition(|c| events.contains(&c.event));
        self.copies = pending;
        for copy in done {
            self.perform(&copy, global, notify, total);
        }
    }

    /// Performs all outstanding copies, reporting that nobody waited for them.
    pub(crate) fn complete_all(
        &mut self,
        global: &mut Memory,
        notify: &mut Notifier<'_>,
        total: usize,
    ) {
        if self.copies.is_empty() {
            return;
        }
        notify.diagnostic(
            None,
            &Diagnostic::UnwaitedEvents {
                count: self.copies.len(),
            },
        );
        for copy in core::mem::take(&mut self.copies) {
            self.perform(&copy, global, notify, total);
        }
    }

    fn perform(&mut self, copy: &AsyncCopy, global: &mut Memory, notify: &mut Notifier<'_>, total: usize) {
        if copy.registered.len() != total {
            notify.diagnostic(
                None,
                &Diagnostic::AsyncCopyDivergence {
                    field: "participating work-items",
                },
            );
        }
        let req = &copy.request;
        tracing::trace!(event = copy.event, num = req.num, "async copy");
        for k in 0..req.num {
            let (Some(src), Some(dst)) = (
                element(req.src, k, req.src_stride, req.elem_size),
                element(req.dst, k, req.dst_stride, req.elem_size),
            ) else {
                notify.diagnostic(
                    None,
                    &Diagnostic::InvalidAccess {
                        kind: AccessKind::Copy,
                        error: MemoryError::OutOfBounds {
                            address: req.src,
                            size: req.elem_size,
                        },
                    },
                );
                continue;
            };
            let loaded = memory_for(&mut self.local, global, src.space()).load(src, req.elem_size);
            let bytes = match loaded {
                Ok(bytes) => bytes,
                Err(error) => {
                    notify.diagnostic(
                        None,
                        &Diagnostic::InvalidAccess {
                            kind: AccessKind::Copy,
                            error,
                        },
                    );
                    continue;
                }
            };
            notify.load(None, src, req.elem_size);
            match memory_for(&mut self.local, global, dst.space()).store(dst, &bytes) {
                Ok(()) => notify.store(None, dst, &bytes),
                Err(error) => notify.diagnostic(
                    None,
                    &Diagnostic::InvalidAccess {
                        kind: AccessKind::Copy,
                        error,
                    },
                ),
            }
        }
    }
}

fn global_coordinate(
    group: usize,
    size: usize,
    local: usize,
    offset: usize,
) -> Result<usize, SimError> {
    group
        .checked_mul(size)
        .and_then(|base| base.checked_add(local))
        .and_then(|id| id.checked_add(offset))
        .ok_or(SimError::InvalidNdRange {
            reason: "global offset overflows",
        })
}

/// Address of element `k` of a strided copy, or `None` when the byte offset overflows.
fn element(base: Address, k: u64, stride: u64, elem_size: u64) -> Option<Address> {
    let delta = k.checked_mul(stride)?.checked_mul(elem_size)?;
    let offset = base.offset().checked_add(delta)?;
    (offset <= MAX_OFFSET).then(|| Address::new(base.space(), base.buffer(), offset))
}

fn memory_for<'m>(local: &'m mut Memory, global: &'m mut Memory, space: AddressSpace) -> &'m mut Memory {
    if space == AddressSpace::Local {
        local
    } else {
        global
    }
}

/// Host-side references a work-group executes against.
#[derive(Debug)]
pub(crate) struct GroupEnv<'a> {
    pub(crate) program: &'a Program,
    pub(crate) builtins: &'a BuiltinTable,
    pub(crate) config: &'a SimConfig,
    pub(crate) ndrange: &'a NdRange,
}

/// One work-group: its shared state and its work-items.
#[derive(Debug)]
pub(crate) struct WorkGroup {
    shared: GroupShared,
    items: Vec<WorkItem>,
}

impl WorkGroup {
    /// Allocates local memory and creates the group's work-items.
    ///
    /// `globals` holds the addresses of program-scope variables in global or constant memory;
    /// local ones are allocated here, private ones by each work-item.
    pub(crate) fn new(
        env: &GroupEnv<'_>,
        kernel: FuncId,
        group_id: Size3,
        args: &[KernelArg],
        globals: &[Option<Address>],
        notify: &mut Notifier<'_>,
    ) -> Result<Self, SimError> {
        let ndrange = env.ndrange;
        let local_size = ndrange.local_size;
        let mut shared = GroupShared::new(group_id, local_size);

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(match arg {
                KernelArg::Buffer(address) => TypedValue::from_address(*address),
                KernelArg::Value(value) => value.clone(),
                KernelArg::Local { size } => {
                    let address = shared.local.allocate(*size)?;
                    notify.allocated(AddressSpace::Local, address, *size);
                    TypedValue::from_address(address)
                }
            });
        }

        let mut globals = globals.to_vec();
        for (slot, var) in globals.iter_mut().zip(&env.program.globals) {
            if var.space == AddressSpace::Local {
                *slot = Some(materialize_global(
                    &mut shared.local,
                    AddressSpace::Local,
                    var,
                )?);
            }
        }

        let count = local_size.volume().unwrap_or(0);
        let mut items = Vec::with_capacity(count);
        for z in 0..local_size.z {
            for y in 0..local_size.y {
                for x in 0..local_size.x {
                    let local_id = Size3::new(x, y, z);
                    let global_id = Size3::new(
                        global_coordinate(group_id.x, local_size.x, x, ndrange.global_offset.x)?,
                        global_coordinate(group_id.y, local_size.y, y, ndrange.global_offset.y)?,
                        global_coordinate(group_id.z, local_size.z, z, ndrange.global_offset.z)?,
                    );
                    let ids = ItemIds {
                        global_id,
                        local_id,
                        group_id,
                    };
                    items.push(WorkItem::new(
                        ids,
                        items.len(),
                        env.program,
                        kernel,
                        values.clone(),
                        &globals,
                    )?);
                }
            }
        }
        Ok(Self { shared, items })
    }

    /// Runs the group to completion and returns the number of instructions executed.
    pub(crate) fn run(
        &mut self,
        env: &GroupEnv<'_>,
        global: &mut Memory,
        notify: &mut Notifier<'_>,
    ) -> Result<u64, SimError> {
        let group_id = self.shared.group_id;
        let _span = tracing::debug_span!("work_group", group = %group_id).entered();
        if let Some(o) = notify.wants(EventMask::WORK_GROUP) {
            o.work_group_begin(group_id);
        }
        if let Some(o) = notify.wants(EventMask::WORK_ITEM) {
            for item in &self.items {
                o.work_item_begin(item.ids());
            }
        }

        let total = self.items.len();
        loop {
            let mut exec = Exec {
                program: env.program,
                builtins: env.builtins,
                config: env.config,
                ndrange: env.ndrange,
                global: &mut *global,
                group: &mut self.shared,
                notify: &mut *notify,
            };
            for item in &mut self.items {
                item.run(&mut exec)?;
            }

            let mut waiting = self
                .items
                .iter()
                .filter(|i| i.state() == WorkItemState::Barrier);
            let Some(first) = waiting.next() else {
                break;
            };
            let Some(request) = first.barrier().cloned() else {
                break;
            };
            let mut count = 1;
            for item in waiting {
                count += 1;
                let Some(other) = item.barrier() else {
                    continue;
                };
                let reason = if other.location != request.location {
                    Some("work-items reached different barriers")
                } else if other.fence != request.fence {
                    Some("fence flags differ")
                } else if other.events != request.events {
                    Some("events differ")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    return Err(SimError::DivergentBarrier {
                        group: group_id,
                        reason,
                    });
                }
            }
            if count < total {
                notify.diagnostic(
                    None,
                    &Diagnostic::PartialBarrier {
                        waiting: count,
                        total,
                    },
                );
            }

            self.shared
                .complete_events(&request.events, global, notify, total);
            tracing::debug!(fence = %request.fence, waiting = count, "barrier released");
            if let Some(o) = notify.wants(EventMask::BARRIER) {
                o.work_group_barrier(group_id, request.fence);
            }
            for item in &mut self.items {
                item.release();
            }
        }

        self.shared.complete_all(global, notify, total);
        if let Some(o) = notify.wants(EventMask::WORK_GROUP) {
            o.work_group_end(group_id);
        }
        Ok(self.items.iter().map(WorkItem::steps).sum())
    }
}
