// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Execution observers.
//!
//! An [`Observer`] receives fire-and-forget notifications about kernel execution. Hooks cannot
//! alter control flow. [`Observer::mask`] selects which categories are delivered so the engine can
//! skip building events nobody listens to.

use core::ops::BitOr;

use crate::address::Address;
use crate::error::Diagnostic;
use crate::invocation::{NdRange, RunSummary};
use crate::memory::AtomicOp;
use crate::program::Instr;
use crate::types::AddressSpace;
use crate::value::TypedValue;
use crate::work_group::FenceFlags;
use crate::work_item::{ItemIds, Size3};

/// Bitmask of observer event categories.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventMask(u32);

impl EventMask {
    /// No events.
    pub const NONE: Self = Self(0);
    /// Kernel begin/end.
    pub const KERNEL: Self = Self(1 << 0);
    /// Work-group begin/end.
    pub const WORK_GROUP: Self = Self(1 << 1);
    /// Work-item begin/end.
    pub const WORK_ITEM: Self = Self(1 << 2);
    /// Every executed instruction.
    pub const INSTRUCTION: Self = Self(1 << 3);
    /// Allocations, frees, loads, stores, atomics.
    pub const MEMORY: Self = Self(1 << 4);
    /// Barrier releases.
    pub const BARRIER: Self = Self(1 << 5);
    /// Diagnostics (the log channel).
    pub const DIAGNOSTIC: Self = Self(1 << 6);
    /// Kernel output (`printf`).
    pub const OUTPUT: Self = Self(1 << 7);
    /// Everything.
    pub const ALL: Self = Self(0xff);

    /// Returns `true` if every bit of `other` is set in `self`.
    #[must_use]
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits.
    #[must_use]
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Receives execution events. Every hook defaults to a no-op.
#[allow(unused_variables, reason = "default hook bodies ignore their arguments")]
pub trait Observer {
    /// Categories this observer wants.
    fn mask(&self) -> EventMask {
        EventMask::ALL
    }

    /// A kernel invocation is starting.
    fn kernel_begin(&mut self, kernel: &str, ndrange: &NdRange) {}

    /// A kernel invocation finished (successfully or not).
    fn kernel_end(&mut self, kernel: &str, summary: &RunSummary) {}

    /// A work-group is starting.
    fn work_group_begin(&mut self, group_id: Size3) {}

    /// A work-group finished.
    fn work_group_end(&mut self, group_id: Size3) {}

    /// A work-item is starting.
    fn work_item_begin(&mut self, ids: &ItemIds) {}

    /// A work-item returned from its kernel.
    fn work_item_end(&mut self, ids: &ItemIds) {}

    /// An instruction was executed; `result` is its value, if any.
    fn instruction_executed(&mut self, ids: &ItemIds, instr: &Instr, result: Option<&TypedValue>) {
    }

    /// Memory was allocated in `space`.
    fn memory_allocated(&mut self, space: AddressSpace, address: Address, size: u64) {}

    /// Memory was freed.
    fn memory_freed(&mut self, space: AddressSpace, address: Address) {}

    /// A load completed. `ids` is `None` for scheduler-initiated accesses (async copies).
    fn memory_load(&mut self, ids: Option<&ItemIds>, address: Address, size: u64) {}

    /// A store completed.
    fn memory_store(&mut self, ids: Option<&ItemIds>, address: Address, data: &[u8]) {}

    /// An atomic read-modify-write completed.
    fn memory_atomic(&mut self, ids: &ItemIds, op: AtomicOp, address: Address, size: u64) {}

    /// A barrier was released for a work-group.
    fn work_group_barrier(&mut self, group_id: Size3, fence: FenceFlags) {}

    /// A recoverable problem was detected.
    fn diagnostic(&mut self, ids: Option<&ItemIds>, diagnostic: &Diagnostic) {}

    /// The kernel produced output (`printf`).
    fn output(&mut self, text: &str) {}
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn mask(&self) -> EventMask {
        (**self).mask()
    }
    fn kernel_begin(&mut self, kernel: &str, ndrange: &NdRange) {
        (**self).kernel_begin(kernel, ndrange);
    }
    fn kernel_end(&mut self, kernel: &str, summary: &RunSummary) {
        (**self).kernel_end(kernel, summary);
    }
    fn work_group_begin(&mut self, group_id: Size3) {
        (**self).work_group_begin(group_id);
    }
    fn work_group_end(&mut self, group_id: Size3) {
        (**self).work_group_end(group_id);
    }
    fn work_item_begin(&mut self, ids: &ItemIds) {
        (**self).work_item_begin(ids);
    }
    fn work_item_end(&mut self, ids: &ItemIds) {
        (**self).work_item_end(ids);
    }
    fn instruction_executed(&mut self, ids: &ItemIds, instr: &Instr, result: Option<&TypedValue>) {
        (**self).instruction_executed(ids, instr, result);
    }
    fn memory_allocated(&mut self, space: AddressSpace, address: Address, size: u64) {
        (**self).memory_allocated(space, address, size);
    }
    fn memory_freed(&mut self, space: AddressSpace, address: Address) {
        (**self).memory_freed(space, address);
    }
    fn memory_load(&mut self, ids: Option<&ItemIds>, address: Address, size: u64) {
        (**self).memory_load(ids, address, size);
    }
    fn memory_store(&mut self, ids: Option<&ItemIds>, address: Address, data: &[u8]) {
        (**self).memory_store(ids, address, data);
    }
    fn memory_atomic(&mut self, ids: &ItemIds, op: AtomicOp, address: Address, size: u64) {
        (**self).memory_atomic(ids, op, address, size);
    }
    fn work_group_barrier(&mut self, group_id: Size3, fence: FenceFlags) {
        (**self).work_group_barrier(group_id, fence);
    }
    fn diagnostic(&mut self, ids: Option<&ItemIds>, diagnostic: &Diagnostic) {
        (**self).diagnostic(ids, diagnostic);
    }
    fn output(&mut self, text: &str) {
        (**self).output(text);
    }
}

/// Fans every event out to two observers.
impl<A: Observer, B: Observer> Observer for (A, B) {
    fn mask(&self) -> EventMask {
        self.0.mask() | self.1.mask()
    }
    fn kernel_begin(&mut self, kernel: &str, ndrange: &NdRange) {
        self.0.kernel_begin(kernel, ndrange);
        self.1.kernel_begin(kernel, ndrange);
    }
    fn kernel_end(&mut self, kernel: &str, summary: &RunSummary) {
        self.0.kernel_end(kernel, summary);
        self.1.kernel_end(kernel, summary);
    }
    fn work_group_begin(&mut self, group_id: Size3) {
        self.0.work_group_begin(group_id);
        self.1.work_group_begin(group_id);
    }
    fn work_group_end(&mut self, group_id: Size3) {
        self.0.work_group_end(group_id);
        self.1.work_group_end(group_id);
    }
    fn work_item_begin(&mut self, ids: &ItemIds) {
        self.0.work_item_begin(ids);
        self.1.work_item_begin(ids);
    }
    fn work_item_end(&mut self, ids: &ItemIds) {
        self.0.work_item_end(ids);
        self.1.work_item_end(ids);
    }
    fn instruction_executed(&mut self, ids: &ItemIds, instr: &Instr, result: Option<&TypedValue>) {
        self.0.instruction_executed(ids, instr, result);
        self.1.instruction_executed(ids, instr, result);
    }
    fn memory_allocated(&mut self, space: AddressSpace, address: Address, size: u64) {
        self.0.memory_allocated(space, address, size);
        self.1.memory_allocated(space, address, size);
    }
    fn memory_freed(&mut self, space: AddressSpace, address: Address) {
        self.0.memory_freed(space, address);
        self.1.memory_freed(space, address);
    }
    fn memory_load(&mut self, ids: Option<&ItemIds>, address: Address, size: u64) {
        self.0.memory_load(ids, address, size);
        self.1.memory_load(ids, address, size);
    }
    fn memory_store(&mut self, ids: Option<&ItemIds>, address: Address, data: &[u8]) {
        self.0.memory_store(ids, address, data);
        self.1.memory_store(ids, address, data);
    }
    fn memory_atomic(&mut self, ids: &ItemIds, op: AtomicOp, address: Address, size: u64) {
        self.0.memory_atomic(ids, op, address, size);
        self.1.memory_atomic(ids, op, address, size);
    }
    fn work_group_barrier(&mut self, group_id: Size3, fence: FenceFlags) {
        self.0.work_group_barrier(group_id, fence);
        self.1.work_group_barrier(group_id, fence);
    }
    fn diagnostic(&mut self, ids: Option<&ItemIds>, diagnostic: &Diagnostic) {
        self.0.diagnostic(ids, diagnostic);
        self.1.diagnostic(ids, diagnostic);
    }
    fn output(&mut self, text: &str) {
        self.0.output(text);
        self.1.output(text);
    }
}

/// Masked dispatch to an optional observer, plus `tracing` for diagnostics.
pub(crate) struct Notifier<'o> {
    sink: Option<&'o mut dyn Observer>,
    mask: EventMask,
    diagnostics: u64,
}

impl core::fmt::Debug for Notifier<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Notifier")
            .field("attached", &self.sink.is_some())
            .field("mask", &self.mask)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

impl<'o> Notifier<'o> {
    pub(crate) fn new(sink: Option<&'o mut dyn Observer>) -> Self {
        let mask = sink.as_ref().map_or(EventMask::NONE, |s| s.mask());
        Self {
            sink,
            mask,
            diagnostics: 0,
        }
    }

    /// Returns the observer if it wants `category`.
    #[inline]
    pub(crate) fn wants(&mut self, category: EventMask) -> Option<&mut (dyn Observer + 'o)> {
        if self.mask.contains(category) {
            self.sink.as_deref_mut()
        } else {
            None
        }
    }

    /// Number of diagnostics reported so far.
    pub(crate) fn diagnostic_count(&self) -> u64 {
        self.diagnostics
    }

    pub(crate) fn diagnostic(&mut self, ids: Option<&ItemIds>, diagnostic: &Diagnostic) {
        self.diagnostics += 1;
        match ids {
            Some(ids) => tracing::warn!(
                global_id = %ids.global_id,
                group_id = %ids.group_id,
                "{diagnostic}"
            ),
            None => tracing::warn!("{diagnostic}"),
        }
        if let Some(o) = self.wants(EventMask::DIAGNOSTIC) {
            o.diagnostic(ids, diagnostic);
        }
    }

    pub(crate) fn load(&mut self, ids: Option<&ItemIds>, address: Address, size: u64) {
        if let Some(o) = self.wants(EventMask::MEMORY) {
            o.memory_load(ids, address, size);
        }
    }

    pub(crate) fn store(&mut self, ids: Option<&ItemIds>, address: Address, data: &[u8]) {
        if let Some(o) = self.wants(EventMask::MEMORY) {
            o.memory_store(ids, address, data);
        }
    }

    pub(crate) fn allocated(&mut self, space: AddressSpace, address: Address, size: u64) {
        if let Some(o) = self.wants(EventMask::MEMORY) {
            o.memory_allocated(space, address, size);
        }
    }

    pub(crate) fn freed(&mut self, space: AddressSpace, address: Address) {
        if let Some(o) = self.wants(EventMask::MEMORY) {
            o.memory_freed(space, address);
        }
    }
}
