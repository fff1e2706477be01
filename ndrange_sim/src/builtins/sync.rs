// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Barriers, fences, and asynchronous work-group copies.

use alloc::vec::Vec;

use super::{Aux, BuiltinCall, BuiltinTable, noop};
use crate::error::{AccessKind, Diagnostic, SimError};
use crate::memory::MemoryError;
use crate::types::AddressSpace;
use crate::value::TypedValue;
use crate::work_group::{CopyRequest, FenceFlags};
use crate::work_item::Ctx;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add("barrier", barrier, Aux::None);
    table.add("work_group_barrier", barrier, Aux::None);
    table.add("mem_fence", noop, Aux::None);
    table.add("read_mem_fence", noop, Aux::None);
    table.add("write_mem_fence", noop, Aux::None);
    table.add("prefetch", noop, Aux::None);
    table.add("async_work_group_copy", async_copy, Aux::None);
    table.add("async_work_group_strided_copy", async_copy, Aux::None);
    table.add("wait_group_events", wait_group_events, Aux::None);
}

fn barrier(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    _: &mut TypedValue,
) -> Result<(), SimError> {
    let flags = FenceFlags::from_bits(call.u(0, 0) as u32);
    ctx.suspend(flags, Vec::new());
    Ok(())
}

/// `(dst, src, num_elements, [stride,] event)`; the copy itself happens when the group waits.
fn async_copy(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let dst = call.ptr(0)?;
    let src = call.ptr(1)?;
    let elem_size = call.pointee(0).map_or(1, |ty| ty.size() as u64);
    let num = call.u(2, 0);
    let strided = call.args.len() == 5;
    let stride = if strided { call.u(3, 0) } else { 1 };
    let event = call.u(if strided { 4 } else { 3 }, 0);
    let to_local = call.params.first().and_then(|p| p.ty.address_space()) == Some(AddressSpace::Local);
    let (src_stride, dst_stride) = if to_local { (stride, 1) } else { (1, stride) };
    let location = ctx.location();
    let id = ctx.register_copy(CopyRequest {
        location,
        dst,
        src,
        elem_size,
        num,
        src_stride,
        dst_stride,
        event,
    });
    out.set_u(0, id);
    Ok(())
}

/// `(num_events, event_list)`: parks the item until the whole group has waited.
fn wait_group_events(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    _: &mut TypedValue,
) -> Result<(), SimError> {
    let num = call.u(0, 0);
    let list = call.ptr(1)?;
    let mut events = Vec::new();
    for i in 0..num {
        let Some(delta) = i.checked_mul(8).and_then(|d| i64::try_from(d).ok()) else {
            ctx.diagnostic(Diagnostic::InvalidAccess {
                kind: AccessKind::Load,
                error: MemoryError::OutOfBounds {
                    address: list,
                    size: num.saturating_mul(8),
                },
            });
            break;
        };
        // A failed load has already been reported; the rest of the list is unreadable too.
        let Some(bytes) = ctx.load(list.offset_by(delta), 8, 8) else {
            break;
        };
        let mut raw = [0_u8; 8];
        raw.copy_from_slice(&bytes);
        let event = u64::from_le_bytes(raw);
        if !ctx.has_event(event) {
            ctx.diagnostic(Diagnostic::InvalidWaitEvent { event });
        }
        events.push(event);
    }
    ctx.suspend(FenceFlags::LOCAL | FenceFlags::GLOBAL, events);
    Ok(())
}
