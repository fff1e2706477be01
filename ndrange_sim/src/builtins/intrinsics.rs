// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! LLVM intrinsics that survive into kernel code.

use super::math::unary;
use super::{Aux, BuiltinCall, BuiltinTable, noop};
use crate::error::SimError;
use crate::value::TypedValue;
use crate::work_item::Ctx;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add_prefix("llvm.bswap.", bswap, Aux::None);
    table.add_prefix("llvm.dbg.", noop, Aux::None);
    table.add_prefix("llvm.lifetime.", noop, Aux::None);
    table.add_prefix("llvm.fabs.", unary, Aux::F1(libm::fabs));
    table.add_prefix("llvm.memcpy.", memcpy, Aux::None);
    table.add_prefix("llvm.memmove.", memcpy, Aux::None);
    table.add_prefix("llvm.memset.", memset, Aux::None);
    table.add("llvm.trap", trap, Aux::None);
}

fn bswap(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let src = call.arg(0)?;
    for i in 0..out.lanes() {
        out.lane_bytes_mut(i).copy_from_slice(src.lane_bytes(i));
        out.lane_bytes_mut(i).reverse();
    }
    Ok(())
}

/// `(dst, src, len, ...)`. The source is read in full before writing, so overlap is safe.
fn memcpy(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    _: &mut TypedValue,
) -> Result<(), SimError> {
    ctx.copy(call.ptr(0)?, call.ptr(1)?, call.u(2, 0));
    Ok(())
}

/// `(dst, byte, len, ...)`.
fn memset(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    _: &mut TypedValue,
) -> Result<(), SimError> {
    ctx.fill(call.ptr(0)?, call.u(1, 0) as u8, call.u(2, 0));
    Ok(())
}

fn trap(
    ctx: &mut Ctx<'_, '_, '_>,
    _: &BuiltinCall<'_>,
    _: &mut TypedValue,
) -> Result<(), SimError> {
    Err(ctx.trap())
}
