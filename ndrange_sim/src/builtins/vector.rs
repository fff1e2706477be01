// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vector data loads, stores, and shuffles.
//!
//! `vloadN`/`vstoreN` address memory in units of whole vectors, where a 3-lane vector counts as
//! three elements. The `vloada_half`/`vstorea_half` forms instead count a 3-lane vector as four.

use super::{Aux, BuiltinCall, BuiltinTable};
use crate::error::SimError;
use crate::half::{RoundingMode, double_to_half, half_to_float};
use crate::value::TypedValue;
use crate::work_item::Ctx;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add_prefix("vload", vload, Aux::None);
    table.add_prefix("vstore", vstore, Aux::None);
    table.add_prefix("vload_half", vload_half, Aux::None);
    table.add_prefix("vloada_half", vload_half, Aux::None);
    table.add_prefix("vstore_half", vstore_half, Aux::None);
    table.add_prefix("vstorea_half", vstore_half, Aux::None);
    table.add("shuffle", shuffle, Aux::None);
    table.add("shuffle2", shuffle2, Aux::None);
}

fn vload(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let size = out.len() as u64;
    let offset = call.u(0, 0);
    let address = call.ptr(1)?.offset_by(offset.wrapping_mul(size) as i64);
    if let Some(bytes) = ctx.load(address, size, out.lane_size() as u64) {
        out.bytes_mut().copy_from_slice(&bytes);
    }
    Ok(())
}

fn vstore(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    _: &mut TypedValue,
) -> Result<(), SimError> {
    let value = call.arg(0)?;
    let size = value.len() as u64;
    let offset = call.u(1, 0);
    let address = call.ptr(2)?.offset_by(offset.wrapping_mul(size) as i64);
    ctx.store(address, value.bytes(), value.lane_size() as u64);
    Ok(())
}

/// Halves between consecutive vectors for the `_half` forms.
fn half_stride(name: &str, lanes: usize) -> u64 {
    if name.starts_with("vloada") || name.starts_with("vstorea") {
        if lanes == 3 { 4 } else { lanes as u64 }
    } else {
        lanes as u64
    }
}

fn vload_half(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let lanes = out.lanes();
    let offset = call.u(0, 0);
    let stride = 2 * half_stride(call.name, lanes);
    let address = call.ptr(1)?.offset_by(offset.wrapping_mul(stride) as i64);
    if let Some(bytes) = ctx.load(address, 2 * lanes as u64, 2) {
        for (i, half) in bytes.chunks_exact(2).enumerate() {
            let h = u16::from_le_bytes([half[0], half[1]]);
            out.set_f(i, f64::from(half_to_float(h)));
        }
    }
    Ok(())
}

fn vstore_half(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    _: &mut TypedValue,
) -> Result<(), SimError> {
    let mode = call
        .name
        .rsplit_once('_')
        .and_then(|(_, suffix)| RoundingMode::from_suffix(suffix))
        .unwrap_or_default();
    let value = call.arg(0)?;
    let lanes = value.lanes();
    let mut bytes = alloc::vec::Vec::with_capacity(2 * lanes);
    for i in 0..lanes {
        bytes.extend_from_slice(&double_to_half(value.get_f(i), mode).to_le_bytes());
    }
    let offset = call.u(1, 0);
    let stride = 2 * half_stride(call.name, lanes);
    let address = call.ptr(2)?.offset_by(offset.wrapping_mul(stride) as i64);
    ctx.store(address, &bytes, 2);
    Ok(())
}

fn shuffle(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let src = call.arg(0)?;
    let n = src.lanes().max(1) as u64;
    for i in 0..out.lanes() {
        let j = (call.u(1, i) % n) as usize;
        out.copy_lane(i, src, j);
    }
    Ok(())
}

fn shuffle2(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let (a, b) = (call.arg(0)?, call.arg(1)?);
    let m = a.lanes().max(1) as u64;
    for i in 0..out.lanes() {
        let j = call.u(2, i) % (2 * m);
        if j < m {
            out.copy_lane(i, a, j as usize);
        } else {
            out.copy_lane(i, b, (j - m) as usize);
        }
    }
    Ok(())
}
