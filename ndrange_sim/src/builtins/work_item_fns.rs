// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Work-item geometry queries (`get_global_id` and friends).

use super::{Aux, BuiltinCall, BuiltinTable, Query};
use crate::error::SimError;
use crate::value::TypedValue;
use crate::work_item::{Ctx, Size3};

pub(super) fn register(table: &mut BuiltinTable) {
    for (name, query) in [
        ("get_global_id", Query::GlobalId),
        ("get_global_size", Query::GlobalSize),
        ("get_global_offset", Query::GlobalOffset),
        ("get_group_id", Query::GroupId),
        ("get_local_id", Query::LocalId),
        ("get_local_size", Query::LocalSize),
        ("get_enqueued_local_size", Query::EnqueuedLocalSize),
        ("get_num_groups", Query::NumGroups),
    ] {
        table.add(name, query_dim, Aux::Query(query));
    }
    table.add("get_work_dim", work_dim, Aux::None);
    table.add("get_global_linear_id", global_linear_id, Aux::None);
    table.add("get_local_linear_id", local_linear_id, Aux::None);
}

/// Per-dimension query; dimensions past the third report 0.
fn query_dim(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let Aux::Query(query) = call.aux else {
        return Err(call.unsupported());
    };
    let size: Size3 = match query {
        Query::GlobalId => ctx.ids().global_id,
        Query::GlobalSize => ctx.ndrange().global_size,
        Query::GlobalOffset => ctx.ndrange().global_offset,
        Query::GroupId => ctx.ids().group_id,
        Query::LocalId => ctx.ids().local_id,
        Query::LocalSize => ctx.group_size(),
        Query::EnqueuedLocalSize => ctx.ndrange().local_size,
        Query::NumGroups => ctx.ndrange().num_groups(),
    };
    let value = size.get(call.u(0, 0)).unwrap_or(0);
    out.set_u(0, value as u64);
    Ok(())
}

fn work_dim(
    ctx: &mut Ctx<'_, '_, '_>,
    _: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    out.set_u(0, u64::from(ctx.ndrange().work_dim));
    Ok(())
}

fn global_linear_id(
    ctx: &mut Ctx<'_, '_, '_>,
    _: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let id = ctx.ids().global_id;
    let offset = ctx.ndrange().global_offset;
    let relative = Size3::new(
        id.x.wrapping_sub(offset.x),
        id.y.wrapping_sub(offset.y),
        id.z.wrapping_sub(offset.z),
    );
    out.set_u(0, relative.linear_in(ctx.ndrange().global_size) as u64);
    Ok(())
}

fn local_linear_id(
    ctx: &mut Ctx<'_, '_, '_>,
    _: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let id = ctx.ids().local_id;
    out.set_u(0, id.linear_in(ctx.group_size()) as u64);
    Ok(())
}
