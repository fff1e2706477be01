// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `atomic_*` and legacy `atom_*` read-modify-write builtins.

use super::{Aux, BuiltinCall, BuiltinTable};
use crate::error::SimError;
use crate::memory::{AtomicOp, Signedness};
use crate::value::TypedValue;
use crate::work_item::Ctx;

const OPS: &[(&str, &str, AtomicOp)] = &[
    ("atom_add", "atomic_add", AtomicOp::Add),
    ("atom_and", "atomic_and", AtomicOp::And),
    ("atom_cmpxchg", "atomic_cmpxchg", AtomicOp::CompareExchange),
    ("atom_dec", "atomic_dec", AtomicOp::Decrement),
    ("atom_inc", "atomic_inc", AtomicOp::Increment),
    ("atom_max", "atomic_max", AtomicOp::Max),
    ("atom_min", "atomic_min", AtomicOp::Min),
    ("atom_or", "atomic_or", AtomicOp::Or),
    ("atom_sub", "atomic_sub", AtomicOp::Sub),
    ("atom_xchg", "atomic_xchg", AtomicOp::Exchange),
    ("atom_xor", "atomic_xor", AtomicOp::Xor),
];

pub(super) fn register(table: &mut BuiltinTable) {
    for &(legacy, name, op) in OPS {
        table.add(legacy, atomic, Aux::Atomic(op));
        table.add(name, atomic, Aux::Atomic(op));
    }
}

/// Signedness of the pointee, from the last type code of the overload.
fn signedness(overload: &str) -> Signedness {
    let last = overload.bytes().rev().find(|b| b.is_ascii_alphabetic());
    match last {
        Some(b'c' | b'a' | b's' | b'i' | b'l' | b'x' | b'n') => Signedness::Signed,
        _ => Signedness::Unsigned,
    }
}

/// `(p[, operand])` or `(p, compare, value)` for compare-exchange; returns the prior value.
fn atomic(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let Aux::Atomic(op) = call.aux else {
        return Err(call.unsupported());
    };
    let address = call.ptr(0)?;
    let width = match call.pointee(0).map(|ty| ty.size()) {
        Some(8) => 8,
        _ => 4,
    };
    let (operand, compare) = match op {
        AtomicOp::CompareExchange => (call.u(2, 0), call.u(1, 0)),
        AtomicOp::Increment | AtomicOp::Decrement => (0, 0),
        _ => (call.u(1, 0), 0),
    };
    let old = ctx.atomic(
        op,
        address,
        width,
        signedness(call.overload),
        operand,
        compare,
    );
    out.set_u(0, old);
    Ok(())
}
