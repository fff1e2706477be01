// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Relational builtins.
//!
//! Scalar comparisons return `1` for true; vector comparisons set every bit of a true lane
//! (`-1`), matching the kernel language's vector boolean convention.

use super::{Aux, BuiltinCall, BuiltinTable};
use crate::error::SimError;
use crate::value::TypedValue;
use crate::work_item::Ctx;

const COMPARISONS: &[(&str, fn(f64, f64) -> bool)] = &[
    ("isequal", |a, b| a == b),
    ("isnotequal", |a, b| a != b),
    ("isgreater", |a, b| a > b),
    ("isgreaterequal", |a, b| a >= b),
    ("isless", |a, b| a < b),
    ("islessequal", |a, b| a <= b),
    ("islessgreater", |a, b| a < b || a > b),
    ("isordered", |a, b| !a.is_nan() && !b.is_nan()),
    ("isunordered", |a, b| a.is_nan() || b.is_nan()),
];

const CLASSES: &[(&str, fn(f64, usize) -> bool)] = &[
    ("isfinite", |x, _| x.is_finite()),
    ("isinf", |x, _| x.is_infinite()),
    ("isnan", |x, _| x.is_nan()),
    ("isnormal", is_normal),
    ("signbit", |x, _| x.is_sign_negative()),
];

pub(super) fn register(table: &mut BuiltinTable) {
    for &(name, f) in COMPARISONS {
        table.add(name, compare, Aux::Compare(f));
    }
    for &(name, f) in CLASSES {
        table.add(name, classify, Aux::Class(f));
    }
    table.add("all", all, Aux::None);
    table.add("any", any, Aux::None);
    table.add("bitselect", bitselect, Aux::None);
    table.add("select", select, Aux::None);
}

/// Normal at the lane's own precision; a subnormal `float` widened to `f64` looks normal.
fn is_normal(x: f64, lane_size: usize) -> bool {
    let smallest = match lane_size {
        2 => libm::exp2(-14.0),
        4 => f64::from(f32::MIN_POSITIVE),
        _ => f64::MIN_POSITIVE,
    };
    let largest = match lane_size {
        2 => 65504.0,
        4 => f64::from(f32::MAX),
        _ => f64::MAX,
    };
    let a = libm::fabs(x);
    a >= smallest && a <= largest
}

fn truth(out: &TypedValue, b: bool) -> i64 {
    match (b, out.lanes() > 1) {
        (false, _) => 0,
        (true, true) => -1,
        (true, false) => 1,
    }
}

fn compare(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let Aux::Compare(f) = call.aux else {
        return Err(call.unsupported());
    };
    for i in 0..out.lanes() {
        let r = truth(out, f(call.f(0, i), call.f(1, i)));
        out.set_s(i, r);
    }
    Ok(())
}

fn classify(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let Aux::Class(f) = call.aux else {
        return Err(call.unsupported());
    };
    let lane_size = call.arg(0)?.lane_size();
    for i in 0..out.lanes() {
        let r = truth(out, f(call.f(0, i), lane_size));
        out.set_s(i, r);
    }
    Ok(())
}

fn all(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let r = (0..call.lanes(0)).all(|i| call.s(0, i) < 0);
    out.set_s(0, i64::from(r));
    Ok(())
}

fn any(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let r = (0..call.lanes(0)).any(|i| call.s(0, i) < 0);
    out.set_s(0, i64::from(r));
    Ok(())
}

/// Each result bit comes from `b` where the matching bit of `c` is set, else from `a`.
fn bitselect(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        let (a, b, c) = (call.u(0, i), call.u(1, i), call.u(2, i));
        out.set_u(i, (a & !c) | (b & c));
    }
    Ok(())
}

/// `c ? b : a`, where a vector `c` is tested by its sign bit.
fn select(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let vector = out.lanes() > 1;
    let (a, b) = (call.arg(0)?, call.arg(1)?);
    for i in 0..out.lanes() {
        let c = call.s(2, i);
        let take_b = if vector { c < 0 } else { c != 0 };
        let src = if take_b { b } else { a };
        let lane = if src.lanes() == 1 { 0 } else { i };
        out.copy_lane(i, src, lane);
    }
    Ok(())
}
