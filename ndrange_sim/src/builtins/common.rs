// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Common functions: `clamp`, `min`/`max`, `mix`, `step`, and friends.

use core::f64::consts::PI;

use super::math::unary;
use super::{ArgKind, Aux, BuiltinCall, BuiltinTable};
use crate::error::SimError;
use crate::value::TypedValue;
use crate::work_item::Ctx;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add("clamp", clamp, Aux::None);
    table.add("max", max, Aux::None);
    table.add("min", min, Aux::None);
    table.add("mix", mix, Aux::None);
    table.add("smoothstep", smoothstep, Aux::None);
    table.add("step", step, Aux::None);
    table.add("degrees", unary, Aux::F1(degrees));
    table.add("radians", unary, Aux::F1(radians));
    table.add("sign", unary, Aux::F1(sign));
}

fn degrees(x: f64) -> f64 {
    x * (180.0 / PI)
}

fn radians(x: f64) -> f64 {
    x * (PI / 180.0)
}

fn sign(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x
    }
}

/// Integer-or-float lane selection shared by `clamp`, `min`, and `max`.
///
/// `pick(a, b)` returns `true` when `a` should win.
fn select_by(
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
    a: usize,
    b: usize,
    pick_signed: fn(i64, i64) -> bool,
    pick_unsigned: fn(u64, u64) -> bool,
    pick_float: fn(f64, f64) -> f64,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        match call.kind() {
            ArgKind::Signed => {
                let (x, y) = (call.s(a, i), call.s(b, i));
                out.set_s(i, if pick_signed(x, y) { x } else { y });
            }
            ArgKind::Unsigned => {
                let (x, y) = (call.u(a, i), call.u(b, i));
                out.set_u(i, if pick_unsigned(x, y) { x } else { y });
            }
            ArgKind::Float => out.set_f(i, pick_float(call.f(a, i), call.f(b, i))),
            ArgKind::Other => return Err(call.unsupported()),
        }
    }
    Ok(())
}

fn max(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    select_by(call, out, 0, 1, |a, b| a > b, |a, b| a > b, libm::fmax)
}

fn min(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    select_by(call, out, 0, 1, |a, b| a < b, |a, b| a < b, libm::fmin)
}

/// `min(max(x, lo), hi)`; scalar bounds are broadcast.
fn clamp(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        match call.kind() {
            ArgKind::Signed => {
                let x = call.s(0, i).max(call.s(1, i)).min(call.s(2, i));
                out.set_s(i, x);
            }
            ArgKind::Unsigned => {
                let x = call.u(0, i).max(call.u(1, i)).min(call.u(2, i));
                out.set_u(i, x);
            }
            ArgKind::Float => {
                let x = libm::fmin(libm::fmax(call.f(0, i), call.f(1, i)), call.f(2, i));
                out.set_f(i, x);
            }
            ArgKind::Other => return Err(call.unsupported()),
        }
    }
    Ok(())
}

fn mix(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        let (x, y, a) = (call.f(0, i), call.f(1, i), call.f(2, i));
        out.set_f(i, x + (y - x) * a);
    }
    Ok(())
}

fn smoothstep(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        let (edge0, edge1, x) = (call.f(0, i), call.f(1, i), call.f(2, i));
        let t = libm::fmin(libm::fmax((x - edge0) / (edge1 - edge0), 0.0), 1.0);
        out.set_f(i, t * t * (3.0 - 2.0 * t));
    }
    Ok(())
}

fn step(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        let (edge, x) = (call.f(0, i), call.f(1, i));
        out.set_f(i, if x < edge { 0.0 } else { 1.0 });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::super::testing::{call, f32s, i32s};
    use super::*;
    use crate::types::Type;

    #[test]
    fn clamp_broadcasts_scalar_bounds() {
        let r = call(
            "clamp",
            "Dv4_fff",
            Type::vector(Type::Float, 4),
            vec![f32s(&[-1.0, 0.5, 2.0, 0.0]), f32s(&[0.0]), f32s(&[1.0])],
        );
        assert_eq!(
            (0..4).map(|i| r.get_f(i)).collect::<alloc::vec::Vec<_>>(),
            [0.0, 0.5, 1.0, 0.0]
        );
    }

    #[test]
    fn integer_min_max_follow_signedness() {
        let r = call("max", "ii", Type::I32, vec![i32s(&[-1]), i32s(&[1])]);
        assert_eq!(r.get_s(0), 1);
        let r = call("max", "jj", Type::I32, vec![i32s(&[-1]), i32s(&[1])]);
        assert_eq!(r.get_u(0), u64::from(u32::MAX));
        let r = call("min", "ii", Type::I32, vec![i32s(&[-1]), i32s(&[1])]);
        assert_eq!(r.get_s(0), -1);
    }

    #[test]
    fn sign_keeps_signed_zero() {
        assert_eq!(sign(f64::NAN), 0.0);
        assert!(sign(-0.0).is_sign_negative());
        assert_eq!(sign(-3.0), -1.0);
    }

    #[test]
    fn step_and_smoothstep() {
        let r = call("step", "ff", Type::Float, vec![f32s(&[0.5]), f32s(&[0.25])]);
        assert_eq!(r.get_f(0), 0.0);
        let r = call(
            "smoothstep",
            "fff",
            Type::Float,
            vec![f32s(&[0.0]), f32s(&[1.0]), f32s(&[0.5])],
        );
        assert_eq!(r.get_f(0), 0.5);
        let r = call(
            "mix",
            "fff",
            Type::Float,
            vec![f32s(&[2.0]), f32s(&[4.0]), f32s(&[0.25])],
        );
        assert_eq!(r.get_f(0), 2.5);
    }
}
