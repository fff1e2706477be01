// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Math builtins.
//!
//! Every lane is computed in double precision and rounded once to the lane's width, which is
//! what the single-precision and half-precision entry points expect.

use core::f64::consts::PI;

use super::{Aux, BuiltinCall, BuiltinTable, store_out};
use crate::error::SimError;
use crate::value::TypedValue;
use crate::work_item::Ctx;

const UNARY: &[(&str, fn(f64) -> f64)] = &[
    ("acos", libm::acos),
    ("acosh", libm::acosh),
    ("acospi", acospi),
    ("asin", libm::asin),
    ("asinh", libm::asinh),
    ("asinpi", asinpi),
    ("atan", libm::atan),
    ("atanh", libm::atanh),
    ("atanpi", atanpi),
    ("cbrt", libm::cbrt),
    ("ceil", libm::ceil),
    ("cos", libm::cos),
    ("cosh", libm::cosh),
    ("cospi", cospi),
    ("erfc", libm::erfc),
    ("erf", libm::erf),
    ("exp", libm::exp),
    ("exp2", libm::exp2),
    ("exp10", libm::exp10),
    ("expm1", libm::expm1),
    ("fabs", libm::fabs),
    ("floor", libm::floor),
    ("lgamma", libm::lgamma),
    ("log", libm::log),
    ("log2", libm::log2),
    ("log10", libm::log10),
    ("log1p", libm::log1p),
    ("logb", logb),
    ("rint", libm::rint),
    ("round", libm::round),
    ("rsqrt", rsqrt),
    ("sin", libm::sin),
    ("sinh", libm::sinh),
    ("sinpi", sinpi),
    ("sqrt", libm::sqrt),
    ("tan", libm::tan),
    ("tanh", libm::tanh),
    ("tanpi", tanpi),
    ("tgamma", libm::tgamma),
    ("trunc", libm::trunc),
];

const BINARY: &[(&str, fn(f64, f64) -> f64)] = &[
    ("atan2", libm::atan2),
    ("atan2pi", atan2pi),
    ("copysign", libm::copysign),
    ("fdim", libm::fdim),
    ("fmax", libm::fmax),
    ("fmin", libm::fmin),
    ("fmod", libm::fmod),
    ("hypot", libm::hypot),
    ("maxmag", maxmag),
    ("minmag", minmag),
    ("pow", libm::pow),
    ("powr", powr),
    ("remainder", libm::remainder),
];

/// Reduced-precision variants; computed at full precision.
const FAST_UNARY: &[(&str, &str, fn(f64) -> f64)] = &[
    ("half_cos", "native_cos", libm::cos),
    ("half_exp", "native_exp", libm::exp),
    ("half_exp2", "native_exp2", libm::exp2),
    ("half_exp10", "native_exp10", libm::exp10),
    ("half_log", "native_log", libm::log),
    ("half_log2", "native_log2", libm::log2),
    ("half_log10", "native_log10", libm::log10),
    ("half_recip", "native_recip", recip),
    ("half_rsqrt", "native_rsqrt", rsqrt),
    ("half_sin", "native_sin", libm::sin),
    ("half_sqrt", "native_sqrt", libm::sqrt),
    ("half_tan", "native_tan", libm::tan),
];

const FAST_BINARY: &[(&str, &str, fn(f64, f64) -> f64)] = &[
    ("half_divide", "native_divide", divide),
    ("half_powr", "native_powr", powr),
];

pub(super) fn register(table: &mut BuiltinTable) {
    for &(name, f) in UNARY {
        table.add(name, unary, Aux::F1(f));
    }
    for &(name, f) in BINARY {
        table.add(name, binary, Aux::F2(f));
    }
    for &(half, native, f) in FAST_UNARY {
        table.add(half, unary, Aux::F1(f));
        table.add(native, unary, Aux::F1(f));
    }
    for &(half, native, f) in FAST_BINARY {
        table.add(half, binary, Aux::F2(f));
        table.add(native, binary, Aux::F2(f));
    }
    table.add("fma", fma, Aux::None);
    table.add("mad", fma, Aux::None);
    table.add_prefix("llvm.fmuladd.", fma, Aux::None);
    table.add("fract", fract, Aux::None);
    table.add("frexp", frexp, Aux::None);
    table.add("ilogb", ilogb, Aux::None);
    table.add("ldexp", ldexp, Aux::None);
    table.add("lgamma_r", lgamma_r, Aux::None);
    table.add("modf", modf, Aux::None);
    table.add("nan", nan, Aux::None);
    table.add("nanf", nan, Aux::None);
    table.add("nextafter", nextafter, Aux::None);
    table.add("pown", pown, Aux::None);
    table.add("remquo", remquo, Aux::None);
    table.add("rootn", rootn, Aux::None);
    table.add("sincos", sincos, Aux::None);
}

/// One float argument, one float result per lane.
pub(super) fn unary(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let Aux::F1(f) = call.aux else {
        return Err(call.unsupported());
    };
    for i in 0..out.lanes() {
        out.set_f(i, f(call.f(0, i)));
    }
    Ok(())
}

/// Two float arguments; a scalar second argument is broadcast.
pub(super) fn binary(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let Aux::F2(f) = call.aux else {
        return Err(call.unsupported());
    };
    for i in 0..out.lanes() {
        out.set_f(i, f(call.f(0, i), call.f(1, i)));
    }
    Ok(())
}

fn acospi(x: f64) -> f64 {
    libm::acos(x) / PI
}

fn asinpi(x: f64) -> f64 {
    libm::asin(x) / PI
}

fn atanpi(x: f64) -> f64 {
    libm::atan(x) / PI
}

fn atan2pi(y: f64, x: f64) -> f64 {
    libm::atan2(y, x) / PI
}

fn cospi(x: f64) -> f64 {
    libm::cos(x * PI)
}

fn sinpi(x: f64) -> f64 {
    libm::sin(x * PI)
}

fn tanpi(x: f64) -> f64 {
    libm::tan(x * PI)
}

fn logb(x: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    if x.is_infinite() {
        return f64::INFINITY;
    }
    if x == 0.0 {
        return f64::NEG_INFINITY;
    }
    f64::from(libm::ilogb(x))
}

fn rsqrt(x: f64) -> f64 {
    1.0 / libm::sqrt(x)
}

fn recip(x: f64) -> f64 {
    1.0 / x
}

fn divide(x: f64, y: f64) -> f64 {
    x / y
}

fn maxmag(x: f64, y: f64) -> f64 {
    let (ax, ay) = (libm::fabs(x), libm::fabs(y));
    if ax > ay {
        x
    } else if ay > ax {
        y
    } else {
        libm::fmax(x, y)
    }
}

fn minmag(x: f64, y: f64) -> f64 {
    let (ax, ay) = (libm::fabs(x), libm::fabs(y));
    if ax < ay {
        x
    } else if ay < ax {
        y
    } else {
        libm::fmin(x, y)
    }
}

/// `pow` restricted to `x >= 0`, with the special cases of `powr`.
pub(super) fn powr(x: f64, y: f64) -> f64 {
    if x < 0.0 || x.is_nan() || y.is_nan() {
        return f64::NAN;
    }
    if x == 1.0 {
        return if y.is_infinite() { f64::NAN } else { 1.0 };
    }
    if y == 0.0 {
        return if x == 0.0 || x.is_infinite() {
            f64::NAN
        } else {
            1.0
        };
    }
    if x == 0.0 {
        return if y < 0.0 { f64::INFINITY } else { 0.0 };
    }
    if x.is_infinite() {
        return if y < 0.0 { 0.0 } else { f64::INFINITY };
    }
    libm::pow(x, y)
}

fn rootn_lane(x: f64, n: i64) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    let odd = n % 2 != 0;
    if x == 0.0 {
        return match (n < 0, odd) {
            (true, true) => libm::copysign(f64::INFINITY, x),
            (true, false) => f64::INFINITY,
            (false, true) => x,
            (false, false) => 0.0,
        };
    }
    if x < 0.0 && !odd {
        return f64::NAN;
    }
    let r = libm::pow(libm::fabs(x), 1.0 / n as f64);
    if x < 0.0 { -r } else { r }
}

/// Fused multiply-add; single-precision lanes use the single-precision fused operation so the
/// product is not rounded twice.
fn fma(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        let (a, b, c) = (call.f(0, i), call.f(1, i), call.f(2, i));
        let r = if out.lane_size() == 4 {
            f64::from(libm::fmaf(a as f32, b as f32, c as f32))
        } else {
            libm::fma(a, b, c)
        };
        out.set_f(i, r);
    }
    Ok(())
}

/// Largest value below 1 at the lane's precision.
fn below_one(lane_size: usize) -> f64 {
    match lane_size {
        2 => 1.0 - libm::exp2(-11.0),
        4 => f64::from(libm::nextafterf(1.0, 0.0)),
        _ => libm::nextafter(1.0, 0.0),
    }
}

fn fract(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let mut floors = out.clone();
    for i in 0..out.lanes() {
        let x = call.f(0, i);
        if x.is_nan() {
            out.set_f(i, f64::NAN);
            floors.set_f(i, f64::NAN);
            continue;
        }
        let fl = libm::floor(x);
        floors.set_f(i, fl);
        out.set_f(i, libm::fmin(x - fl, below_one(out.lane_size())));
    }
    store_out(ctx, call, 1, &floors)
}

fn frexp(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let mut exps = TypedValue::new(4, out.lanes());
    for i in 0..out.lanes() {
        let (m, e) = libm::frexp(call.f(0, i));
        out.set_f(i, m);
        exps.set_s(i, i64::from(e));
    }
    store_out(ctx, call, 1, &exps)
}

fn ilogb(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        let x = call.f(0, i);
        let e = if x.is_nan() { i32::MAX } else { libm::ilogb(x) };
        out.set_s(i, i64::from(e));
    }
    Ok(())
}

fn ldexp(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        let n = call.s(1, i).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        out.set_f(i, libm::scalbn(call.f(0, i), n));
    }
    Ok(())
}

fn lgamma_r(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let mut signs = TypedValue::new(4, out.lanes());
    for i in 0..out.lanes() {
        let (r, sign) = libm::lgamma_r(call.f(0, i));
        out.set_f(i, r);
        signs.set_s(i, if sign < 0 { -1 } else { 1 });
    }
    store_out(ctx, call, 1, &signs)
}

fn modf(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let mut integral = out.clone();
    for i in 0..out.lanes() {
        let x = call.f(0, i);
        let whole = libm::trunc(x);
        integral.set_f(i, whole);
        let frac = if x.is_infinite() { 0.0 } else { x - whole };
        out.set_f(i, libm::copysign(frac, x));
    }
    store_out(ctx, call, 1, &integral)
}

fn nan(
    _: &mut Ctx<'_, '_, '_>,
    _: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        out.set_f(i, f64::NAN);
    }
    Ok(())
}

/// `nextafter` on half-precision bit patterns.
fn next_after_half(from: u16, to: f64) -> u16 {
    let x = f64::from(crate::half::half_to_float(from));
    if x.is_nan() || to.is_nan() {
        return 0x7e00;
    }
    if x == to {
        return crate::half::double_to_half(to, crate::half::RoundingMode::NearestEven);
    }
    if x == 0.0 {
        return if to > 0.0 { 0x0001 } else { 0x8001 };
    }
    let away = (to > x) == (x > 0.0);
    if away { from + 1 } else { from - 1 }
}

fn nextafter(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        let (x, y) = (call.f(0, i), call.f(1, i));
        match out.lane_size() {
            2 => {
                let bits = next_after_half(call.u(0, i) as u16, y);
                out.set_u(i, u64::from(bits));
            }
            4 => out.set_f(i, f64::from(libm::nextafterf(x as f32, y as f32))),
            _ => out.set_f(i, libm::nextafter(x, y)),
        }
    }
    Ok(())
}

fn pown(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        out.set_f(i, libm::pow(call.f(0, i), call.s(1, i) as f64));
    }
    Ok(())
}

fn remquo(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let mut quotients = TypedValue::new(4, out.lanes());
    for i in 0..out.lanes() {
        let (r, q) = libm::remquo(call.f(0, i), call.f(1, i));
        out.set_f(i, r);
        quotients.set_s(i, i64::from(q));
    }
    store_out(ctx, call, 2, &quotients)
}

fn rootn(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    for i in 0..out.lanes() {
        out.set_f(i, rootn_lane(call.f(0, i), call.s(1, i)));
    }
    Ok(())
}

fn sincos(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let mut cosines = out.clone();
    for i in 0..out.lanes() {
        let (s, c) = libm::sincos(call.f(0, i));
        out.set_f(i, s);
        cosines.set_f(i, c);
    }
    store_out(ctx, call, 1, &cosines)
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::super::testing::{call, call_out, f32s, i32s};
    use super::*;
    use crate::types::Type;

    #[test]
    fn powr_special_cases() {
        assert!(powr(-2.0, 3.0).is_nan());
        assert!(powr(1.0, f64::INFINITY).is_nan());
        assert!(powr(0.0, 0.0).is_nan());
        assert_eq!(powr(0.0, -1.0), f64::INFINITY);
        assert_eq!(powr(f64::INFINITY, -1.0), 0.0);
        assert_eq!(powr(4.0, 0.5), 2.0);
    }

    #[test]
    fn powr_of_negative_base_is_nan_in_a_kernel() {
        let r = call("powr", "ff", Type::Float, vec![f32s(&[-2.0]), f32s(&[3.0])]);
        assert!(r.get_f(0).is_nan());
    }

    #[test]
    fn rootn_edges() {
        assert!(rootn_lane(1.0, 0).is_nan());
        assert!(rootn_lane(-8.0, 2).is_nan());
        assert_eq!(rootn_lane(-8.0, 3), -2.0);
        assert_eq!(rootn_lane(-0.0, -3), f64::NEG_INFINITY);
        assert_eq!(rootn_lane(0.0, 2), 0.0);
    }

    #[test]
    fn vector_sqrt_and_scalar_broadcast() {
        let r = call(
            "sqrt",
            "Dv4_f",
            Type::vector(Type::Float, 4),
            vec![f32s(&[1.0, 4.0, 9.0, 16.0])],
        );
        assert_eq!(
            (0..4).map(|i| r.get_f(i)).collect::<Vec<_>>(),
            [1.0, 2.0, 3.0, 4.0]
        );
        let r = call(
            "fmax",
            "Dv2_ff",
            Type::vector(Type::Float, 2),
            vec![f32s(&[1.0, 5.0]), f32s(&[3.0])],
        );
        assert_eq!((r.get_f(0), r.get_f(1)), (3.0, 5.0));
    }

    #[test]
    fn fract_clamps_below_one_and_stores_floor() {
        let (r, fl) = call_out(
            "fract",
            "fPU3AS0f",
            Type::Float,
            vec![f32s(&[-1e-9])],
            Some((1, Type::Float)),
        );
        assert_eq!(r.get_f(0), f64::from(libm::nextafterf(1.0, 0.0)));
        assert_eq!(fl.get_f(0), -1.0);
    }

    #[test]
    fn frexp_and_remquo_out_parameters() {
        let (m, e) = call_out(
            "frexp",
            "fPU3AS0i",
            Type::Float,
            vec![f32s(&[8.0])],
            Some((1, Type::I32)),
        );
        assert_eq!((m.get_f(0), e.get_s(0)), (0.5, 4));
        let (r, q) = call_out(
            "remquo",
            "ffPU3AS0i",
            Type::Float,
            vec![f32s(&[7.0]), f32s(&[2.0])],
            Some((2, Type::I32)),
        );
        assert_eq!(r.get_f(0), -1.0);
        assert_eq!(q.get_s(0) & 7, 4);
    }

    #[test]
    fn fma_is_single_rounded() {
        let a = 1.0 + f32::EPSILON;
        let r = call(
            "fma",
            "fff",
            Type::Float,
            vec![f32s(&[a]), f32s(&[a]), f32s(&[-1.0])],
        );
        assert_eq!(r.get_f(0), f64::from(libm::fmaf(a, a, -1.0)));
    }

    #[test]
    fn ldexp_and_ilogb() {
        let r = call("ldexp", "fi", Type::Float, vec![f32s(&[3.0]), i32s(&[2])]);
        assert_eq!(r.get_f(0), 12.0);
        let r = call("ilogb", "f", Type::I32, vec![f32s(&[f32::NAN])]);
        assert_eq!(r.get_s(0), i64::from(i32::MAX));
    }

    #[test]
    fn half_nextafter_steps_one_ulp() {
        assert_eq!(next_after_half(0x3c00, 2.0), 0x3c01);
        assert_eq!(next_after_half(0x3c00, 0.0), 0x3bff);
        assert_eq!(next_after_half(0x0000, -1.0), 0x8001);
        assert_eq!(next_after_half(0xbc00, -2.0), 0xbc01);
    }
}
