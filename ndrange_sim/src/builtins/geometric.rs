// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometric functions on float vectors of up to four lanes.

use super::{Aux, BuiltinCall, BuiltinTable};
use crate::error::SimError;
use crate::value::TypedValue;
use crate::work_item::Ctx;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add("cross", cross, Aux::None);
    table.add("dot", dot, Aux::None);
    table.add("distance", distance, Aux::None);
    table.add("length", length, Aux::None);
    table.add("normalize", normalize, Aux::None);
    table.add("fast_distance", distance, Aux::None);
    table.add("fast_length", length, Aux::None);
    table.add("fast_normalize", normalize, Aux::None);
}

fn cross(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let a = |i| call.f(0, i);
    let b = |i| call.f(1, i);
    out.set_f(0, a(1) * b(2) - a(2) * b(1));
    out.set_f(1, a(2) * b(0) - a(0) * b(2));
    out.set_f(2, a(0) * b(1) - a(1) * b(0));
    if out.lanes() == 4 {
        out.set_f(3, 0.0);
    }
    Ok(())
}

fn dot(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let sum = (0..call.lanes(0))
        .map(|i| call.f(0, i) * call.f(1, i))
        .sum::<f64>();
    out.set_f(0, sum);
    Ok(())
}

/// Euclidean length, rescaling the sum of squares when it overflows or nears underflow.
fn geometric_length(values: &[f64]) -> f64 {
    let sum_squares = |scale: f64| values.iter().map(|v| (v * scale) * (v * scale)).sum::<f64>();
    let mut scale = 1.0;
    let mut sum = sum_squares(scale);
    if sum.is_infinite() {
        scale = libm::exp2(-512.0);
        sum = sum_squares(scale);
    } else if sum < values.len() as f64 * f64::MIN_POSITIVE / f64::EPSILON {
        scale = libm::exp2(640.0);
        sum = sum_squares(scale);
    }
    libm::sqrt(sum) / scale
}

fn lanes(call: &BuiltinCall<'_>, index: usize) -> [f64; 4] {
    let mut v = [0.0; 4];
    for (i, slot) in v.iter_mut().enumerate().take(call.lanes(index)) {
        *slot = call.f(index, i);
    }
    v
}

fn length(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let n = call.lanes(0).min(4);
    out.set_f(0, geometric_length(&lanes(call, 0)[..n]));
    Ok(())
}

fn distance(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let n = call.lanes(0).min(4);
    let (a, b) = (lanes(call, 0), lanes(call, 1));
    let mut diff = [0.0; 4];
    for i in 0..n {
        diff[i] = a[i] - b[i];
    }
    out.set_f(0, geometric_length(&diff[..n]));
    Ok(())
}

fn normalize(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let n = call.lanes(0).min(4);
    let mut v = lanes(call, 0);
    let v = &mut v[..n];

    let sum = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>();
    let mut lensq = sum(v);
    if lensq.is_infinite() {
        let scale = libm::exp2(-512.0);
        v.iter_mut().for_each(|x| *x *= scale);
        lensq = sum(v);
        if lensq.is_infinite() {
            // Infinite lanes become +-1, everything else +-0.
            for x in v.iter_mut() {
                *x = libm::copysign(if x.is_infinite() { 1.0 } else { 0.0 }, *x);
            }
            lensq = sum(v);
        }
    } else if lensq < n as f64 * f64::MIN_POSITIVE / f64::EPSILON {
        let scale = libm::exp2(640.0);
        v.iter_mut().for_each(|x| *x *= scale);
        lensq = sum(v);
        if lensq == 0.0 {
            for i in 0..out.lanes() {
                out.copy_lane(i, call.arg(0)?, i);
            }
            return Ok(());
        }
    }
    let len = libm::sqrt(lensq);
    for (i, x) in v.iter().enumerate() {
        out.set_f(i, x / len);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::super::testing::{call, f32s};
    use super::*;
    use crate::types::Type;

    #[test]
    fn length_survives_overflow_and_underflow() {
        assert_eq!(geometric_length(&[3.0, 4.0]), 5.0);
        assert!((geometric_length(&[3e200, 4e200]) / 5e200 - 1.0).abs() < 1e-15);
        assert!((geometric_length(&[3e-200, 4e-200]) / 5e-200 - 1.0).abs() < 1e-15);
    }

    #[test]
    fn cross_zeroes_fourth_lane() {
        let ty = Type::vector(Type::Float, 4);
        let r = call(
            "cross",
            "Dv4_fS_",
            ty,
            vec![f32s(&[1.0, 0.0, 0.0, 7.0]), f32s(&[0.0, 1.0, 0.0, 9.0])],
        );
        assert_eq!(
            (0..4).map(|i| r.get_f(i)).collect::<alloc::vec::Vec<_>>(),
            [0.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn dot_and_normalize() {
        let ty = Type::vector(Type::Float, 2);
        let r = call(
            "dot",
            "Dv2_fS_",
            Type::Float,
            vec![f32s(&[1.0, 2.0]), f32s(&[3.0, 4.0])],
        );
        assert_eq!(r.get_f(0), 11.0);
        let r = call("normalize", "Dv2_f", ty.clone(), vec![f32s(&[3.0, 4.0])]);
        assert_eq!((r.get_f(0), r.get_f(1)), (0.6000000238418579, 0.800000011920929));
        let r = call("normalize", "Dv2_f", ty, vec![f32s(&[0.0, -0.0])]);
        assert!(r.get_f(1).is_sign_negative());
        let r = call(
            "normalize",
            "Dv2_f",
            Type::vector(Type::Float, 2),
            vec![f32s(&[f32::INFINITY, 1.0])],
        );
        assert_eq!((r.get_f(0), r.get_f(1)), (1.0, 0.0));
    }
}
