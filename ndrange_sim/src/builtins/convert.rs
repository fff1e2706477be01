// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `as_<type>` reinterpretation and `convert_<type>[_sat][_<rounding>]` conversions.
//!
//! Directed rounding is done in software: the nearest-even result is computed first and then
//! stepped by one ulp when it lies on the wrong side of the exact value. No host rounding mode
//! is ever changed.

use core::cmp::Ordering;

use super::{ArgKind, Aux, BuiltinCall, BuiltinTable};
use crate::error::SimError;
use crate::half::{RoundingMode, double_to_half};
use crate::value::TypedValue;
use crate::work_item::Ctx;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add_prefix("as_", reinterpret, Aux::None);
    table.add_prefix("convert_half", to_half, Aux::None);
    table.add_prefix("convert_float", to_float, Aux::None);
    table.add_prefix("convert_double", to_float, Aux::None);
    table.add_prefix("convert_u", to_int, Aux::None);
    table.add_prefix("convert_", to_int, Aux::None);
}

/// Explicit rounding suffix of a conversion name, if any.
fn rounding(name: &str, default: RoundingMode) -> RoundingMode {
    name.rsplit_once('_')
        .and_then(|(_, suffix)| RoundingMode::from_suffix(suffix))
        .unwrap_or(default)
}

/// Copies the source bytes unchanged; a 3-lane vector shares its padded size with 4 lanes.
fn reinterpret(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let src = call.arg(0)?.bytes();
    let dst = out.bytes_mut();
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    Ok(())
}

/// Exact value of a source lane.
#[derive(Copy, Clone)]
enum Exact {
    Int(i128),
    Float(f64),
}

fn source(call: &BuiltinCall<'_>, lane: usize) -> Exact {
    match call.kind() {
        ArgKind::Signed => Exact::Int(i128::from(call.s(0, lane))),
        ArgKind::Unsigned | ArgKind::Other => Exact::Int(i128::from(call.u(0, lane))),
        ArgKind::Float => Exact::Float(call.f(0, lane)),
    }
}

/// Orders a finite candidate against the exact value.
fn compare(candidate: f64, exact: Exact) -> Ordering {
    match exact {
        Exact::Float(x) => candidate.partial_cmp(&x).unwrap_or(Ordering::Equal),
        Exact::Int(x) => {
            if !candidate.is_finite() {
                return if candidate > 0.0 {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
            }
            // Integral at these magnitudes, so the conversion is exact.
            (candidate as i128).cmp(&x).then_with(|| {
                let frac = candidate - libm::trunc(candidate);
                frac.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
            })
        }
    }
}

fn next_up_f32(x: f32) -> f32 {
    libm::nextafterf(x, f32::INFINITY)
}

fn next_down_f32(x: f32) -> f32 {
    libm::nextafterf(x, f32::NEG_INFINITY)
}

/// Rounds `exact` to a `lane_size`-byte float with the given mode.
fn round_float(exact: Exact, lane_size: usize, mode: RoundingMode) -> f64 {
    let single = lane_size == 4;
    let nearest = match (exact, single) {
        (Exact::Int(x), true) => f64::from(x as f32),
        (Exact::Int(x), false) => x as f64,
        (Exact::Float(x), true) => f64::from(x as f32),
        (Exact::Float(x), false) => x,
    };
    if let Exact::Float(x) = exact {
        if x.is_nan() {
            return x;
        }
    }
    let up = |v: f64| {
        if single {
            f64::from(next_up_f32(v as f32))
        } else {
            libm::nextafter(v, f64::INFINITY)
        }
    };
    let down = |v: f64| {
        if single {
            f64::from(next_down_f32(v as f32))
        } else {
            libm::nextafter(v, f64::NEG_INFINITY)
        }
    };
    let order = compare(nearest, exact);
    match mode {
        RoundingMode::NearestEven => nearest,
        RoundingMode::TowardPositive if order == Ordering::Less => up(nearest),
        RoundingMode::TowardNegative if order == Ordering::Greater => down(nearest),
        RoundingMode::TowardZero => match order {
            Ordering::Greater if nearest > 0.0 => down(nearest),
            Ordering::Less if nearest < 0.0 => up(nearest),
            _ => nearest,
        },
        _ => nearest,
    }
}

fn to_float(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let mode = rounding(call.name, RoundingMode::NearestEven);
    let lane_size = out.lane_size();
    for i in 0..out.lanes() {
        out.set_f(i, round_float(source(call, i), lane_size, mode));
    }
    Ok(())
}

fn to_half(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let mode = rounding(call.name, RoundingMode::NearestEven);
    for i in 0..out.lanes() {
        let value = match source(call, i) {
            Exact::Int(x) => round_float(Exact::Int(x), 8, mode),
            Exact::Float(x) => x,
        };
        out.set_u(i, u64::from(double_to_half(value, mode)));
    }
    Ok(())
}

/// Integer targets; the overload's first type code says how to read the source.
fn to_int(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let signed_target = !call.name.starts_with("convert_u");
    let saturate = call.name.contains("_sat");
    let mode = rounding(call.name, RoundingMode::TowardZero);
    let bits = (out.lane_size() * 8) as u32;
    let (lo, hi) = if signed_target {
        (-(1_i128 << (bits - 1)), (1_i128 << (bits - 1)) - 1)
    } else {
        (0, (1_i128 << bits) - 1)
    };
    for i in 0..out.lanes() {
        let value = match source(call, i) {
            Exact::Int(x) => {
                if saturate {
                    x.clamp(lo, hi)
                } else {
                    x
                }
            }
            Exact::Float(x) => {
                if x.is_nan() {
                    0
                } else {
                    let r = match mode {
                        RoundingMode::NearestEven => libm::rint(x),
                        RoundingMode::TowardZero => libm::trunc(x),
                        RoundingMode::TowardPositive => libm::ceil(x),
                        RoundingMode::TowardNegative => libm::floor(x),
                    };
                    let r = r as i128;
                    if saturate { r.clamp(lo, hi) } else { r }
                }
            }
        };
        out.set_u(i, value as u64);
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
    fn directed_rounding_of_integers_to_float() {
        let big = (1_i128 << 24) + 1;
        assert_eq!(
            round_float(Exact::Int(big), 4, RoundingMode::NearestEven),
            16_777_216.0
        );
        assert_eq!(
            round_float(Exact::Int(big), 4, RoundingMode::TowardPositive),
            16_777_218.0
        );
        assert_eq!(
            round_float(Exact::Int(-big), 4, RoundingMode::TowardZero),
            -16_777_216.0
        );
        assert_eq!(
            round_float(Exact::Int(-big), 4, RoundingMode::TowardNegative),
            -16_777_218.0
        );
    }

    #[test]
    fn double_to_float_rounding_modes() {
        let x = 1.0 + f64::EPSILON;
        assert_eq!(round_float(Exact::Float(x), 4, RoundingMode::TowardZero), 1.0);
        assert_eq!(
            round_float(Exact::Float(x), 4, RoundingMode::TowardPositive),
            f64::from(1.0_f32 + f32::EPSILON)
        );
    }

    #[test]
    fn saturating_float_to_int() {
        let r = call("convert_int_sat", "f", Type::I32, vec![f32s(&[3e10])]);
        assert_eq!(r.get_s(0), i64::from(i32::MAX));
        let r = call("convert_int_sat", "f", Type::I32, vec![f32s(&[f32::NAN])]);
        assert_eq!(r.get_s(0), 0);
        let r = call("convert_uchar_sat", "i", Type::I8, vec![i32s(&[-5])]);
        assert_eq!(r.get_u(0), 0);
        let r = call("convert_int_rtn", "f", Type::I32, vec![f32s(&[-1.5])]);
        assert_eq!(r.get_s(0), -2);
        let r = call("convert_int", "f", Type::I32, vec![f32s(&[-1.5])]);
        assert_eq!(r.get_s(0), -1);
    }

    #[test]
    fn reinterpret_keeps_bits() {
        let r = call("as_uint", "f", Type::I32, vec![f32s(&[1.0])]);
        assert_eq!(r.get_u(0), 0x3f80_0000);
        let r = call("convert_half_rtz", "f", Type::Half, vec![f32s(&[1.0 + 3.0 / 2048.0])]);
        assert_eq!(r.get_u(0), 0x3c01);
    }
}
