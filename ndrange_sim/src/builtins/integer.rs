// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer builtins. Lanes are widened to `i128` so saturation and high-half products are exact
//! at every width up to 64 bits.

use super::{ArgKind, Aux, BuiltinCall, BuiltinTable};
use crate::error::SimError;
use crate::value::TypedValue;
use crate::work_item::Ctx;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add("abs", abs, Aux::None);
    table.add("abs_diff", abs_diff, Aux::None);
    table.add("add_sat", add_sat, Aux::None);
    table.add("sub_sat", sub_sat, Aux::None);
    table.add("mad_sat", mad_sat, Aux::None);
    table.add("clz", clz, Aux::None);
    table.add("popcount", popcount, Aux::None);
    table.add("hadd", hadd, Aux::None);
    table.add("rhadd", rhadd, Aux::None);
    table.add("mad_hi", mad_hi, Aux::None);
    table.add("mul_hi", mul_hi, Aux::None);
    table.add("mad24", mad24, Aux::None);
    table.add("mul24", mul24, Aux::None);
    table.add("rotate", rotate, Aux::None);
    table.add("upsample", upsample, Aux::None);
}

/// Lane `lane` of argument `index`, widened according to the overload's signedness.
fn wide(call: &BuiltinCall<'_>, index: usize, lane: usize) -> i128 {
    if call.kind() == ArgKind::Signed {
        i128::from(call.s(index, lane))
    } else {
        i128::from(call.u(index, lane))
    }
}

fn range(bits: u32, signed: bool) -> (i128, i128) {
    if signed {
        (-(1_i128 << (bits - 1)), (1_i128 << (bits - 1)) - 1)
    } else {
        (0, (1_i128 << bits) - 1)
    }
}

fn lane_bits(out: &TypedValue) -> u32 {
    (out.lane_size() * 8) as u32
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1 << bits) - 1 }
}

/// Applies `f` lane-wise and stores the low bits of each result.
fn each(
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
    f: impl Fn(&BuiltinCall<'_>, usize, u32, bool) -> i128,
) -> Result<(), SimError> {
    let kind = call.kind();
    if !matches!(kind, ArgKind::Signed | ArgKind::Unsigned) {
        return Err(call.unsupported());
    }
    let bits = lane_bits(out);
    for i in 0..out.lanes() {
        out.set_u(i, f(call, i, bits, kind == ArgKind::Signed) as u64);
    }
    Ok(())
}

fn saturate(v: i128, bits: u32, signed: bool) -> i128 {
    let (lo, hi) = range(bits, signed);
    v.clamp(lo, hi)
}

fn abs(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, _, _| wide(c, 0, i).abs())
}

fn abs_diff(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, _, _| (wide(c, 0, i) - wide(c, 1, i)).abs())
}

fn add_sat(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, bits, signed| {
        saturate(wide(c, 0, i) + wide(c, 1, i), bits, signed)
    })
}

fn sub_sat(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, bits, signed| {
        saturate(wide(c, 0, i) - wide(c, 1, i), bits, signed)
    })
}

fn mad_sat(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, bits, signed| {
        // An unsigned 64-bit product can exceed i128; saturate it first.
        let product = wide(c, 0, i).saturating_mul(wide(c, 1, i));
        saturate(product.saturating_add(wide(c, 2, i)), bits, signed)
    })
}

fn clz(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, bits, _| {
        let v = c.u(0, i) & mask(bits);
        i128::from(v.leading_zeros() - (64 - bits))
    })
}

fn popcount(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, bits, _| {
        i128::from((c.u(0, i) & mask(bits)).count_ones())
    })
}

fn hadd(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, _, _| (wide(c, 0, i) + wide(c, 1, i)) >> 1)
}

fn rhadd(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, _, _| (wide(c, 0, i) + wide(c, 1, i) + 1) >> 1)
}

/// High half of the double-width product.
fn high_product(c: &BuiltinCall<'_>, i: usize, bits: u32, signed: bool) -> i128 {
    if signed {
        (wide(c, 0, i) * wide(c, 1, i)) >> bits
    } else {
        let product = u128::from(c.u(0, i)) * u128::from(c.u(1, i));
        (product >> bits) as i128
    }
}

fn mul_hi(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, high_product)
}

fn mad_hi(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, bits, signed| {
        high_product(c, i, bits, signed).wrapping_add(wide(c, 2, i))
    })
}

fn mad24(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, _, _| {
        wide(c, 0, i)
            .wrapping_mul(wide(c, 1, i))
            .wrapping_add(wide(c, 2, i))
    })
}

fn mul24(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, _, _| wide(c, 0, i).wrapping_mul(wide(c, 1, i)))
}

fn rotate(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    each(call, out, |c, i, bits, _| {
        let v = c.u(0, i) & mask(bits);
        let by = (c.u(1, i) % u64::from(bits)) as u32;
        let rotated = if by == 0 {
            v
        } else {
            ((v << by) | (v >> (bits - by))) & mask(bits)
        };
        i128::from(rotated)
    })
}

/// `(hi << half) | lo`, where `half` is the width of the narrow inputs.
fn upsample(
    _: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let half = (out.lane_size() * 4) as u32;
    for i in 0..out.lanes() {
        let hi = call.u(0, i) & mask(half);
        let lo = call.u(1, i) & mask(half);
        out.set_u(i, (hi << half) | lo);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::super::testing::{call, i32s};
    use crate::types::Type;
    use crate::value::TypedValue;

    fn u8s(lanes: &[u8]) -> (TypedValue, Type) {
        let raw = lanes.iter().map(|&v| u64::from(v)).collect::<alloc::vec::Vec<_>>();
        (TypedValue::from_u_lanes(1, &raw), Type::vector(Type::I8, lanes.len() as u32))
    }

    #[test]
    fn saturating_arithmetic_respects_signedness() {
        let r = call("add_sat", "ii", Type::I32, vec![i32s(&[i32::MAX]), i32s(&[1])]);
        assert_eq!(r.get_s(0), i64::from(i32::MAX));
        let r = call("sub_sat", "jj", Type::I32, vec![i32s(&[1]), i32s(&[2])]);
        assert_eq!(r.get_u(0), 0);
        let r = call(
            "add_sat",
            "Dv2_hS_",
            Type::vector(Type::I8, 2),
            vec![u8s(&[200, 10]), u8s(&[100, 10])],
        );
        assert_eq!((r.get_u(0), r.get_u(1)), (255, 20));
    }

    #[test]
    fn high_products() {
        let r = call("mul_hi", "ii", Type::I32, vec![i32s(&[-2]), i32s(&[i32::MAX])]);
        assert_eq!(r.get_s(0), -1);
        let r = call("mul_hi", "jj", Type::I32, vec![i32s(&[-1]), i32s(&[-1])]);
        assert_eq!(r.get_u(0), 0xffff_fffe);
    }

    #[test]
    fn bit_counting_and_rotation() {
        let r = call("clz", "j", Type::I32, vec![i32s(&[1])]);
        assert_eq!(r.get_u(0), 31);
        let r = call("popcount", "i", Type::I32, vec![i32s(&[-1])]);
        assert_eq!(r.get_u(0), 32);
        let r = call("rotate", "jj", Type::I32, vec![i32s(&[1]), i32s(&[33])]);
        assert_eq!(r.get_u(0), 2);
        let r = call("rotate", "jj", Type::I32, vec![i32s(&[i32::MIN]), i32s(&[1])]);
        assert_eq!(r.get_u(0), 1);
    }

    #[test]
    fn averages_and_differences() {
        let r = call("hadd", "ii", Type::I32, vec![i32s(&[-3]), i32s(&[0])]);
        assert_eq!(r.get_s(0), -2);
        let r = call("rhadd", "ii", Type::I32, vec![i32s(&[-3]), i32s(&[0])]);
        assert_eq!(r.get_s(0), -1);
        let r = call("abs_diff", "ii", Type::I32, vec![i32s(&[i32::MIN]), i32s(&[i32::MAX])]);
        assert_eq!(r.get_u(0), u64::from(u32::MAX));
        let r = call("abs", "i", Type::I32, vec![i32s(&[-7])]);
        assert_eq!(r.get_u(0), 7);
    }

    #[test]
    fn upsample_joins_halves() {
        let r = call(
            "upsample",
            "hh",
            Type::I16,
            vec![
                (TypedValue::from_u(1, 0x12), Type::I8),
                (TypedValue::from_u(1, 0x34), Type::I8),
            ],
        );
        assert_eq!(r.get_u(0), 0x1234);
    }
}
