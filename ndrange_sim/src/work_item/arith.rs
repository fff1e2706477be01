// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lane-wise semantics of the value instructions.
//!
//! Every helper is total: malformed shapes produce zeros rather than panics, matching the
//! [`TypedValue`] accessor contract.

use crate::program::{BinOp, CastOp, FloatPredicate, IntPredicate};
use crate::types::Type;
use crate::value::TypedValue;

/// Low `bits` bits set.
pub(crate) const fn mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1 << bits) - 1 }
}

/// Sign-extends the low `bits` bits of `v`.
pub(crate) const fn sext(v: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return v as i64;
    }
    let shift = 64 - bits;
    ((v << shift) as i64) >> shift
}

/// Integer width of a scalar or vector element; pointers are 64 bits.
fn elem_bits(ty: &Type) -> u32 {
    match ty {
        Type::Int(bits) => *bits,
        Type::Vector { elem, .. } => elem_bits(elem),
        other => u32::try_from(other.size() * 8).unwrap_or(64),
    }
}

/// Lane `i` of `v`, broadcasting scalars.
fn lane(v: &TypedValue, i: usize) -> usize {
    if v.lanes() == 1 { 0 } else { i }
}

pub(crate) fn binary(op: BinOp, ty: &Type, lhs: &TypedValue, rhs: &TypedValue) -> TypedValue {
    let mut out = TypedValue::zero_of(ty);
    let bits = elem_bits(ty);
    let m = mask(bits);
    for i in 0..out.lanes() {
        let (li, ri) = (lane(lhs, i), lane(rhs, i));
        if matches!(
            op,
            BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv | BinOp::FRem
        ) {
            let (a, b) = (lhs.get_f(li), rhs.get_f(ri));
            let r = match op {
                BinOp::FAdd => a + b,
                BinOp::FSub => a - b,
                BinOp::FMul => a * b,
                BinOp::FDiv => a / b,
                _ => libm::fmod(a, b),
            };
            out.set_f(i, r);
            continue;
        }
        let (a, b) = (lhs.get_u(li) & m, rhs.get_u(ri) & m);
        let (sa, sb) = (sext(a, bits), sext(b, bits));
        let shift = u32::try_from(b % u64::from(bits.max(1))).unwrap_or(0);
        let r = match op {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::UDiv => a.checked_div(b).unwrap_or(0),
            BinOp::URem => a.checked_rem(b).unwrap_or(0),
            // Division by zero yields zero; `MIN / -1` wraps to `MIN` at every width.
            BinOp::SDiv if sb == 0 => 0,
            BinOp::SRem if sb == 0 => 0,
            BinOp::SDiv => sa.wrapping_div(sb) as u64,
            BinOp::SRem => sa.wrapping_rem(sb) as u64,
            BinOp::Shl => a << shift,
            BinOp::LShr => a >> shift,
            BinOp::AShr => (sa >> shift) as u64,
            BinOp::And => a & b,
            BinOp::Or => a | b,
            BinOp::Xor => a ^ b,
            BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv | BinOp::FRem => 0,
        };
        out.set_u(i, r & m);
    }
    out
}

/// Flips the sign bit of every lane.
pub(crate) fn fneg(v: &TypedValue) -> TypedValue {
    let mut out = v.clone();
    let sign = 1_u64 << (v.lane_size() * 8).saturating_sub(1).min(63);
    for i in 0..out.lanes() {
        out.set_u(i, v.get_u(i) ^ sign);
    }
    out
}

pub(crate) fn icmp(
    pred: IntPredicate,
    operand_ty: &Type,
    ty: &Type,
    lhs: &TypedValue,
    rhs: &TypedValue,
) -> TypedValue {
    let mut out = TypedValue::zero_of(ty);
    let bits = elem_bits(operand_ty);
    let m = mask(bits);
    for i in 0..out.lanes() {
        let (a, b) = (lhs.get_u(lane(lhs, i)) & m, rhs.get_u(lane(rhs, i)) & m);
        let (sa, sb) = (sext(a, bits), sext(b, bits));
        let r = match pred {
            IntPredicate::Eq => a == b,
            IntPredicate::Ne => a != b,
            IntPredicate::Ugt => a > b,
            IntPredicate::Uge => a >= b,
            IntPredicate::Ult => a < b,
            IntPredicate::Ule => a <= b,
            IntPredicate::Sgt => sa > sb,
            IntPredicate::Sge => sa >= sb,
            IntPredicate::Slt => sa < sb,
            IntPredicate::Sle => sa <= sb,
        };
        out.set_u(i, u64::from(r));
    }
    out
}

pub(crate) fn fcmp(pred: FloatPredicate, ty: &Type, lhs: &TypedValue, rhs: &TypedValue) -> TypedValue {
    let mut out = TypedValue::zero_of(ty);
    for i in 0..out.lanes() {
        let (a, b) = (lhs.get_f(lane(lhs, i)), rhs.get_f(lane(rhs, i)));
        let unordered = a.is_nan() || b.is_nan();
        let r = match pred {
            FloatPredicate::False => false,
            FloatPredicate::True => true,
            FloatPredicate::Ord => !unordered,
            FloatPredicate::Uno => unordered,
            FloatPredicate::Oeq => a == b,
            FloatPredicate::Ogt => a > b,
            FloatPredicate::Oge => a >= b,
            FloatPredicate::Olt => a < b,
            FloatPredicate::Ole => a <= b,
            FloatPredicate::One => !unordered && a != b,
            FloatPredicate::Ueq => unordered || a == b,
            FloatPredicate::Ugt => unordered || a > b,
            FloatPredicate::Uge => unordered || a >= b,
            FloatPredicate::Ult => unordered || a < b,
            FloatPredicate::Ule => unordered || a <= b,
            FloatPredicate::Une => unordered || a != b,
        };
        out.set_u(i, u64::from(r));
    }
    out
}

pub(crate) fn cast(op: CastOp, from: &Type, to: &Type, v: &TypedValue) -> TypedValue {
    let mut out = TypedValue::zero_of(to);
    if matches!(op, CastOp::BitCast | CastOp::AddrSpaceCast) {
        let shape = out.shape();
        return TypedValue::from_bytes(shape.lane_size, shape.lanes, v.bytes());
    }
    let from_bits = elem_bits(from);
    let to_mask = mask(elem_bits(to));
    for i in 0..out.lanes() {
        let j = lane(v, i);
        let raw = v.get_u(j) & mask(from_bits);
        match op {
            CastOp::Trunc | CastOp::ZExt | CastOp::PtrToInt | CastOp::IntToPtr => {
                out.set_u(i, raw & to_mask);
            }
            CastOp::SExt => out.set_u(i, sext(raw, from_bits) as u64 & to_mask),
            CastOp::FpTrunc | CastOp::FpExt => out.set_f(i, v.get_f(j)),
            CastOp::FpToUi => out.set_u(i, (v.get_f(j) as u64) & to_mask),
            CastOp::FpToSi => out.set_u(i, (v.get_f(j) as i64) as u64 & to_mask),
            CastOp::UiToFp => set_int_as_float(&mut out, i, raw as i128),
            CastOp::SiToFp => set_int_as_float(&mut out, i, i128::from(sext(raw, from_bits))),
            CastOp::BitCast | CastOp::AddrSpaceCast => {}
        }
    }
    out
}

/// Converts with a single rounding to the destination precision.
fn set_int_as_float(out: &mut TypedValue, i: usize, v: i128) {
    if out.lane_size() == 4 {
        out.set_u(i, u64::from((v as f32).to_bits()));
    } else {
        out.set_f(i, v as f64);
    }
}

pub(crate) fn select(cond: &TypedValue, if_true: &TypedValue, if_false: &TypedValue) -> TypedValue {
    if cond.lanes() == 1 {
        return if cond.get_u(0) & 1 != 0 {
            if_true.clone()
        } else {
            if_false.clone()
        };
    }
    let mut out = if_false.clone();
    for i in 0..out.lanes() {
        if cond.get_u(i) & 1 != 0 {
            out.copy_lane(i, if_true, i);
        }
    }
    out
}

pub(crate) fn extract_element(ty: &Type, vector: &TypedValue, index: u64) -> TypedValue {
    let mut out = TypedValue::zero_of(ty);
    if let Ok(index) = usize::try_from(index) {
        if index < vector.lanes() {
            out.copy_lane(0, vector, index);
        }
    }
    out
}

pub(crate) fn insert_element(vector: &TypedValue, element: &TypedValue, index: u64) -> TypedValue {
    let mut out = vector.clone();
    if let Ok(index) = usize::try_from(index) {
        if index < out.lanes() {
            out.copy_lane(index, element, 0);
        }
    }
    out
}

/// `shufflevector`: mask entries index the concatenation of `lhs` and `rhs`; `None` is undefined
/// and produces zero.
pub(crate) fn shuffle(
    ty: &Type,
    lhs: &TypedValue,
    rhs: &TypedValue,
    mask: &[Option<u32>],
) -> TypedValue {
    let mut out = TypedValue::zero_of(ty);
    for (i, m) in mask.iter().enumerate() {
        let Some(m) = m.map(|m| m as usize) else {
            continue;
        };
        if m < lhs.lanes() {
            out.copy_lane(i, lhs, m);
        } else {
            out.copy_lane(i, rhs, m - lhs.lanes());
        }
    }
    out
}

/// Byte offset and type of the member reached by `indices`.
fn member_offset<'t>(ty: &'t Type, indices: &[u32]) -> (usize, Option<&'t Type>) {
    let mut offset = 0;
    let mut current = Some(ty);
    for index in indices {
        let Some(ty) = current else {
            break;
        };
        offset += ty.field_offset(*index as usize);
        current = ty.field(*index as usize);
    }
    (offset, current)
}

pub(crate) fn extract_value(
    ty: &Type,
    aggregate_ty: &Type,
    aggregate: &TypedValue,
    indices: &[u32],
) -> TypedValue {
    let (offset, _) = member_offset(aggregate_ty, indices);
    let shape = ty.shape();
    let bytes = aggregate.bytes().get(offset..).unwrap_or_default();
    TypedValue::from_bytes(shape.lane_size, shape.lanes, bytes)
}

pub(crate) fn insert_value(
    aggregate_ty: &Type,
    aggregate: &TypedValue,
    element: &TypedValue,
    indices: &[u32],
) -> TypedValue {
    let (offset, _) = member_offset(aggregate_ty, indices);
    let mut out = aggregate.clone();
    if let Some(dst) = out.bytes_mut().get_mut(offset..) {
        let n = dst.len().min(element.len());
        dst[..n].copy_from_slice(&element.bytes()[..n]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn integer_division_by_zero_is_zero_and_min_over_minus_one_wraps() {
        let a = TypedValue::from_i32(7);
        let z = TypedValue::from_i32(0);
        assert_eq!(binary(BinOp::SDiv, &Type::I32, &a, &z).get_s(0), 0);
        assert_eq!(binary(BinOp::URem, &Type::I32, &a, &z).get_u(0), 0);
        let min = TypedValue::from_i32(i32::MIN);
        let neg1 = TypedValue::from_i32(-1);
        assert_eq!(
            binary(BinOp::SDiv, &Type::I32, &min, &neg1).get_s(0),
            i64::from(i32::MIN),
            "wraps"
        );
        assert_eq!(binary(BinOp::SRem, &Type::I32, &min, &neg1).get_s(0), 0);
        let min64 = TypedValue::from_u(8, i64::MIN as u64);
        let neg1_64 = TypedValue::from_u(8, u64::MAX);
        assert_eq!(binary(BinOp::SDiv, &Type::I64, &min64, &neg1_64).get_s(0), i64::MIN);
    }

    #[test]
    fn narrow_integers_wrap_and_shift_modulo_width() {
        let a = TypedValue::from_u(1, 0xff);
        let b = TypedValue::from_u(1, 1);
        assert_eq!(binary(BinOp::Add, &Type::I8, &a, &b).get_u(0), 0);
        assert_eq!(binary(BinOp::AShr, &Type::I8, &a, &b).get_s(0), -1);
        let nine = TypedValue::from_u(1, 9);
        assert_eq!(binary(BinOp::Shl, &Type::I8, &b, &nine).get_u(0), 2, "9 % 8 == 1");
    }

    #[test]
    fn float_ops_round_to_lane_precision() {
        let ty = Type::Float;
        let a = TypedValue::from_f32(1.0);
        let b = TypedValue::from_f32(3.0);
        let q = binary(BinOp::FDiv, &ty, &a, &b);
        assert_eq!(q.get_f(0), f64::from(1.0_f32 / 3.0), "rounded to f32");
        let r = binary(BinOp::FRem, &ty, &TypedValue::from_f32(-7.5), &TypedValue::from_f32(2.0));
        assert_eq!(r.get_f(0), -1.5);
    }

    #[test]
    fn vector_ops_broadcast_scalars() {
        let ty = Type::vector(Type::I32, 4);
        let v = TypedValue::from_u_lanes(4, &[1, 2, 3, 4]);
        let s = TypedValue::from_i32(10);
        let r = binary(BinOp::Mul, &ty, &v, &s);
        assert_eq!(
            (0..4).map(|i| r.get_u(i)).collect::<alloc::vec::Vec<_>>(),
            vec![10, 20, 30, 40]
        );
    }

    #[test]
    fn comparisons_respect_signedness_and_nan() {
        let a = TypedValue::from_i32(-1);
        let b = TypedValue::from_i32(1);
        assert!(icmp(IntPredicate::Slt, &Type::I32, &Type::BOOL, &a, &b).get_bool(0));
        assert!(!icmp(IntPredicate::Ult, &Type::I32, &Type::BOOL, &a, &b).get_bool(0));
        let nan = TypedValue::from_f32(f32::NAN);
        let one = TypedValue::from_f32(1.0);
        assert!(!fcmp(FloatPredicate::Oeq, &Type::BOOL, &nan, &nan).get_bool(0));
        assert!(fcmp(FloatPredicate::Une, &Type::BOOL, &nan, &one).get_bool(0));
    }

    #[test]
    fn casts() {
        let b = TypedValue::from_u(1, 0x80);
        assert_eq!(cast(CastOp::SExt, &Type::I8, &Type::I32, &b).get_s(0), -128);
        assert_eq!(cast(CastOp::ZExt, &Type::I8, &Type::I32, &b).get_u(0), 128);
        let f = TypedValue::from_f32(-3.75);
        assert_eq!(cast(CastOp::FpToSi, &Type::Float, &Type::I32, &f).get_s(0), -3);
        let big = TypedValue::from_u64(u64::MAX);
        let as_f = cast(CastOp::UiToFp, &Type::I64, &Type::Float, &big);
        assert_eq!(as_f.get_f(0), 18_446_744_073_709_551_616.0);
        let bits = cast(CastOp::BitCast, &Type::Float, &Type::I32, &TypedValue::from_f32(1.0));
        assert_eq!(bits.get_u(0), 0x3f80_0000);
    }

    #[test]
    fn shuffle_and_aggregates() {
        let ty = Type::vector(Type::I32, 4);
        let l = TypedValue::from_u_lanes(4, &[0, 1, 2, 3]);
        let r = TypedValue::from_u_lanes(4, &[4, 5, 6, 7]);
        let s = shuffle(&ty, &l, &r, &[Some(7), Some(0), None, Some(4)]);
        assert_eq!([s.get_u(0), s.get_u(1), s.get_u(2), s.get_u(3)], [7, 0, 0, 4]);

        let st = Type::Struct {
            fields: vec![Type::I8, Type::I32, Type::vector(Type::Float, 3)],
        };
        let agg = TypedValue::zero_of(&st);
        let agg = insert_value(&st, &agg, &TypedValue::from_i32(42), &[1]);
        assert_eq!(extract_value(&Type::I32, &st, &agg, &[1]).get_s(0), 42);
        assert_eq!(agg.bytes()[4], 42, "field 1 is 4-aligned");
        let agg = insert_value(&st, &agg, &TypedValue::from_f32(2.5), &[2, 1]);
        assert_eq!(extract_value(&Type::Float, &st, &agg, &[2, 1]).get_f(0), 2.5);
    }
}
