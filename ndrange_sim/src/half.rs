// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! IEEE-754 binary16 codec with explicit rounding modes.
//!
//! Narrowing works on the exact integer significand of the source value, so every rounding mode is
//! computed in software without touching the host floating-point environment.

/// Rounding mode for narrowing conversions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RoundingMode {
    /// Round to nearest, ties to even (`_rte`).
    #[default]
    NearestEven,
    /// Round toward zero (`_rtz`).
    TowardZero,
    /// Round toward positive infinity (`_rtp`).
    TowardPositive,
    /// Round toward negative infinity (`_rtn`).
    TowardNegative,
}

impl RoundingMode {
    /// Parses a conversion suffix (`rte`, `rtz`, `rtp`, `rtn`).
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "rte" => Some(Self::NearestEven),
            "rtz" => Some(Self::TowardZero),
            "rtp" => Some(Self::TowardPositive),
            "rtn" => Some(Self::TowardNegative),
            _ => None,
        }
    }
}

const HALF_INF: u16 = 0x7c00;
const HALF_MAX: u16 = 0x7bff;
const HALF_QNAN: u16 = 0x7e00;

/// Widens a binary16 bit pattern to `f32` (exact).
#[must_use]
pub fn half_to_float(h: u16) -> f32 {
    let sign = u32::from(h & 0x8000) << 16;
    let exp = u32::from((h >> 10) & 0x1f);
    let mant = u32::from(h & 0x3ff);
    let bits = match (exp, mant) {
        (0, 0) => sign,
        (0, _) => {
            // Subnormal: renormalize into an f32 normal.
            let shift = mant.leading_zeros() - 21;
            let mant = (mant << shift) & 0x3ff;
            let exp = 127 - 15 + 1 - shift;
            sign | (exp << 23) | (mant << 13)
        }
        (0x1f, 0) => sign | 0x7f80_0000,
        (0x1f, _) => sign | 0x7fc0_0000 | (mant << 13),
        _ => sign | ((exp + 127 - 15) << 23) | (mant << 13),
    };
    f32::from_bits(bits)
}

/// Narrows an `f32` to binary16 with the given rounding mode.
#[must_use]
#[inline]
pub fn float_to_half(value: f32, mode: RoundingMode) -> u16 {
    double_to_half(f64::from(value), mode)
}

/// Narrows an `f64` to binary16 with the given rounding mode.
///
/// NaN becomes the quiet NaN `0x7e00` with the source sign. Overflow produces infinity, except that
/// modes rounding toward zero for the value's sign saturate to the largest finite half.
#[must_use]
pub fn double_to_half(value: f64, mode: RoundingMode) -> u16 {
    let bits = value.to_bits();
    let negative = (bits >> 63) != 0;
    let sign: u16 = if negative { 0x8000 } else { 0 };
    if value.is_nan() {
        return HALF_QNAN | sign;
    }
    if value.is_infinite() {
        return HALF_INF | sign;
    }
    if value == 0.0 {
        return sign;
    }

    let biased = ((bits >> 52) & 0x7ff) as i32;
    let frac = bits & ((1_u64 << 52) - 1);
    let (sig, exp) = if biased == 0 {
        (frac, -1074)
    } else {
        (frac | (1_u64 << 52), biased - 1075)
    };
    // value = sig * 2^exp; floor(log2(value)):
    let log2 = (63 - sig.leading_zeros() as i32) + exp;
    // Exponent of the last significand bit in the target format.
    let quantum = if log2 < -14 { -24 } else { log2 - 10 };

    let shift = quantum - exp;
    let (mut n, rem, halfway) = if shift <= 0 {
        (u128::from(sig) << (-shift) as u32, 0_u128, 1_u128)
    } else if shift >= 120 {
        (0, 1, 2)
    } else {
        let sig = u128::from(sig);
        let shift = shift as u32;
        (sig >> shift, sig & ((1 << shift) - 1), 1 << (shift - 1))
    };

    let round_up = match mode {
        RoundingMode::NearestEven => rem > halfway || (rem == halfway && n & 1 == 1),
        RoundingMode::TowardZero => false,
        RoundingMode::TowardPositive => rem != 0 && !negative,
        RoundingMode::TowardNegative => rem != 0 && negative,
    };
    if round_up {
        n += 1;
    }

    if quantum == -24 {
        // Subnormal range; a carry into bit 10 yields the smallest normal encoding naturally.
        return sign | (n as u16);
    }

    let mut half_exp = log2;
    if n == 2048 {
        n = 1024;
        half_exp += 1;
    }
    let field = half_exp + 15;
    if field >= 31 {
        let saturate = match mode {
            RoundingMode::NearestEven => false,
            RoundingMode::TowardZero => true,
            RoundingMode::TowardPositive => negative,
            RoundingMode::TowardNegative => !negative,
        };
        return sign | if saturate { HALF_MAX } else { HALF_INF };
    }
    sign | ((field as u16) << 10) | ((n as u16) & 0x3ff)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    const MODES: [RoundingMode; 4] = [
        RoundingMode::NearestEven,
        RoundingMode::TowardZero,
        RoundingMode::TowardPositive,
        RoundingMode::TowardNegative,
    ];

    #[test]
    fn every_finite_half_round_trips_in_every_mode() {
        for h in 0..=u16::MAX {
            let f = half_to_float(h);
            if f.is_nan() {
                continue;
            }
            for mode in MODES {
                assert_eq!(float_to_half(f, mode), h, "h={h:#06x} mode={mode:?}");
            }
        }
    }

    #[test]
    fn special_patterns() {
        assert!(half_to_float(0x7c00).is_infinite());
        assert!(half_to_float(0xfc00).is_sign_negative());
        assert!(half_to_float(0x7e00).is_nan());
        assert_eq!(float_to_half(f32::NAN, RoundingMode::NearestEven), 0x7e00);
        assert_eq!(float_to_half(-f32::NAN, RoundingMode::NearestEven), 0xfe00);
        assert_eq!(half_to_float(0x0001), f32::from_bits(0x3380_0000));
        assert_eq!(half_to_float(0x3c00), 1.0);
    }

    #[test]
    fn overflow_saturates_by_mode() {
        let big = 1.0e6_f32;
        assert_eq!(float_to_half(big, RoundingMode::NearestEven), 0x7c00);
        assert_eq!(float_to_half(big, RoundingMode::TowardZero), 0x7bff);
        assert_eq!(float_to_half(big, RoundingMode::TowardPositive), 0x7c00);
        assert_eq!(float_to_half(big, RoundingMode::TowardNegative), 0x7bff);
        assert_eq!(float_to_half(-big, RoundingMode::TowardPositive), 0xfbff);
        assert_eq!(float_to_half(-big, RoundingMode::TowardNegative), 0xfc00);
    }

    #[test]
    fn directed_rounding_between_neighbours() {
        // 1 + 2^-11 sits exactly between 1.0 (0x3c00) and the next half (0x3c01).
        let tie = 1.0_f32 + f32::from_bits(0x3a00_0000);
        assert_eq!(float_to_half(tie, RoundingMode::NearestEven), 0x3c00);
        assert_eq!(float_to_half(tie, RoundingMode::TowardZero), 0x3c00);
        assert_eq!(float_to_half(tie, RoundingMode::TowardPositive), 0x3c01);
        assert_eq!(float_to_half(-tie, RoundingMode::TowardNegative), 0xbc01);
        // Tiny values round to zero or the smallest subnormal.
        let tiny = 1.0e-30_f64;
        assert_eq!(double_to_half(tiny, RoundingMode::NearestEven), 0);
        assert_eq!(double_to_half(tiny, RoundingMode::TowardPositive), 1);
        assert_eq!(double_to_half(-tiny, RoundingMode::TowardNegative), 0x8001);
    }

    #[test]
    fn suffix_parsing() {
        assert_eq!(RoundingMode::from_suffix("rtz"), Some(RoundingMode::TowardZero));
        assert_eq!(RoundingMode::from_suffix("sat"), None);
    }
}
