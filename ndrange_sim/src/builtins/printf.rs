// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kernel `printf`.
//!
//! The format string is read from simulated memory and rendered with C conversion semantics,
//! including the OpenCL `v<n>` vector modifier (elements joined by `,`). Output goes to the
//! observer's output hook.

use alloc::format;
use alloc::string::{String, ToString};

use super::{Aux, BuiltinCall, BuiltinTable};
use crate::address::Address;
use crate::error::SimError;
use crate::value::TypedValue;
use crate::work_item::Ctx;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add("printf", printf, Aux::None);
}

/// One parsed conversion specification.
#[derive(Clone, Debug, Default, PartialEq)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    vector: usize,
    conversion: char,
}

/// Parses the text after a `%`; returns the spec and the number of bytes consumed.
fn parse_spec(s: &str) -> Option<(Spec, usize)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut spec = Spec {
        vector: 1,
        ..Spec::default()
    };
    while let Some(&b) = bytes.get(i) {
        match b {
            b'-' => spec.left = true,
            b'+' => spec.plus = true,
            b' ' => spec.space = true,
            b'#' => spec.alt = true,
            b'0' => spec.zero = true,
            _ => break,
        }
        i += 1;
    }
    let digits = |i: &mut usize| {
        let start = *i;
        while bytes.get(*i).is_some_and(u8::is_ascii_digit) {
            *i += 1;
        }
        s[start..*i].parse::<usize>().ok()
    };
    spec.width = digits(&mut i).unwrap_or(0);
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        spec.precision = Some(digits(&mut i).unwrap_or(0));
    }
    if bytes.get(i) == Some(&b'v') {
        i += 1;
        spec.vector = digits(&mut i)?;
    }
    while let Some(b'h' | b'l') = bytes.get(i) {
        i += 1;
    }
    let conversion = *bytes.get(i)?;
    spec.conversion = char::from(conversion);
    Some((spec, i + 1))
}

fn pad(spec: &Spec, body: String, zero_ok: bool) -> String {
    let len = body.chars().count();
    if len >= spec.width {
        return body;
    }
    let fill = spec.width - len;
    if spec.left {
        return format!("{body}{}", " ".repeat(fill));
    }
    if spec.zero && zero_ok {
        // Zeros go after any sign or radix prefix.
        let split = body
            .find(|c: char| c.is_ascii_digit())
            .map_or(0, |at| {
                if body[at..].starts_with("0x") || body[at..].starts_with("0X") {
                    at + 2
                } else {
                    at
                }
            });
        return format!("{}{}{}", &body[..split], "0".repeat(fill), &body[split..]);
    }
    format!("{}{body}", " ".repeat(fill))
}

fn sign_prefix(spec: &Spec, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

fn format_int(spec: &Spec, value: &TypedValue, lane: usize) -> String {
    let signed = matches!(spec.conversion, 'd' | 'i');
    let (negative, magnitude) = if signed {
        let v = value.get_s(lane);
        (v < 0, v.unsigned_abs())
    } else {
        (false, value.get_u(lane))
    };
    let mut digits = match spec.conversion {
        'o' => format!("{magnitude:o}"),
        'x' => format!("{magnitude:x}"),
        'X' => format!("{magnitude:X}"),
        _ => magnitude.to_string(),
    };
    if let Some(p) = spec.precision {
        if p == 0 && magnitude == 0 {
            digits.clear();
        } else if digits.len() < p {
            digits = format!("{}{digits}", "0".repeat(p - digits.len()));
        }
    }
    let prefix = match spec.conversion {
        'o' if spec.alt && !digits.starts_with('0') => "0",
        'x' if spec.alt && magnitude != 0 => "0x",
        'X' if spec.alt && magnitude != 0 => "0X",
        _ => "",
    };
    let sign = if signed { sign_prefix(spec, negative) } else { "" };
    pad(
        spec,
        format!("{sign}{prefix}{digits}"),
        spec.precision.is_none(),
    )
}

/// `d.ddde±XX` with at least two exponent digits.
fn exponential(x: f64, precision: usize, upper: bool) -> String {
    let s = format!("{x:.precision$e}");
    let (mantissa, exp) = s.split_once('e').unwrap_or((&s, "0"));
    let exp = exp.parse::<i32>().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{:02}", exp.unsigned_abs())
}

/// Decimal exponent `x` would print with under `%e` at `precision`.
fn decimal_exponent(x: f64, precision: usize) -> i32 {
    let s = format!("{x:.precision$e}");
    s.split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0)
}

fn strip_trailing_zeros(s: &str) -> String {
    match s.split_once(|c| c == 'e' || c == 'E') {
        Some((mantissa, exp)) => {
            let idx = s.len() - exp.len() - 1;
            let e = &s[idx..idx + 1];
            format!("{}{e}{exp}", strip_trailing_zeros(mantissa))
        }
        None if s.contains('.') => s.trim_end_matches('0').trim_end_matches('.').to_string(),
        None => s.to_string(),
    }
}

fn hex_float(x: f64, precision: Option<usize>, upper: bool) -> String {
    let bits = x.to_bits();
    let exp_bits = ((bits >> 52) & 0x7ff) as i32;
    let mut mantissa = bits & ((1 << 52) - 1);
    let (mut lead, exp) = match (exp_bits, mantissa) {
        (0, 0) => (0, 0),
        (0, _) => (0, -1022),
        _ => (1, exp_bits - 1023),
    };
    let mut digits = 13;
    if let Some(p) = precision.filter(|&p| p < 13) {
        let drop = 4 * (13 - p) as u32;
        let half = 1_u64 << (drop - 1);
        let rem = mantissa & ((1 << drop) - 1);
        mantissa >>= drop;
        let odd = if p == 0 { lead & 1 == 1 } else { mantissa & 1 == 1 };
        if rem > half || (rem == half && odd) {
            mantissa += 1;
            // A carry out of the fraction bumps the leading digit without renormalizing.
            if mantissa >> (4 * p) != 0 {
                mantissa &= (1 << (4 * p)) - 1;
                lead += 1;
            }
        }
        digits = p;
    }
    let mut frac = if digits == 0 {
        String::new()
    } else {
        format!("{mantissa:0digits$x}")
    };
    if precision.is_none() {
        frac = frac.trim_end_matches('0').to_string();
    }
    let dot = if frac.is_empty() { "" } else { "." };
    let s = format!("0x{lead}{dot}{frac}p{exp:+}");
    if upper { s.to_uppercase() } else { s }
}

fn format_float(spec: &Spec, x: f64) -> String {
    let upper = spec.conversion.is_ascii_uppercase();
    let negative = x.is_sign_negative();
    let sign = sign_prefix(spec, negative);
    let a = libm::fabs(x);
    if !a.is_finite() {
        let body = if a.is_nan() { "nan" } else { "inf" };
        let body = if upper {
            body.to_uppercase()
        } else {
            body.to_string()
        };
        return pad(spec, format!("{sign}{body}"), false);
    }
    let precision = spec.precision.unwrap_or(6);
    let body = match spec.conversion {
        'f' | 'F' => format!("{a:.precision$}"),
        'e' | 'E' => exponential(a, precision, upper),
        'g' | 'G' => {
            let p = if precision == 0 { 1 } else { precision };
            let exp = decimal_exponent(a, p - 1);
            let s = if exp < -4 || exp >= p as i32 {
                exponential(a, p - 1, upper)
            } else {
                let decimals = (p as i32 - 1 - exp) as usize;
                format!("{a:.decimals$}")
            };
            if spec.alt {
                s
            } else {
                strip_trailing_zeros(&s)
            }
        }
        _ => hex_float(a, spec.precision, upper),
    };
    pad(spec, format!("{sign}{body}"), true)
}

fn format_char(spec: &Spec, value: &TypedValue, lane: usize) -> String {
    let c = char::from(value.get_u(lane) as u8);
    pad(spec, c.to_string(), false)
}

fn format_string(ctx: &mut Ctx<'_, '_, '_>, spec: &Spec, address: Address) -> String {
    let mut s = if address.is_null() {
        String::from("(null)")
    } else {
        ctx.read_c_string(address)
    };
    if let Some(p) = spec.precision {
        s = s.chars().take(p).collect();
    }
    pad(spec, s, false)
}

fn printf(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    out: &mut TypedValue,
) -> Result<(), SimError> {
    let format = ctx.read_c_string(call.ptr(0)?);
    let mut text = String::new();
    let mut next_arg = 1;
    let mut rest = format.as_str();
    while let Some(at) = rest.find('%') {
        text.push_str(&rest[..at]);
        rest = &rest[at + 1..];
        if let Some(after) = rest.strip_prefix('%') {
            text.push('%');
            rest = after;
            continue;
        }
        let Some((spec, used)) = parse_spec(rest) else {
            text.push('%');
            continue;
        };
        rest = &rest[used..];
        let Some(value) = call.args.get(next_arg) else {
            break;
        };
        next_arg += 1;
        let lanes = if spec.vector > 1 {
            spec.vector.min(value.lanes())
        } else {
            1
        };
        for lane in 0..lanes {
            if lane > 0 {
                text.push(',');
            }
            let piece = match spec.conversion {
                'd' | 'i' | 'o' | 'u' | 'x' | 'X' => format_int(&spec, value, lane),
                'c' => format_char(&spec, value, lane),
                'p' => pad(&spec, format!("0x{:x}", value.get_u(lane)), false),
                'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'a' | 'A' => {
                    format_float(&spec, value.get_f(lane))
                }
                's' => format_string(ctx, &spec, value.get_address(lane)),
                other => {
                    tracing::debug!(conversion = %other, "unknown printf conversion");
                    String::new()
                }
            };
            text.push_str(&piece);
        }
    }
    text.push_str(rest);
    ctx.output(&text);
    out.set_s(0, 0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> Spec {
        parse_spec(s).unwrap().0
    }

    fn float(s: &str, x: f64) -> String {
        format_float(&spec(s), x)
    }

    fn int(s: &str, v: i64) -> String {
        format_int(&spec(s), &TypedValue::from_s(4, v), 0)
    }

    #[test]
    fn parses_flags_width_precision_and_vectors() {
        let s = spec("-08.3v4hlf");
        assert!(s.left && s.zero);
        assert_eq!((s.width, s.precision, s.vector, s.conversion), (8, Some(3), 4, 'f'));
        assert_eq!(parse_spec("d rest").map(|(_, n)| n), Some(1));
        assert!(parse_spec("v").is_none());
    }

    #[test]
    fn integers() {
        assert_eq!(int("d", -42), "-42");
        assert_eq!(int("5d", 42), "   42");
        assert_eq!(int("-5d|", 42), "42   ");
        assert_eq!(int("05d", -42), "-0042");
        assert_eq!(int("+d", 7), "+7");
        assert_eq!(int(".3d", 7), "007");
        assert_eq!(int("#x", 255), "0xff");
        assert_eq!(int("X", 255), "FF");
        assert_eq!(int("#o", 8), "010");
        assert_eq!(int("u", -1), "4294967295");
    }

    #[test]
    fn floats() {
        assert_eq!(float("f", 1.5), "1.500000");
        assert_eq!(float(".2f", -0.126), "-0.13");
        assert_eq!(float("e", 1234.5), "1.234500e+03");
        assert_eq!(float(".1E", 0.00012), "1.2E-04");
        assert_eq!(float("g", 100000.0), "100000");
        assert_eq!(float("g", 1000000.0), "1e+06");
        assert_eq!(float("g", 0.0001), "0.0001");
        assert_eq!(float("g", 0.5), "0.5");
        assert_eq!(float("8.3f", 3.14159), "   3.142");
        assert_eq!(float("08.3f", -3.14159), "-003.142");
        assert_eq!(float("f", f64::INFINITY), "inf");
        assert_eq!(float("F", f64::NAN), "NAN");
    }

    #[test]
    fn hex_floats() {
        assert_eq!(float("a", 1.0), "0x1p+0");
        assert_eq!(float("a", 0.5), "0x1p-1");
        assert_eq!(float("a", 3.0), "0x1.8p+1");
        assert_eq!(float("A", 10.0), "0X1.4P+3");
        assert_eq!(float(".0a", 1.5), "0x2p+0");
    }
}
