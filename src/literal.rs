//! Decoding of literal token text into values.
//!
//! The lexer uses the same routines to validate rune and string literals, so
//! a literal that lexes cleanly always decodes.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use crate::error::LexErrorKind;

/// Exponents beyond this magnitude are rejected instead of materialising a
/// huge power of ten.
pub const MAX_EXPONENT: i64 = 10_000;

#[inline(always)]
const fn hex_value(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u32),
        b'a'..=b'f' => Some((b - b'a') as u32 + 10),
        b'A'..=b'F' => Some((b - b'A') as u32 + 10),
        _ => None,
    }
}

#[inline(always)]
const fn is_valid_unicode_scalar(x: u32) -> bool {
    x <= 0x10_FFFF && !(x >= 0xD800 && x <= 0xDFFF)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escaped {
    /// `\xHH` or `\OOO`: a single byte, not a code point.
    Byte(u8),
    Char(u32),
}

/// Decodes the escape starting at `b[i] == b'\\'`; returns the value and the
/// number of bytes consumed (backslash included).
fn decode_escape(b: &[u8], i: usize, quote: u8) -> Result<(Escaped, usize), LexErrorKind> {
    let c = *b.get(i + 1).ok_or(LexErrorKind::InvalidEscape)?;
    let simple = match c {
        b'a' => Some(0x07),
        b'b' => Some(0x08),
        b'f' => Some(0x0C),
        b'n' => Some(b'\n' as u32),
        b'r' => Some(b'\r' as u32),
        b't' => Some(b'\t' as u32),
        b'v' => Some(0x0B),
        b'\\' => Some(b'\\' as u32),
        _ if c == quote => Some(c as u32),
        _ => None,
    };
    if let Some(v) = simple {
        return Ok((Escaped::Char(v), 2));
    }

    let (digits, radix) = match c {
        b'x' => (2, 16),
        b'u' => (4, 16),
        b'U' => (8, 16),
        b'0'..=b'7' => (3, 8),
        _ => return Err(LexErrorKind::InvalidEscape),
    };
    let start = if radix == 8 { i + 1 } else { i + 2 };
    let body = b
        .get(start..start + digits)
        .ok_or(LexErrorKind::InvalidEscape)?;

    let mut v = 0u32;
    for &d in body {
        let dv = hex_value(d).filter(|&x| x < radix).ok_or(LexErrorKind::InvalidEscape)?;
        v = v * radix + dv;
    }
    let consumed = start + digits - i;

    match c {
        b'x' => Ok((Escaped::Byte(v as u8), consumed)),
        b'0'..=b'7' if v > 255 => Err(LexErrorKind::InvalidEscape),
        b'0'..=b'7' => Ok((Escaped::Byte(v as u8), consumed)),
        _ if !is_valid_unicode_scalar(v) => Err(LexErrorKind::InvalidEscape),
        _ => Ok((Escaped::Char(v), consumed)),
    }
}

fn push_char(out: &mut Vec<u8>, cp: u32) {
    let ch = char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER);
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
}

/// Decodes an interpreted (`"..."`) or raw (`` `...` ``) string literal into
/// its byte value. Carriage returns are dropped from raw strings.
pub fn unquote_string(raw: &str) -> Result<Vec<u8>, LexErrorKind> {
    let b = raw.as_bytes();
    if b.len() < 2 {
        return Err(LexErrorKind::UnterminatedString);
    }
    let body = &b[1..b.len() - 1];
    match (b[0], b[b.len() - 1]) {
        (b'`', b'`') => Ok(body.iter().copied().filter(|&c| c != b'\r').collect()),
        (b'"', b'"') => {
            let mut out = Vec::with_capacity(body.len());
            let mut i = 0;
            while i < body.len() {
                match body[i] {
                    b'\\' => {
                        let (e, n) = decode_escape(body, i, b'"')?;
                        match e {
                            Escaped::Byte(x) => out.push(x),
                            Escaped::Char(cp) => push_char(&mut out, cp),
                        }
                        i += n;
                    }
                    b'\n' => return Err(LexErrorKind::UnterminatedString),
                    c => {
                        out.push(c);
                        i += 1;
                    }
                }
            }
            Ok(out)
        }
        _ => Err(LexErrorKind::UnterminatedString),
    }
}

/// Decodes a rune literal (`'x'`, `'\n'`, `'é'`) into its code point.
pub fn unquote_rune(raw: &str) -> Result<u32, LexErrorKind> {
    let b = raw.as_bytes();
    if b.len() < 3 || b[0] != b'\'' || b[b.len() - 1] != b'\'' {
        return Err(LexErrorKind::InvalidRune);
    }
    let body = &b[1..b.len() - 1];
    let (value, consumed) = if body[0] == b'\\' {
        match decode_escape(body, 0, b'\'')? {
            (Escaped::Byte(x), n) => (x as u32, n),
            (Escaped::Char(cp), n) => (cp, n),
        }
    } else {
        let s = &raw[1..raw.len() - 1];
        let ch = s.chars().next().ok_or(LexErrorKind::InvalidRune)?;
        (ch as u32, ch.len_utf8())
    };
    if consumed != body.len() {
        return Err(LexErrorKind::InvalidRune);
    }
    Ok(value)
}

fn strip_underscores(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains('_') {
        std::borrow::Cow::Owned(s.chars().filter(|&c| c != '_').collect())
    } else {
        std::borrow::Cow::Borrowed(s)
    }
}

/// Value of an integer literal in any base (`0x`, `0o`, `0b`, legacy `0`).
pub fn parse_int(raw: &str) -> Option<BigInt> {
    let s = strip_underscores(raw);
    let s = s.as_ref();
    let lower = s.get(..2).map(str::to_ascii_lowercase);
    let (digits, radix) = match lower.as_deref() {
        Some("0x") => (&s[2..], 16),
        Some("0o") => (&s[2..], 8),
        Some("0b") => (&s[2..], 2),
        _ if s.len() > 1 && s.starts_with('0') => (&s[1..], 8),
        _ => (s, 10),
    };
    if digits.is_empty() {
        return None;
    }
    BigInt::parse_bytes(digits.as_bytes(), radix)
}

fn pow_rational(base: u32, exp: i64) -> Option<BigRational> {
    if exp.abs() > MAX_EXPONENT {
        return None;
    }
    let p = num_traits::pow(BigInt::from(base), exp.unsigned_abs() as usize);
    Some(if exp >= 0 {
        BigRational::from_integer(p)
    } else {
        BigRational::new(BigInt::one(), p)
    })
}

/// Exact value of a floating-point literal (decimal or hexadecimal).
pub fn parse_float(raw: &str) -> Option<BigRational> {
    let s = strip_underscores(raw);
    let s = s.as_ref();
    let is_hex = s.len() > 2 && s[..2].eq_ignore_ascii_case("0x");

    let (body, exp_char_base) = if is_hex { (&s[2..], 2u32) } else { (s, 10u32) };
    let exp_pos = if is_hex {
        body.find(['p', 'P'])
    } else {
        body.find(['e', 'E'])
    };
    let (mantissa, exp) = match exp_pos {
        Some(p) => (&body[..p], body[p + 1..].parse::<i64>().ok()?),
        None => (&body[..], 0),
    };

    let (int_part, frac_part) = match mantissa.find('.') {
        Some(p) => (&mantissa[..p], &mantissa[p + 1..]),
        None => (mantissa, ""),
    };
    let radix = if is_hex { 16 } else { 10 };
    let digits: String = int_part.chars().chain(frac_part.chars()).collect();
    let m = if digits.is_empty() {
        BigInt::zero()
    } else {
        BigInt::parse_bytes(digits.as_bytes(), radix)?
    };

    // Each fractional digit scales by 1/radix; for hex that is 2^-4.
    let frac_len = frac_part.len() as i64;
    let scale = if is_hex {
        exp - 4 * frac_len
    } else {
        exp - frac_len
    };
    Some(BigRational::from_integer(m) * pow_rational(exp_char_base, scale)?)
}

/// Exact value of an imaginary literal's coefficient.
///
/// `0123i` is decimal for backward compatibility, unlike the integer `0123`.
pub fn parse_imag(raw: &str) -> Option<BigRational> {
    let body = raw.strip_suffix('i')?;
    let s = strip_underscores(body);
    let looks_int = s.bytes().all(|b| b.is_ascii_digit());
    if looks_int {
        return BigInt::parse_bytes(s.as_bytes(), 10).map(BigRational::from_integer);
    }
    let lower = s.to_ascii_lowercase();
    if (lower.starts_with("0x") && !lower.contains('p'))
        || lower.starts_with("0o")
        || lower.starts_with("0b")
    {
        return parse_int(body).map(BigRational::from_integer);
    }
    parse_float(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_escapes_decode_to_bytes() {
        assert_eq!(unquote_string(r#""a\tb""#).unwrap(), b"a\tb");
        assert_eq!(unquote_string(r#""\xff\101""#).unwrap(), b"\xffA");
        assert_eq!(unquote_string(r#""é""#).unwrap(), "é".as_bytes());
        assert_eq!(unquote_string("`a\r\nb`").unwrap(), b"a\nb");
        assert_eq!(
            unquote_string(r#""\'""#),
            Err(LexErrorKind::InvalidEscape)
        );
        assert_eq!(
            unquote_string(r#""\400""#),
            Err(LexErrorKind::InvalidEscape)
        );
    }

    #[test]
    fn rune_values() {
        assert_eq!(unquote_rune("'a'"), Ok('a' as u32));
        assert_eq!(unquote_rune("'é'"), Ok('é' as u32));
        assert_eq!(unquote_rune(r"'\n'"), Ok(10));
        assert_eq!(unquote_rune(r"'\377'"), Ok(255));
        assert_eq!(unquote_rune(r"'\U0010FFFF'"), Ok(0x10FFFF));
        assert_eq!(unquote_rune(r"'\uD800'"), Err(LexErrorKind::InvalidEscape));
        assert_eq!(unquote_rune("'ab'"), Err(LexErrorKind::InvalidRune));
        assert_eq!(unquote_rune(r#"'\"'"#), Err(LexErrorKind::InvalidEscape));
    }

    #[test]
    fn integer_bases() {
        assert_eq!(parse_int("42"), Some(BigInt::from(42)));
        assert_eq!(parse_int("0x_FF"), Some(BigInt::from(255)));
        assert_eq!(parse_int("0o17"), Some(BigInt::from(15)));
        assert_eq!(parse_int("017"), Some(BigInt::from(15)));
        assert_eq!(parse_int("0b1010"), Some(BigInt::from(10)));
        assert_eq!(parse_int("1_000_000"), Some(BigInt::from(1_000_000)));
        assert_eq!(parse_int("0"), Some(BigInt::from(0)));
    }

    #[test]
    fn floats_are_exact() {
        let r = |n: i64, d: i64| BigRational::new(BigInt::from(n), BigInt::from(d));
        assert_eq!(parse_float("0.1"), Some(r(1, 10)));
        assert_eq!(parse_float("1e3"), Some(r(1000, 1)));
        assert_eq!(parse_float("1.5e-1"), Some(r(15, 100)));
        assert_eq!(parse_float(".5"), Some(r(1, 2)));
        assert_eq!(parse_float("0x1p-2"), Some(r(1, 4)));
        assert_eq!(parse_float("0x1.8p1"), Some(r(3, 1)));
        assert_eq!(parse_float("1e100000"), None);
    }

    #[test]
    fn imaginary_coefficients() {
        let r = |n: i64, d: i64| BigRational::new(BigInt::from(n), BigInt::from(d));
        assert_eq!(parse_imag("0123i"), Some(r(123, 1)));
        assert_eq!(parse_imag("2.5i"), Some(r(5, 2)));
        assert_eq!(parse_imag("0x10i"), Some(r(16, 1)));
    }
}
