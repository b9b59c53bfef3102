//! Compile-time constant values.
//!
//! Integers are unbounded [`BigInt`]s and floats exact [`BigRational`]s; a
//! value only gets squeezed into a machine width when it is converted or
//! assigned to a sized type ([`representable`]).

use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use thiserror::Error;

use crate::cst::{BinaryOp, UnaryOp};
use crate::types::BasicKind;

/// Largest shift count accepted for constant shifts.
pub const MAX_SHIFT: u64 = 1074;

/// Untyped integer constants larger than this many bits are rejected.
pub const MAX_UNTYPED_BITS: u64 = 512;

/// Bound on the numerator and denominator of floating-point and complex
/// constants. Every literal fits; repeated multiplication does not.
pub const MAX_RATIONAL_BITS: u64 = 1 << 17;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Int(BigInt),
    Float(BigRational),
    Complex(BigRational, BigRational),
    Str(Arc<[u8]>),
    /// Result of an operation on an invalid operand.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstError {
    #[error("division by zero")]
    DivByZero,
    #[error("constant overflow")]
    Overflow,
    #[error("invalid shift count {0}")]
    ShiftCount(String),
    #[error("operator {op} not defined on {operand}")]
    InvalidOp {
        op: &'static str,
        operand: &'static str,
    },
    #[error("mismatched constant kinds")]
    Mismatch,
}

/// Why a value does not fit a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReprError {
    #[error("overflows")]
    Overflow,
    #[error("truncated")]
    Truncated,
    #[error("cannot be represented")]
    Kind,
}

impl Value {
    pub fn int(v: impl Into<BigInt>) -> Value {
        Value::Int(v.into())
    }

    pub fn string(s: &[u8]) -> Value {
        Value::Str(s.into())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Complex(..) => "complex",
            Value::Str(_) => "string",
            Value::Unknown => "unknown",
        }
    }

    /// Whether the value has grown past the size limits for untyped
    /// constants.
    pub fn is_oversized(&self) -> bool {
        match self {
            Value::Int(i) => i.bits() > MAX_UNTYPED_BITS,
            Value::Float(r) => rational_bits(r) > MAX_RATIONAL_BITS,
            Value::Complex(re, im) => rational_bits(re).max(rational_bits(im)) > MAX_RATIONAL_BITS,
            _ => false,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Exact integer value, converting integral floats and real complexes.
    pub fn to_int(&self) -> Option<BigInt> {
        match self {
            Value::Int(i) => Some(i.clone()),
            Value::Float(f) if f.is_integer() => Some(f.to_integer()),
            Value::Complex(re, im) if im.is_zero() && re.is_integer() => Some(re.to_integer()),
            _ => None,
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.to_int()?.to_i64()
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.to_int()?.to_u64()
    }

    pub fn to_float(&self) -> Option<BigRational> {
        match self {
            Value::Int(i) => Some(BigRational::from_integer(i.clone())),
            Value::Float(f) => Some(f.clone()),
            Value::Complex(re, im) if im.is_zero() => Some(re.clone()),
            _ => None,
        }
    }

    pub fn to_complex(&self) -> Option<(BigRational, BigRational)> {
        match self {
            Value::Complex(re, im) => Some((re.clone(), im.clone())),
            v => v.to_float().map(|f| (f, BigRational::zero())),
        }
    }

    /// Representation rank: int < float < complex.
    fn rank(&self) -> u8 {
        match self {
            Value::Int(_) => 0,
            Value::Float(_) => 1,
            Value::Complex(..) => 2,
            _ => 3,
        }
    }

    fn promote(&self, rank: u8) -> Option<Value> {
        match rank {
            0 => self.to_int().map(Value::Int),
            1 => self.to_float().map(Value::Float),
            2 => self.to_complex().map(|(r, i)| Value::Complex(r, i)),
            _ => Some(self.clone()),
        }
    }

    /// Converts a numeric value to the representation used by `kind`.
    pub fn convert_to(&self, kind: BasicKind) -> Option<Value> {
        if kind.is_integer() {
            self.to_int().map(Value::Int)
        } else if kind.is_float() {
            self.to_float().map(Value::Float)
        } else if kind.is_complex() {
            self.to_complex().map(|(r, i)| Value::Complex(r, i))
        } else {
            Some(self.clone())
        }
    }
}

fn rational_bits(r: &BigRational) -> u64 {
    r.numer().bits().max(r.denom().bits())
}

/// Rejects floating-point results that outgrew [`MAX_RATIONAL_BITS`]; both
/// operands were in bounds, so the work that produced them was bounded too.
fn bounded(v: Value) -> Result<Value, ConstError> {
    if v.is_oversized() {
        Err(ConstError::Overflow)
    } else {
        Ok(v)
    }
}

fn match_numeric(a: &Value, b: &Value) -> Result<(Value, Value), ConstError> {
    let r = a.rank().max(b.rank());
    if r > 2 {
        return Err(ConstError::Mismatch);
    }
    match (a.promote(r), b.promote(r)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(ConstError::Mismatch),
    }
}

/// Evaluates `a op b`. `int_div` selects truncated integer division, used
/// when both operands are of integer type.
pub fn binary(op: BinaryOp, a: &Value, b: &Value, int_div: bool) -> Result<Value, ConstError> {
    use BinaryOp::*;
    if a.is_unknown() || b.is_unknown() {
        return Ok(Value::Unknown);
    }
    if op.is_comparison() {
        return compare(op, a, b).map(Value::Bool);
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => {
            return match op {
                LAnd => Ok(Value::Bool(*x && *y)),
                LOr => Ok(Value::Bool(*x || *y)),
                _ => Err(invalid(op, a)),
            };
        }
        (Value::Str(x), Value::Str(y)) => {
            return match op {
                Add => {
                    let mut s = Vec::with_capacity(x.len() + y.len());
                    s.extend_from_slice(x);
                    s.extend_from_slice(y);
                    Ok(Value::Str(s.into()))
                }
                _ => Err(invalid(op, a)),
            };
        }
        (Value::Bool(_) | Value::Str(_), _) | (_, Value::Bool(_) | Value::Str(_)) => {
            return Err(ConstError::Mismatch);
        }
        _ => {}
    }

    // Integer division of two integer-valued operands stays integral.
    let (a, b) = if op == Div && int_div {
        match (a.to_int(), b.to_int()) {
            (Some(x), Some(y)) => (Value::Int(x), Value::Int(y)),
            _ => match_numeric(a, b)?,
        }
    } else {
        match_numeric(a, b)?
    };

    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => int_binary(op, x, y, int_div),
        (Value::Float(x), Value::Float(y)) => {
            let v = match op {
                Add => x + y,
                Sub => x - y,
                Mul => x * y,
                Div => {
                    if y.is_zero() {
                        return Err(ConstError::DivByZero);
                    }
                    x / y
                }
                _ => return Err(invalid(op, &a)),
            };
            bounded(Value::Float(v))
        }
        (Value::Complex(ar, ai), Value::Complex(br, bi)) => {
            let (re, im) = match op {
                Add => (ar + br, ai + bi),
                Sub => (ar - br, ai - bi),
                Mul => (ar * br - ai * bi, ar * bi + ai * br),
                Div => {
                    let d = br * br + bi * bi;
                    if d.is_zero() {
                        return Err(ConstError::DivByZero);
                    }
                    ((ar * br + ai * bi) / &d, (ai * br - ar * bi) / &d)
                }
                _ => return Err(invalid(op, &a)),
            };
            bounded(Value::Complex(re, im))
        }
        _ => Err(ConstError::Mismatch),
    }
}

fn int_binary(op: BinaryOp, x: &BigInt, y: &BigInt, int_div: bool) -> Result<Value, ConstError> {
    use BinaryOp::*;
    let v = match op {
        Add => x + y,
        Sub => x - y,
        Mul => x * y,
        Div if !int_div => {
            if y.is_zero() {
                return Err(ConstError::DivByZero);
            }
            let q = BigRational::new(x.clone(), y.clone());
            return Ok(if q.is_integer() {
                Value::Int(q.to_integer())
            } else {
                Value::Float(q)
            });
        }
        Div | Mod if y.is_zero() => return Err(ConstError::DivByZero),
        Div => x / y,
        Mod => x % y,
        And => x & y,
        Or => x | y,
        Xor => x ^ y,
        AndNot => x & !y.clone(),
        _ => return Err(invalid(op, &Value::Int(x.clone()))),
    };
    Ok(Value::Int(v))
}

fn invalid(op: BinaryOp, v: &Value) -> ConstError {
    ConstError::InvalidOp {
        op: op.as_str(),
        operand: v.kind_name(),
    }
}

pub fn compare(op: BinaryOp, a: &Value, b: &Value) -> Result<bool, ConstError> {
    use std::cmp::Ordering;
    use BinaryOp::*;
    let ord: Option<Ordering> = match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => {
            return match op {
                Eq => Ok(x == y),
                Ne => Ok(x != y),
                _ => Err(invalid(op, a)),
            };
        }
        (Value::Str(x), Value::Str(y)) => Some(x.as_ref().cmp(y.as_ref())),
        (Value::Bool(_) | Value::Str(_), _) | (_, Value::Bool(_) | Value::Str(_)) => {
            return Err(ConstError::Mismatch);
        }
        _ => match match_numeric(a, b)? {
            (Value::Int(x), Value::Int(y)) => Some(x.cmp(&y)),
            (Value::Float(x), Value::Float(y)) => Some(x.cmp(&y)),
            (Value::Complex(ar, ai), Value::Complex(br, bi)) => {
                let eq = ar == br && ai == bi;
                return match op {
                    Eq => Ok(eq),
                    Ne => Ok(!eq),
                    _ => Err(invalid(op, a)),
                };
            }
            _ => None,
        },
    };
    let ord = ord.ok_or(ConstError::Mismatch)?;
    Ok(match op {
        Eq => ord == Ordering::Equal,
        Ne => ord != Ordering::Equal,
        Lt => ord == Ordering::Less,
        Le => ord != Ordering::Greater,
        Gt => ord == Ordering::Greater,
        Ge => ord != Ordering::Less,
        _ => return Err(invalid(op, a)),
    })
}

/// Evaluates a unary operator. `unsigned_bits` is the width of the operand's
/// unsigned type, which makes `^x` a mask instead of `-x-1`.
pub fn unary(op: UnaryOp, v: &Value, unsigned_bits: Option<u32>) -> Result<Value, ConstError> {
    let bad = |v: &Value| ConstError::InvalidOp {
        op: match op {
            UnaryOp::Add => "+",
            UnaryOp::Sub => "-",
            UnaryOp::Not => "!",
            UnaryOp::Xor => "^",
            UnaryOp::Deref => "*",
            UnaryOp::Addr => "&",
            UnaryOp::Recv => "<-",
        },
        operand: v.kind_name(),
    };
    match (op, v) {
        (_, Value::Unknown) => Ok(Value::Unknown),
        (UnaryOp::Add, Value::Int(_) | Value::Float(_) | Value::Complex(..)) => Ok(v.clone()),
        (UnaryOp::Sub, Value::Int(i)) => Ok(Value::Int(-i)),
        (UnaryOp::Sub, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Sub, Value::Complex(r, i)) => Ok(Value::Complex(-r, -i)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Xor, Value::Int(i)) => Ok(Value::Int(match unsigned_bits {
            Some(bits) => {
                let mask = (BigInt::one() << bits as usize) - BigInt::one();
                i ^ mask
            }
            None => !i.clone(),
        })),
        _ => Err(bad(v)),
    }
}

/// Constant shift `v << count` / `v >> count`.
pub fn shift(op: BinaryOp, v: &Value, count: &Value) -> Result<Value, ConstError> {
    if v.is_unknown() || count.is_unknown() {
        return Ok(Value::Unknown);
    }
    let n = count
        .to_int()
        .ok_or_else(|| ConstError::ShiftCount(count.to_string()))?;
    let n = match n.to_u64() {
        Some(n) if n <= MAX_SHIFT => n as usize,
        _ => return Err(ConstError::ShiftCount(n.to_string())),
    };
    let x = v.to_int().ok_or(ConstError::InvalidOp {
        op: op.as_str(),
        operand: v.kind_name(),
    })?;
    match op {
        BinaryOp::Shl => Ok(Value::Int(x << n)),
        BinaryOp::Shr => Ok(Value::Int(x >> n)),
        _ => Err(invalid(op, v)),
    }
}

/// Inclusive integer range of a sized integer kind.
pub fn int_bounds(kind: BasicKind, word: u64) -> Option<(BigInt, BigInt)> {
    use BasicKind::*;
    let bits: u64 = match kind {
        Int8 | Uint8 => 8,
        Int16 | Uint16 => 16,
        Int32 | Uint32 => 32,
        Int64 | Uint64 => 64,
        Int | Uint | Uintptr => word * 8,
        _ => return None,
    };
    let one = BigInt::one();
    if kind.is_unsigned() {
        Some((BigInt::zero(), (&one << bits as usize) - &one))
    } else {
        let half = &one << (bits - 1) as usize;
        Some((-half.clone(), half - one))
    }
}

fn round_float(f: &BigRational, single: bool) -> Result<BigRational, ReprError> {
    let d = f.to_f64().ok_or(ReprError::Overflow)?;
    let d = if single {
        let s = d as f32;
        if s.is_infinite() {
            return Err(ReprError::Overflow);
        }
        s as f64
    } else {
        d
    };
    if d.is_infinite() || d.is_nan() {
        return Err(ReprError::Overflow);
    }
    BigRational::from_float(d).ok_or(ReprError::Overflow)
}

/// Checks that `v` can be represented by a value of `kind` on a target with
/// `word`-byte words; returns the (possibly rounded) value on success.
pub fn representable(v: &Value, kind: BasicKind, word: u64) -> Result<Value, ReprError> {
    use BasicKind::*;
    if v.is_unknown() {
        return Ok(Value::Unknown);
    }
    match kind {
        Bool | UntypedBool => match v {
            Value::Bool(_) => Ok(v.clone()),
            _ => Err(ReprError::Kind),
        },
        String | UntypedString => match v {
            Value::Str(_) => Ok(v.clone()),
            _ => Err(ReprError::Kind),
        },
        k if k.is_integer() => {
            let i = match v {
                Value::Int(i) => i.clone(),
                Value::Float(_) | Value::Complex(..) => v.to_int().ok_or(ReprError::Truncated)?,
                _ => return Err(ReprError::Kind),
            };
            match int_bounds(k, word) {
                Some((lo, hi)) if i < lo || i > hi => Err(ReprError::Overflow),
                None if i.bits() > MAX_UNTYPED_BITS => Err(ReprError::Overflow),
                _ => Ok(Value::Int(i)),
            }
        }
        Float32 | Float64 => {
            let f = v.to_float().ok_or(match v {
                Value::Complex(..) => ReprError::Truncated,
                _ => ReprError::Kind,
            })?;
            round_float(&f, kind == Float32).map(Value::Float)
        }
        UntypedFloat => v.to_float().map(Value::Float).ok_or(ReprError::Kind),
        Complex64 | Complex128 => {
            let (re, im) = v.to_complex().ok_or(ReprError::Kind)?;
            let single = kind == Complex64;
            Ok(Value::Complex(round_float(&re, single)?, round_float(&im, single)?))
        }
        UntypedComplex => v
            .to_complex()
            .map(|(r, i)| Value::Complex(r, i))
            .ok_or(ReprError::Kind),
        _ => Err(ReprError::Kind),
    }
}

fn fmt_rat(f: &mut fmt::Formatter<'_>, r: &BigRational) -> fmt::Result {
    if r.is_integer() {
        return write!(f, "{}", r.to_integer());
    }
    match r.to_f64() {
        Some(d) if d.is_finite() => write!(f, "{d}"),
        _ => write!(f, "{}/{}", r.numer(), r.denom()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(r) => fmt_rat(f, r),
            Value::Complex(re, im) => {
                f.write_str("(")?;
                fmt_rat(f, re)?;
                if im.is_negative() {
                    f.write_str(" - ")?;
                    fmt_rat(f, &-im)?;
                } else {
                    f.write_str(" + ")?;
                    fmt_rat(f, im)?;
                }
                f.write_str("i)")
            }
            Value::Str(s) => write!(f, "{:?}", String::from_utf8_lossy(s)),
            Value::Unknown => f.write_str("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i(v: i64) -> Value {
        Value::int(v)
    }

    #[test]
    fn untyped_division_depends_on_kind() {
        assert_eq!(binary(BinaryOp::Div, &i(7), &i(2), true), Ok(i(3)));
        let half = binary(BinaryOp::Div, &i(1), &i(2), false).unwrap();
        assert_eq!(half.to_string(), "0.5");
        assert_eq!(
            binary(BinaryOp::Mod, &i(1), &i(0), true),
            Err(ConstError::DivByZero)
        );
    }

    #[test]
    fn int8_bounds() {
        assert!(representable(&i(127), BasicKind::Int8, 8).is_ok());
        assert_eq!(representable(&i(128), BasicKind::Int8, 8), Err(ReprError::Overflow));
        assert!(representable(&i(-128), BasicKind::Int8, 8).is_ok());
        assert_eq!(representable(&i(-1), BasicKind::Uint8, 8), Err(ReprError::Overflow));
    }

    #[test]
    fn word_size_bounds_int() {
        let big = i(1 << 40);
        assert!(representable(&big, BasicKind::Int, 8).is_ok());
        assert_eq!(representable(&big, BasicKind::Int, 4), Err(ReprError::Overflow));
    }

    #[test]
    fn float_to_int_must_be_integral() {
        let f = Value::Float(BigRational::new(3.into(), 2.into()));
        assert_eq!(representable(&f, BasicKind::Int, 8), Err(ReprError::Truncated));
        let g = Value::Float(BigRational::from_integer(4.into()));
        assert_eq!(representable(&g, BasicKind::Int, 8), Ok(i(4)));
    }

    #[test]
    fn shifts_are_bounded() {
        assert_eq!(shift(BinaryOp::Shl, &i(1), &i(10)), Ok(i(1024)));
        assert!(shift(BinaryOp::Shl, &i(1), &i(-1)).is_err());
        assert!(shift(BinaryOp::Shl, &i(1), &i(1075)).is_err());
        assert_eq!(shift(BinaryOp::Shr, &i(-8), &i(1)), Ok(i(-4)));
    }

    #[test]
    fn complement_of_unsigned_masks() {
        assert_eq!(unary(UnaryOp::Xor, &i(0), Some(8)), Ok(i(255)));
        assert_eq!(unary(UnaryOp::Xor, &i(0), None), Ok(i(-1)));
    }

    #[test]
    fn float32_overflow() {
        let v = Value::Float(BigRational::from_integer(BigInt::one() << 200usize));
        assert!(representable(&v, BasicKind::Float64, 8).is_ok());
        assert_eq!(representable(&v, BasicKind::Float32, 8), Err(ReprError::Overflow));
    }

    #[test]
    fn float_growth_overflows() {
        let mut v = Value::Float(crate::literal::parse_float("1e10000").unwrap());
        assert!(!v.is_oversized());
        let mut squarings = 0;
        let err = loop {
            match binary(BinaryOp::Mul, &v, &v, false) {
                Ok(next) => {
                    v = next;
                    squarings += 1;
                }
                Err(e) => break e,
            }
        };
        assert_eq!(err, ConstError::Overflow);
        assert!(squarings < 4);
        let c = Value::Complex(BigRational::zero(), BigRational::from_integer(BigInt::one() << 70000usize));
        assert_eq!(binary(BinaryOp::Mul, &c, &c, false), Err(ConstError::Overflow));
    }

    #[test]
    fn string_concat_and_compare() {
        let a = Value::string(b"ab");
        let b = Value::string(b"c");
        assert_eq!(binary(BinaryOp::Add, &a, &b, false), Ok(Value::string(b"abc")));
        assert_eq!(compare(BinaryOp::Lt, &a, &b), Ok(true));
    }
}
