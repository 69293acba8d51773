//! Constant folding over HIR operations
//!
//! Implements the source numeric semantics exactly: two's-complement
//! wraparound for integer add/sub/mul, truncate-toward-zero division,
//! shift counts masked to the operand width minus one, and IEEE-754
//! binary32/binary64 arithmetic with NaN and signed zero preserved.
//!
//! Folding division or remainder by a constant zero is refused: the zero
//! check must survive to runtime and raise the arithmetic fault there.

use kestrel_bytecode::ValueType;

use crate::hir::{BinOp, CmpKind, ConvKind};

/// A compile-time constant value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// binary32
    Float(f32),
    /// binary64
    Double(f64),
}

impl ConstValue {
    /// Type of the constant
    pub const fn value_type(self) -> ValueType {
        match self {
            ConstValue::Int(_) => ValueType::Int,
            ConstValue::Long(_) => ValueType::Long,
            ConstValue::Float(_) => ValueType::Float,
            ConstValue::Double(_) => ValueType::Double,
        }
    }
}

/// Fold a binary operation. Returns `None` when the operand types do not
/// fit the operator or when folding would hide a runtime fault.
pub fn fold_binary(op: BinOp, lhs: ConstValue, rhs: ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    Some(match (lhs, rhs) {
        (Int(a), Int(b)) => Int(fold_int(op, a, b)?),
        (Long(a), Long(b)) => Long(fold_long(op, a, b)?),
        // Long shifts take an int count.
        (Long(a), Int(b)) => Long(fold_long_shift(op, a, b)?),
        (Float(a), Float(b)) => Float(fold_float(op, a, b)?),
        (Double(a), Double(b)) => Double(fold_double(op, a, b)?),
        _ => return None,
    })
}

fn fold_int(op: BinOp, a: i32, b: i32) -> Option<i32> {
    Some(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        BinOp::Rem => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        BinOp::Shl => a.wrapping_shl(b as u32 & 31),
        BinOp::Shr => a.wrapping_shr(b as u32 & 31),
        BinOp::Ushr => ((a as u32) >> (b as u32 & 31)) as i32,
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
    })
}

fn fold_long(op: BinOp, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        BinOp::Rem => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        // Shift counts arrive as ints, handled separately.
        BinOp::Shl | BinOp::Shr | BinOp::Ushr => return None,
    })
}

fn fold_long_shift(op: BinOp, a: i64, count: i32) -> Option<i64> {
    let s = count as u32 & 63;
    Some(match op {
        BinOp::Shl => a.wrapping_shl(s),
        BinOp::Shr => a.wrapping_shr(s),
        BinOp::Ushr => ((a as u64) >> s) as i64,
        _ => return None,
    })
}

fn fold_float(op: BinOp, a: f32, b: f32) -> Option<f32> {
    Some(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Rem => a % b,
        _ => return None,
    })
}

fn fold_double(op: BinOp, a: f64, b: f64) -> Option<f64> {
    Some(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Rem => a % b,
        _ => return None,
    })
}

/// Fold negation. Float negation is a sign-bit flip, NaN included.
pub fn fold_neg(v: ConstValue) -> ConstValue {
    match v {
        ConstValue::Int(a) => ConstValue::Int(a.wrapping_neg()),
        ConstValue::Long(a) => ConstValue::Long(a.wrapping_neg()),
        ConstValue::Float(a) => ConstValue::Float(-a),
        ConstValue::Double(a) => ConstValue::Double(-a),
    }
}

/// Fold a numeric conversion. Float-to-integer conversions saturate and
/// map NaN to zero.
pub fn fold_convert(kind: ConvKind, v: ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    Some(match (kind, v) {
        (ConvKind::I2L, Int(a)) => Long(i64::from(a)),
        (ConvKind::I2F, Int(a)) => Float(a as f32),
        (ConvKind::I2D, Int(a)) => Double(f64::from(a)),
        (ConvKind::L2I, Long(a)) => Int(a as i32),
        (ConvKind::L2F, Long(a)) => Float(a as f32),
        (ConvKind::L2D, Long(a)) => Double(a as f64),
        (ConvKind::F2I, Float(a)) => Int(a as i32),
        (ConvKind::F2L, Float(a)) => Long(a as i64),
        (ConvKind::F2D, Float(a)) => Double(f64::from(a)),
        (ConvKind::D2I, Double(a)) => Int(a as i32),
        (ConvKind::D2L, Double(a)) => Long(a as i64),
        (ConvKind::D2F, Double(a)) => Float(a as f32),
        (ConvKind::I2B, Int(a)) => Int(i32::from(a as i8)),
        (ConvKind::I2C, Int(a)) => Int(i32::from(a as u16)),
        (ConvKind::I2S, Int(a)) => Int(i32::from(a as i16)),
        _ => return None,
    })
}

/// Fold a three-way comparison to int -1, 0, or 1. The `l`/`g` suffix
/// picks which result an unordered (NaN) comparison biases toward.
pub fn fold_compare(kind: CmpKind, lhs: ConstValue, rhs: ConstValue) -> Option<i32> {
    use ConstValue::*;
    Some(match (kind, lhs, rhs) {
        (CmpKind::Lcmp, Long(a), Long(b)) => three_way(a.cmp(&b)),
        (CmpKind::Fcmpl, Float(a), Float(b)) => a.partial_cmp(&b).map_or(-1, three_way),
        (CmpKind::Fcmpg, Float(a), Float(b)) => a.partial_cmp(&b).map_or(1, three_way),
        (CmpKind::Dcmpl, Double(a), Double(b)) => a.partial_cmp(&b).map_or(-1, three_way),
        (CmpKind::Dcmpg, Double(a), Double(b)) => a.partial_cmp(&b).map_or(1, three_way),
        _ => return None,
    })
}

fn three_way(ord: std::cmp::Ordering) -> i32 {
    match ord {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConstValue::*;

    #[test]
    fn test_int_wraparound() {
        assert_eq!(
            fold_binary(BinOp::Add, Int(i32::MAX), Int(1)),
            Some(Int(i32::MIN))
        );
        assert_eq!(
            fold_binary(BinOp::Mul, Int(i32::MIN), Int(-1)),
            Some(Int(i32::MIN))
        );
        assert_eq!(
            fold_binary(BinOp::Sub, Long(i64::MIN), Long(1)),
            Some(Long(i64::MAX))
        );
    }

    #[test]
    fn test_min_div_minus_one_wraps() {
        assert_eq!(
            fold_binary(BinOp::Div, Int(i32::MIN), Int(-1)),
            Some(Int(i32::MIN))
        );
        assert_eq!(
            fold_binary(BinOp::Rem, Int(i32::MIN), Int(-1)),
            Some(Int(0))
        );
    }

    #[test]
    fn test_division_by_zero_not_folded() {
        assert_eq!(fold_binary(BinOp::Div, Int(7), Int(0)), None);
        assert_eq!(fold_binary(BinOp::Rem, Long(7), Long(0)), None);
    }

    #[test]
    fn test_rem_sign_follows_dividend() {
        assert_eq!(fold_binary(BinOp::Rem, Int(-7), Int(2)), Some(Int(-1)));
        assert_eq!(fold_binary(BinOp::Rem, Int(7), Int(-2)), Some(Int(1)));
    }

    #[test]
    fn test_shift_count_masked_to_width() {
        // i32 shl 33 == shl 1
        assert_eq!(
            fold_binary(BinOp::Shl, Int(1), Int(33)),
            fold_binary(BinOp::Shl, Int(1), Int(1))
        );
        // i64 shl 65 == shl 1
        assert_eq!(
            fold_binary(BinOp::Shl, Long(1), Int(65)),
            fold_binary(BinOp::Shl, Long(1), Int(1))
        );
        assert_eq!(
            fold_binary(BinOp::Ushr, Int(-1), Int(32)),
            Some(Int(-1)) // count masks to 0
        );
    }

    #[test]
    fn test_ushr_zero_extends() {
        assert_eq!(
            fold_binary(BinOp::Ushr, Int(-1), Int(1)),
            Some(Int(i32::MAX))
        );
        assert_eq!(
            fold_binary(BinOp::Ushr, Long(-1), Int(1)),
            Some(Long(i64::MAX))
        );
    }

    #[test]
    fn test_ieee_edge_cases() {
        // NaN propagates.
        let r = fold_binary(BinOp::Add, Double(f64::NAN), Double(2.0));
        assert!(matches!(r, Some(Double(x)) if x.is_nan()));
        // Opposite infinities sum to NaN.
        let r = fold_binary(BinOp::Add, Double(f64::INFINITY), Double(f64::NEG_INFINITY));
        assert!(matches!(r, Some(Double(x)) if x.is_nan()));
        // -0.0 + +0.0 == +0.0
        let r = fold_binary(BinOp::Add, Double(-0.0), Double(0.0));
        assert!(matches!(r, Some(Double(x)) if x == 0.0 && x.is_sign_positive()));
        // Inf * 0 == NaN
        let r = fold_binary(BinOp::Mul, Double(f64::INFINITY), Double(0.0));
        assert!(matches!(r, Some(Double(x)) if x.is_nan()));
        // Overflow to infinity.
        let r = fold_binary(BinOp::Mul, Double(f64::MAX), Double(2.0));
        assert_eq!(r, Some(Double(f64::INFINITY)));
    }

    #[test]
    fn test_float_neg_flips_nan_sign() {
        let negated = match fold_neg(Float(f32::NAN)) {
            Float(x) => x,
            other => panic!("unexpected {other:?}"),
        };
        assert!(negated.is_nan());
        assert_ne!(negated.to_bits(), f32::NAN.to_bits());
        assert_eq!(negated.to_bits() ^ f32::NAN.to_bits(), 0x8000_0000);
    }

    #[test]
    fn test_float_to_int_saturates() {
        assert_eq!(fold_convert(ConvKind::F2I, Float(f32::NAN)), Some(Int(0)));
        assert_eq!(
            fold_convert(ConvKind::F2I, Float(1e30)),
            Some(Int(i32::MAX))
        );
        assert_eq!(
            fold_convert(ConvKind::D2L, Double(f64::NEG_INFINITY)),
            Some(Long(i64::MIN))
        );
    }

    #[test]
    fn test_narrowing_conversions() {
        assert_eq!(fold_convert(ConvKind::I2B, Int(0x180)), Some(Int(-128)));
        assert_eq!(fold_convert(ConvKind::I2C, Int(-1)), Some(Int(0xFFFF)));
        assert_eq!(fold_convert(ConvKind::I2S, Int(0x18000)), Some(Int(-32768)));
        assert_eq!(fold_convert(ConvKind::L2I, Long(0x1_0000_0001)), Some(Int(1)));
    }

    #[test]
    fn test_compare_nan_bias() {
        assert_eq!(
            fold_compare(CmpKind::Fcmpl, Float(f32::NAN), Float(1.0)),
            Some(-1)
        );
        assert_eq!(
            fold_compare(CmpKind::Fcmpg, Float(f32::NAN), Float(1.0)),
            Some(1)
        );
        assert_eq!(
            fold_compare(CmpKind::Dcmpl, Double(1.0), Double(2.0)),
            Some(-1)
        );
        assert_eq!(fold_compare(CmpKind::Lcmp, Long(5), Long(5)), Some(0));
    }

    #[test]
    fn test_mixed_types_refused() {
        assert_eq!(fold_binary(BinOp::Add, Int(1), Long(2)), None);
        assert_eq!(fold_compare(CmpKind::Lcmp, Int(1), Long(2)), None);
    }
}
