//! Runtime value representation at the managed/native boundary

use kestrel_bytecode::ValueType;

/// A materialized value crossing the call boundary. References are opaque
/// handles the collector may relocate; everything else is plain bits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuntimeValue {
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// binary32
    Float(f32),
    /// binary64
    Double(f64),
    /// Opaque reference handle; zero is null
    Reference(u64),
}

impl RuntimeValue {
    /// The static type of the value
    pub const fn value_type(self) -> ValueType {
        match self {
            RuntimeValue::Int(_) => ValueType::Int,
            RuntimeValue::Long(_) => ValueType::Long,
            RuntimeValue::Float(_) => ValueType::Float,
            RuntimeValue::Double(_) => ValueType::Double,
            RuntimeValue::Reference(_) => ValueType::Reference,
        }
    }

    /// The zero/null value of a type
    pub const fn default_of(ty: ValueType) -> Self {
        match ty {
            ValueType::Long => RuntimeValue::Long(0),
            ValueType::Float => RuntimeValue::Float(0.0),
            ValueType::Double => RuntimeValue::Double(0.0),
            ValueType::Reference | ValueType::ReturnAddress => RuntimeValue::Reference(0),
            ValueType::Int => RuntimeValue::Int(0),
        }
    }

    /// Raw bits as they sit in a register or spill slot
    pub const fn bits(self) -> u64 {
        match self {
            RuntimeValue::Int(v) => v as u32 as u64,
            RuntimeValue::Long(v) => v as u64,
            RuntimeValue::Float(v) => v.to_bits() as u64,
            RuntimeValue::Double(v) => v.to_bits(),
            RuntimeValue::Reference(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_zero_extend_int() {
        assert_eq!(RuntimeValue::Int(-1).bits(), 0xFFFF_FFFF);
        assert_eq!(RuntimeValue::Long(-1).bits(), u64::MAX);
    }

    #[test]
    fn test_default_of() {
        assert_eq!(
            RuntimeValue::default_of(ValueType::Reference),
            RuntimeValue::Reference(0)
        );
        assert_eq!(RuntimeValue::default_of(ValueType::Int), RuntimeValue::Int(0));
    }
}
