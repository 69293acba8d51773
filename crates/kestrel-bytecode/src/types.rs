//! Value types and stack slot categories

use serde::{Deserialize, Serialize};

/// Type of a value on the operand stack or in a local variable slot.
///
/// Category-1 types occupy one slot; category-2 types (`Long`, `Double`)
/// occupy two contiguous slots and must never be split by a single-slot
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// 32-bit two's-complement integer
    Int,
    /// 64-bit two's-complement integer (category 2)
    Long,
    /// IEEE-754 binary32
    Float,
    /// IEEE-754 binary64 (category 2)
    Double,
    /// Reference to a heap object (may be null)
    Reference,
    /// Return address produced by the subroutine-call instruction
    ReturnAddress,
}

impl ValueType {
    /// Slot category: 1 or 2
    #[inline]
    pub const fn category(self) -> u8 {
        match self {
            ValueType::Long | ValueType::Double => 2,
            _ => 1,
        }
    }

    /// Whether this type occupies two stack/local slots
    #[inline]
    pub const fn is_category2(self) -> bool {
        self.category() == 2
    }

    /// Number of local-variable slots a parameter of this type consumes
    #[inline]
    pub const fn slot_count(self) -> u16 {
        self.category() as u16
    }

    /// Lowercase name used in diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Long => "long",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::Reference => "reference",
            ValueType::ReturnAddress => "returnAddress",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
