//! Constant pool: the host-supplied symbol table

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{BytecodeError, Result};
use crate::types::ValueType;

/// 1-based index into the constant pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PoolIndex(pub u16);

impl PoolIndex {
    /// Create a new pool index
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Get index value
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl From<u16> for PoolIndex {
    fn from(index: u16) -> Self {
        Self(index)
    }
}

/// Symbolic reference to a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Defining class (a `Class` entry)
    pub class: PoolIndex,
    /// Field name (a `Utf8` entry)
    pub name: PoolIndex,
    /// Declared field type
    pub field_type: ValueType,
    /// Whether the field is static
    pub is_static: bool,
}

/// Symbolic reference to a method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    /// Defining class (a `Class` entry)
    pub class: PoolIndex,
    /// Method name (a `Utf8` entry)
    pub name: PoolIndex,
    /// Declared parameter types, in order, not counting the receiver
    pub params: Vec<ValueType>,
    /// Declared return type, `None` for void
    pub ret: Option<ValueType>,
    /// Whether the target is a native function rather than managed code
    #[serde(default)]
    pub is_native: bool,
}

/// A single constant pool entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// 32-bit integer constant
    Integer(i32),
    /// 64-bit integer constant
    Long(i64),
    /// binary32 constant
    Float(f32),
    /// binary64 constant
    Double(f64),
    /// Modified UTF-8 string (names, descriptors)
    Utf8(String),
    /// Class reference, pointing at a `Utf8` name
    Class {
        /// Class name entry
        name: PoolIndex,
    },
    /// Field reference
    Field(FieldRef),
    /// Method reference
    Method(MethodRef),
}

impl Constant {
    /// Kind name used in diagnostics
    pub const fn kind(&self) -> &'static str {
        match self {
            Constant::Integer(_) => "Integer",
            Constant::Long(_) => "Long",
            Constant::Float(_) => "Float",
            Constant::Double(_) => "Double",
            Constant::Utf8(_) => "Utf8",
            Constant::Class { .. } => "Class",
            Constant::Field(_) => "Field",
            Constant::Method(_) => "Method",
        }
    }

    /// Type of the value a loadable constant pushes, `None` for symbolic entries
    pub const fn loadable_type(&self) -> Option<ValueType> {
        match self {
            Constant::Integer(_) => Some(ValueType::Int),
            Constant::Long(_) => Some(ValueType::Long),
            Constant::Float(_) => Some(ValueType::Float),
            Constant::Double(_) => Some(ValueType::Double),
            Constant::Utf8(_) | Constant::Class { .. } => Some(ValueType::Reference),
            Constant::Field(_) | Constant::Method(_) => None,
        }
    }
}

/// The constant pool. Indices are 1-based; index 0 is reserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    /// Interning map for Utf8 entries
    #[serde(skip)]
    utf8_index: FxHashMap<String, PoolIndex>,
}

impl ConstantPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries (not counting the reserved index 0)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry, returning its index
    pub fn push(&mut self, constant: Constant) -> PoolIndex {
        self.entries.push(constant);
        PoolIndex(self.entries.len() as u16)
    }

    /// Intern a Utf8 entry, reusing an existing index for equal strings
    pub fn intern_utf8(&mut self, s: impl Into<String>) -> PoolIndex {
        let s = s.into();
        if let Some(&idx) = self.utf8_index.get(&s) {
            return idx;
        }
        let idx = self.push(Constant::Utf8(s.clone()));
        self.utf8_index.insert(s, idx);
        idx
    }

    /// Convenience: intern a class name and push a `Class` entry
    pub fn push_class(&mut self, name: impl Into<String>) -> PoolIndex {
        let name = self.intern_utf8(name);
        self.push(Constant::Class { name })
    }

    /// Look up an entry
    pub fn get(&self, index: PoolIndex) -> Result<&Constant> {
        if index.0 == 0 {
            return Err(BytecodeError::PoolIndexOutOfRange(0));
        }
        self.entries
            .get(index.0 as usize - 1)
            .ok_or(BytecodeError::PoolIndexOutOfRange(index.0))
    }

    /// Look up a field reference
    pub fn field_ref(&self, index: PoolIndex) -> Result<&FieldRef> {
        match self.get(index)? {
            Constant::Field(f) => Ok(f),
            other => Err(BytecodeError::PoolKindMismatch {
                index: index.0,
                actual: other.kind(),
                expected: "Field",
            }),
        }
    }

    /// Look up a method reference
    pub fn method_ref(&self, index: PoolIndex) -> Result<&MethodRef> {
        match self.get(index)? {
            Constant::Method(m) => Ok(m),
            other => Err(BytecodeError::PoolKindMismatch {
                index: index.0,
                actual: other.kind(),
                expected: "Method",
            }),
        }
    }

    /// Look up a class entry and resolve its name
    pub fn class_name(&self, index: PoolIndex) -> Result<&str> {
        let name = match self.get(index)? {
            Constant::Class { name } => *name,
            other => {
                return Err(BytecodeError::PoolKindMismatch {
                    index: index.0,
                    actual: other.kind(),
                    expected: "Class",
                });
            }
        };
        self.utf8(name)
    }

    /// Look up a Utf8 entry
    pub fn utf8(&self, index: PoolIndex) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            other => Err(BytecodeError::PoolKindMismatch {
                index: index.0,
                actual: other.kind(),
                expected: "Utf8",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut pool = ConstantPool::new();
        let idx = pool.push(Constant::Integer(42));
        assert_eq!(idx, PoolIndex(1));
        assert!(matches!(pool.get(idx), Ok(Constant::Integer(42))));
    }

    #[test]
    fn test_index_zero_reserved() {
        let pool = ConstantPool::new();
        assert!(pool.get(PoolIndex(0)).is_err());
    }

    #[test]
    fn test_utf8_interning() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_utf8("name");
        let b = pool.intern_utf8("name");
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_kind_mismatch() {
        let mut pool = ConstantPool::new();
        let idx = pool.push(Constant::Integer(7));
        let err = pool.field_ref(idx).unwrap_err();
        assert!(matches!(
            err,
            BytecodeError::PoolKindMismatch {
                expected: "Field",
                ..
            }
        ));
    }
}
