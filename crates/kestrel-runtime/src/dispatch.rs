//! Type hierarchy, per-type dispatch tables, and static field storage
//!
//! Types and their method tables are plain data registered by the host.
//! Virtual dispatch walks the receiver's table first, then its supertype
//! chain; `instanceof` semantics follow the declared lattice, a subtype
//! satisfying every supertype test.

use kestrel_bytecode::ValueType;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::{Result, RuntimeError};
use crate::value::RuntimeValue;

/// The declared subtype lattice: every type except roots names exactly one
/// supertype.
#[derive(Debug, Default)]
pub struct TypeHierarchy {
    supertype: FxHashMap<String, Option<String>>,
}

impl TypeHierarchy {
    /// Create an empty hierarchy
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root type
    pub fn add_root(&mut self, name: impl Into<String>) {
        self.supertype.insert(name.into(), None);
    }

    /// Register a type under a supertype already in the hierarchy
    pub fn add_type(&mut self, name: impl Into<String>, supertype: impl Into<String>) -> Result<()> {
        let name = name.into();
        let supertype = supertype.into();
        if !self.supertype.contains_key(&supertype) {
            return Err(RuntimeError::UnknownType(supertype));
        }
        if name == supertype || self.chain(&supertype).any(|t| t == name) {
            return Err(RuntimeError::HierarchyCycle(name));
        }
        self.supertype.insert(name, Some(supertype));
        Ok(())
    }

    /// Whether the type is registered
    pub fn contains(&self, name: &str) -> bool {
        self.supertype.contains_key(name)
    }

    /// Walk from a type up through its supertypes, the type itself first
    pub fn chain<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        let mut current = self.supertype.contains_key(name).then_some(name);
        std::iter::from_fn(move || {
            let here = current?;
            current = self.supertype.get(here).and_then(|s| s.as_deref());
            Some(here)
        })
    }

    /// Subtype test over the declared lattice; every type is a subtype of
    /// itself.
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> Result<bool> {
        if !self.contains(sub) {
            return Err(RuntimeError::UnknownType(sub.to_string()));
        }
        if !self.contains(sup) {
            return Err(RuntimeError::UnknownType(sup.to_string()));
        }
        Ok(self.chain(sub).any(|t| t == sup))
    }
}

/// Per-type virtual method tables
#[derive(Debug, Default)]
pub struct DispatchTable {
    methods: FxHashMap<String, FxHashMap<String, u64>>,
}

impl DispatchTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method implementation on a type
    pub fn define(&mut self, type_name: impl Into<String>, method: impl Into<String>, address: u64) {
        self.methods
            .entry(type_name.into())
            .or_default()
            .insert(method.into(), address);
    }

    /// Resolve a virtual call for a receiver type: the receiver's own table
    /// first, then each supertype in order.
    pub fn resolve(
        &self,
        hierarchy: &TypeHierarchy,
        receiver: &str,
        method: &str,
    ) -> Result<u64> {
        if !hierarchy.contains(receiver) {
            return Err(RuntimeError::UnknownType(receiver.to_string()));
        }
        for ty in hierarchy.chain(receiver) {
            if let Some(&address) = self.methods.get(ty).and_then(|t| t.get(method)) {
                trace!(receiver, method, defining = ty, "resolved virtual call");
                return Ok(address);
            }
        }
        Err(RuntimeError::UnknownMethod {
            type_name: receiver.to_string(),
            method: method.to_string(),
        })
    }
}

/// Static field storage, keyed by defining type and field name. One slot
/// per field shared by all instances; unwritten fields read as the zero
/// value of their declared type.
#[derive(Debug, Default)]
pub struct StaticArea {
    slots: RwLock<FxHashMap<(String, String), RuntimeValue>>,
}

impl StaticArea {
    /// Create an empty area
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a static field
    pub fn get(&self, class: &str, field: &str, ty: ValueType) -> RuntimeValue {
        self.slots
            .read()
            .get(&(class.to_string(), field.to_string()))
            .copied()
            .unwrap_or(RuntimeValue::default_of(ty))
    }

    /// Write a static field
    pub fn put(&self, class: impl Into<String>, field: impl Into<String>, value: RuntimeValue) {
        self.slots
            .write()
            .insert((class.into(), field.into()), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> TypeHierarchy {
        let mut h = TypeHierarchy::new();
        h.add_root("Object");
        h.add_type("Animal", "Object").unwrap();
        h.add_type("Dog", "Animal").unwrap();
        h.add_type("Cat", "Animal").unwrap();
        h
    }

    #[test]
    fn test_subtype_includes_self_and_transitive() {
        let h = hierarchy();
        assert!(h.is_subtype_of("Dog", "Dog").unwrap());
        assert!(h.is_subtype_of("Dog", "Animal").unwrap());
        assert!(h.is_subtype_of("Dog", "Object").unwrap());
        assert!(!h.is_subtype_of("Animal", "Dog").unwrap());
        assert!(!h.is_subtype_of("Dog", "Cat").unwrap());
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let h = hierarchy();
        assert_eq!(
            h.is_subtype_of("Bird", "Object"),
            Err(RuntimeError::UnknownType("Bird".to_string()))
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let mut h = hierarchy();
        let err = h.add_type("Object", "Dog").unwrap_err();
        assert!(matches!(err, RuntimeError::HierarchyCycle(_)));
    }

    #[test]
    fn test_dispatch_prefers_override() {
        let h = hierarchy();
        let mut d = DispatchTable::new();
        d.define("Animal", "speak", 0x1000);
        d.define("Dog", "speak", 0x2000);
        assert_eq!(d.resolve(&h, "Dog", "speak").unwrap(), 0x2000);
        assert_eq!(d.resolve(&h, "Cat", "speak").unwrap(), 0x1000);
    }

    #[test]
    fn test_dispatch_missing_method() {
        let h = hierarchy();
        let d = DispatchTable::new();
        assert!(matches!(
            d.resolve(&h, "Dog", "speak"),
            Err(RuntimeError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn test_statics_default_to_zero() {
        let area = StaticArea::new();
        assert_eq!(
            area.get("C", "counter", ValueType::Int),
            RuntimeValue::Int(0)
        );
        area.put("C", "counter", RuntimeValue::Int(41));
        assert_eq!(
            area.get("C", "counter", ValueType::Int),
            RuntimeValue::Int(41)
        );
        // Distinct defining classes get distinct slots.
        assert_eq!(
            area.get("D", "counter", ValueType::Int),
            RuntimeValue::Int(0)
        );
    }
}
