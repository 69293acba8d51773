//! Method descriptors as supplied by the host runtime

use serde::{Deserialize, Serialize};

use crate::constant::ConstantPool;
use crate::types::ValueType;

/// One entry of a method's exception table.
///
/// Offsets follow the half-open convention: the handler covers instructions
/// whose offsets satisfy `start <= offset < end`. Entries are matched in
/// declaration order; the first covering entry whose catch filter accepts
/// the thrown type wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    /// First covered bytecode offset (inclusive)
    pub start: u32,
    /// End of the covered range (exclusive)
    pub end: u32,
    /// Bytecode offset of the handler entry point
    pub handler: u32,
    /// Constant pool index of the caught class, `None` for catch-all
    pub catch_type: Option<crate::constant::PoolIndex>,
}

impl ExceptionHandler {
    /// Whether this entry covers the given bytecode offset
    #[inline]
    pub const fn covers(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// A method handed to the compiler: bytecode plus the metadata the
/// abstract interpreter needs to type it.
///
/// The descriptor is immutable once built. The compiler never mutates the
/// bytecode; all analysis state lives in the compiler's own structures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Method name, for diagnostics
    pub name: String,
    /// Raw bytecode
    pub code: Vec<u8>,
    /// Maximum operand stack depth, in slots
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// Parameter types in declaration order, receiver excluded
    pub params: Vec<ValueType>,
    /// Return type, `None` for void
    pub ret: Option<ValueType>,
    /// Whether the method has no receiver
    pub is_static: bool,
    /// Exception table, in declaration order
    pub handlers: Vec<ExceptionHandler>,
}

impl MethodDescriptor {
    /// Start building a descriptor
    pub fn builder(name: impl Into<String>) -> MethodDescriptorBuilder {
        MethodDescriptorBuilder {
            name: name.into(),
            code: Vec::new(),
            max_stack: 0,
            max_locals: 0,
            params: Vec::new(),
            ret: None,
            is_static: true,
            handlers: Vec::new(),
        }
    }

    /// Number of local slots occupied by the parameters (and the receiver,
    /// for instance methods). These slots are initialized on entry.
    pub fn param_slots(&self) -> u16 {
        let receiver = if self.is_static { 0 } else { 1 };
        receiver + self.params.iter().map(|t| t.slot_count()).sum::<u16>()
    }

    /// Exception table entries covering `offset`, in declaration order
    pub fn handlers_at(&self, offset: u32) -> impl Iterator<Item = &ExceptionHandler> {
        self.handlers.iter().filter(move |h| h.covers(offset))
    }
}

/// Builder for [`MethodDescriptor`]
#[derive(Debug)]
pub struct MethodDescriptorBuilder {
    name: String,
    code: Vec<u8>,
    max_stack: u16,
    max_locals: u16,
    params: Vec<ValueType>,
    ret: Option<ValueType>,
    is_static: bool,
    handlers: Vec<ExceptionHandler>,
}

impl MethodDescriptorBuilder {
    /// Set the bytecode
    pub fn code(mut self, code: impl Into<Vec<u8>>) -> Self {
        self.code = code.into();
        self
    }

    /// Set the maximum operand stack depth
    pub fn max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = max_stack;
        self
    }

    /// Set the number of local slots
    pub fn max_locals(mut self, max_locals: u16) -> Self {
        self.max_locals = max_locals;
        self
    }

    /// Append a parameter
    pub fn param(mut self, ty: ValueType) -> Self {
        self.params.push(ty);
        self
    }

    /// Set the return type
    pub fn returns(mut self, ty: ValueType) -> Self {
        self.ret = Some(ty);
        self
    }

    /// Mark the method as an instance method (adds a receiver slot)
    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    /// Append an exception table entry
    pub fn handler(mut self, handler: ExceptionHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Finish building
    pub fn build(self) -> MethodDescriptor {
        let mut desc = MethodDescriptor {
            name: self.name,
            code: self.code,
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            params: self.params,
            ret: self.ret,
            is_static: self.is_static,
            handlers: self.handlers,
        };
        // Parameters always fit in the local area, whatever max_locals said.
        desc.max_locals = desc.max_locals.max(desc.param_slots());
        desc
    }
}

/// A compilation unit: one method plus the pool its symbolic operands
/// index into. Both are owned by the host for the duration of a compile.
#[derive(Debug, Clone)]
pub struct CompilationInput<'a> {
    /// The method being compiled
    pub method: &'a MethodDescriptor,
    /// The constant pool the method's operands reference
    pub pool: &'a ConstantPool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let m = MethodDescriptor::builder("empty").build();
        assert!(m.is_static);
        assert!(m.code.is_empty());
        assert_eq!(m.param_slots(), 0);
    }

    #[test]
    fn test_param_slots_with_receiver() {
        let m = MethodDescriptor::builder("f")
            .instance()
            .param(ValueType::Long)
            .param(ValueType::Int)
            .build();
        // receiver + two-slot long + int
        assert_eq!(m.param_slots(), 4);
        assert_eq!(m.max_locals, 4);
    }

    #[test]
    fn test_handler_coverage() {
        let h = ExceptionHandler {
            start: 4,
            end: 10,
            handler: 20,
            catch_type: None,
        };
        assert!(!h.covers(3));
        assert!(h.covers(4));
        assert!(h.covers(9));
        assert!(!h.covers(10));
    }

    #[test]
    fn test_handlers_at_order() {
        let m = MethodDescriptor::builder("f")
            .handler(ExceptionHandler {
                start: 0,
                end: 8,
                handler: 30,
                catch_type: None,
            })
            .handler(ExceptionHandler {
                start: 4,
                end: 12,
                handler: 40,
                catch_type: None,
            })
            .build();
        let targets: Vec<u32> = m.handlers_at(5).map(|h| h.handler).collect();
        assert_eq!(targets, vec![30, 40]);
    }
}
