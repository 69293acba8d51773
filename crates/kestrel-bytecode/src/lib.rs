//! # Kestrel Bytecode
//!
//! This crate defines the bytecode input format for the Kestrel JIT front end.
//!
//! ## Design Principles
//!
//! - **Stack-based**: the source instruction set operates on an operand stack
//!   and a set of local variable slots
//! - **Host-owned**: method descriptors and the symbol table are supplied by
//!   the host runtime and are read-only to the compiler
//! - **Lazy decoding**: the instruction stream is decoded in a single forward
//!   pass with no lookahead beyond the current opcode's immediates

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod constant;
pub mod decode;
pub mod error;
pub mod method;
pub mod opcode;
pub mod types;

pub use constant::{Constant, ConstantPool, FieldRef, MethodRef, PoolIndex};
pub use decode::{DecodedOp, InstructionStream, Operands};
pub use error::BytecodeError;
pub use method::{CompilationInput, ExceptionHandler, MethodDescriptor};
pub use opcode::Opcode;
pub use types::ValueType;
