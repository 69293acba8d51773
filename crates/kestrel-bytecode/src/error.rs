//! Bytecode errors

use thiserror::Error;

/// Errors that can occur while decoding or resolving bytecode
#[derive(Debug, Error)]
pub enum BytecodeError {
    /// Unknown opcode byte
    #[error("Unknown opcode {opcode:#04x} at offset {offset}")]
    UnknownOpcode {
        /// The unrecognized byte
        opcode: u8,
        /// Byte offset of the opcode in the instruction stream
        offset: u32,
    },

    /// Operand bytes run past the end of the stream
    #[error("Truncated operands for {mnemonic} at offset {offset}")]
    TruncatedOperands {
        /// Mnemonic of the opcode whose operands are missing
        mnemonic: &'static str,
        /// Byte offset of the opcode in the instruction stream
        offset: u32,
    },

    /// An opcode that may not follow a `wide` prefix did so
    #[error("Opcode {mnemonic} may not be widened (offset {offset})")]
    InvalidWide {
        /// Mnemonic of the offending opcode
        mnemonic: &'static str,
        /// Byte offset of the `wide` prefix
        offset: u32,
    },

    /// Constant pool index out of range
    #[error("Constant pool index {0} out of range")]
    PoolIndexOutOfRange(u16),

    /// Constant pool entry has a different kind than expected
    #[error("Constant pool entry {index} is {actual}, expected {expected}")]
    PoolKindMismatch {
        /// The offending index
        index: u16,
        /// Kind found at the index
        actual: &'static str,
        /// Kind the caller asked for
        expected: &'static str,
    },

    /// A switch payload declared an invalid case range
    #[error("Malformed switch payload at offset {0}")]
    MalformedSwitch(u32),

    /// A branch target resolved outside the addressable code range
    #[error("Branch target of {mnemonic} at offset {offset} out of range")]
    BranchOutOfRange {
        /// Mnemonic of the branching opcode
        mnemonic: &'static str,
        /// Byte offset of the opcode in the instruction stream
        offset: u32,
    },
}

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, BytecodeError>;
