//! Translation errors
//!
//! Every error is a whole-method bailout: the translator returns `Err` and no
//! partial graph, call-site table, or safepoint record escapes to the caller.

use kestrel_bytecode::BytecodeError;
use thiserror::Error;

/// Errors raised while translating a method
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The input bytecode could not be decoded
    #[error(transparent)]
    Malformed(#[from] BytecodeError),

    /// Decodable bytecode that violates the stack or type discipline
    #[error("Verification failed at offset {offset}: {reason}")]
    Verification {
        /// Bytecode offset of the offending instruction
        offset: u32,
        /// Human-readable description of the violated rule
        reason: String,
    },

    /// A recognized construct this compiler does not translate
    #[error("Unsupported construct: {0}")]
    Unsupported(&'static str),

    /// Internal invariant broken; always a compiler bug
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TranslateError {
    /// Shorthand for a verification failure
    pub fn verification(offset: u32, reason: impl Into<String>) -> Self {
        Self::Verification {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result type for translation
pub type Result<T> = std::result::Result<T, TranslateError>;
