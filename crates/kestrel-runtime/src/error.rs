//! Runtime error types

use thiserror::Error;

/// Errors raised by the runtime contracts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// A type name was never registered with the hierarchy
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Method lookup failed along the whole supertype chain
    #[error("no method {method} on {type_name} or its supertypes")]
    UnknownMethod {
        /// Receiver type searched
        type_name: String,
        /// Method name searched for
        method: String,
    },

    /// A call-site argument did not match the recorded layout
    #[error("argument {index} does not match the call layout: {reason}")]
    ArgumentMismatch {
        /// Argument position
        index: usize,
        /// What went wrong
        reason: String,
    },

    /// A native spill slot index outside the call's outgoing area
    #[error("spill slot {0} out of range")]
    SlotOutOfRange(u16),

    /// Registering a type under a supertype that would cycle the lattice
    #[error("supertype cycle through {0}")]
    HierarchyCycle(String),
}

/// Result alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
