//! # Kestrel runtime contracts
//!
//! The execution-time counterparts of the metadata the JIT front end
//! emits: the cooperative safepoint handshake behind every committed poll,
//! the patchable slots behind direct call sites, the type hierarchy and
//! dispatch tables virtual calls and type tests resolve against, static
//! field storage, and the native-boundary argument area with its
//! GC-visible spill slots.
//!
//! None of this executes compiled code; it defines and tests the contracts
//! compiled code relies on.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod dispatch;
pub mod error;
pub mod native;
pub mod patch;
pub mod safepoint;
pub mod value;

pub use dispatch::{DispatchTable, StaticArea, TypeHierarchy};
pub use error::{Result, RuntimeError};
pub use native::NativeCallArea;
pub use patch::{CodeCache, CompiledEntry, EntryState, PatchSet, PatchableCallSite};
pub use safepoint::SafepointSync;
pub use value::RuntimeValue;
