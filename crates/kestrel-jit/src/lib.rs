//! # Kestrel JIT front end
//!
//! Translates stack-oriented bytecode into a typed SSA control-flow graph,
//! verifying the stack and type discipline along the way and annotating the
//! result with the metadata later tiers need: safepoint frame snapshots for
//! deoptimization and GC root enumeration, and call-site records for
//! patchable dispatch.
//!
//! ## Pipeline
//!
//! 1. [`cfg::Cfg::build`] carves the bytecode into basic blocks, wires
//!    normal and exception-handler edges, finds loop headers, and numbers
//!    blocks in reverse post order
//! 2. [`translate::translate`] abstractly interprets each block over an
//!    [`frame::AbstractFrame`], emitting one [`hir`] operation per bytecode
//!    and phis at join points
//! 3. Constant-foldable operations are folded via [`fold`] as they are
//!    emitted; everything else reaches the graph unchanged
//!
//! Any malformed input, verification violation, or unsupported construct
//! aborts the whole method with a [`TranslateError`]; no partial output is
//! ever observable.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod callsite;
pub mod cfg;
pub mod error;
pub mod fold;
pub mod frame;
pub mod hir;
pub mod safepoint;
pub mod translate;

pub use callsite::{ArgLayout, ArgSlot, CallKind, CallSiteInfo, CallSiteTable, StatepointId};
pub use cfg::{Cfg, CfgBlock};
pub use error::{Result, TranslateError};
pub use fold::ConstValue;
pub use frame::{AbstractFrame, FrameError, Slot};
pub use hir::{BinOp, BlockId, CmpKind, Cond, ConvKind, HirGraph, HirOp, Terminator, ValueId};
pub use safepoint::{
    FrameSnapshot, SafepointId, SafepointKind, SafepointState, SafepointTable, SnapshotSlot,
};
pub use translate::{CompiledMethod, translate};
