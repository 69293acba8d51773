//! Call-site records and argument layout
//!
//! Every call the translator emits allocates a statepoint id and a call-site
//! record. The record carries everything later stages need: how the call
//! dispatches, where its arguments live under the native calling convention,
//! and whether the target address is a patchable slot. After emission the
//! table is read-only except to the relocation mechanism.

use kestrel_bytecode::{PoolIndex, ValueType};
use rustc_hash::FxHashMap;

/// Number of integer/reference argument registers in the native convention
pub const INT_ARG_REGS: u8 = 6;
/// Number of floating-point argument registers in the native convention
pub const FLOAT_ARG_REGS: u8 = 8;

/// Identifier tying a call site to its deopt/GC metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StatepointId(pub u32);

/// How a call site dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Direct call to a statically resolved target
    Static,
    /// Dispatch through the receiver's method table
    Virtual,
    /// Direct call with a receiver (constructors, private/super calls)
    Special,
    /// Call out of managed code into a native function
    Native,
}

impl CallKind {
    /// Whether the target address lives in a patchable slot
    pub const fn is_patchable(self) -> bool {
        matches!(self, CallKind::Static | CallKind::Special)
    }
}

/// Where one argument lives at the call instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSlot {
    /// Integer/reference argument register
    IntReg(u8),
    /// Floating-point argument register
    FloatReg(u8),
    /// Spilled to the outgoing argument area, 8-byte slots
    Stack(u16),
}

/// Placement of every argument of one call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgLayout {
    /// Per-argument (type, slot) in call order
    pub args: Vec<(ValueType, ArgSlot)>,
}

impl ArgLayout {
    /// Assign argument slots per the native convention: integer and
    /// reference arguments consume integer registers, floats consume
    /// float registers, and overflow in either class spills to the stack.
    pub fn assign(sig: &[ValueType]) -> Self {
        let mut next_int = 0u8;
        let mut next_float = 0u8;
        let mut next_stack = 0u16;
        let args = sig
            .iter()
            .map(|&ty| {
                let slot = match ty {
                    ValueType::Float | ValueType::Double => {
                        if next_float < FLOAT_ARG_REGS {
                            next_float += 1;
                            ArgSlot::FloatReg(next_float - 1)
                        } else {
                            next_stack += 1;
                            ArgSlot::Stack(next_stack - 1)
                        }
                    }
                    _ => {
                        if next_int < INT_ARG_REGS {
                            next_int += 1;
                            ArgSlot::IntReg(next_int - 1)
                        } else {
                            next_stack += 1;
                            ArgSlot::Stack(next_stack - 1)
                        }
                    }
                };
                (ty, slot)
            })
            .collect();
        Self { args }
    }

    /// Stack slots holding reference arguments. These are GC roots while
    /// the callee runs and must appear in the covering frame snapshot.
    pub fn spilled_refs(&self) -> impl Iterator<Item = u16> + '_ {
        self.args.iter().filter_map(|&(ty, slot)| match (ty, slot) {
            (ValueType::Reference, ArgSlot::Stack(i)) => Some(i),
            _ => None,
        })
    }

    /// Number of stack slots the call consumes
    pub fn stack_slots(&self) -> u16 {
        self.args
            .iter()
            .filter(|(_, s)| matches!(s, ArgSlot::Stack(_)))
            .count() as u16
    }
}

/// Everything recorded about one emitted call site
#[derive(Debug, Clone, PartialEq)]
pub struct CallSiteInfo {
    /// Statepoint allocated for the site
    pub statepoint: StatepointId,
    /// Dispatch kind
    pub kind: CallKind,
    /// Method entry in the pool
    pub target: PoolIndex,
    /// Bytecode offset of the call instruction
    pub bci: u32,
    /// Argument placement
    pub layout: ArgLayout,
    /// Whether relocation may rewrite the target slot after emission
    pub patchable: bool,
}

/// All call sites of one translated method, keyed by statepoint id
#[derive(Debug, Clone, Default)]
pub struct CallSiteTable {
    entries: Vec<CallSiteInfo>,
    by_id: FxHashMap<StatepointId, usize>,
}

impl CallSiteTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next statepoint id and record its call site
    pub fn alloc(
        &mut self,
        kind: CallKind,
        target: PoolIndex,
        bci: u32,
        sig: &[ValueType],
    ) -> StatepointId {
        let id = StatepointId(self.entries.len() as u32);
        self.by_id.insert(id, self.entries.len());
        self.entries.push(CallSiteInfo {
            statepoint: id,
            kind,
            target,
            bci,
            layout: ArgLayout::assign(sig),
            patchable: kind.is_patchable(),
        });
        id
    }

    /// Look up a call site
    pub fn get(&self, id: StatepointId) -> Option<&CallSiteInfo> {
        self.by_id.get(&id).map(|&i| &self.entries[i])
    }

    /// All call sites in emission order
    pub fn iter(&self) -> impl Iterator<Item = &CallSiteInfo> {
        self.entries.iter()
    }

    /// Number of recorded call sites
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no call sites were recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_args_spill_after_register_budget() {
        let sig = vec![ValueType::Int; 9];
        let layout = ArgLayout::assign(&sig);
        for (i, (_, slot)) in layout.args.iter().enumerate() {
            if i < INT_ARG_REGS as usize {
                assert_eq!(*slot, ArgSlot::IntReg(i as u8));
            } else {
                assert_eq!(*slot, ArgSlot::Stack((i - INT_ARG_REGS as usize) as u16));
            }
        }
        assert_eq!(layout.stack_slots(), 3);
    }

    #[test]
    fn test_float_args_use_separate_registers() {
        let sig = [
            ValueType::Int,
            ValueType::Double,
            ValueType::Reference,
            ValueType::Float,
        ];
        let layout = ArgLayout::assign(&sig);
        assert_eq!(layout.args[0].1, ArgSlot::IntReg(0));
        assert_eq!(layout.args[1].1, ArgSlot::FloatReg(0));
        assert_eq!(layout.args[2].1, ArgSlot::IntReg(1));
        assert_eq!(layout.args[3].1, ArgSlot::FloatReg(1));
    }

    #[test]
    fn test_spilled_reference_roots() {
        let mut sig = vec![ValueType::Int; 6];
        sig.push(ValueType::Reference);
        sig.push(ValueType::Reference);
        let layout = ArgLayout::assign(&sig);
        let roots: Vec<u16> = layout.spilled_refs().collect();
        assert_eq!(roots, vec![0, 1]);
    }

    #[test]
    fn test_statepoint_ids_are_dense() {
        let mut table = CallSiteTable::new();
        let a = table.alloc(CallKind::Static, PoolIndex(1), 0, &[]);
        let b = table.alloc(CallKind::Virtual, PoolIndex(2), 5, &[ValueType::Reference]);
        assert_eq!(a, StatepointId(0));
        assert_eq!(b, StatepointId(1));
        assert!(table.get(a).unwrap().patchable);
        assert!(!table.get(b).unwrap().patchable);
    }
}
