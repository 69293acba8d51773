//! Safepoint and deoptimization metadata
//!
//! A safepoint candidate moves through a three-state machine. The CFG pass
//! marks method entry and loop headers `Pending`; the translator commits a
//! candidate by attaching the full frame snapshot at the moment the poll is
//! emitted. Only `Committed` safepoints reach the runtime: a poll without a
//! snapshot would be unusable for both deopt and root enumeration.

use kestrel_bytecode::ValueType;

use crate::error::{Result, TranslateError};
use crate::hir::ValueId;

/// Identifier of one safepoint record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SafepointId(pub u32);

/// Lifecycle of a safepoint candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafepointState {
    /// Not a candidate
    Unmarked,
    /// Marked during CFG construction, no snapshot yet
    Pending,
    /// Snapshot attached; usable for deopt and root enumeration
    Committed,
}

/// Why the poll exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafepointKind {
    /// Poll on method entry
    MethodEntry,
    /// Poll at a loop header; executed once per iteration, which covers
    /// every back edge targeting the header
    LoopHeader,
}

/// One abstract-frame slot captured in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSlot {
    /// A live typed value
    Value {
        /// The SSA value occupying the slot
        value: ValueId,
        /// Its type
        ty: ValueType,
    },
    /// Upper half of a category-2 value in the previous slot
    SecondHalf,
    /// Dead or conflicting slot; not reconstructed on deopt
    Undefined,
}

impl SnapshotSlot {
    /// The value if the slot holds a reference (a GC root)
    pub const fn as_reference(self) -> Option<ValueId> {
        match self {
            SnapshotSlot::Value {
                value,
                ty: ValueType::Reference,
            } => Some(value),
            _ => None,
        }
    }
}

/// Complete logical frame at one safepoint.
///
/// Sufficient to reconstruct the interpreter frame on deoptimization and to
/// enumerate every reference slot for the collector, the native-call spill
/// area included via [`crate::callsite::ArgLayout::spilled_refs`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    /// Bytecode offset execution resumes at after deopt
    pub bci: u32,
    /// Local variable slots, in slot order
    pub locals: Vec<SnapshotSlot>,
    /// Operand stack slots, bottom first
    pub stack: Vec<SnapshotSlot>,
}

impl FrameSnapshot {
    /// All reference-typed values in the frame, locals then stack
    pub fn reference_slots(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.locals
            .iter()
            .chain(self.stack.iter())
            .filter_map(|s| s.as_reference())
    }
}

/// One safepoint record
#[derive(Debug, Clone, PartialEq)]
pub struct SafepointEntry {
    /// Record id
    pub id: SafepointId,
    /// Why the poll exists
    pub kind: SafepointKind,
    /// Bytecode offset of the poll
    pub bci: u32,
    /// Lifecycle state
    pub state: SafepointState,
    /// Frame snapshot, present exactly when `state == Committed`
    pub snapshot: Option<FrameSnapshot>,
}

/// All safepoints of one translated method
#[derive(Debug, Clone, Default)]
pub struct SafepointTable {
    entries: Vec<SafepointEntry>,
}

impl SafepointTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a new pending candidate
    pub fn alloc_pending(&mut self, kind: SafepointKind, bci: u32) -> SafepointId {
        let id = SafepointId(self.entries.len() as u32);
        self.entries.push(SafepointEntry {
            id,
            kind,
            bci,
            state: SafepointState::Pending,
            snapshot: None,
        });
        id
    }

    /// Commit a pending candidate by attaching its snapshot
    pub fn commit(&mut self, id: SafepointId, snapshot: FrameSnapshot) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id.0 as usize)
            .ok_or_else(|| TranslateError::Internal(format!("unknown safepoint {}", id.0)))?;
        if entry.state != SafepointState::Pending {
            return Err(TranslateError::Internal(format!(
                "safepoint {} committed twice",
                id.0
            )));
        }
        entry.state = SafepointState::Committed;
        entry.snapshot = Some(snapshot);
        Ok(())
    }

    /// Look up a record
    pub fn get(&self, id: SafepointId) -> Option<&SafepointEntry> {
        self.entries.get(id.0 as usize)
    }

    /// All records in allocation order
    pub fn iter(&self) -> impl Iterator<Item = &SafepointEntry> {
        self.entries.iter()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every record carries a snapshot. Holds for every successful
    /// translation; a pending leftover means a poll was emitted without
    /// frame state.
    pub fn all_committed(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.state == SafepointState::Committed && e.snapshot.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> FrameSnapshot {
        FrameSnapshot {
            bci: 8,
            locals: vec![
                SnapshotSlot::Value {
                    value: ValueId(0),
                    ty: ValueType::Reference,
                },
                SnapshotSlot::Undefined,
            ],
            stack: vec![SnapshotSlot::Value {
                value: ValueId(1),
                ty: ValueType::Int,
            }],
        }
    }

    #[test]
    fn test_commit_transitions_state() {
        let mut table = SafepointTable::new();
        let id = table.alloc_pending(SafepointKind::LoopHeader, 8);
        assert_eq!(table.get(id).unwrap().state, SafepointState::Pending);
        table.commit(id, snapshot()).unwrap();
        let entry = table.get(id).unwrap();
        assert_eq!(entry.state, SafepointState::Committed);
        assert!(entry.snapshot.is_some());
        assert!(table.all_committed());
    }

    #[test]
    fn test_double_commit_rejected() {
        let mut table = SafepointTable::new();
        let id = table.alloc_pending(SafepointKind::LoopHeader, 12);
        table.commit(id, snapshot()).unwrap();
        assert!(table.commit(id, snapshot()).is_err());
    }

    #[test]
    fn test_reference_slot_enumeration() {
        let snap = snapshot();
        let roots: Vec<ValueId> = snap.reference_slots().collect();
        assert_eq!(roots, vec![ValueId(0)]);
    }
}
