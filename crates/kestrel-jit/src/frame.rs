//! Abstract frame: the typed operand stack and local variable model
//!
//! The translator interprets bytecode over this frame instead of real
//! values. Every slot is either a typed SSA value, the upper half of a
//! category-2 value in the slot below, or undefined. Category-2 values
//! always occupy a value slot plus a `SecondHalf` slot and are never split
//! by a single-slot operation; every stack shuffle validates its category
//! pattern before touching anything.
//!
//! Stack shuffles work on logical units: a unit is one category-1 value or
//! one category-2 pair. [`AbstractFrame::take_slots`] pops units totaling an
//! exact slot count, which encodes the whole shuffle form table (`dup_x2`
//! form 2 is simply "one slot over a two-slot unit").

use kestrel_bytecode::ValueType;
use smallvec::SmallVec;
use thiserror::Error;

use crate::hir::{BlockId, HirGraph, ValueId};
use crate::safepoint::{FrameSnapshot, SnapshotSlot};

/// One stack or local slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// A typed SSA value (the lower slot, for category-2 types)
    Value {
        /// The value occupying the slot
        id: ValueId,
        /// Its type
        ty: ValueType,
    },
    /// Upper half of the category-2 value in the previous slot
    SecondHalf,
    /// No usable value
    Undefined,
}

impl Slot {
    fn describe(&self) -> String {
        match self {
            Slot::Value { ty, .. } => ty.name().to_string(),
            Slot::SecondHalf => "second-half".to_string(),
            Slot::Undefined => "undefined".to_string(),
        }
    }
}

/// A logical unit popped from the stack: one value, one or two slots wide
type Unit = (ValueId, ValueType);

/// Frame-model violations; the translator wraps these with the offending
/// bytecode offset
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Pop from an empty or too-shallow stack
    #[error("operand stack underflow")]
    StackUnderflow,

    /// Push past the declared maximum stack depth
    #[error("operand stack overflow (max {0} slots)")]
    StackOverflow(u16),

    /// Popped value has the wrong type
    #[error("expected {expected} on stack, found {found}")]
    TypeMismatch {
        /// Type the instruction requires
        expected: ValueType,
        /// Description of what was found
        found: String,
    },

    /// A single-slot operation would split a category-2 pair
    #[error("operation would split a two-slot value")]
    SplitPair,

    /// Load from a local slot holding no usable value
    #[error("local slot {0} is undefined")]
    UndefinedLocal(u16),

    /// Local index past the declared local area
    #[error("local slot {0} out of range")]
    LocalOutOfRange(u16),

    /// Merging frames of different stack depths
    #[error("merge with mismatched stack depth: {expected} vs {found}")]
    MergeDepth {
        /// Depth recorded at the join
        expected: usize,
        /// Depth arriving on the new edge
        found: usize,
    },

    /// Merging frames whose stack slots disagree in kind or type
    #[error("merge with mismatched stack slot {index}: {left} vs {right}")]
    MergeShape {
        /// Slot index from the bottom
        index: usize,
        /// Shape recorded at the join
        left: String,
        /// Shape arriving on the new edge
        right: String,
    },
}

/// Result type for frame operations
pub type FrameResult<T> = std::result::Result<T, FrameError>;

/// The abstract frame at one program point
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractFrame {
    stack: Vec<Slot>,
    locals: Vec<Slot>,
    max_stack: u16,
}

impl AbstractFrame {
    /// Empty stack, all locals undefined
    pub fn new(max_stack: u16, max_locals: u16) -> Self {
        Self {
            stack: Vec::with_capacity(max_stack as usize),
            locals: vec![Slot::Undefined; max_locals as usize],
            max_stack,
        }
    }

    /// Current stack depth in slots
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Stack slots, bottom first
    pub fn stack(&self) -> &[Slot] {
        &self.stack
    }

    /// Local slots
    pub fn locals(&self) -> &[Slot] {
        &self.locals
    }

    // ---- typed stack operations -------------------------------------

    /// Push a typed value; category-2 types occupy two slots
    pub fn push(&mut self, id: ValueId, ty: ValueType) -> FrameResult<()> {
        let span = ty.slot_count() as usize;
        if self.stack.len() + span > self.max_stack as usize {
            return Err(FrameError::StackOverflow(self.max_stack));
        }
        self.stack.push(Slot::Value { id, ty });
        if span == 2 {
            self.stack.push(Slot::SecondHalf);
        }
        Ok(())
    }

    /// Pop a value of the exact expected type
    pub fn pop(&mut self, expected: ValueType) -> FrameResult<ValueId> {
        let (id, ty) = self.pop_any()?;
        if ty != expected {
            // Re-push so diagnostics after an error see a stable frame.
            let _ = self.push(id, ty);
            return Err(FrameError::TypeMismatch {
                expected,
                found: ty.name().to_string(),
            });
        }
        Ok(id)
    }

    /// Pop one logical value of any type
    pub fn pop_any(&mut self) -> FrameResult<Unit> {
        match self.stack.pop() {
            Some(Slot::Value { id, ty }) => {
                if ty.is_category2() {
                    // A pair's value slot may not be popped without its half.
                    self.stack.push(Slot::Value { id, ty });
                    return Err(FrameError::SplitPair);
                }
                Ok((id, ty))
            }
            Some(Slot::SecondHalf) => match self.stack.pop() {
                Some(Slot::Value { id, ty }) if ty.is_category2() => Ok((id, ty)),
                _ => Err(FrameError::SplitPair),
            },
            Some(Slot::Undefined) => Err(FrameError::TypeMismatch {
                expected: ValueType::Int,
                found: "undefined".to_string(),
            }),
            None => Err(FrameError::StackUnderflow),
        }
    }

    /// Value on top of the stack without popping
    pub fn top(&self) -> FrameResult<Unit> {
        match self.stack.last() {
            Some(&Slot::Value { id, ty }) => Ok((id, ty)),
            Some(Slot::SecondHalf) => match self.stack.get(self.stack.len() - 2) {
                Some(&Slot::Value { id, ty }) => Ok((id, ty)),
                _ => Err(FrameError::SplitPair),
            },
            Some(Slot::Undefined) => Err(FrameError::TypeMismatch {
                expected: ValueType::Int,
                found: "undefined".to_string(),
            }),
            None => Err(FrameError::StackUnderflow),
        }
    }

    // ---- category-pattern stack shuffles ----------------------------

    /// Pop logical units totaling exactly `slots` slots, top first.
    /// A category-2 pair never splits across the boundary.
    fn take_slots(&mut self, slots: usize) -> FrameResult<SmallVec<[Unit; 2]>> {
        let mut units = SmallVec::new();
        let mut taken = 0;
        while taken < slots {
            let (id, ty) = self.pop_any()?;
            taken += ty.slot_count() as usize;
            if taken > slots {
                let _ = self.push(id, ty);
                return Err(FrameError::SplitPair);
            }
            units.push((id, ty));
        }
        Ok(units)
    }

    /// Push units previously taken, restoring their original order
    fn put_back(&mut self, units: &[Unit]) -> FrameResult<()> {
        for &(id, ty) in units.iter().rev() {
            self.push(id, ty)?;
        }
        Ok(())
    }

    /// `pop`: discard one category-1 slot
    pub fn shuffle_pop(&mut self) -> FrameResult<()> {
        self.take_slots(1).map(|_| ())
    }

    /// `pop2`: discard two slots (two category-1 values or one pair)
    pub fn shuffle_pop2(&mut self) -> FrameResult<()> {
        self.take_slots(2).map(|_| ())
    }

    /// `dup`: duplicate the top category-1 slot
    pub fn shuffle_dup(&mut self) -> FrameResult<()> {
        let top = self.take_slots(1)?;
        self.put_back(&top)?;
        self.put_back(&top)
    }

    /// `dup_x1`: duplicate the top slot beneath the next slot
    pub fn shuffle_dup_x1(&mut self) -> FrameResult<()> {
        let top = self.take_slots(1)?;
        let under = self.take_slots(1)?;
        self.put_back(&top)?;
        self.put_back(&under)?;
        self.put_back(&top)
    }

    /// `dup_x2`: duplicate the top slot beneath the next two slots
    pub fn shuffle_dup_x2(&mut self) -> FrameResult<()> {
        let top = self.take_slots(1)?;
        let under = self.take_slots(2)?;
        self.put_back(&top)?;
        self.put_back(&under)?;
        self.put_back(&top)
    }

    /// `dup2`: duplicate the top two slots
    pub fn shuffle_dup2(&mut self) -> FrameResult<()> {
        let top = self.take_slots(2)?;
        self.put_back(&top)?;
        self.put_back(&top)
    }

    /// `dup2_x1`: duplicate the top two slots beneath the next slot
    pub fn shuffle_dup2_x1(&mut self) -> FrameResult<()> {
        let top = self.take_slots(2)?;
        let under = self.take_slots(1)?;
        self.put_back(&top)?;
        self.put_back(&under)?;
        self.put_back(&top)
    }

    /// `dup2_x2`: duplicate the top two slots beneath the next two slots
    pub fn shuffle_dup2_x2(&mut self) -> FrameResult<()> {
        let top = self.take_slots(2)?;
        let under = self.take_slots(2)?;
        self.put_back(&top)?;
        self.put_back(&under)?;
        self.put_back(&top)
    }

    /// `swap`: exchange the top two category-1 slots
    pub fn shuffle_swap(&mut self) -> FrameResult<()> {
        let top = self.take_slots(1)?;
        let under = self.take_slots(1)?;
        self.put_back(&top)?;
        self.put_back(&under)
    }

    // ---- locals -----------------------------------------------------

    /// Load a local of the exact expected type
    pub fn load(&self, index: u16, expected: ValueType) -> FrameResult<ValueId> {
        let slot = self
            .locals
            .get(index as usize)
            .ok_or(FrameError::LocalOutOfRange(index))?;
        match *slot {
            Slot::Value { id, ty } if ty == expected => Ok(id),
            Slot::Value { ty, .. } => Err(FrameError::TypeMismatch {
                expected,
                found: ty.name().to_string(),
            }),
            Slot::SecondHalf | Slot::Undefined => Err(FrameError::UndefinedLocal(index)),
        }
    }

    /// Store a value into a local slot. Overwriting either half of an
    /// existing category-2 pair kills the whole pair.
    pub fn store(&mut self, index: u16, id: ValueId, ty: ValueType) -> FrameResult<()> {
        let i = index as usize;
        let span = ty.slot_count() as usize;
        if i + span > self.locals.len() {
            return Err(FrameError::LocalOutOfRange(index));
        }
        // The slot below may hold a pair whose upper half we overwrite.
        if i > 0 {
            if let Slot::Value { ty: below, .. } = self.locals[i - 1] {
                if below.is_category2() {
                    self.locals[i - 1] = Slot::Undefined;
                }
            }
        }
        // Any pair starting inside the written span loses its upper half.
        for k in i..i + span {
            if let Slot::Value { ty: old, .. } = self.locals[k] {
                if old.is_category2() && k + 1 < self.locals.len() {
                    self.locals[k + 1] = Slot::Undefined;
                }
            }
        }
        self.locals[i] = Slot::Value { id, ty };
        if span == 2 {
            self.locals[i + 1] = Slot::SecondHalf;
        }
        Ok(())
    }

    // ---- merging ----------------------------------------------------

    /// Seed a join block's entry frame with one phi per live slot. Stack
    /// values and defined locals become phis; `SecondHalf` and `Undefined`
    /// slots carry over as-is.
    pub fn seed_with_phis(&self, graph: &mut HirGraph, block: BlockId, bci: u32) -> AbstractFrame {
        let mut seeded = AbstractFrame {
            stack: Vec::with_capacity(self.stack.len()),
            locals: Vec::with_capacity(self.locals.len()),
            max_stack: self.max_stack,
        };
        for slot in &self.stack {
            seeded.stack.push(match *slot {
                Slot::Value { ty, .. } => Slot::Value {
                    id: graph.emit_phi(block, bci, ty),
                    ty,
                },
                other => other,
            });
        }
        for slot in &self.locals {
            seeded.locals.push(match *slot {
                Slot::Value { ty, .. } => Slot::Value {
                    id: graph.emit_phi(block, bci, ty),
                    ty,
                },
                other => other,
            });
        }
        seeded
    }

    /// Seed an exception handler's entry frame. Locals become phis fed by
    /// the covered blocks; the stack is exactly the in-flight exception.
    pub fn seed_handler_entry(
        &self,
        graph: &mut HirGraph,
        block: BlockId,
        bci: u32,
        caught: ValueId,
    ) -> AbstractFrame {
        let mut seeded = AbstractFrame {
            stack: vec![Slot::Value {
                id: caught,
                ty: ValueType::Reference,
            }],
            locals: Vec::with_capacity(self.locals.len()),
            max_stack: self.max_stack,
        };
        for slot in &self.locals {
            seeded.locals.push(match *slot {
                Slot::Value { ty, .. } => Slot::Value {
                    id: graph.emit_phi(block, bci, ty),
                    ty,
                },
                other => other,
            });
        }
        seeded
    }

    /// In-block meet of local slots, used to accumulate the state an
    /// exception handler may observe. No phis: disagreeing slots degrade.
    pub fn meet_locals(&mut self, other: &AbstractFrame) -> bool {
        let mut degraded = false;
        for (mine, theirs) in self.locals.iter_mut().zip(other.locals.iter()) {
            let agree = match (*mine, *theirs) {
                (Slot::Value { id: a, ty: ta }, Slot::Value { id: b, ty: tb }) => {
                    a == b && ta == tb
                }
                (Slot::SecondHalf, Slot::SecondHalf) | (Slot::Undefined, _) => true,
                _ => false,
            };
            if !agree {
                *mine = Slot::Undefined;
                degraded = true;
            }
        }
        degraded
    }

    /// Merge only the local slots into a handler entry frame, leaving its
    /// one-slot exception stack alone
    pub fn merge_locals_into(
        &self,
        entry: &mut AbstractFrame,
        graph: &mut HirGraph,
        pred: BlockId,
    ) -> FrameResult<bool> {
        Ok(merge_local_slots(
            &self.locals,
            &mut entry.locals,
            graph,
            pred,
        ))
    }

    /// Record this frame as one incoming edge of a phi-seeded entry frame.
    ///
    /// Stack slots must agree in depth, kind, and type; any disagreement is
    /// fatal. Locals degrade: a slot whose kind or type disagrees becomes
    /// `Undefined` at the join. Returns whether any local degraded, which
    /// obligates the caller to retranslate the join block.
    pub fn merge_into(
        &self,
        entry: &mut AbstractFrame,
        graph: &mut HirGraph,
        pred: BlockId,
    ) -> FrameResult<bool> {
        if self.stack.len() != entry.stack.len() {
            return Err(FrameError::MergeDepth {
                expected: entry.stack.len(),
                found: self.stack.len(),
            });
        }
        for (index, (mine, theirs)) in self.stack.iter().zip(entry.stack.iter()).enumerate() {
            match (*mine, *theirs) {
                (Slot::Value { id, ty }, Slot::Value { id: phi, ty: want }) => {
                    if ty != want {
                        return Err(FrameError::MergeShape {
                            index,
                            left: theirs.describe(),
                            right: mine.describe(),
                        });
                    }
                    graph.add_phi_input(phi, pred, id);
                }
                (Slot::SecondHalf, Slot::SecondHalf) => {}
                _ => {
                    return Err(FrameError::MergeShape {
                        index,
                        left: theirs.describe(),
                        right: mine.describe(),
                    });
                }
            }
        }

        Ok(merge_local_slots(
            &self.locals,
            &mut entry.locals,
            graph,
            pred,
        ))
    }

    /// Capture the frame for a safepoint
    pub fn snapshot(&self, bci: u32) -> FrameSnapshot {
        let map = |slot: &Slot| match *slot {
            Slot::Value { id, ty } => SnapshotSlot::Value { value: id, ty },
            Slot::SecondHalf => SnapshotSlot::SecondHalf,
            Slot::Undefined => SnapshotSlot::Undefined,
        };
        FrameSnapshot {
            bci,
            locals: self.locals.iter().map(map).collect(),
            stack: self.stack.iter().map(map).collect(),
        }
    }

    /// Phi ids of a seeded entry frame, in slot order (locals then stack)
    pub fn phi_ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.locals
            .iter()
            .chain(self.stack.iter())
            .filter_map(|slot| match slot {
                Slot::Value { id, .. } => Some(*id),
                _ => None,
            })
    }

    /// Whether any local or stack slot references the given value
    pub fn references(&self, id: ValueId) -> bool {
        self.locals
            .iter()
            .chain(self.stack.iter())
            .any(|s| matches!(s, Slot::Value { id: v, .. } if *v == id))
    }

    /// Drop phis that became dead when their local slot degraded during a
    /// merge. The phi values stay defined in the graph but are removed from
    /// the block's phi list when no slot references them.
    pub fn prune_dead_phis(&self, graph: &mut HirGraph, block: BlockId) {
        let live: rustc_hash::FxHashSet<ValueId> = self.phi_ids().collect();
        graph.block_mut(block).phis.retain(|p| live.contains(p));
    }
}

/// Merge incoming local slots into a phi-seeded entry. Agreeing types feed
/// the phi; disagreements degrade the slot to `Undefined`. Returns whether
/// anything degraded.
fn merge_local_slots(
    incoming: &[Slot],
    entry: &mut [Slot],
    graph: &mut HirGraph,
    pred: BlockId,
) -> bool {
    let mut degraded = false;
    for (mine, theirs) in incoming.iter().zip(entry.iter_mut()) {
        match (*mine, *theirs) {
            (Slot::Value { id, ty }, Slot::Value { id: phi, ty: want }) => {
                if ty == want {
                    graph.add_phi_input(phi, pred, id);
                } else {
                    *theirs = Slot::Undefined;
                    degraded = true;
                }
            }
            (Slot::SecondHalf, Slot::SecondHalf) | (_, Slot::Undefined) => {}
            _ => {
                *theirs = Slot::Undefined;
                degraded = true;
            }
        }
    }
    degraded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::HirOp;

    fn v(n: u32) -> ValueId {
        ValueId(n)
    }

    fn frame_with(stack: &[(u32, ValueType)]) -> AbstractFrame {
        let mut f = AbstractFrame::new(16, 8);
        for &(n, ty) in stack {
            f.push(v(n), ty).unwrap();
        }
        f
    }

    fn stack_ids(f: &AbstractFrame) -> Vec<u32> {
        f.stack()
            .iter()
            .filter_map(|s| match s {
                Slot::Value { id, .. } => Some(id.0),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_pop_type_checked() {
        let mut f = frame_with(&[(1, ValueType::Int)]);
        assert_eq!(
            f.pop(ValueType::Float),
            Err(FrameError::TypeMismatch {
                expected: ValueType::Float,
                found: "int".to_string()
            })
        );
        // Frame intact after the failed pop.
        assert_eq!(f.pop(ValueType::Int), Ok(v(1)));
    }

    #[test]
    fn test_category2_occupies_two_slots() {
        let mut f = frame_with(&[(1, ValueType::Long)]);
        assert_eq!(f.stack_depth(), 2);
        assert_eq!(f.pop(ValueType::Long), Ok(v(1)));
        assert_eq!(f.stack_depth(), 0);
    }

    #[test]
    fn test_overflow_counts_slots() {
        let mut f = AbstractFrame::new(3, 0);
        f.push(v(1), ValueType::Long).unwrap();
        assert_eq!(
            f.push(v(2), ValueType::Double),
            Err(FrameError::StackOverflow(3))
        );
    }

    // Shuffle table, literal forms. Stacks read bottom -> top.

    #[test]
    fn test_dup_x1_form() {
        // [B, A] -> [A, B, A]
        let mut f = frame_with(&[(2, ValueType::Int), (1, ValueType::Int)]);
        f.shuffle_dup_x1().unwrap();
        assert_eq!(stack_ids(&f), vec![1, 2, 1]);
    }

    #[test]
    fn test_dup_x2_form1() {
        // [C, B, A] all cat1 -> [A, C, B, A]
        let mut f = frame_with(&[
            (3, ValueType::Int),
            (2, ValueType::Int),
            (1, ValueType::Int),
        ]);
        f.shuffle_dup_x2().unwrap();
        assert_eq!(stack_ids(&f), vec![1, 3, 2, 1]);
    }

    #[test]
    fn test_dup_x2_form2() {
        // [L(pair), A] -> [A, L, A]
        let mut f = frame_with(&[(2, ValueType::Long), (1, ValueType::Int)]);
        f.shuffle_dup_x2().unwrap();
        assert_eq!(stack_ids(&f), vec![1, 2, 1]);
        assert_eq!(f.stack_depth(), 4);
    }

    #[test]
    fn test_dup2_on_pair() {
        let mut f = frame_with(&[(1, ValueType::Double)]);
        f.shuffle_dup2().unwrap();
        assert_eq!(stack_ids(&f), vec![1, 1]);
        assert_eq!(f.stack_depth(), 4);
    }

    #[test]
    fn test_dup2_on_two_cat1() {
        // [B, A] -> [B, A, B, A]
        let mut f = frame_with(&[(2, ValueType::Int), (1, ValueType::Int)]);
        f.shuffle_dup2().unwrap();
        assert_eq!(stack_ids(&f), vec![2, 1, 2, 1]);
    }

    #[test]
    fn test_dup2_x1_pair_form() {
        // [B, L(pair)] -> [L, B, L]
        let mut f = frame_with(&[(2, ValueType::Int), (1, ValueType::Long)]);
        f.shuffle_dup2_x1().unwrap();
        assert_eq!(stack_ids(&f), vec![1, 2, 1]);
    }

    #[test]
    fn test_dup2_x2_all_forms_mix() {
        // Form 3: [L(pair), B, A] -> [B, A, L, B, A]
        let mut f = frame_with(&[
            (3, ValueType::Long),
            (2, ValueType::Int),
            (1, ValueType::Int),
        ]);
        f.shuffle_dup2_x2().unwrap();
        assert_eq!(stack_ids(&f), vec![2, 1, 3, 2, 1]);
    }

    #[test]
    fn test_swap_rejects_pair() {
        let mut f = frame_with(&[(2, ValueType::Int), (1, ValueType::Long)]);
        assert_eq!(f.shuffle_swap(), Err(FrameError::SplitPair));
    }

    #[test]
    fn test_dup_rejects_pair() {
        let mut f = frame_with(&[(1, ValueType::Double)]);
        assert_eq!(f.shuffle_dup(), Err(FrameError::SplitPair));
    }

    #[test]
    fn test_pop2_takes_whole_pair() {
        let mut f = frame_with(&[(2, ValueType::Int), (1, ValueType::Long)]);
        f.shuffle_pop2().unwrap();
        assert_eq!(stack_ids(&f), vec![2]);
    }

    // Locals

    #[test]
    fn test_store_kills_overlapped_pair_below() {
        let mut f = AbstractFrame::new(4, 4);
        f.store(0, v(1), ValueType::Long).unwrap();
        f.store(1, v(2), ValueType::Int).unwrap();
        assert_eq!(
            f.load(0, ValueType::Long),
            Err(FrameError::UndefinedLocal(0))
        );
        assert_eq!(f.load(1, ValueType::Int), Ok(v(2)));
    }

    #[test]
    fn test_store_orphans_pair_starting_in_span() {
        let mut f = AbstractFrame::new(4, 4);
        f.store(1, v(1), ValueType::Double).unwrap();
        f.store(1, v(2), ValueType::Int).unwrap();
        assert_eq!(f.load(1, ValueType::Int), Ok(v(2)));
        // Slot 2 was the pair's upper half; it is dead now.
        assert_eq!(f.load(2, ValueType::Int), Err(FrameError::UndefinedLocal(2)));
    }

    #[test]
    fn test_store_pair_out_of_range() {
        let mut f = AbstractFrame::new(4, 2);
        assert_eq!(
            f.store(1, v(1), ValueType::Long),
            Err(FrameError::LocalOutOfRange(1))
        );
    }

    // Merging

    #[test]
    fn test_merge_depth_mismatch_fatal() {
        let mut graph = HirGraph::new();
        let join = graph.add_block();
        let pred = graph.add_block();
        let a = frame_with(&[(1, ValueType::Int)]);
        let b = frame_with(&[(2, ValueType::Int), (3, ValueType::Int)]);
        let mut entry = a.seed_with_phis(&mut graph, join, 0);
        assert!(matches!(
            b.merge_into(&mut entry, &mut graph, pred),
            Err(FrameError::MergeDepth { .. })
        ));
    }

    #[test]
    fn test_merge_stack_type_mismatch_fatal() {
        let mut graph = HirGraph::new();
        let join = graph.add_block();
        let pred = graph.add_block();
        let a = frame_with(&[(1, ValueType::Int)]);
        let b = frame_with(&[(2, ValueType::Float)]);
        let mut entry = a.seed_with_phis(&mut graph, join, 0);
        assert!(matches!(
            b.merge_into(&mut entry, &mut graph, pred),
            Err(FrameError::MergeShape { .. })
        ));
    }

    #[test]
    fn test_merge_local_type_mismatch_degrades() {
        let mut graph = HirGraph::new();
        let join = graph.add_block();
        let pred = graph.add_block();
        let mut a = AbstractFrame::new(4, 2);
        a.store(0, v(1), ValueType::Int).unwrap();
        let mut b = AbstractFrame::new(4, 2);
        b.store(0, v(2), ValueType::Reference).unwrap();
        let mut entry = a.seed_with_phis(&mut graph, join, 0);
        let degraded = b.merge_into(&mut entry, &mut graph, pred).unwrap();
        assert!(degraded);
        assert_eq!(
            entry.load(0, ValueType::Int),
            Err(FrameError::UndefinedLocal(0))
        );
    }

    #[test]
    fn test_merge_same_types_wires_phis() {
        let mut graph = HirGraph::new();
        let join = graph.add_block();
        let p0 = graph.add_block();
        let p1 = graph.add_block();
        let a = frame_with(&[(1, ValueType::Int)]);
        let b = frame_with(&[(2, ValueType::Int)]);
        let mut entry = a.seed_with_phis(&mut graph, join, 0);
        a.merge_into(&mut entry, &mut graph, p0).unwrap();
        let degraded = b.merge_into(&mut entry, &mut graph, p1).unwrap();
        assert!(!degraded);
        let phi = entry.phi_ids().next().unwrap();
        match &graph.value(phi).op {
            HirOp::Phi(inputs) => {
                assert_eq!(inputs.len(), 2);
            }
            other => panic!("not a phi: {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_preserves_slot_kinds() {
        let mut f = AbstractFrame::new(4, 3);
        f.store(0, v(1), ValueType::Long).unwrap();
        f.push(v(2), ValueType::Reference).unwrap();
        let snap = f.snapshot(7);
        assert_eq!(snap.bci, 7);
        assert_eq!(snap.locals.len(), 3);
        assert!(matches!(snap.locals[1], SnapshotSlot::SecondHalf));
        assert!(matches!(snap.locals[2], SnapshotSlot::Undefined));
        let roots: Vec<ValueId> = snap.reference_slots().collect();
        assert_eq!(roots, vec![v(2)]);
    }
}
