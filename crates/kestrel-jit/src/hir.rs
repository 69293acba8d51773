//! Typed SSA intermediate representation
//!
//! The translator lowers bytecode into this graph. Values are immutable and
//! typed; each is defined exactly once by the instruction that produces it.
//! Cross-block data flow goes through phi values at block entry. Operand
//! stack and local slots do not exist here; they are fully resolved during
//! abstract interpretation.

use kestrel_bytecode::{PoolIndex, ValueType};
use smallvec::SmallVec;

use crate::callsite::{CallKind, StatepointId};
use crate::safepoint::SafepointId;

/// Identifier of an SSA value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(pub u32);

impl std::fmt::Display for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of a basic block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Integer/float binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// Addition (wrapping for integers)
    Add,
    /// Subtraction (wrapping for integers)
    Sub,
    /// Multiplication (wrapping for integers)
    Mul,
    /// Division (integer forms trap on zero divisor upstream)
    Div,
    /// Remainder (sign follows the dividend for integers)
    Rem,
    /// Left shift, count masked to width-1
    Shl,
    /// Arithmetic right shift, count masked to width-1
    Shr,
    /// Logical right shift, count masked to width-1
    Ushr,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
}

/// Numeric conversion kinds, named source-to-destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ConvKind {
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
}

impl ConvKind {
    /// Type of the converted result
    pub const fn result_type(self) -> ValueType {
        match self {
            ConvKind::I2L | ConvKind::F2L | ConvKind::D2L => ValueType::Long,
            ConvKind::I2F | ConvKind::L2F | ConvKind::D2F => ValueType::Float,
            ConvKind::I2D | ConvKind::L2D | ConvKind::F2D => ValueType::Double,
            ConvKind::L2I
            | ConvKind::F2I
            | ConvKind::D2I
            | ConvKind::I2B
            | ConvKind::I2C
            | ConvKind::I2S => ValueType::Int,
        }
    }
}

/// Three-way comparison kinds producing an int in {-1, 0, 1}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpKind {
    /// Long compare
    Lcmp,
    /// Float compare, NaN biased to -1
    Fcmpl,
    /// Float compare, NaN biased to +1
    Fcmpg,
    /// Double compare, NaN biased to -1
    Dcmpl,
    /// Double compare, NaN biased to +1
    Dcmpg,
}

/// Condition codes for conditional branches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

/// A single SSA operation
#[derive(Debug, Clone, PartialEq)]
pub enum HirOp {
    /// 32-bit integer constant
    ConstInt(i32),
    /// 64-bit integer constant
    ConstLong(i64),
    /// binary32 constant (bit pattern preserved)
    ConstFloat(f32),
    /// binary64 constant (bit pattern preserved)
    ConstDouble(f64),
    /// Null reference constant
    ConstNull,
    /// Reference constant loaded from the pool (string/class literal)
    ConstPool(PoolIndex),
    /// Incoming parameter occupying the given local slot on entry
    Param(u16),
    /// Phi at block entry; inputs are (predecessor, value) pairs
    Phi(SmallVec<[(BlockId, ValueId); 2]>),
    /// The in-flight exception at a handler entry
    CaughtException,
    /// Binary arithmetic/logic
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// Arithmetic negation (sign-bit flip for floats, NaN included)
    Neg(ValueId),
    /// Numeric conversion
    Convert {
        /// Conversion kind
        kind: ConvKind,
        /// Source value
        value: ValueId,
    },
    /// Three-way comparison
    Compare {
        /// Comparison kind
        kind: CmpKind,
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// Raise a null-pointer fault at runtime if the operand is null
    NullCheck(ValueId),
    /// Raise an arithmetic fault at runtime if the operand is zero
    ZeroCheck(ValueId),
    /// Load an instance field (object already null-checked)
    GetField {
        /// Receiver
        object: ValueId,
        /// Field entry in the pool
        field: PoolIndex,
    },
    /// Store an instance field (object already null-checked)
    PutField {
        /// Receiver
        object: ValueId,
        /// Field entry in the pool
        field: PoolIndex,
        /// Value to store
        value: ValueId,
    },
    /// Load a static field from its defining class's storage
    GetStatic(PoolIndex),
    /// Store a static field
    PutStatic {
        /// Field entry in the pool
        field: PoolIndex,
        /// Value to store
        value: ValueId,
    },
    /// Load an array element (array null-checked, index bounds-checked at runtime)
    ArrayLoad {
        /// Array reference
        array: ValueId,
        /// Element index
        index: ValueId,
        /// Element type
        elem: ValueType,
    },
    /// Store an array element
    ArrayStore {
        /// Array reference
        array: ValueId,
        /// Element index
        index: ValueId,
        /// Value to store
        value: ValueId,
        /// Element type
        elem: ValueType,
    },
    /// Array length (array already null-checked)
    ArrayLength(ValueId),
    /// Allocate an instance of a class
    New(PoolIndex),
    /// Allocate a primitive array; tag is the element type code
    NewArray {
        /// Element type tag
        elem_tag: u8,
        /// Element count
        length: ValueId,
    },
    /// Allocate a reference array
    NewRefArray {
        /// Element class entry
        class: PoolIndex,
        /// Element count
        length: ValueId,
    },
    /// Subtype test producing int 0/1
    InstanceOf {
        /// Tested reference
        object: ValueId,
        /// Class entry
        class: PoolIndex,
    },
    /// Checked downcast; raises a cast fault at runtime on mismatch
    CheckCast {
        /// Tested reference
        object: ValueId,
        /// Class entry
        class: PoolIndex,
    },
    /// Method call; always carries a statepoint
    Call {
        /// Dispatch kind
        kind: CallKind,
        /// Method entry in the pool
        target: PoolIndex,
        /// Arguments, receiver first for instance calls
        args: SmallVec<[ValueId; 4]>,
        /// Statepoint allocated for this site
        statepoint: StatepointId,
    },
    /// Cooperative safepoint poll carrying a committed frame snapshot
    SafepointPoll(SafepointId),
}

/// Block terminator
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    /// Unconditional jump
    Goto(BlockId),
    /// Conditional branch on an integer or reference comparison
    If {
        /// Condition code
        cond: Cond,
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
        /// Taken edge
        then_block: BlockId,
        /// Fall-through edge
        else_block: BlockId,
    },
    /// Dense dispatch: `targets[(index - low) as usize]`, default on miss
    JumpTable {
        /// Scrutinee
        index: ValueId,
        /// Key of `targets[0]`
        low: i32,
        /// One target per consecutive key
        targets: Vec<BlockId>,
        /// Out-of-range target
        default: BlockId,
    },
    /// Sparse dispatch lowered as a decision tree by the back end
    Switch {
        /// Scrutinee
        index: ValueId,
        /// Sorted (key, target) cases
        cases: Vec<(i32, BlockId)>,
        /// No-match target
        default: BlockId,
    },
    /// Return from the method
    Return(Option<ValueId>),
    /// Throw the given reference
    Throw(ValueId),
    /// Placeholder used while a block is under construction
    Unterminated,
}

impl Terminator {
    /// Normal (non-exceptional) successor blocks
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Goto(b) => vec![*b],
            Terminator::If {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::JumpTable {
                targets, default, ..
            } => {
                let mut out = targets.clone();
                out.push(*default);
                out
            }
            Terminator::Switch { cases, default, .. } => {
                let mut out: Vec<BlockId> = cases.iter().map(|&(_, b)| b).collect();
                out.push(*default);
                out
            }
            Terminator::Return(_) | Terminator::Throw(_) | Terminator::Unterminated => Vec::new(),
        }
    }
}

/// Definition record of one SSA value
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDef {
    /// The operation producing the value
    pub op: HirOp,
    /// Result type, `None` for pure-effect ops
    pub ty: Option<ValueType>,
    /// Defining block
    pub block: BlockId,
    /// Bytecode offset the op was lowered from
    pub bci: u32,
}

/// One basic block of the graph
#[derive(Debug, Clone, Default)]
pub struct HirBlock {
    /// Phi values, defined before all instructions
    pub phis: Vec<ValueId>,
    /// Instructions in program order
    pub insts: Vec<ValueId>,
    /// Terminator; `Unterminated` only during construction
    pub terminator: Option<Terminator>,
}

impl HirBlock {
    /// Terminator, defaulting to the construction placeholder
    pub fn terminator(&self) -> &Terminator {
        self.terminator.as_ref().unwrap_or(&Terminator::Unterminated)
    }
}

/// The SSA graph of one translated method
#[derive(Debug, Clone, Default)]
pub struct HirGraph {
    values: Vec<ValueDef>,
    blocks: Vec<HirBlock>,
}

impl HirGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block, returning its id
    pub fn add_block(&mut self) -> BlockId {
        self.blocks.push(HirBlock::default());
        BlockId(self.blocks.len() as u32 - 1)
    }

    /// Number of blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of values
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Borrow a block
    pub fn block(&self, id: BlockId) -> &HirBlock {
        &self.blocks[id.0 as usize]
    }

    /// Borrow a block mutably
    pub fn block_mut(&mut self, id: BlockId) -> &mut HirBlock {
        &mut self.blocks[id.0 as usize]
    }

    /// Borrow a value definition
    pub fn value(&self, id: ValueId) -> &ValueDef {
        &self.values[id.0 as usize]
    }

    /// Borrow a value definition mutably (phi input patching)
    pub fn value_mut(&mut self, id: ValueId) -> &mut ValueDef {
        &mut self.values[id.0 as usize]
    }

    /// Define a new value and append it to its block's instruction list
    pub fn emit(&mut self, block: BlockId, bci: u32, op: HirOp, ty: Option<ValueType>) -> ValueId {
        let id = self.define(block, bci, op, ty);
        self.blocks[block.0 as usize].insts.push(id);
        id
    }

    /// Define a phi at block entry
    pub fn emit_phi(&mut self, block: BlockId, bci: u32, ty: ValueType) -> ValueId {
        let id = self.define(block, bci, HirOp::Phi(SmallVec::new()), Some(ty));
        self.blocks[block.0 as usize].phis.push(id);
        id
    }

    /// Add an input edge to an existing phi
    pub fn add_phi_input(&mut self, phi: ValueId, pred: BlockId, value: ValueId) {
        if let HirOp::Phi(inputs) = &mut self.values[phi.0 as usize].op {
            // Re-merging the same edge replaces the previous input.
            if let Some(slot) = inputs.iter_mut().find(|(b, _)| *b == pred) {
                slot.1 = value;
            } else {
                inputs.push((pred, value));
            }
        }
    }

    /// Set a block's terminator
    pub fn set_terminator(&mut self, block: BlockId, term: Terminator) {
        self.blocks[block.0 as usize].terminator = Some(term);
    }

    /// All value definitions, in definition order
    pub fn values(&self) -> impl Iterator<Item = (ValueId, &ValueDef)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, def)| (ValueId(i as u32), def))
    }

    fn define(&mut self, block: BlockId, bci: u32, op: HirOp, ty: Option<ValueType>) -> ValueId {
        self.values.push(ValueDef { op, ty, block, bci });
        ValueId(self.values.len() as u32 - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_orders_instructions() {
        let mut g = HirGraph::new();
        let b = g.add_block();
        let a = g.emit(b, 0, HirOp::ConstInt(1), Some(ValueType::Int));
        let c = g.emit(b, 1, HirOp::ConstInt(2), Some(ValueType::Int));
        assert_eq!(g.block(b).insts, vec![a, c]);
        assert_eq!(g.value(a).ty, Some(ValueType::Int));
    }

    #[test]
    fn test_phi_inputs_replace_per_edge() {
        let mut g = HirGraph::new();
        let b0 = g.add_block();
        let b1 = g.add_block();
        let v0 = g.emit(b0, 0, HirOp::ConstInt(1), Some(ValueType::Int));
        let v1 = g.emit(b0, 0, HirOp::ConstInt(2), Some(ValueType::Int));
        let phi = g.emit_phi(b1, 4, ValueType::Int);
        g.add_phi_input(phi, b0, v0);
        g.add_phi_input(phi, b0, v1);
        match &g.value(phi).op {
            HirOp::Phi(inputs) => assert_eq!(inputs.as_slice(), &[(b0, v1)]),
            other => panic!("not a phi: {other:?}"),
        }
    }

    #[test]
    fn test_terminator_successors() {
        let t = Terminator::Switch {
            index: ValueId(0),
            cases: vec![(1, BlockId(1)), (9, BlockId(2))],
            default: BlockId(3),
        };
        assert_eq!(t.successors(), vec![BlockId(1), BlockId(2), BlockId(3)]);
    }
}
