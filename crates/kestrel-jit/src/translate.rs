//! Bytecode-to-SSA translation
//!
//! Blocks are processed from a worklist ordered by reverse post order, so a
//! block's predecessors are usually translated first and loop headers are
//! reached before their bodies. Each block is abstractly interpreted over an
//! [`AbstractFrame`]: one SSA emission per bytecode, with the frame tracking
//! which value sits in every stack and local slot.
//!
//! Join blocks are seeded with phis from the first arriving frame; later
//! edges feed the phis. A stack shape disagreement between edges is a
//! verification failure and aborts the whole compilation. A local slot
//! disagreement degrades the slot to undefined; if the join block was
//! already translated it is reset and translated again, which terminates
//! because slots only ever degrade.
//!
//! Translation is all-or-nothing: any error discards every intermediate
//! structure, and no partial graph or table escapes.

use kestrel_bytecode::{
    CompilationInput, Constant, ConstantPool, InstructionStream, MethodDescriptor, MethodRef,
    Opcode, Operands, PoolIndex, ValueType,
};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::callsite::{CallKind, CallSiteTable};
use crate::cfg::Cfg;
use crate::error::{Result, TranslateError};
use crate::fold::{self, ConstValue};
use crate::frame::AbstractFrame;
use crate::hir::{BinOp, BlockId, CmpKind, Cond, ConvKind, HirGraph, HirOp, Terminator, ValueId};
use crate::safepoint::{SafepointId, SafepointKind, SafepointTable};

/// Widest key span a sparse switch may occupy and still become a jump
/// table. Beyond this, or below the density floor, a decision-tree switch
/// is emitted instead. Tuning constants, not contracts.
const JUMP_TABLE_MAX_SPAN: i64 = 512;

/// Minimum case density (cases / span) for jump-table lowering, as a
/// numerator over 2
const JUMP_TABLE_MIN_DENSITY_NUM: i64 = 1;
const JUMP_TABLE_MIN_DENSITY_DEN: i64 = 2;

/// Everything produced for one successfully translated method
#[derive(Debug, Clone)]
pub struct CompiledMethod {
    /// The SSA graph
    pub graph: HirGraph,
    /// The control-flow graph the SSA blocks mirror
    pub cfg: Cfg,
    /// Synthetic entry block holding parameter definitions and the
    /// method-entry safepoint
    pub entry_block: BlockId,
    /// Call-site records keyed by statepoint id
    pub call_sites: CallSiteTable,
    /// Safepoint records, all committed
    pub safepoints: SafepointTable,
}

/// Translate one method into typed SSA
pub fn translate(input: &CompilationInput<'_>) -> Result<CompiledMethod> {
    Translator::new(input.method, input.pool)?.run()
}

struct Translator<'a> {
    method: &'a MethodDescriptor,
    pool: &'a ConstantPool,
    cfg: Cfg,
    graph: HirGraph,
    call_sites: CallSiteTable,
    safepoints: SafepointTable,
    entry_block: BlockId,
    entry_states: Vec<Option<AbstractFrame>>,
    /// Seeded with phis (true) or copied from a single predecessor (false)
    phi_seeded: Vec<bool>,
    translated: Vec<bool>,
    header_polls: FxHashMap<BlockId, SafepointId>,
    entry_poll: SafepointId,
    entry_frame: AbstractFrame,
}

impl<'a> Translator<'a> {
    fn new(method: &'a MethodDescriptor, pool: &'a ConstantPool) -> Result<Self> {
        let cfg = Cfg::build(method)?;
        let mut graph = HirGraph::new();
        for _ in 0..cfg.len() {
            graph.add_block();
        }
        let entry_block = graph.add_block();
        let mut safepoints = SafepointTable::new();
        let entry_poll = safepoints.alloc_pending(SafepointKind::MethodEntry, 0);
        let mut header_polls = FxHashMap::default();
        for header in cfg.loop_headers() {
            if header.rpo.is_some() {
                let id = safepoints.alloc_pending(SafepointKind::LoopHeader, header.start);
                header_polls.insert(header.id, id);
            }
        }

        let block_count = cfg.len();
        let mut translator = Self {
            method,
            pool,
            cfg,
            graph,
            call_sites: CallSiteTable::new(),
            safepoints,
            entry_block,
            entry_states: vec![None; block_count],
            phi_seeded: vec![false; block_count],
            translated: vec![false; block_count],
            header_polls,
            entry_poll,
            entry_frame: AbstractFrame::new(method.max_stack, method.max_locals),
        };
        translator.build_entry_block()?;
        Ok(translator)
    }

    /// Synthetic entry: define parameters into their local slots, poll
    /// once, and jump to the block at offset 0.
    fn build_entry_block(&mut self) -> Result<()> {
        let b = self.entry_block;
        let mut slot = 0u16;
        let define = |graph: &mut HirGraph,
                      frame: &mut AbstractFrame,
                      ty: ValueType,
                      slot: &mut u16|
         -> Result<()> {
            let id = graph.emit(b, 0, HirOp::Param(*slot), Some(ty));
            frame
                .store(*slot, id, ty)
                .map_err(|e| TranslateError::verification(0, e.to_string()))?;
            *slot += ty.slot_count();
            Ok(())
        };
        if !self.method.is_static {
            define(
                &mut self.graph,
                &mut self.entry_frame,
                ValueType::Reference,
                &mut slot,
            )?;
        }
        for &ty in &self.method.params {
            define(&mut self.graph, &mut self.entry_frame, ty, &mut slot)?;
        }
        self.graph
            .emit(b, 0, HirOp::SafepointPoll(self.entry_poll), None);
        Ok(())
    }

    fn run(mut self) -> Result<CompiledMethod> {
        debug!(method = %self.method.name, blocks = self.cfg.len(), "translating");

        let first = self
            .cfg
            .block_at(0)
            .ok_or_else(|| TranslateError::Internal("no block at offset 0".into()))?;
        self.graph.set_terminator(self.entry_block, Terminator::Goto(first));

        let mut worklist = Worklist::new();
        let entry_frame = self.entry_frame.clone();
        self.propagate(self.entry_block, first, &entry_frame, &mut worklist)?;

        while let Some(block) = worklist.pop() {
            self.translate_block(block, &mut worklist)?;
        }

        self.commit_safepoints()?;
        debug!(
            values = self.graph.value_count(),
            call_sites = self.call_sites.len(),
            safepoints = self.safepoints.len(),
            "translation complete"
        );
        Ok(CompiledMethod {
            graph: self.graph,
            cfg: self.cfg,
            entry_block: self.entry_block,
            call_sites: self.call_sites,
            safepoints: self.safepoints,
        })
    }

    /// Attach final frame snapshots to the entry and loop-header polls.
    /// Deferred to the fixed point so snapshots never capture a local that
    /// later degraded.
    fn commit_safepoints(&mut self) -> Result<()> {
        let snapshot = self.entry_frame.snapshot(0);
        self.safepoints.commit(self.entry_poll, snapshot)?;
        let headers: Vec<(BlockId, SafepointId)> =
            self.header_polls.iter().map(|(&b, &s)| (b, s)).collect();
        for (block, poll) in headers {
            let start = self.cfg.block(block).start;
            let entry = self.entry_states[block.0 as usize]
                .as_ref()
                .ok_or_else(|| {
                    TranslateError::Internal(format!("loop header {block} never reached"))
                })?;
            self.safepoints.commit(poll, entry.snapshot(start))?;
        }
        Ok(())
    }

    // ---- worklist machinery -----------------------------------------

    /// Hand `frame` across the edge `from -> to`, seeding or merging the
    /// target's entry state and scheduling (re)translation as needed.
    fn propagate(
        &mut self,
        from: BlockId,
        to: BlockId,
        frame: &AbstractFrame,
        worklist: &mut Worklist,
    ) -> Result<()> {
        let target = self.cfg.block(to);
        let start = target.start;
        if !target.handler_preds.is_empty() {
            if !target.preds.is_empty() {
                return Err(TranslateError::verification(
                    start,
                    "exception handler entry is also a branch target",
                ));
            }
            // The synthetic entry edge is not in `preds`; a handler at
            // offset 0 would otherwise merge into the method-entry frame
            // without a caught-exception definition.
            if to == self.first_block() {
                return Err(TranslateError::verification(
                    start,
                    "exception handler entry is also the method entry",
                ));
            }
        }
        let is_join =
            target.is_loop_header || target.preds.len() + usize::from(to == self.first_block()) > 1;

        let index = to.0 as usize;
        match self.entry_states[index].take() {
            None => {
                let entry = if is_join {
                    let mut entry = frame.seed_with_phis(&mut self.graph, to, start);
                    frame
                        .merge_into(&mut entry, &mut self.graph, from)
                        .map_err(|e| TranslateError::verification(start, e.to_string()))?;
                    self.phi_seeded[index] = true;
                    entry
                } else {
                    frame.clone()
                };
                self.entry_states[index] = Some(entry);
                worklist.push(to, &self.cfg);
            }
            Some(mut entry) if self.phi_seeded[index] => {
                let degraded = frame
                    .merge_into(&mut entry, &mut self.graph, from)
                    .map_err(|e| TranslateError::verification(start, e.to_string()))?;
                if degraded {
                    entry.prune_dead_phis(&mut self.graph, to);
                }
                self.entry_states[index] = Some(entry);
                if degraded && self.translated[index] {
                    trace!(block = %to, "local degraded at join, retranslating");
                    self.reset_block(to);
                    worklist.push(to, &self.cfg);
                } else if !self.translated[index] {
                    worklist.push(to, &self.cfg);
                }
            }
            Some(entry) => {
                // Copy-seeded single-predecessor block; a retranslated
                // predecessor may hand over a different frame.
                if entry != *frame {
                    self.entry_states[index] = Some(frame.clone());
                    if self.translated[index] {
                        self.reset_block(to);
                    }
                    worklist.push(to, &self.cfg);
                } else {
                    self.entry_states[index] = Some(entry);
                    if !self.translated[index] {
                        worklist.push(to, &self.cfg);
                    }
                }
            }
        }
        Ok(())
    }

    /// Hand the handler-visible locals across an exceptional edge.
    fn propagate_to_handler(
        &mut self,
        from: BlockId,
        handler: BlockId,
        locals: &AbstractFrame,
        worklist: &mut Worklist,
    ) -> Result<()> {
        let start = self.cfg.block(handler).start;
        let index = handler.0 as usize;
        match self.entry_states[index].take() {
            None => {
                let caught = self.graph.emit(
                    handler,
                    start,
                    HirOp::CaughtException,
                    Some(ValueType::Reference),
                );
                let mut entry = locals.seed_handler_entry(&mut self.graph, handler, start, caught);
                locals
                    .merge_locals_into(&mut entry, &mut self.graph, from)
                    .map_err(|e| TranslateError::verification(start, e.to_string()))?;
                self.entry_states[index] = Some(entry);
                self.phi_seeded[index] = true;
                worklist.push(handler, &self.cfg);
            }
            Some(mut entry) => {
                let degraded = locals
                    .merge_locals_into(&mut entry, &mut self.graph, from)
                    .map_err(|e| TranslateError::verification(start, e.to_string()))?;
                if degraded {
                    entry.prune_dead_phis(&mut self.graph, handler);
                }
                self.entry_states[index] = Some(entry);
                if degraded && self.translated[index] {
                    self.reset_block(handler);
                    worklist.push(handler, &self.cfg);
                } else if !self.translated[index] {
                    worklist.push(handler, &self.cfg);
                }
            }
        }
        Ok(())
    }

    fn first_block(&self) -> BlockId {
        // Offset 0 always starts a block.
        BlockId(0)
    }

    /// Clear a block's emitted instructions ahead of retranslation. Phis
    /// and the caught-exception definition survive; successors reference
    /// them.
    fn reset_block(&mut self, block: BlockId) {
        let keep: Vec<ValueId> = self
            .graph
            .block(block)
            .insts
            .iter()
            .copied()
            .filter(|&v| matches!(self.graph.value(v).op, HirOp::CaughtException))
            .collect();
        let blk = self.graph.block_mut(block);
        blk.insts = keep;
        blk.terminator = None;
        self.translated[block.0 as usize] = false;
    }

    // ---- per-block interpretation -----------------------------------

    fn translate_block(&mut self, block: BlockId, worklist: &mut Worklist) -> Result<()> {
        let index = block.0 as usize;
        if self.translated[index] {
            return Ok(());
        }
        let mut frame = self.entry_states[index]
            .clone()
            .ok_or_else(|| TranslateError::Internal(format!("block {block} has no entry state")))?;
        let (start, end, has_handlers) = {
            let b = self.cfg.block(block);
            (b.start, b.end, !b.handler_succs.is_empty())
        };
        trace!(block = %block, start, end, "translating block");

        if let Some(&poll) = self.header_polls.get(&block) {
            self.graph.emit(block, start, HirOp::SafepointPoll(poll), None);
        }

        // Locals an exception handler may observe: the meet over every
        // point in the block the exception could be raised at.
        let mut handler_meet = has_handlers.then(|| frame.clone());

        let mut stream = InstructionStream::new(&self.method.code);
        stream.reset_to(start);
        let mut terminator: Option<Terminator> = None;
        while stream.offset() < end {
            let op = stream.next_op()?.ok_or_else(|| {
                TranslateError::Internal(format!("stream ended inside block {block}"))
            })?;
            terminator = self.interpret(block, &mut frame, &op)?;
            if let Some(meet) = handler_meet.as_mut() {
                meet.meet_locals(&frame);
            }
            if terminator.is_some() {
                break;
            }
        }

        let terminator = match terminator {
            Some(t) => t,
            None => {
                let next = self.cfg.block_at(end).ok_or_else(|| {
                    TranslateError::verification(end, "control falls off the end of the code")
                })?;
                Terminator::Goto(next)
            }
        };

        let succs = terminator.successors();
        self.graph.set_terminator(block, terminator);
        self.translated[index] = true;

        for succ in succs {
            self.propagate(block, succ, &frame, worklist)?;
        }
        if let Some(meet) = handler_meet {
            let handlers = self.cfg.block(block).handler_succs.clone();
            for handler in handlers {
                self.propagate_to_handler(block, handler, &meet, worklist)?;
            }
        }
        Ok(())
    }

    /// Lower one instruction. Returns the terminator when the instruction
    /// ends the block.
    fn interpret(
        &mut self,
        block: BlockId,
        frame: &mut AbstractFrame,
        op: &kestrel_bytecode::DecodedOp,
    ) -> Result<Option<Terminator>> {
        use Opcode::*;
        use ValueType::*;
        let bci = op.offset;

        macro_rules! frm {
            ($e:expr) => {
                $e.map_err(|e| TranslateError::verification(bci, e.to_string()))?
            };
        }

        match op.opcode {
            Nop => {}

            // ---- constants ----
            AconstNull => {
                let v = self.graph.emit(block, bci, HirOp::ConstNull, Some(Reference));
                frm!(frame.push(v, Reference));
            }
            IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5 => {
                let n = op.opcode.to_byte() as i32 - Iconst0.to_byte() as i32;
                let v = self.graph.emit(block, bci, HirOp::ConstInt(n), Some(Int));
                frm!(frame.push(v, Int));
            }
            Lconst0 | Lconst1 => {
                let n = i64::from(op.opcode.to_byte() - Lconst0.to_byte());
                let v = self.graph.emit(block, bci, HirOp::ConstLong(n), Some(Long));
                frm!(frame.push(v, Long));
            }
            Fconst0 | Fconst1 | Fconst2 => {
                let n = f32::from(op.opcode.to_byte() - Fconst0.to_byte());
                let v = self.graph.emit(block, bci, HirOp::ConstFloat(n), Some(Float));
                frm!(frame.push(v, Float));
            }
            Dconst0 | Dconst1 => {
                let n = f64::from(op.opcode.to_byte() - Dconst0.to_byte());
                let v = self.graph.emit(block, bci, HirOp::ConstDouble(n), Some(Double));
                frm!(frame.push(v, Double));
            }
            Bipush | Sipush => {
                let n = match op.operands {
                    Operands::Imm8(n) => i32::from(n),
                    Operands::Imm16(n) => i32::from(n),
                    _ => return Err(self.bad_operands(bci)),
                };
                let v = self.graph.emit(block, bci, HirOp::ConstInt(n), Some(Int));
                frm!(frame.push(v, Int));
            }
            Ldc | LdcW | Ldc2W => {
                let index = self.constant_operand(op, bci)?;
                self.load_constant(block, frame, bci, index, op.opcode == Ldc2W)?;
            }

            // ---- loads ----
            Iload | Lload | Fload | Dload | Aload => {
                let ty = load_store_type(op.opcode);
                let local = self.local_operand(op, bci)?;
                let v = frm!(frame.load(local, ty));
                frm!(frame.push(v, ty));
            }
            Iload0 | Iload1 | Iload2 | Iload3 | Lload0 | Lload1 | Lload2 | Lload3 | Fload0
            | Fload1 | Fload2 | Fload3 | Dload0 | Dload1 | Dload2 | Dload3 | Aload0 | Aload1
            | Aload2 | Aload3 => {
                let (ty, local) = short_load(op.opcode);
                let v = frm!(frame.load(local, ty));
                frm!(frame.push(v, ty));
            }

            // ---- stores ----
            Istore | Lstore | Fstore | Dstore | Astore => {
                let ty = load_store_type(op.opcode);
                let local = self.local_operand(op, bci)?;
                let v = frm!(frame.pop(ty));
                frm!(frame.store(local, v, ty));
            }
            Istore0 | Istore1 | Istore2 | Istore3 | Lstore0 | Lstore1 | Lstore2 | Lstore3
            | Fstore0 | Fstore1 | Fstore2 | Fstore3 | Dstore0 | Dstore1 | Dstore2 | Dstore3
            | Astore0 | Astore1 | Astore2 | Astore3 => {
                let (ty, local) = short_store(op.opcode);
                let v = frm!(frame.pop(ty));
                frm!(frame.store(local, v, ty));
            }

            // ---- arrays ----
            Iaload | Laload | Faload | Daload | Aaload | Baload | Caload | Saload => {
                let elem = array_elem_type(op.opcode);
                let index = frm!(frame.pop(Int));
                let array = frm!(frame.pop(Reference));
                self.graph.emit(block, bci, HirOp::NullCheck(array), None);
                let v = self
                    .graph
                    .emit(block, bci, HirOp::ArrayLoad { array, index, elem }, Some(elem));
                frm!(frame.push(v, elem));
            }
            Iastore | Lastore | Fastore | Dastore | Aastore | Bastore | Castore | Sastore => {
                let elem = array_elem_type(op.opcode);
                let value = frm!(frame.pop(elem));
                let index = frm!(frame.pop(Int));
                let array = frm!(frame.pop(Reference));
                self.graph.emit(block, bci, HirOp::NullCheck(array), None);
                self.graph.emit(
                    block,
                    bci,
                    HirOp::ArrayStore {
                        array,
                        index,
                        value,
                        elem,
                    },
                    None,
                );
            }
            Arraylength => {
                let array = frm!(frame.pop(Reference));
                self.graph.emit(block, bci, HirOp::NullCheck(array), None);
                let v = self.graph.emit(block, bci, HirOp::ArrayLength(array), Some(Int));
                frm!(frame.push(v, Int));
            }

            // ---- stack shuffles ----
            Pop => frm!(frame.shuffle_pop()),
            Pop2 => frm!(frame.shuffle_pop2()),
            Dup => frm!(frame.shuffle_dup()),
            DupX1 => frm!(frame.shuffle_dup_x1()),
            DupX2 => frm!(frame.shuffle_dup_x2()),
            Dup2 => frm!(frame.shuffle_dup2()),
            Dup2X1 => frm!(frame.shuffle_dup2_x1()),
            Dup2X2 => frm!(frame.shuffle_dup2_x2()),
            Swap => frm!(frame.shuffle_swap()),

            // ---- arithmetic ----
            Iadd | Isub | Imul | Iand | Ior | Ixor => {
                self.binary(block, frame, bci, binop_of(op.opcode), Int, Int)?;
            }
            Ladd | Lsub | Lmul | Land | Lor | Lxor => {
                self.binary(block, frame, bci, binop_of(op.opcode), Long, Long)?;
            }
            Fadd | Fsub | Fmul | Fdiv | Frem => {
                self.binary(block, frame, bci, binop_of(op.opcode), Float, Float)?;
            }
            Dadd | Dsub | Dmul | Ddiv | Drem => {
                self.binary(block, frame, bci, binop_of(op.opcode), Double, Double)?;
            }
            Idiv | Irem => {
                self.int_div(block, frame, bci, binop_of(op.opcode), Int)?;
            }
            Ldiv | Lrem => {
                self.int_div(block, frame, bci, binop_of(op.opcode), Long)?;
            }
            Ishl | Ishr | Iushr => {
                self.binary(block, frame, bci, binop_of(op.opcode), Int, Int)?;
            }
            Lshl | Lshr | Lushr => {
                // Shift count is an int even for long shifts.
                let count = frm!(frame.pop(Int));
                let value = frm!(frame.pop(Long));
                let v = self.emit_binary(block, bci, binop_of(op.opcode), value, count, Long);
                frm!(frame.push(v, Long));
            }
            Ineg | Lneg | Fneg | Dneg => {
                let ty = match op.opcode {
                    Ineg => Int,
                    Lneg => Long,
                    Fneg => Float,
                    _ => Double,
                };
                let a = frm!(frame.pop(ty));
                let v = self.emit_neg(block, bci, a, ty);
                frm!(frame.push(v, ty));
            }
            Iinc => {
                let (local, delta) = match op.operands {
                    Operands::Iinc { local, delta } => (local, delta),
                    _ => return Err(self.bad_operands(bci)),
                };
                let old = frm!(frame.load(local, Int));
                let delta = self
                    .graph
                    .emit(block, bci, HirOp::ConstInt(i32::from(delta)), Some(Int));
                let v = self.emit_binary(block, bci, BinOp::Add, old, delta, Int);
                frm!(frame.store(local, v, Int));
            }

            // ---- conversions ----
            I2l | I2f | I2d | L2i | L2f | L2d | F2i | F2l | F2d | D2i | D2l | D2f | I2b | I2c
            | I2s => {
                let kind = conv_of(op.opcode);
                let from = conv_source_type(op.opcode);
                let a = frm!(frame.pop(from));
                let to = kind.result_type();
                let v = self.emit_convert(block, bci, kind, a, to);
                frm!(frame.push(v, to));
            }

            // ---- comparisons ----
            Lcmp | Fcmpl | Fcmpg | Dcmpl | Dcmpg => {
                let (kind, ty) = match op.opcode {
                    Lcmp => (CmpKind::Lcmp, Long),
                    Fcmpl => (CmpKind::Fcmpl, Float),
                    Fcmpg => (CmpKind::Fcmpg, Float),
                    Dcmpl => (CmpKind::Dcmpl, Double),
                    _ => (CmpKind::Dcmpg, Double),
                };
                let rhs = frm!(frame.pop(ty));
                let lhs = frm!(frame.pop(ty));
                let v = self.emit_compare(block, bci, kind, lhs, rhs);
                frm!(frame.push(v, Int));
            }

            // ---- conditional branches ----
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle => {
                let lhs = frm!(frame.pop(Int));
                let rhs = self.graph.emit(block, bci, HirOp::ConstInt(0), Some(Int));
                return self.branch(op, cond_of(op.opcode), lhs, rhs);
            }
            IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge | IfIcmpgt | IfIcmple => {
                let rhs = frm!(frame.pop(Int));
                let lhs = frm!(frame.pop(Int));
                return self.branch(op, cond_of(op.opcode), lhs, rhs);
            }
            IfAcmpeq | IfAcmpne => {
                let rhs = frm!(frame.pop(Reference));
                let lhs = frm!(frame.pop(Reference));
                return self.branch(op, cond_of(op.opcode), lhs, rhs);
            }
            Ifnull | Ifnonnull => {
                let lhs = frm!(frame.pop(Reference));
                let rhs = self.graph.emit(block, bci, HirOp::ConstNull, Some(Reference));
                return self.branch(op, cond_of(op.opcode), lhs, rhs);
            }

            // ---- unconditional control ----
            Goto | GotoW => {
                let target = match op.operands {
                    Operands::Branch(t) => t,
                    _ => return Err(self.bad_operands(bci)),
                };
                return Ok(Some(Terminator::Goto(self.block_of(target)?)));
            }
            Tableswitch => {
                let key = frm!(frame.pop(Int));
                if let Operands::TableSwitch {
                    default,
                    low,
                    targets,
                    ..
                } = &op.operands
                {
                    let blocks: Vec<BlockId> = targets
                        .iter()
                        .map(|&t| self.block_of(t))
                        .collect::<Result<_>>()?;
                    return Ok(Some(Terminator::JumpTable {
                        index: key,
                        low: *low,
                        targets: blocks,
                        default: self.block_of(*default)?,
                    }));
                }
                return Err(self.bad_operands(bci));
            }
            Lookupswitch => {
                let key = frm!(frame.pop(Int));
                if let Operands::LookupSwitch { default, pairs } = &op.operands {
                    return Ok(Some(self.lower_sparse_switch(key, *default, pairs)?));
                }
                return Err(self.bad_operands(bci));
            }
            Ireturn | Lreturn | Freturn | Dreturn | Areturn => {
                let ty = match op.opcode {
                    Ireturn => Int,
                    Lreturn => Long,
                    Freturn => Float,
                    Dreturn => Double,
                    _ => Reference,
                };
                if self.method.ret != Some(ty) {
                    return Err(TranslateError::verification(
                        bci,
                        format!("return of {ty} from a method returning {:?}", self.method.ret),
                    ));
                }
                let v = frm!(frame.pop(ty));
                return Ok(Some(Terminator::Return(Some(v))));
            }
            Return => {
                if self.method.ret.is_some() {
                    return Err(TranslateError::verification(
                        bci,
                        "void return from a method with a return type",
                    ));
                }
                return Ok(Some(Terminator::Return(None)));
            }
            Athrow => {
                let exc = frm!(frame.pop(Reference));
                self.graph.emit(block, bci, HirOp::NullCheck(exc), None);
                return Ok(Some(Terminator::Throw(exc)));
            }

            // ---- fields ----
            Getstatic => {
                let field = self.constant_operand(op, bci)?;
                let ty = self.pool.field_ref(field)?.field_type;
                let v = self.graph.emit(block, bci, HirOp::GetStatic(field), Some(ty));
                frm!(frame.push(v, ty));
            }
            Putstatic => {
                let field = self.constant_operand(op, bci)?;
                let ty = self.pool.field_ref(field)?.field_type;
                let value = frm!(frame.pop(ty));
                self.graph
                    .emit(block, bci, HirOp::PutStatic { field, value }, None);
            }
            Getfield => {
                let field = self.constant_operand(op, bci)?;
                let ty = self.pool.field_ref(field)?.field_type;
                let object = frm!(frame.pop(Reference));
                self.graph.emit(block, bci, HirOp::NullCheck(object), None);
                let v = self
                    .graph
                    .emit(block, bci, HirOp::GetField { object, field }, Some(ty));
                frm!(frame.push(v, ty));
            }
            Putfield => {
                let field = self.constant_operand(op, bci)?;
                let ty = self.pool.field_ref(field)?.field_type;
                let value = frm!(frame.pop(ty));
                let object = frm!(frame.pop(Reference));
                self.graph.emit(block, bci, HirOp::NullCheck(object), None);
                self.graph.emit(
                    block,
                    bci,
                    HirOp::PutField {
                        object,
                        field,
                        value,
                    },
                    None,
                );
            }

            // ---- calls ----
            Invokestatic => {
                let target = self.constant_operand(op, bci)?;
                self.invoke(block, frame, bci, target, CallKind::Static, false)?;
            }
            Invokevirtual | Invokeinterface => {
                let target = self.constant_operand(op, bci)?;
                self.invoke(block, frame, bci, target, CallKind::Virtual, true)?;
            }
            Invokespecial => {
                let target = self.constant_operand(op, bci)?;
                self.invoke(block, frame, bci, target, CallKind::Special, true)?;
            }

            // ---- allocation and type tests ----
            New => {
                let class = self.constant_operand(op, bci)?;
                let v = self.graph.emit(block, bci, HirOp::New(class), Some(Reference));
                frm!(frame.push(v, Reference));
            }
            Newarray => {
                let elem_tag = match op.operands {
                    Operands::ArrayType(t) => t,
                    _ => return Err(self.bad_operands(bci)),
                };
                let length = frm!(frame.pop(Int));
                let v = self
                    .graph
                    .emit(block, bci, HirOp::NewArray { elem_tag, length }, Some(Reference));
                frm!(frame.push(v, Reference));
            }
            Anewarray => {
                let class = self.constant_operand(op, bci)?;
                let length = frm!(frame.pop(Int));
                let v = self
                    .graph
                    .emit(block, bci, HirOp::NewRefArray { class, length }, Some(Reference));
                frm!(frame.push(v, Reference));
            }
            Instanceof => {
                let class = self.constant_operand(op, bci)?;
                let object = frm!(frame.pop(Reference));
                let v = self
                    .graph
                    .emit(block, bci, HirOp::InstanceOf { object, class }, Some(Int));
                frm!(frame.push(v, Int));
            }
            Checkcast => {
                let class = self.constant_operand(op, bci)?;
                let object = frm!(frame.pop(Reference));
                let v = self
                    .graph
                    .emit(block, bci, HirOp::CheckCast { object, class }, Some(Reference));
                frm!(frame.push(v, Reference));
            }

            // ---- recognized but untranslated ----
            Jsr | JsrW | Ret | Invokedynamic | Monitorenter | Monitorexit | Multianewarray => {
                return Err(TranslateError::Unsupported(op.opcode.name()));
            }
            // The decoder folds `wide` into its inner instruction.
            Wide => {
                return Err(TranslateError::Internal("undecoded wide prefix".into()));
            }
        }
        Ok(None)
    }

    // ---- emission helpers -------------------------------------------

    /// Constant value of an already-emitted op, for folding
    fn const_of(&self, id: ValueId) -> Option<ConstValue> {
        match self.graph.value(id).op {
            HirOp::ConstInt(n) => Some(ConstValue::Int(n)),
            HirOp::ConstLong(n) => Some(ConstValue::Long(n)),
            HirOp::ConstFloat(n) => Some(ConstValue::Float(n)),
            HirOp::ConstDouble(n) => Some(ConstValue::Double(n)),
            _ => None,
        }
    }

    fn emit_const(&mut self, block: BlockId, bci: u32, value: ConstValue) -> ValueId {
        let (op, ty) = match value {
            ConstValue::Int(n) => (HirOp::ConstInt(n), ValueType::Int),
            ConstValue::Long(n) => (HirOp::ConstLong(n), ValueType::Long),
            ConstValue::Float(n) => (HirOp::ConstFloat(n), ValueType::Float),
            ConstValue::Double(n) => (HirOp::ConstDouble(n), ValueType::Double),
        };
        self.graph.emit(block, bci, op, Some(ty))
    }

    fn emit_binary(
        &mut self,
        block: BlockId,
        bci: u32,
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
        ty: ValueType,
    ) -> ValueId {
        if let (Some(a), Some(b)) = (self.const_of(lhs), self.const_of(rhs)) {
            if let Some(folded) = fold::fold_binary(op, a, b) {
                return self.emit_const(block, bci, folded);
            }
        }
        self.graph
            .emit(block, bci, HirOp::Binary { op, lhs, rhs }, Some(ty))
    }

    fn emit_neg(&mut self, block: BlockId, bci: u32, a: ValueId, ty: ValueType) -> ValueId {
        if let Some(c) = self.const_of(a) {
            let folded = fold::fold_neg(c);
            return self.emit_const(block, bci, folded);
        }
        self.graph.emit(block, bci, HirOp::Neg(a), Some(ty))
    }

    fn emit_convert(
        &mut self,
        block: BlockId,
        bci: u32,
        kind: ConvKind,
        a: ValueId,
        ty: ValueType,
    ) -> ValueId {
        if let Some(c) = self.const_of(a) {
            if let Some(folded) = fold::fold_convert(kind, c) {
                return self.emit_const(block, bci, folded);
            }
        }
        self.graph
            .emit(block, bci, HirOp::Convert { kind, value: a }, Some(ty))
    }

    fn emit_compare(
        &mut self,
        block: BlockId,
        bci: u32,
        kind: CmpKind,
        lhs: ValueId,
        rhs: ValueId,
    ) -> ValueId {
        if let (Some(a), Some(b)) = (self.const_of(lhs), self.const_of(rhs)) {
            if let Some(folded) = fold::fold_compare(kind, a, b) {
                return self.emit_const(block, bci, ConstValue::Int(folded));
            }
        }
        self.graph
            .emit(block, bci, HirOp::Compare { kind, lhs, rhs }, Some(ValueType::Int))
    }

    fn binary(
        &mut self,
        block: BlockId,
        frame: &mut AbstractFrame,
        bci: u32,
        op: BinOp,
        ty: ValueType,
        out: ValueType,
    ) -> Result<()> {
        let rhs = frame
            .pop(ty)
            .map_err(|e| TranslateError::verification(bci, e.to_string()))?;
        let lhs = frame
            .pop(ty)
            .map_err(|e| TranslateError::verification(bci, e.to_string()))?;
        let v = self.emit_binary(block, bci, op, lhs, rhs, out);
        frame
            .push(v, out)
            .map_err(|e| TranslateError::verification(bci, e.to_string()))
    }

    /// Integer division and remainder: a zero check precedes the divide so
    /// the runtime fault survives unless the divisor folds to a nonzero
    /// constant.
    fn int_div(
        &mut self,
        block: BlockId,
        frame: &mut AbstractFrame,
        bci: u32,
        op: BinOp,
        ty: ValueType,
    ) -> Result<()> {
        let rhs = frame
            .pop(ty)
            .map_err(|e| TranslateError::verification(bci, e.to_string()))?;
        let lhs = frame
            .pop(ty)
            .map_err(|e| TranslateError::verification(bci, e.to_string()))?;
        let v = if let (Some(a), Some(b)) = (self.const_of(lhs), self.const_of(rhs)) {
            match fold::fold_binary(op, a, b) {
                Some(folded) => self.emit_const(block, bci, folded),
                None => {
                    // Constant zero divisor: keep the trap.
                    self.graph.emit(block, bci, HirOp::ZeroCheck(rhs), None);
                    self.graph
                        .emit(block, bci, HirOp::Binary { op, lhs, rhs }, Some(ty))
                }
            }
        } else {
            self.graph.emit(block, bci, HirOp::ZeroCheck(rhs), None);
            self.graph
                .emit(block, bci, HirOp::Binary { op, lhs, rhs }, Some(ty))
        };
        frame
            .push(v, ty)
            .map_err(|e| TranslateError::verification(bci, e.to_string()))
    }

    fn branch(
        &mut self,
        op: &kestrel_bytecode::DecodedOp,
        cond: Cond,
        lhs: ValueId,
        rhs: ValueId,
    ) -> Result<Option<Terminator>> {
        let target = match op.operands {
            Operands::Branch(t) => t,
            _ => return Err(self.bad_operands(op.offset)),
        };
        let then_block = self.block_of(target)?;
        let fall = self.end_of_block_containing(op.offset)?;
        let else_block = self.block_of(fall)?;
        Ok(Some(Terminator::If {
            cond,
            lhs,
            rhs,
            then_block,
            else_block,
        }))
    }

    /// Sparse switch lowering: dense-enough, narrow-enough case sets get a
    /// jump table with default-filled holes; the rest stay a sorted case
    /// list for decision-tree lowering.
    fn lower_sparse_switch(
        &mut self,
        key: ValueId,
        default: u32,
        pairs: &[(i32, u32)],
    ) -> Result<Terminator> {
        let default_block = self.block_of(default)?;
        if pairs.is_empty() {
            return Ok(Terminator::Goto(default_block));
        }
        let low = pairs[0].0;
        let high = pairs[pairs.len() - 1].0;
        let span = i64::from(high) - i64::from(low) + 1;
        let dense = span <= JUMP_TABLE_MAX_SPAN
            && pairs.len() as i64 * JUMP_TABLE_MIN_DENSITY_DEN
                >= span * JUMP_TABLE_MIN_DENSITY_NUM;
        if dense {
            let mut targets = vec![default_block; span as usize];
            for &(case, offset) in pairs {
                targets[(i64::from(case) - i64::from(low)) as usize] = self.block_of(offset)?;
            }
            Ok(Terminator::JumpTable {
                index: key,
                low,
                targets,
                default: default_block,
            })
        } else {
            let cases = pairs
                .iter()
                .map(|&(case, offset)| Ok((case, self.block_of(offset)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Terminator::Switch {
                index: key,
                cases,
                default: default_block,
            })
        }
    }

    fn invoke(
        &mut self,
        block: BlockId,
        frame: &mut AbstractFrame,
        bci: u32,
        target: PoolIndex,
        kind: CallKind,
        has_receiver: bool,
    ) -> Result<()> {
        let MethodRef {
            params,
            ret,
            is_native,
            ..
        } = self.pool.method_ref(target)?.clone();
        // A natively-bound target keeps its dispatch form on the stack but
        // crosses the boundary, so the site is recorded as a native call.
        let kind = if is_native { CallKind::Native } else { kind };

        let mut args: SmallVec<[ValueId; 4]> = SmallVec::new();
        for &ty in params.iter().rev() {
            let v = frame
                .pop(ty)
                .map_err(|e| TranslateError::verification(bci, e.to_string()))?;
            args.push(v);
        }
        let mut sig: Vec<ValueType> = Vec::with_capacity(params.len() + 1);
        if has_receiver {
            let recv = frame
                .pop(ValueType::Reference)
                .map_err(|e| TranslateError::verification(bci, e.to_string()))?;
            self.graph.emit(block, bci, HirOp::NullCheck(recv), None);
            args.push(recv);
            sig.push(ValueType::Reference);
        }
        args.reverse();
        sig.extend(params.iter().copied());

        let statepoint = self.call_sites.alloc(kind, target, bci, &sig);
        let v = self.graph.emit(
            block,
            bci,
            HirOp::Call {
                kind,
                target,
                args,
                statepoint,
            },
            ret,
        );
        if let Some(ty) = ret {
            frame
                .push(v, ty)
                .map_err(|e| TranslateError::verification(bci, e.to_string()))?;
        }
        Ok(())
    }

    fn load_constant(
        &mut self,
        block: BlockId,
        frame: &mut AbstractFrame,
        bci: u32,
        index: PoolIndex,
        wide_slot: bool,
    ) -> Result<()> {
        let constant = self.pool.get(index)?;
        let (op, ty) = match *constant {
            Constant::Integer(n) => (HirOp::ConstInt(n), ValueType::Int),
            Constant::Long(n) => (HirOp::ConstLong(n), ValueType::Long),
            Constant::Float(n) => (HirOp::ConstFloat(n), ValueType::Float),
            Constant::Double(n) => (HirOp::ConstDouble(n), ValueType::Double),
            Constant::Utf8(_) | Constant::Class { .. } => {
                (HirOp::ConstPool(index), ValueType::Reference)
            }
            Constant::Field(_) | Constant::Method(_) => {
                return Err(TranslateError::verification(
                    bci,
                    "constant load of a symbolic pool entry",
                ));
            }
        };
        if ty.is_category2() != wide_slot {
            return Err(TranslateError::verification(
                bci,
                "constant width does not match load form",
            ));
        }
        let v = self.graph.emit(block, bci, op, Some(ty));
        frame
            .push(v, ty)
            .map_err(|e| TranslateError::verification(bci, e.to_string()))
    }

    // ---- small lookups ----------------------------------------------

    fn block_of(&self, offset: u32) -> Result<BlockId> {
        self.cfg
            .block_at(offset)
            .ok_or_else(|| TranslateError::Internal(format!("no block starts at offset {offset}")))
    }

    /// Fall-through offset of the block containing `offset`
    fn end_of_block_containing(&self, offset: u32) -> Result<u32> {
        self.cfg
            .iter()
            .find(|b| b.start <= offset && offset < b.end)
            .map(|b| b.end)
            .ok_or_else(|| TranslateError::Internal(format!("offset {offset} outside all blocks")))
    }

    fn constant_operand(
        &self,
        op: &kestrel_bytecode::DecodedOp,
        bci: u32,
    ) -> Result<PoolIndex> {
        match op.operands {
            Operands::Constant(index) => Ok(index),
            _ => Err(self.bad_operands(bci)),
        }
    }

    fn local_operand(&self, op: &kestrel_bytecode::DecodedOp, bci: u32) -> Result<u16> {
        match op.operands {
            Operands::Local(index) => Ok(index),
            _ => Err(self.bad_operands(bci)),
        }
    }

    fn bad_operands(&self, bci: u32) -> TranslateError {
        TranslateError::Internal(format!("operand shape mismatch at offset {bci}"))
    }
}

/// Worklist ordered by reverse post order, deduplicated
struct Worklist {
    heap: std::collections::BinaryHeap<std::cmp::Reverse<(u32, BlockId)>>,
    queued: FxHashSet<BlockId>,
}

impl Worklist {
    fn new() -> Self {
        Self {
            heap: std::collections::BinaryHeap::new(),
            queued: FxHashSet::default(),
        }
    }

    fn push(&mut self, block: BlockId, cfg: &Cfg) {
        if let Some(rpo) = cfg.block(block).rpo {
            if self.queued.insert(block) {
                self.heap.push(std::cmp::Reverse((rpo, block)));
            }
        }
    }

    fn pop(&mut self) -> Option<BlockId> {
        let std::cmp::Reverse((_, block)) = self.heap.pop()?;
        self.queued.remove(&block);
        Some(block)
    }
}

// ---- opcode classification tables -----------------------------------

fn load_store_type(op: Opcode) -> ValueType {
    match op {
        Opcode::Iload | Opcode::Istore => ValueType::Int,
        Opcode::Lload | Opcode::Lstore => ValueType::Long,
        Opcode::Fload | Opcode::Fstore => ValueType::Float,
        Opcode::Dload | Opcode::Dstore => ValueType::Double,
        _ => ValueType::Reference,
    }
}

fn short_load(op: Opcode) -> (ValueType, u16) {
    let delta = op.to_byte() - Opcode::Iload0.to_byte();
    let ty = match delta / 4 {
        0 => ValueType::Int,
        1 => ValueType::Long,
        2 => ValueType::Float,
        3 => ValueType::Double,
        _ => ValueType::Reference,
    };
    (ty, u16::from(delta % 4))
}

fn short_store(op: Opcode) -> (ValueType, u16) {
    let delta = op.to_byte() - Opcode::Istore0.to_byte();
    let ty = match delta / 4 {
        0 => ValueType::Int,
        1 => ValueType::Long,
        2 => ValueType::Float,
        3 => ValueType::Double,
        _ => ValueType::Reference,
    };
    (ty, u16::from(delta % 4))
}

fn array_elem_type(op: Opcode) -> ValueType {
    match op {
        Opcode::Iaload | Opcode::Iastore | Opcode::Baload | Opcode::Bastore | Opcode::Caload
        | Opcode::Castore | Opcode::Saload | Opcode::Sastore => ValueType::Int,
        Opcode::Laload | Opcode::Lastore => ValueType::Long,
        Opcode::Faload | Opcode::Fastore => ValueType::Float,
        Opcode::Daload | Opcode::Dastore => ValueType::Double,
        _ => ValueType::Reference,
    }
}

fn binop_of(op: Opcode) -> BinOp {
    match op {
        Opcode::Iadd | Opcode::Ladd | Opcode::Fadd | Opcode::Dadd => BinOp::Add,
        Opcode::Isub | Opcode::Lsub | Opcode::Fsub | Opcode::Dsub => BinOp::Sub,
        Opcode::Imul | Opcode::Lmul | Opcode::Fmul | Opcode::Dmul => BinOp::Mul,
        Opcode::Idiv | Opcode::Ldiv | Opcode::Fdiv | Opcode::Ddiv => BinOp::Div,
        Opcode::Irem | Opcode::Lrem | Opcode::Frem | Opcode::Drem => BinOp::Rem,
        Opcode::Ishl | Opcode::Lshl => BinOp::Shl,
        Opcode::Ishr | Opcode::Lshr => BinOp::Shr,
        Opcode::Iushr | Opcode::Lushr => BinOp::Ushr,
        Opcode::Iand | Opcode::Land => BinOp::And,
        Opcode::Ior | Opcode::Lor => BinOp::Or,
        _ => BinOp::Xor,
    }
}

fn conv_of(op: Opcode) -> ConvKind {
    match op {
        Opcode::I2l => ConvKind::I2L,
        Opcode::I2f => ConvKind::I2F,
        Opcode::I2d => ConvKind::I2D,
        Opcode::L2i => ConvKind::L2I,
        Opcode::L2f => ConvKind::L2F,
        Opcode::L2d => ConvKind::L2D,
        Opcode::F2i => ConvKind::F2I,
        Opcode::F2l => ConvKind::F2L,
        Opcode::F2d => ConvKind::F2D,
        Opcode::D2i => ConvKind::D2I,
        Opcode::D2l => ConvKind::D2L,
        Opcode::D2f => ConvKind::D2F,
        Opcode::I2b => ConvKind::I2B,
        Opcode::I2c => ConvKind::I2C,
        _ => ConvKind::I2S,
    }
}

fn conv_source_type(op: Opcode) -> ValueType {
    match op {
        Opcode::I2l | Opcode::I2f | Opcode::I2d | Opcode::I2b | Opcode::I2c | Opcode::I2s => {
            ValueType::Int
        }
        Opcode::L2i | Opcode::L2f | Opcode::L2d => ValueType::Long,
        Opcode::F2i | Opcode::F2l | Opcode::F2d => ValueType::Float,
        _ => ValueType::Double,
    }
}

fn cond_of(op: Opcode) -> Cond {
    match op {
        Opcode::Ifeq | Opcode::IfIcmpeq | Opcode::IfAcmpeq | Opcode::Ifnull => Cond::Eq,
        Opcode::Ifne | Opcode::IfIcmpne | Opcode::IfAcmpne | Opcode::Ifnonnull => Cond::Ne,
        Opcode::Iflt | Opcode::IfIcmplt => Cond::Lt,
        Opcode::Ifge | Opcode::IfIcmpge => Cond::Ge,
        Opcode::Ifgt | Opcode::IfIcmpgt => Cond::Gt,
        _ => Cond::Le,
    }
}
