//! Control-flow graph construction
//!
//! Two passes over the decoded stream. The first collects block leaders:
//! offset 0, every branch and switch target, the offset after every
//! control-transfer instruction, and the boundaries of every exception
//! handler range. The second carves the code into half-open offset ranges
//! and wires successor and predecessor edges, including the implicit edge
//! from each covered block to its handler's block.
//!
//! Loop headers are found with an explicit iterative depth-first walk over
//! the finished edge set; recursion depth must not depend on input shape.
//! The same walk assigns reverse-post-order numbers, which is the order the
//! translator visits blocks in.

use kestrel_bytecode::{InstructionStream, MethodDescriptor};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{Result, TranslateError};
use crate::hir::BlockId;

/// One basic block: a half-open bytecode range plus its edges
#[derive(Debug, Clone)]
pub struct CfgBlock {
    /// Block id; indexes into [`Cfg::blocks`]
    pub id: BlockId,
    /// First bytecode offset (inclusive)
    pub start: u32,
    /// End of the range (exclusive)
    pub end: u32,
    /// Normal successors
    pub succs: Vec<BlockId>,
    /// Normal predecessors
    pub preds: Vec<BlockId>,
    /// Handler blocks reachable if any covered instruction throws
    pub handler_succs: Vec<BlockId>,
    /// Blocks this handler covers (empty for non-handler blocks)
    pub handler_preds: Vec<BlockId>,
    /// Whether some edge in the graph targets this block from inside
    /// its own natural loop
    pub is_loop_header: bool,
    /// Reverse-post-order number; `None` for unreachable blocks
    pub rpo: Option<u32>,
}

/// The control-flow graph of one method
#[derive(Debug, Clone)]
pub struct Cfg {
    blocks: Vec<CfgBlock>,
    by_offset: FxHashMap<u32, BlockId>,
    rpo: Vec<BlockId>,
}

impl Cfg {
    /// Build the graph for a method
    pub fn build(method: &MethodDescriptor) -> Result<Self> {
        if method.code.is_empty() {
            return Err(TranslateError::verification(0, "method has no code"));
        }
        let leaders = collect_leaders(method)?;
        let mut cfg = carve_blocks(method, leaders)?;
        cfg.wire_handler_edges(method);
        cfg.mark_loops_and_order();
        debug!(
            blocks = cfg.blocks.len(),
            reachable = cfg.rpo.len(),
            "built control-flow graph"
        );
        Ok(cfg)
    }

    /// Borrow a block
    pub fn block(&self, id: BlockId) -> &CfgBlock {
        &self.blocks[id.0 as usize]
    }

    /// Block starting exactly at `offset`
    pub fn block_at(&self, offset: u32) -> Option<BlockId> {
        self.by_offset.get(&offset).copied()
    }

    /// Reachable blocks in reverse post order
    pub fn rpo(&self) -> &[BlockId] {
        &self.rpo
    }

    /// All blocks, in offset order
    pub fn iter(&self) -> impl Iterator<Item = &CfgBlock> {
        self.blocks.iter()
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the graph has no blocks
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Loop-header blocks, in offset order
    pub fn loop_headers(&self) -> impl Iterator<Item = &CfgBlock> {
        self.blocks.iter().filter(|b| b.is_loop_header)
    }

    fn wire_handler_edges(&mut self, method: &MethodDescriptor) {
        // Handler range boundaries are leaders, so coverage is whole-block.
        let mut edges: Vec<(BlockId, BlockId)> = Vec::new();
        for block in &self.blocks {
            for h in &method.handlers {
                if h.start <= block.start && block.end <= h.end {
                    if let Some(target) = self.by_offset.get(&h.handler) {
                        if *target != block.id {
                            edges.push((block.id, *target));
                        }
                    }
                }
            }
        }
        for (from, to) in edges {
            let succs = &mut self.blocks[from.0 as usize].handler_succs;
            if !succs.contains(&to) {
                succs.push(to);
                self.blocks[to.0 as usize].handler_preds.push(from);
            }
        }
    }

    /// Iterative depth-first walk from the entry block. An edge to a block
    /// still on the walk stack is a back edge; its target is a loop header.
    /// Post-order exit times, reversed, give the visit order.
    fn mark_loops_and_order(&mut self) {
        let n = self.blocks.len();
        let mut visited = vec![false; n];
        let mut active = vec![false; n];
        let mut post: Vec<BlockId> = Vec::with_capacity(n);
        // (block index, next outgoing edge to examine)
        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
        visited[0] = true;
        active[0] = true;

        while let Some(top) = stack.last_mut() {
            let (b, edge) = *top;
            let block = &self.blocks[b];
            let total = block.succs.len() + block.handler_succs.len();
            if edge >= total {
                active[b] = false;
                post.push(BlockId(b as u32));
                stack.pop();
                continue;
            }
            top.1 += 1;
            let succ = if edge < block.succs.len() {
                block.succs[edge]
            } else {
                block.handler_succs[edge - block.succs.len()]
            };
            let s = succ.0 as usize;
            if active[s] {
                self.blocks[s].is_loop_header = true;
            } else if !visited[s] {
                visited[s] = true;
                active[s] = true;
                stack.push((s, 0));
            }
        }

        post.reverse();
        for (number, &id) in post.iter().enumerate() {
            self.blocks[id.0 as usize].rpo = Some(number as u32);
        }
        self.rpo = post;
    }
}

/// First pass: block leaders, validated against instruction boundaries.
fn collect_leaders(method: &MethodDescriptor) -> Result<Vec<u32>> {
    let len = method.code.len() as u32;
    let mut inst_starts = FxHashSet::default();
    let mut leaders = FxHashSet::default();
    leaders.insert(0u32);

    let mut stream = InstructionStream::new(&method.code);
    while let Some(op) = stream.next_op()? {
        inst_starts.insert(op.offset);
        for target in op.branch_targets() {
            leaders.insert(target);
        }
        if op.opcode.ends_block() && stream.offset() < len {
            leaders.insert(stream.offset());
        }
    }

    for h in &method.handlers {
        if h.handler >= len || h.start >= len || h.end > len || h.start >= h.end {
            return Err(TranslateError::verification(
                h.handler,
                "exception handler range out of bounds",
            ));
        }
        leaders.insert(h.handler);
        leaders.insert(h.start);
        if h.end < len {
            leaders.insert(h.end);
        }
        if !inst_starts.contains(&h.handler) || !inst_starts.contains(&h.start) {
            return Err(TranslateError::verification(
                h.handler,
                "exception handler boundary inside an instruction",
            ));
        }
    }

    for &leader in &leaders {
        if !inst_starts.contains(&leader) {
            return Err(TranslateError::verification(
                leader,
                "branch target inside an instruction",
            ));
        }
    }

    let mut ordered: Vec<u32> = leaders.into_iter().collect();
    ordered.sort_unstable();
    Ok(ordered)
}

/// Second pass: carve ranges and wire normal edges.
fn carve_blocks(method: &MethodDescriptor, leaders: Vec<u32>) -> Result<Cfg> {
    let len = method.code.len() as u32;
    let mut blocks: Vec<CfgBlock> = Vec::with_capacity(leaders.len());
    let mut by_offset = FxHashMap::default();
    for (i, &start) in leaders.iter().enumerate() {
        let end = leaders.get(i + 1).copied().unwrap_or(len);
        let id = BlockId(i as u32);
        by_offset.insert(start, id);
        blocks.push(CfgBlock {
            id,
            start,
            end,
            succs: Vec::new(),
            preds: Vec::new(),
            handler_succs: Vec::new(),
            handler_preds: Vec::new(),
            is_loop_header: false,
            rpo: None,
        });
    }

    let block_of = |offset: u32| -> Result<BlockId> {
        by_offset
            .get(&offset)
            .copied()
            .ok_or_else(|| TranslateError::Internal(format!("no block at offset {offset}")))
    };

    let mut edges: Vec<(BlockId, BlockId)> = Vec::new();
    let mut stream = InstructionStream::new(&method.code);
    let mut current = BlockId(0);
    while let Some(op) = stream.next_op()? {
        if let Some(&b) = by_offset.get(&op.offset) {
            current = b;
        }
        let next = stream.offset();
        if op.opcode.ends_block() {
            for target in op.branch_targets() {
                edges.push((current, block_of(target)?));
            }
            if !op.opcode.is_unconditional_exit() {
                if next >= len {
                    return Err(TranslateError::verification(
                        op.offset,
                        "conditional branch falls off the end of the code",
                    ));
                }
                edges.push((current, block_of(next)?));
            }
        } else if next < len && by_offset.contains_key(&next) {
            // Fall-through into the next leader.
            edges.push((current, block_of(next)?));
        } else if next >= len {
            return Err(TranslateError::verification(
                op.offset,
                "control falls off the end of the code",
            ));
        }
    }

    for (from, to) in edges {
        let succs = &mut blocks[from.0 as usize].succs;
        if !succs.contains(&to) {
            succs.push(to);
            blocks[to.0 as usize].preds.push(from);
        }
    }

    Ok(Cfg {
        blocks,
        by_offset,
        rpo: Vec::new(),
    })
}
