//! Flow-insensitive points-to solver
//!
//! Every allocation site owns a single memory object shared across all
//! program points. Nodes whose points-to set grew since the last drain are
//! tracked in a changed set; when the queue empties with pending changes,
//! the whole subgraph is re-seeded so every transitive reader reruns.

use super::solver::{
    gep_transfer, memcpy_cells, memory_owner, run_worklist, union_operands, SolverStats,
    TransferModel,
};
use crate::features::points_to::domain::{
    MemoryObject, Offset, Pointer, PointerSubgraph, PointsToSet, PssNodeId, PssNodeKind,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Result of a flow-insensitive run; points-to sets live on the PSS nodes
#[derive(Debug)]
pub struct FlowInsensitiveResult {
    /// Memory object per allocation site
    pub memory: FxHashMap<PssNodeId, MemoryObject>,
    pub stats: SolverStats,
}

impl FlowInsensitiveResult {
    pub fn memory_of(&self, node: PssNodeId) -> Option<&MemoryObject> {
        self.memory.get(&node)
    }
}

/// Solve points-to flow-insensitively over `pss`
pub fn solve_flow_insensitive(pss: &mut PointerSubgraph) -> FlowInsensitiveResult {
    let mut model = FlowInsensitive::new(pss);
    let stats = run_worklist(pss, &mut model);
    FlowInsensitiveResult {
        memory: model.memory,
        stats,
    }
}

struct FlowInsensitive {
    memory: FxHashMap<PssNodeId, MemoryObject>,
    changed: FxHashSet<PssNodeId>,
}

impl FlowInsensitive {
    fn new(pss: &PointerSubgraph) -> Self {
        let mut memory: FxHashMap<PssNodeId, MemoryObject> = FxHashMap::default();

        // zero-initialized allocations read as null at every offset
        let null = pss.null_node;
        for (id, node) in pss.nodes() {
            if node.kind.is_allocation() && node.zero_initialized {
                let nulls: PointsToSet = [Pointer::at_zero(null)].into_iter().collect();
                memory
                    .entry(id)
                    .or_insert_with(|| MemoryObject::new(id))
                    .write(Offset::Unknown, &nulls);
            }
        }

        FlowInsensitive {
            memory,
            changed: FxHashSet::default(),
        }
    }

    fn object(&mut self, owner: PssNodeId) -> &mut MemoryObject {
        self.memory
            .entry(owner)
            .or_insert_with(|| MemoryObject::new(owner))
    }

    fn load(&mut self, pss: &mut PointerSubgraph, node: PssNodeId) -> bool {
        let ptr = pss.node(node).operand(0);
        let pointers = pss.node(ptr).points_to.sorted();

        let mut gathered = PointsToSet::new();
        for p in pointers {
            if let Some(owner) = memory_owner(pss, p.target) {
                gathered.union(&self.object(owner).read(p.offset));
            }
        }
        pss.node_mut(node).points_to.union(&gathered)
    }

    fn store(&mut self, pss: &mut PointerSubgraph, node: PssNodeId) -> bool {
        let value = pss.node(node).operand(0);
        let ptr = pss.node(node).operand(1);
        let values = pss.node(value).points_to.clone();
        if values.is_empty() {
            return false;
        }

        let mut changed = false;
        for p in pss.node(ptr).points_to.sorted() {
            if let Some(owner) = memory_owner(pss, p.target) {
                changed |= self.object(owner).write(p.offset, &values);
            }
        }
        changed
    }

    fn memcpy(&mut self, pss: &mut PointerSubgraph, node: PssNodeId) -> bool {
        let dst = pss.node(node).operand(0);
        let src = pss.node(node).operand(1);
        let len = pss.node(node).length;

        let mut changed = false;
        for sp in pss.node(src).points_to.sorted() {
            let Some(src_owner) = memory_owner(pss, sp.target) else {
                continue;
            };
            let cells = self.object(src_owner).sorted_cells();
            for dp in pss.node(dst).points_to.sorted() {
                let Some(dst_owner) = memory_owner(pss, dp.target) else {
                    continue;
                };
                for (offset, ptrs) in memcpy_cells(&cells, sp.offset, dp.offset, len) {
                    let set: PointsToSet = ptrs.into_iter().collect();
                    changed |= self.object(dst_owner).write(offset, &set);
                }
            }
        }
        changed
    }
}

impl TransferModel for FlowInsensitive {
    fn process(&mut self, pss: &mut PointerSubgraph, node: PssNodeId) -> bool {
        let grew = match pss.node(node).kind {
            PssNodeKind::Cast
            | PssNodeKind::Phi
            | PssNodeKind::Call
            | PssNodeKind::Return => union_operands(pss, node),
            PssNodeKind::Gep => gep_transfer(pss, node),
            PssNodeKind::Load => self.load(pss, node),
            PssNodeKind::Store => self.store(pss, node),
            PssNodeKind::Memcpy => self.memcpy(pss, node),
            // allocations and constants are seeded; noop and the
            // unknown-memory sentinel are identity
            _ => false,
        };
        if grew {
            self.changed.insert(node);
        }
        grew
    }

    fn after_processed(
        &mut self,
        pss: &PointerSubgraph,
        queue: &mut VecDeque<PssNodeId>,
        stats: &mut SolverStats,
    ) {
        if queue.is_empty() && !self.changed.is_empty() {
            queue.extend(pss.node_ids());
            self.changed.clear();
            stats.iterations += 1;
        }
    }
}
