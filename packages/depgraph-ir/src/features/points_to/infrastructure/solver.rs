//! Worklist core shared by the points-to solver variants
//!
//! All nodes are enqueued initially; a popped node runs its transfer and,
//! on growth, re-enqueues its pointer-subgraph successors plus whatever
//! extra targets the variant names. The `after_processed` hook lets a
//! variant re-seed the queue when it would otherwise drain.
//!
//! Transfers are monotone over a finite universe, so any queue order
//! reaches the same fixpoint; ordering only affects the iteration count.

use crate::features::points_to::domain::{
    Offset, Pointer, PointerSubgraph, PssNodeId, PssNodeKind,
};
use std::collections::VecDeque;
use std::time::Instant;

/// Statistics of one solver run
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverStats {
    /// Worklist pops
    pub processed: u64,
    /// Queue drains survived (re-seeding rounds plus the initial pass)
    pub iterations: u64,
    pub duration_ms: f64,
}

/// One solver variant: the per-node transfer plus its queueing policy
pub(crate) trait TransferModel {
    /// Apply the node transfer; returns true when the node's state grew
    fn process(&mut self, pss: &mut PointerSubgraph, node: PssNodeId) -> bool;

    /// Extra nodes to revisit when `node` changed, beyond PSS successors
    fn changed_targets(
        &mut self,
        _pss: &PointerSubgraph,
        _node: PssNodeId,
        _queue: &mut VecDeque<PssNodeId>,
    ) {
    }

    /// Runs after every pop; may re-seed a drained queue
    fn after_processed(
        &mut self,
        _pss: &PointerSubgraph,
        _queue: &mut VecDeque<PssNodeId>,
        _stats: &mut SolverStats,
    ) {
    }
}

pub(crate) fn run_worklist(
    pss: &mut PointerSubgraph,
    model: &mut impl TransferModel,
) -> SolverStats {
    let start = Instant::now();
    let mut stats = SolverStats {
        iterations: 1,
        ..Default::default()
    };

    let mut queue: VecDeque<PssNodeId> = pss.node_ids().collect();
    while let Some(node) = queue.pop_front() {
        stats.processed += 1;
        if model.process(pss, node) {
            let successors = pss.node(node).successors().to_vec();
            queue.extend(successors);
            model.changed_targets(pss, node, &mut queue);
        }
        model.after_processed(pss, &mut queue, &mut stats);
    }

    stats.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    stats
}

// ── transfers shared by both variants ──────────────────────────────────
//
// Top-level values are in SSA form, so their points-to sets are the same
// at every program point; only memory differs between the variants.

/// `pt(node) ∪= pt(op)` for every operand
pub(crate) fn union_operands(pss: &mut PointerSubgraph, node: PssNodeId) -> bool {
    let ops = pss.node(node).operands.clone();
    let mut gathered = crate::features::points_to::domain::PointsToSet::new();
    for op in ops {
        gathered.union(&pss.node(op).points_to);
    }
    pss.node_mut(node).points_to.union(&gathered)
}

/// `pt(node) ∪= { (t, o ⊕ Δ) | (t, o) ∈ pt(op) }`
pub(crate) fn gep_transfer(pss: &mut PointerSubgraph, node: PssNodeId) -> bool {
    let src = pss.node(node).operand(0);
    let delta = pss.node(node).offset;
    let shifted: Vec<Pointer> = pss
        .node(src)
        .points_to
        .iter()
        .map(|p| Pointer::new(p.target, p.offset + delta))
        .collect();

    let mut changed = false;
    for ptr in shifted {
        changed |= pss.node_mut(node).points_to.insert(ptr);
    }
    changed
}

/// Resolve a points-to target to the node owning its memory
///
/// Casts and GEPs forward to their source, constants to their fixed
/// target. Null and functions own no writable memory.
pub(crate) fn memory_owner(pss: &PointerSubgraph, mut target: PssNodeId) -> Option<PssNodeId> {
    loop {
        let node = pss.node(target);
        match node.kind {
            PssNodeKind::Cast | PssNodeKind::Gep => target = node.operand(0),
            PssNodeKind::Constant => {
                target = node.points_to.iter().next()?.target;
            }
            _ => break,
        }
    }
    if pss.node(target).kind.is_allocation() {
        Some(target)
    } else {
        None
    }
}

/// Copy propagation of a memcpy between two memory views, as
/// `(cell offset, stored pointers)` rewrites.
///
/// Returns the destination cells to update: offsets outside a concrete
/// `[src_off, src_off + len)` window are skipped, everything else is
/// rebased onto the destination offset. Unknown lengths and offsets
/// collapse to unknown-offset writes.
pub(crate) fn memcpy_cells(
    cells: &[(Offset, Vec<Pointer>)],
    src_off: Offset,
    dst_off: Offset,
    len: Option<u64>,
) -> Vec<(Offset, Vec<Pointer>)> {
    let mut out = Vec::new();
    for (cell_off, ptrs) in cells {
        let rebased = match (cell_off.value(), src_off.value(), dst_off.value(), len) {
            (Some(c), Some(s), Some(d), l) => {
                if c < s {
                    continue;
                }
                if let Some(l) = l {
                    if c >= s + l {
                        continue;
                    }
                }
                Offset::Concrete(d + (c - s))
            }
            _ => Offset::Unknown,
        };
        out.push((rebased, ptrs.clone()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::points_to::domain::PssNode;

    #[test]
    fn memory_owner_resolves_through_casts_and_geps() {
        let mut pss = PointerSubgraph::new();
        let alloc = pss.add_node(PssNode::new(PssNodeKind::Alloc));
        let cast = pss.add_node(PssNode::new(PssNodeKind::Cast).with_operands(vec![alloc]));
        let gep = pss.add_node(
            PssNode::new(PssNodeKind::Gep)
                .with_operands(vec![cast])
                .with_offset(Offset::Concrete(8)),
        );
        assert_eq!(memory_owner(&pss, gep), Some(alloc));
        assert_eq!(memory_owner(&pss, pss.null_node), None);
        assert_eq!(memory_owner(&pss, pss.unknown_node), Some(pss.unknown_node));
    }

    #[test]
    fn memcpy_window_rebases_offsets() {
        let cells = vec![
            (Offset::Concrete(0), vec![Pointer::at_zero(PssNodeId(7))]),
            (Offset::Concrete(16), vec![Pointer::at_zero(PssNodeId(8))]),
        ];
        let out = memcpy_cells(&cells, Offset::Concrete(0), Offset::Concrete(32), Some(8));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, Offset::Concrete(32));

        // unknown length copies everything
        let all = memcpy_cells(&cells, Offset::Concrete(0), Offset::Concrete(0), None);
        assert_eq!(all.len(), 2);
    }
}
