//! Flow-sensitive points-to solver
//!
//! Every pointer-subgraph node carries a memory map describing memory at
//! that program point. A transfer joins the predecessors' out-maps
//! pointwise, applies the node's effect, and re-enqueues successors when
//! the out-map changed. Stores update strongly when the pointer has a
//! unique stack target at a concrete offset, weakly otherwise.

use super::solver::{
    gep_transfer, memcpy_cells, memory_owner, run_worklist, union_operands, SolverStats,
    TransferModel,
};
use crate::features::points_to::domain::{
    MemoryMap, Offset, Pointer, PointerSubgraph, PointsToSet, PssNodeId, PssNodeKind,
};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Result of a flow-sensitive run; points-to sets live on the PSS nodes
#[derive(Debug)]
pub struct FlowSensitiveResult {
    /// Out-map per program point
    pub maps: FxHashMap<PssNodeId, MemoryMap>,
    pub stats: SolverStats,
}

impl FlowSensitiveResult {
    pub fn map_of(&self, node: PssNodeId) -> Option<&MemoryMap> {
        self.maps.get(&node)
    }
}

/// Solve points-to flow-sensitively over `pss`
pub fn solve_flow_sensitive(pss: &mut PointerSubgraph) -> FlowSensitiveResult {
    let mut model = FlowSensitive::new(pss);
    let stats = run_worklist(pss, &mut model);
    FlowSensitiveResult {
        maps: model.maps,
        stats,
    }
}

struct FlowSensitive {
    maps: FxHashMap<PssNodeId, MemoryMap>,
    /// Reverse operand index: value changes revisit their readers
    users: FxHashMap<PssNodeId, Vec<PssNodeId>>,
}

impl FlowSensitive {
    fn new(pss: &PointerSubgraph) -> Self {
        let mut users: FxHashMap<PssNodeId, Vec<PssNodeId>> = FxHashMap::default();
        for (id, node) in pss.nodes() {
            for &op in &node.operands {
                users.entry(op).or_default().push(id);
            }
        }
        FlowSensitive {
            maps: FxHashMap::default(),
            users,
        }
    }

    fn join_predecessors(&self, pss: &PointerSubgraph, node: PssNodeId) -> MemoryMap {
        let mut map = MemoryMap::new();
        for p in pss.node(node).predecessors() {
            if let Some(m) = self.maps.get(p) {
                map.merge(m);
            }
        }
        map
    }

    fn load(&self, pss: &mut PointerSubgraph, node: PssNodeId, map: &MemoryMap) -> bool {
        let ptr = pss.node(node).operand(0);
        let mut gathered = PointsToSet::new();
        for p in pss.node(ptr).points_to.sorted() {
            if let Some(owner) = memory_owner(pss, p.target) {
                for obj in map.objects_of(owner) {
                    gathered.union(&obj.read(p.offset));
                }
            }
        }
        pss.node_mut(node).points_to.union(&gathered)
    }

    fn store(&self, pss: &PointerSubgraph, node: PssNodeId, map: &mut MemoryMap) {
        let value = pss.node(node).operand(0);
        let ptr = pss.node(node).operand(1);
        let values = pss.node(value).points_to.clone();
        let targets = pss.node(ptr).points_to.sorted();

        // one unique stack slot at a concrete offset permits a strong update
        let strong = targets.len() == 1
            && !targets[0].offset.is_unknown()
            && memory_owner(pss, targets[0].target)
                .map(|o| pss.node(o).kind == PssNodeKind::Alloc && !pss.node(o).is_heap)
                .unwrap_or(false);

        for p in targets {
            let Some(owner) = memory_owner(pss, p.target) else {
                continue;
            };
            let obj = map.object_mut(Pointer::at_zero(owner));
            if strong {
                obj.write_strong(p.offset, values.clone());
            } else {
                obj.write(p.offset, &values);
            }
        }
    }

    fn memcpy(&self, pss: &PointerSubgraph, node: PssNodeId, map: &mut MemoryMap) {
        let dst = pss.node(node).operand(0);
        let src = pss.node(node).operand(1);
        let len = pss.node(node).length;

        for sp in pss.node(src).points_to.sorted() {
            let Some(src_owner) = memory_owner(pss, sp.target) else {
                continue;
            };
            let cells: Vec<_> = map
                .objects_of(src_owner)
                .flat_map(|o| o.sorted_cells())
                .collect();
            for dp in pss.node(dst).points_to.sorted() {
                let Some(dst_owner) = memory_owner(pss, dp.target) else {
                    continue;
                };
                for (offset, ptrs) in memcpy_cells(&cells, sp.offset, dp.offset, len) {
                    let set: PointsToSet = ptrs.into_iter().collect();
                    map.object_mut(Pointer::at_zero(dst_owner)).write(offset, &set);
                }
            }
        }
    }
}

impl TransferModel for FlowSensitive {
    fn process(&mut self, pss: &mut PointerSubgraph, node: PssNodeId) -> bool {
        let mut map = self.join_predecessors(pss, node);
        let mut pt_changed = false;

        match pss.node(node).kind {
            PssNodeKind::Alloc | PssNodeKind::DynAlloc => {
                // allocations introduce their key into the memory state
                let zeroed = pss.node(node).zero_initialized;
                let null = pss.null_node;
                let obj = map.object_mut(Pointer::at_zero(node));
                if zeroed {
                    let nulls: PointsToSet = [Pointer::at_zero(null)].into_iter().collect();
                    obj.write(Offset::Unknown, &nulls);
                }
            }
            PssNodeKind::Cast
            | PssNodeKind::Phi
            | PssNodeKind::Call
            | PssNodeKind::Return => pt_changed = union_operands(pss, node),
            PssNodeKind::Gep => pt_changed = gep_transfer(pss, node),
            PssNodeKind::Load => pt_changed = self.load(pss, node, &map),
            PssNodeKind::Store => self.store(pss, node, &mut map),
            PssNodeKind::Memcpy => self.memcpy(pss, node, &mut map),
            _ => {}
        }

        let map_changed = self.maps.get(&node) != Some(&map);
        if map_changed {
            self.maps.insert(node, map);
        }
        map_changed || pt_changed
    }

    fn changed_targets(
        &mut self,
        _pss: &PointerSubgraph,
        node: PssNodeId,
        queue: &mut VecDeque<PssNodeId>,
    ) {
        if let Some(users) = self.users.get(&node) {
            queue.extend(users.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::points_to::infrastructure::pss_builder::build_pss;
    use crate::shared::models::ir::ValueId;
    use crate::shared::testing::scenario_strong_update;

    fn return_node(pss: &PointerSubgraph) -> PssNodeId {
        pss.nodes()
            .find(|(_, n)| n.kind == PssNodeKind::Return)
            .map(|(id, _)| id)
            .expect("return node")
    }

    #[test]
    fn strong_updates_separate_the_stores() {
        // p = &a; *p = &b; p = &c; *p = &d;
        let m = scenario_strong_update();
        let mut pss = build_pss(&m, None).unwrap();
        let result = solve_flow_sensitive(&mut pss);

        let a = pss.get(ValueId(2)).unwrap();
        let b = pss.get(ValueId(3)).unwrap();
        let c = pss.get(ValueId(4)).unwrap();
        let d = pss.get(ValueId(5)).unwrap();

        let final_map = result.map_of(return_node(&pss)).expect("map at return");

        let mem_a: Vec<_> = final_map.objects_of(a).collect();
        assert_eq!(mem_a.len(), 1);
        let read_a = mem_a[0].read(Offset::ZERO);
        assert!(read_a.contains_target(b));
        assert!(!read_a.contains_target(d));

        let mem_c: Vec<_> = final_map.objects_of(c).collect();
        assert_eq!(mem_c.len(), 1);
        let read_c = mem_c[0].read(Offset::ZERO);
        assert!(read_c.contains_target(d));
        assert!(!read_c.contains_target(b));
    }

    #[test]
    fn loads_see_the_memory_of_their_point() {
        let m = scenario_strong_update();
        let mut pss = build_pss(&m, None).unwrap();
        solve_flow_sensitive(&mut pss);

        let a = pss.get(ValueId(2)).unwrap();
        let c = pss.get(ValueId(4)).unwrap();

        // first load sees only &a, second only &c
        let first = pss.points_to(ValueId(8)).unwrap();
        assert!(first.contains_target(a));
        assert!(!first.contains_target(c));

        let second = pss.points_to(ValueId(11)).unwrap();
        assert!(second.contains_target(c));
        assert!(!second.contains_target(a));
    }

    #[test]
    fn solving_twice_is_idempotent() {
        let m = scenario_strong_update();
        let mut pss = build_pss(&m, None).unwrap();
        solve_flow_sensitive(&mut pss);
        let before: Vec<Vec<Pointer>> = pss.nodes().map(|(_, n)| n.points_to.sorted()).collect();

        solve_flow_sensitive(&mut pss);
        let after: Vec<Vec<Pointer>> = pss.nodes().map(|(_, n)| n.points_to.sorted()).collect();
        assert_eq!(before, after);
    }
}
