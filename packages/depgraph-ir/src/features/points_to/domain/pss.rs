//! Pointer State Subgraph
//!
//! The analysed program reduced to its pointer-relevant operations. Node
//! kinds are a tagged variant; the solvers dispatch a single match on the
//! tag. Successor edges encode the control order the solvers traverse.

use super::offset::Offset;
use super::pointer::{Pointer, PointsToSet};
use crate::shared::models::ir::ValueId;
use rustc_hash::FxHashMap;
use std::fmt;

/// Index of a node within the pointer subgraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PssNodeId(pub u32);

impl fmt::Display for PssNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pss{}", self.0)
    }
}

/// Kind tag of a pointer-state node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PssNodeKind {
    Alloc,
    DynAlloc,
    Load,
    Store,
    Gep,
    Cast,
    Phi,
    Call,
    Return,
    Function,
    Constant,
    Null,
    UnknownMem,
    Noop,
    Memcpy,
}

impl PssNodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PssNodeKind::Alloc => "ALLOC",
            PssNodeKind::DynAlloc => "DYN_ALLOC",
            PssNodeKind::Load => "LOAD",
            PssNodeKind::Store => "STORE",
            PssNodeKind::Gep => "GEP",
            PssNodeKind::Cast => "CAST",
            PssNodeKind::Phi => "PHI",
            PssNodeKind::Call => "CALL",
            PssNodeKind::Return => "RETURN",
            PssNodeKind::Function => "FUNCTION",
            PssNodeKind::Constant => "CONSTANT",
            PssNodeKind::Null => "NULL",
            PssNodeKind::UnknownMem => "UNKNOWN_MEM",
            PssNodeKind::Noop => "NOOP",
            PssNodeKind::Memcpy => "MEMCPY",
        }
    }

    /// Kinds that own abstract memory
    pub fn is_allocation(&self) -> bool {
        matches!(
            self,
            PssNodeKind::Alloc | PssNodeKind::DynAlloc | PssNodeKind::UnknownMem
        )
    }
}

impl fmt::Display for PssNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pointer-state node
#[derive(Debug, Clone)]
pub struct PssNode {
    pub kind: PssNodeKind,
    /// Typed operands; meaning depends on the kind (store: [value, pointer])
    pub operands: Vec<PssNodeId>,
    /// GEP displacement, or the fixed offset of a constant pointer
    pub offset: Offset,
    /// Byte count of a memcpy; `None` = unknown length
    pub length: Option<u64>,
    pub points_to: PointsToSet,
    /// Allocation size in bytes (0 = unknown)
    pub size: u64,
    pub is_heap: bool,
    pub zero_initialized: bool,
    /// Originating IR value, for dump labels
    pub value: Option<ValueId>,
    pub name: Option<String>,
    successors: Vec<PssNodeId>,
    predecessors: Vec<PssNodeId>,
}

impl PssNode {
    pub fn new(kind: PssNodeKind) -> Self {
        PssNode {
            kind,
            operands: Vec::new(),
            offset: Offset::ZERO,
            length: None,
            points_to: PointsToSet::new(),
            size: 0,
            is_heap: false,
            zero_initialized: false,
            value: None,
            name: None,
            successors: Vec::new(),
            predecessors: Vec::new(),
        }
    }

    pub fn with_operands(mut self, operands: Vec<PssNodeId>) -> Self {
        self.operands = operands;
        self
    }

    pub fn with_offset(mut self, offset: Offset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_value(mut self, value: ValueId) -> Self {
        self.value = Some(value);
        self
    }

    pub fn heap(mut self) -> Self {
        self.is_heap = true;
        self
    }

    pub fn zeroed(mut self) -> Self {
        self.zero_initialized = true;
        self
    }

    pub fn successors(&self) -> &[PssNodeId] {
        &self.successors
    }

    pub fn predecessors(&self) -> &[PssNodeId] {
        &self.predecessors
    }

    pub fn operand(&self, idx: usize) -> PssNodeId {
        self.operands[idx]
    }
}

/// The pointer subgraph of a whole module
///
/// Owns all nodes; two singletons exist from the start: the null node and
/// the unknown-memory sentinel.
#[derive(Debug)]
pub struct PointerSubgraph {
    nodes: Vec<PssNode>,
    value_map: FxHashMap<ValueId, PssNodeId>,
    pub entry: Option<PssNodeId>,
    pub null_node: PssNodeId,
    pub unknown_node: PssNodeId,
}

impl Default for PointerSubgraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerSubgraph {
    pub fn new() -> Self {
        let mut pss = PointerSubgraph {
            nodes: Vec::new(),
            value_map: FxHashMap::default(),
            entry: None,
            null_node: PssNodeId(0),
            unknown_node: PssNodeId(0),
        };
        pss.null_node = pss.add_node(PssNode::new(PssNodeKind::Null));
        pss.unknown_node = pss.add_node(PssNode::new(PssNodeKind::UnknownMem));
        pss
    }

    pub fn add_node(&mut self, node: PssNode) -> PssNodeId {
        let id = PssNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Bind an IR value to its pointer-state node
    pub fn map_value(&mut self, value: ValueId, id: PssNodeId) {
        self.value_map.insert(value, id);
    }

    pub fn get(&self, value: ValueId) -> Option<PssNodeId> {
        self.value_map.get(&value).copied()
    }

    pub fn node(&self, id: PssNodeId) -> &PssNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: PssNodeId) -> &mut PssNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = PssNodeId> {
        (0..self.nodes.len() as u32).map(PssNodeId)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (PssNodeId, &PssNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (PssNodeId(i as u32), n))
    }

    /// Add a successor edge, maintaining the predecessor list
    pub fn add_successor(&mut self, from: PssNodeId, to: PssNodeId) {
        if self.nodes[from.0 as usize].successors.contains(&to) {
            return;
        }
        self.nodes[from.0 as usize].successors.push(to);
        self.nodes[to.0 as usize].predecessors.push(from);
    }

    /// Points-to set of the node bound to an IR value
    pub fn points_to(&self, value: ValueId) -> Option<&PointsToSet> {
        self.get(value).map(|id| &self.node(id).points_to)
    }

    /// Whether two IR pointers may reference overlapping memory
    pub fn may_alias(&self, a: ValueId, b: ValueId) -> bool {
        if a == b {
            return true;
        }
        match (self.points_to(a), self.points_to(b)) {
            (Some(pa), Some(pb)) => pa.may_overlap(pb),
            // without points-to data, only identical pointers alias
            _ => false,
        }
    }

    /// Seed the fixed points-to facts of allocations, functions and
    /// constants. Called once by the builder.
    pub fn seed_initial_points_to(&mut self) {
        for id in self.node_ids().collect::<Vec<_>>() {
            let node = self.node(id);
            match node.kind {
                PssNodeKind::Alloc | PssNodeKind::DynAlloc | PssNodeKind::Function => {
                    let ptr = Pointer::at_zero(id);
                    self.node_mut(id).points_to.insert(ptr);
                }
                PssNodeKind::Constant => {
                    if let Some(&target) = node.operands.first() {
                        let ptr = Pointer::new(target, node.offset);
                        self.node_mut(id).points_to.insert(ptr);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_exist() {
        let pss = PointerSubgraph::new();
        assert_eq!(pss.node(pss.null_node).kind, PssNodeKind::Null);
        assert_eq!(pss.node(pss.unknown_node).kind, PssNodeKind::UnknownMem);
    }

    #[test]
    fn successor_edges_stay_symmetric() {
        let mut pss = PointerSubgraph::new();
        let a = pss.add_node(PssNode::new(PssNodeKind::Noop));
        let b = pss.add_node(PssNode::new(PssNodeKind::Noop));
        pss.add_successor(a, b);
        pss.add_successor(a, b);
        assert_eq!(pss.node(a).successors(), &[b]);
        assert_eq!(pss.node(b).predecessors(), &[a]);
    }

    #[test]
    fn seeding_gives_allocations_self_pointers() {
        let mut pss = PointerSubgraph::new();
        let a = pss.add_node(PssNode::new(PssNodeKind::Alloc).with_size(8));
        let c = pss.add_node(
            PssNode::new(PssNodeKind::Constant)
                .with_operands(vec![a])
                .with_offset(Offset::Concrete(4)),
        );
        pss.seed_initial_points_to();

        assert!(pss.node(a).points_to.contains(&Pointer::at_zero(a)));
        assert!(pss
            .node(c)
            .points_to
            .contains(&Pointer::new(a, Offset::Concrete(4))));
    }
}
