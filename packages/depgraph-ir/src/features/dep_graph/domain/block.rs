//! Basic blocks of the dependence graph

use super::{BlockId, NodeId};
use crate::shared::models::ir::CfgEdgeKind;
use rustc_hash::FxHashSet;

/// Labelled block-level successor edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEdge {
    pub target: BlockId,
    pub kind: CfgEdgeKind,
}

/// Ordered chain of nodes with a designated first and last node
///
/// The phony exit block and the post-dominator sentinel root have no nodes;
/// every block created from an IR block is non-empty.
#[derive(Debug, Clone, Default)]
pub struct BBlock {
    /// Index of the originating IR block; `None` for phony blocks
    pub key: Option<usize>,
    pub first: Option<NodeId>,
    pub last: Option<NodeId>,
    pub(super) successors: Vec<BlockEdge>,
    pub(super) predecessors: Vec<BlockId>,
    /// Call nodes in this block targeting defined functions
    pub(super) callsites: FxHashSet<NodeId>,
    /// Immediate post-dominator back-pointer
    pub ipostdom: Option<BlockId>,
    /// Post-dominance frontier: blocks this one is control-dependent on
    pub(super) frontier: FxHashSet<BlockId>,
    /// Block-level control-dependence edges (this block controls the targets)
    pub(super) control_deps: FxHashSet<BlockId>,
    /// DFS order assigned by traversal passes
    pub dfs_order: u32,
}

impl BBlock {
    pub fn new(key: Option<usize>) -> Self {
        BBlock {
            key,
            ..Default::default()
        }
    }

    pub fn successors(&self) -> &[BlockEdge] {
        &self.successors
    }

    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    pub fn has_successor(&self, target: BlockId) -> bool {
        self.successors.iter().any(|e| e.target == target)
    }

    pub fn add_callsite(&mut self, node: NodeId) {
        self.callsites.insert(node);
    }

    pub fn callsites(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.callsites.iter().copied()
    }

    pub fn is_callsite(&self, node: NodeId) -> bool {
        self.callsites.contains(&node)
    }

    /// Blocks this one controls (block-level control dependence)
    pub fn control_deps(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.control_deps.iter().copied()
    }

    pub fn has_control_dep(&self, target: BlockId) -> bool {
        self.control_deps.contains(&target)
    }

    /// Post-dominance frontier members (the controllers of this block)
    pub fn frontier(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.frontier.iter().copied()
    }
}
