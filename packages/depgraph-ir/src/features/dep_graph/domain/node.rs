//! Dependence-graph node and parameter records

use super::{BlockId, NodeId, SubgraphId};
use crate::shared::models::ir::{InstKind, ValueId};
use rustc_hash::FxHashSet;

/// Whether a parameter record sits at a function entry or at a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPosition {
    Formal,
    Actual,
}

/// Phony parameter-in / parameter-out node pair for one argument value
#[derive(Debug, Clone, Copy)]
pub struct ParamPair {
    pub input: NodeId,
    pub output: NodeId,
}

/// Ordered mapping from argument value to its in/out pair
///
/// Formal and actual parameter structures are isomorphic; the position tag
/// tells them apart.
#[derive(Debug, Clone)]
pub struct Parameters {
    position: ParamPosition,
    pairs: Vec<(ValueId, ParamPair)>,
}

impl Parameters {
    pub fn new(position: ParamPosition) -> Self {
        Parameters {
            position,
            pairs: Vec::new(),
        }
    }

    pub fn position(&self) -> ParamPosition {
        self.position
    }

    pub fn add(&mut self, value: ValueId, pair: ParamPair) {
        self.pairs.push((value, pair));
    }

    pub fn get(&self, value: ValueId) -> Option<ParamPair> {
        self.pairs
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ValueId, ParamPair)> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Role of a node beyond its instruction payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Ordinary instruction node
    Instruction,
    /// Function entry node (keyed by the function value)
    Entry,
    /// Phony unified exit node
    Exit,
    /// Phony parameter-in node
    ParamIn,
    /// Phony parameter-out node
    ParamOut,
}

/// A dependence-graph node keyed by an IR value handle
///
/// Carries the instruction payload, the intra-block linked-list position,
/// the containing block, ordered operand references, and both directions of
/// the control- and data-dependence edge sets. Edge sets are mutated only
/// through [`super::Subgraph`] so the two directions stay consistent.
#[derive(Debug, Clone)]
pub struct Node {
    pub key: ValueId,
    pub kind: InstKind,
    pub role: NodeRole,
    /// Containing block; entry nodes have none
    pub block: Option<BlockId>,
    /// Intra-block predecessor
    pub pred: Option<NodeId>,
    /// Intra-block successor
    pub succ: Option<NodeId>,
    /// Ordered operand references; `None` marks an operand without a node
    pub operands: Vec<Option<NodeId>>,
    /// Callee subgraph for call nodes targeting defined functions
    pub callee: Option<SubgraphId>,
    /// Actual-parameter record for call nodes with arguments
    pub parameters: Option<Parameters>,
    /// DFS order assigned by traversal passes
    pub dfs_order: u32,
    pub(super) control_deps: FxHashSet<NodeId>,
    pub(super) rev_control_deps: FxHashSet<NodeId>,
    pub(super) data_deps: FxHashSet<NodeId>,
    pub(super) rev_data_deps: FxHashSet<NodeId>,
}

impl Node {
    pub fn new(key: ValueId, kind: InstKind) -> Self {
        Node {
            key,
            kind,
            role: NodeRole::Instruction,
            block: None,
            pred: None,
            succ: None,
            operands: Vec::new(),
            callee: None,
            parameters: None,
            dfs_order: 0,
            control_deps: FxHashSet::default(),
            rev_control_deps: FxHashSet::default(),
            data_deps: FxHashSet::default(),
            rev_data_deps: FxHashSet::default(),
        }
    }

    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }

    /// Outgoing control-dependence edges
    pub fn control_deps(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.control_deps.iter().copied()
    }

    /// Incoming control-dependence edges
    pub fn rev_control_deps(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.rev_control_deps.iter().copied()
    }

    /// Outgoing data-dependence edges
    pub fn data_deps(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.data_deps.iter().copied()
    }

    /// Incoming data-dependence edges
    pub fn rev_data_deps(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.rev_data_deps.iter().copied()
    }

    pub fn has_control_dep(&self, to: NodeId) -> bool {
        self.control_deps.contains(&to)
    }

    pub fn has_data_dep(&self, to: NodeId) -> bool {
        self.data_deps.contains(&to)
    }

    pub fn control_dep_count(&self) -> usize {
        self.control_deps.len()
    }

    pub fn data_dep_count(&self) -> usize {
        self.data_deps.len()
    }
}
