//! Dependence-graph domain models
//!
//! Typed nodes with control- and data-dependence edge sets, basic blocks
//! with labelled successor edges, per-function subgraphs and the module-level
//! graph that arena-owns them.

pub mod block;
pub mod node;
pub mod subgraph;

pub use block::{BBlock, BlockEdge};
pub use node::{Node, NodeRole, ParamPair, ParamPosition, Parameters};
pub use subgraph::{DepGraph, Subgraph};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node within its subgraph's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Index of a block within its subgraph's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Index of a subgraph within the module graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubgraphId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl fmt::Display for SubgraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub{}", self.0)
    }
}

/// A block reference that is unique across the whole module graph
pub type BlockRef = (SubgraphId, BlockId);
