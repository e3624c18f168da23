//! Per-function subgraphs and the module-level dependence graph
//!
//! The module graph arena-owns every subgraph; call sites link callees by
//! stable index. The number of linking call nodes is kept as a plain counter
//! so consumers can still observe the sharing degree.

use super::block::{BBlock, BlockEdge};
use super::node::{Node, NodeRole, Parameters};
use super::{BlockId, NodeId, SubgraphId};
use crate::shared::models::ir::{CfgEdgeKind, ValueId};
use rustc_hash::FxHashMap;

/// Dependence subgraph of a single function
#[derive(Debug, Default)]
pub struct Subgraph {
    /// The function's value handle
    pub func: ValueId,
    pub name: String,
    nodes: Vec<Node>,
    value_map: FxHashMap<ValueId, NodeId>,
    blocks: Vec<BBlock>,
    pub entry: Option<NodeId>,
    /// Phony unified exit node
    pub exit: Option<NodeId>,
    pub entry_block: Option<BlockId>,
    pub exit_block: Option<BlockId>,
    /// Formal-parameter record; present iff the function has arguments
    pub parameters: Option<Parameters>,
    /// Sentinel root of the post-dominator tree, created lazily
    pub pd_root: Option<BlockId>,
    /// Call sites that invoke this subgraph, in link order
    callers: Vec<(SubgraphId, NodeId)>,
    /// Set when a soft warning degraded the graph
    pub degraded: bool,
}

impl Subgraph {
    pub fn new(func: ValueId, name: impl Into<String>) -> Self {
        Subgraph {
            func,
            name: name.into(),
            ..Default::default()
        }
    }

    // ── nodes ──────────────────────────────────────────────────────────

    /// Add a node; instruction and entry nodes are also registered in the
    /// value map, phony nodes are not required to be.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        if matches!(node.role, NodeRole::Instruction | NodeRole::Entry) {
            self.value_map.insert(node.key, id);
        }
        self.nodes.push(node);
        id
    }

    pub fn get(&self, value: ValueId) -> Option<NodeId> {
        self.value_map.get(&value).copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    // ── blocks ─────────────────────────────────────────────────────────

    pub fn add_block(&mut self, block: BBlock) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(block);
        id
    }

    pub fn block(&self, id: BlockId) -> &BBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BBlock {
        &mut self.blocks[id.0 as usize]
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// Add a labelled block successor edge, maintaining the predecessor list
    pub fn add_block_successor(&mut self, from: BlockId, to: BlockId, kind: CfgEdgeKind) {
        if self.blocks[from.0 as usize].has_successor(to) {
            return;
        }
        self.blocks[from.0 as usize]
            .successors
            .push(BlockEdge { target: to, kind });
        self.blocks[to.0 as usize].predecessors.push(from);
    }

    /// Walk the intra-block chain of `block` in order
    pub fn block_nodes(&self, block: BlockId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.blocks[block.0 as usize].first;
        while let Some(id) = cur {
            out.push(id);
            cur = self.nodes[id.0 as usize].succ;
        }
        out
    }

    // ── dependence edges ───────────────────────────────────────────────

    /// Add a control-dependence edge `from → to`; both directions are
    /// recorded atomically.
    pub fn add_control_dependence(&mut self, from: NodeId, to: NodeId) -> bool {
        let added = self.nodes[from.0 as usize].control_deps.insert(to);
        if added {
            self.nodes[to.0 as usize].rev_control_deps.insert(from);
        }
        added
    }

    pub fn remove_control_dependence(&mut self, from: NodeId, to: NodeId) -> bool {
        let removed = self.nodes[from.0 as usize].control_deps.remove(&to);
        if removed {
            self.nodes[to.0 as usize].rev_control_deps.remove(&from);
        }
        removed
    }

    /// Add a data-dependence edge `from → to`; both directions are recorded
    /// atomically.
    pub fn add_data_dependence(&mut self, from: NodeId, to: NodeId) -> bool {
        let added = self.nodes[from.0 as usize].data_deps.insert(to);
        if added {
            self.nodes[to.0 as usize].rev_data_deps.insert(from);
        }
        added
    }

    pub fn remove_data_dependence(&mut self, from: NodeId, to: NodeId) -> bool {
        let removed = self.nodes[from.0 as usize].data_deps.remove(&to);
        if removed {
            self.nodes[to.0 as usize].rev_data_deps.remove(&from);
        }
        removed
    }

    /// Add a block-level control-dependence edge `from → to`
    pub fn add_block_control_dependence(&mut self, from: BlockId, to: BlockId) -> bool {
        let added = self.blocks[from.0 as usize].control_deps.insert(to);
        if added {
            self.blocks[to.0 as usize].frontier.insert(from);
        }
        added
    }

    // ── linking ────────────────────────────────────────────────────────

    pub(crate) fn add_link(&mut self, caller: (SubgraphId, NodeId)) {
        self.callers.push(caller);
    }

    /// Call sites that invoke this subgraph
    pub fn callers(&self) -> &[(SubgraphId, NodeId)] {
        &self.callers
    }

    /// Number of call nodes linking this subgraph
    pub fn link_count(&self) -> u32 {
        self.callers.len() as u32
    }

    // ── validation ─────────────────────────────────────────────────────

    /// Structural self-check; returns human-readable issues
    ///
    /// Checks intra-block link consistency (`p.succ == n ⇔ n.pred == p`),
    /// block membership, and first/last endpoint discipline.
    pub fn verify(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for (id, node) in self.nodes() {
            if node.block.is_none() && !matches!(node.role, NodeRole::Entry) {
                issues.push(format!("node {} ({}) has no block assigned", id, node.key));
            }
            if let Some(s) = node.succ {
                let succ = self.node(s);
                if succ.pred != Some(id) {
                    issues.push(format!("node {}: successor {} has wrong predecessor", id, s));
                }
                if succ.block != node.block {
                    issues.push(format!("node {}: successor {} in different block", id, s));
                }
            }
            if let Some(p) = node.pred {
                let pred = self.node(p);
                if pred.succ != Some(id) {
                    issues.push(format!("node {}: predecessor {} has wrong successor", id, p));
                }
                if pred.block != node.block {
                    issues.push(format!("node {}: predecessor {} in different block", id, p));
                }
            }
        }

        for bid in self.block_ids() {
            let block = self.block(bid);
            if let Some(first) = block.first {
                if self.node(first).pred.is_some() {
                    issues.push(format!("block {}: first node has a predecessor", bid));
                }
                let chain = self.block_nodes(bid);
                if block.last != chain.last().copied() {
                    issues.push(format!("block {}: last node not at end of chain", bid));
                }
                for n in chain {
                    if self.node(n).block != Some(bid) {
                        issues.push(format!("block {}: node {} claims another block", bid, n));
                    }
                }
            }
            if let Some(last) = block.last {
                if self.node(last).succ.is_some() {
                    issues.push(format!("block {}: last node has a successor", bid));
                }
            }
        }

        issues
    }
}

/// Module-level dependence graph: a forest of per-function subgraphs
/// connected by call edges
#[derive(Debug, Default)]
pub struct DepGraph {
    subgraphs: Vec<Subgraph>,
    by_function: FxHashMap<ValueId, SubgraphId>,
    /// Subgraph of the entry function
    pub entry: Option<SubgraphId>,
}

impl DepGraph {
    pub fn new() -> Self {
        DepGraph::default()
    }

    pub fn add_subgraph(&mut self, subgraph: Subgraph) -> SubgraphId {
        let id = SubgraphId(self.subgraphs.len() as u32);
        self.by_function.insert(subgraph.func, id);
        self.subgraphs.push(subgraph);
        id
    }

    pub fn subgraph(&self, id: SubgraphId) -> &Subgraph {
        &self.subgraphs[id.0 as usize]
    }

    pub fn subgraph_mut(&mut self, id: SubgraphId) -> &mut Subgraph {
        &mut self.subgraphs[id.0 as usize]
    }

    pub fn subgraph_for(&self, func: ValueId) -> Option<SubgraphId> {
        self.by_function.get(&func).copied()
    }

    pub fn subgraph_count(&self) -> usize {
        self.subgraphs.len()
    }

    pub fn subgraph_ids(&self) -> impl Iterator<Item = SubgraphId> {
        (0..self.subgraphs.len() as u32).map(SubgraphId)
    }

    pub fn subgraphs(&self) -> impl Iterator<Item = (SubgraphId, &Subgraph)> {
        self.subgraphs
            .iter()
            .enumerate()
            .map(|(i, s)| (SubgraphId(i as u32), s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ir::InstKind;

    fn sub_with_nodes(n: u32) -> (Subgraph, Vec<NodeId>) {
        let mut sub = Subgraph::new(ValueId(0), "f");
        let ids = (1..=n)
            .map(|i| sub.add_node(Node::new(ValueId(i), InstKind::Other)))
            .collect();
        (sub, ids)
    }

    #[test]
    fn dependence_edges_are_symmetric() {
        let (mut sub, ids) = sub_with_nodes(2);
        assert!(sub.add_control_dependence(ids[0], ids[1]));
        assert!(!sub.add_control_dependence(ids[0], ids[1]));
        assert!(sub.node(ids[0]).has_control_dep(ids[1]));
        assert!(sub.node(ids[1]).rev_control_deps().any(|n| n == ids[0]));

        assert!(sub.remove_control_dependence(ids[0], ids[1]));
        assert_eq!(sub.node(ids[1]).rev_control_deps().count(), 0);

        assert!(sub.add_data_dependence(ids[0], ids[1]));
        assert!(sub.remove_data_dependence(ids[0], ids[1]));
        assert_eq!(sub.node(ids[0]).data_dep_count(), 0);
        assert_eq!(sub.node(ids[1]).rev_data_deps().count(), 0);
    }

    #[test]
    fn block_successor_keeps_predecessors_in_sync() {
        let (mut sub, _) = sub_with_nodes(0);
        let a = sub.add_block(BBlock::new(Some(0)));
        let b = sub.add_block(BBlock::new(Some(1)));
        sub.add_block_successor(a, b, CfgEdgeKind::Sequential);
        sub.add_block_successor(a, b, CfgEdgeKind::Sequential);
        assert_eq!(sub.block(a).successors().len(), 1);
        assert_eq!(sub.block(b).predecessors(), &[a]);
    }

    #[test]
    fn verify_flags_broken_chain() {
        let (mut sub, ids) = sub_with_nodes(2);
        let b = sub.add_block(BBlock::new(Some(0)));
        sub.node_mut(ids[0]).block = Some(b);
        sub.node_mut(ids[1]).block = Some(b);
        sub.node_mut(ids[0]).succ = Some(ids[1]);
        // inconsistent: ids[1].pred left unset
        sub.block_mut(b).first = Some(ids[0]);
        sub.block_mut(b).last = Some(ids[1]);
        let issues = sub.verify();
        assert!(issues.iter().any(|i| i.contains("wrong predecessor")));
    }

    #[test]
    fn verify_accepts_consistent_chain() {
        let (mut sub, ids) = sub_with_nodes(2);
        let b = sub.add_block(BBlock::new(Some(0)));
        sub.node_mut(ids[0]).block = Some(b);
        sub.node_mut(ids[1]).block = Some(b);
        sub.node_mut(ids[0]).succ = Some(ids[1]);
        sub.node_mut(ids[1]).pred = Some(ids[0]);
        sub.block_mut(b).first = Some(ids[0]);
        sub.block_mut(b).last = Some(ids[1]);
        assert!(sub.verify().is_empty());
    }
}
