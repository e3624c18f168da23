//! BFS over dependence edges
//!
//! Each walk carries its own visited set, so concurrent analyses cannot
//! interfere with each other's visitation marks.

use crate::features::dep_graph::domain::{NodeId, Subgraph};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// Which dependence edges a node walk follows
#[derive(Debug, Clone, Copy)]
pub struct WalkEdges {
    pub control: bool,
    pub data: bool,
}

impl WalkEdges {
    pub fn control_only() -> Self {
        WalkEdges {
            control: true,
            data: false,
        }
    }

    pub fn data_only() -> Self {
        WalkEdges {
            control: false,
            data: true,
        }
    }

    pub fn both() -> Self {
        WalkEdges {
            control: true,
            data: true,
        }
    }
}

/// BFS from `entry` over outgoing dependence edges, visiting each node at
/// most once. The callback runs once per visited node.
pub fn walk_nodes<F>(sub: &Subgraph, entry: NodeId, edges: WalkEdges, mut func: F)
where
    F: FnMut(NodeId),
{
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    let mut queue = VecDeque::new();

    visited.insert(entry);
    queue.push_back(entry);

    while let Some(id) = queue.pop_front() {
        func(id);

        let node = sub.node(id);
        if edges.control {
            for succ in node.control_deps() {
                if visited.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
        if edges.data {
            for succ in node.data_deps() {
                if visited.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dep_graph::domain::{Node, Subgraph};
    use crate::shared::models::ir::{InstKind, ValueId};

    fn diamond_with_cycle() -> (Subgraph, Vec<NodeId>) {
        let mut sub = Subgraph::new(ValueId(0), "f");
        let ids: Vec<NodeId> = (1..=4)
            .map(|i| sub.add_node(Node::new(ValueId(i), InstKind::Other)))
            .collect();
        sub.add_control_dependence(ids[0], ids[1]);
        sub.add_control_dependence(ids[0], ids[2]);
        sub.add_data_dependence(ids[1], ids[3]);
        sub.add_data_dependence(ids[2], ids[3]);
        // back edge
        sub.add_control_dependence(ids[3], ids[0]);
        (sub, ids)
    }

    #[test]
    fn visits_each_node_once_despite_cycle() {
        let (sub, ids) = diamond_with_cycle();
        let mut seen = Vec::new();
        walk_nodes(&sub, ids[0], WalkEdges::both(), |n| seen.push(n));
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn edge_toggles_limit_reach() {
        let (sub, ids) = diamond_with_cycle();
        let mut seen = Vec::new();
        walk_nodes(&sub, ids[0], WalkEdges::control_only(), |n| seen.push(n));
        // data edges into ids[3] are not followed
        assert!(!seen.contains(&ids[3]));
        assert_eq!(seen.len(), 3);
    }
}
