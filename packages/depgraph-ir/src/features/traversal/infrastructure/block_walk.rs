//! BFS/DFS over block successor edges
//!
//! The DFS variant assigns DFS order to visited blocks; ordered containers
//! (the data-flow framework's block set) consult it through a comparator.

use crate::features::dep_graph::domain::{BlockRef, DepGraph};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// Inter-procedural traversal toggles
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockWalkFlags {
    /// Follow call edges into callee subgraphs
    pub interprocedural: bool,
    /// Do not enter callees even if they are defined
    pub skip_callsites: bool,
}

fn block_neighbors(graph: &DepGraph, at: BlockRef, flags: BlockWalkFlags) -> Vec<BlockRef> {
    let (sid, bid) = at;
    let sub = graph.subgraph(sid);
    let block = sub.block(bid);

    let mut out: Vec<BlockRef> = block
        .successors()
        .iter()
        .map(|e| (sid, e.target))
        .collect();

    if flags.interprocedural && !flags.skip_callsites {
        let mut callees: Vec<_> = block
            .callsites()
            .filter_map(|n| sub.node(n).callee)
            .collect();
        callees.sort();
        for callee in callees {
            if let Some(entry_block) = graph.subgraph(callee).entry_block {
                out.push((callee, entry_block));
            }
        }
    }

    out
}

/// BFS over block successor edges; each block is visited at most once
pub fn walk_blocks<F>(graph: &DepGraph, entry: BlockRef, flags: BlockWalkFlags, mut func: F)
where
    F: FnMut(BlockRef),
{
    let mut visited: FxHashSet<BlockRef> = FxHashSet::default();
    let mut queue = VecDeque::new();

    visited.insert(entry);
    queue.push_back(entry);

    while let Some(at) = queue.pop_front() {
        func(at);
        for next in block_neighbors(graph, at, flags) {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
}

/// DFS over block successor edges, assigning preorder DFS numbers
///
/// Returns the blocks in visit order; the callback runs once per block.
pub fn dfs_blocks<F>(
    graph: &mut DepGraph,
    entry: BlockRef,
    flags: BlockWalkFlags,
    mut func: F,
) -> Vec<BlockRef>
where
    F: FnMut(&mut DepGraph, BlockRef),
{
    let mut visited: FxHashSet<BlockRef> = FxHashSet::default();
    let mut stack = vec![entry];
    let mut order = Vec::new();
    let mut counter: u32 = 0;

    visited.insert(entry);

    while let Some(at) = stack.pop() {
        counter += 1;
        graph.subgraph_mut(at.0).block_mut(at.1).dfs_order = counter;
        order.push(at);
        func(graph, at);

        // push in reverse so the first successor is processed first
        let mut next = block_neighbors(graph, at, flags);
        next.reverse();
        for n in next {
            if visited.insert(n) {
                stack.push(n);
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dep_graph::domain::{BBlock, DepGraph, Subgraph};
    use crate::shared::models::ir::{CfgEdgeKind, ValueId};

    fn looped_graph() -> (DepGraph, BlockRef) {
        // bb0 -> bb1 -> bb2, bb2 -> bb1 (back edge)
        let mut sub = Subgraph::new(ValueId(0), "f");
        let b0 = sub.add_block(BBlock::new(Some(0)));
        let b1 = sub.add_block(BBlock::new(Some(1)));
        let b2 = sub.add_block(BBlock::new(Some(2)));
        sub.add_block_successor(b0, b1, CfgEdgeKind::Sequential);
        sub.add_block_successor(b1, b2, CfgEdgeKind::Sequential);
        sub.add_block_successor(b2, b1, CfgEdgeKind::TrueBranch);
        let mut graph = DepGraph::new();
        let sid = graph.add_subgraph(sub);
        (graph, (sid, b0))
    }

    #[test]
    fn bfs_visits_loop_blocks_once() {
        let (graph, entry) = looped_graph();
        let mut count = 0;
        walk_blocks(&graph, entry, BlockWalkFlags::default(), |_| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn dfs_assigns_monotone_order() {
        let (mut graph, entry) = looped_graph();
        let order = dfs_blocks(&mut graph, entry, BlockWalkFlags::default(), |_, _| {});
        assert_eq!(order.len(), 3);
        let sub = graph.subgraph(entry.0);
        let orders: Vec<u32> = order.iter().map(|&(_, b)| sub.block(b).dfs_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }
}
