//! Iterative data-flow framework
//!
//! A block-level fixpoint driver parameterised over a transfer function.
//! The initial DFS seeds the analysis once per reachable block; afterwards
//! blocks are iterated in reverse DFS order until quiescence, which tends to
//! converge quickly for forward problems on reducible CFGs. Irreducible CFGs
//! get no special handling beyond iterating to fixpoint.
//!
//! The transfer must be monotone with respect to its state; the driver then
//! terminates on any bounded lattice.

use crate::features::dep_graph::domain::{BlockRef, DepGraph, NodeId, SubgraphId};
use crate::features::traversal::infrastructure::block_walk::{dfs_blocks, BlockWalkFlags};

/// Statistics collected by a data-flow run
#[derive(Debug, Clone, Copy, Default)]
pub struct DataFlowStats {
    /// Reachable blocks collected by the initial DFS
    pub blocks: u64,
    /// Fixpoint iterations, the seeding DFS counted as the first
    pub iterations: u64,
    /// Total transfer applications
    pub processed_blocks: u64,
}

/// Block-level fixpoint driver
#[derive(Debug, Default)]
pub struct BlockDataFlow {
    flags: BlockWalkFlags,
    pub stats: DataFlowStats,
}

impl BlockDataFlow {
    pub fn new(flags: BlockWalkFlags) -> Self {
        BlockDataFlow {
            flags,
            stats: DataFlowStats::default(),
        }
    }

    pub fn flags(&self) -> BlockWalkFlags {
        self.flags
    }

    /// Run `transfer` to fixpoint from `entry`
    pub fn run<F>(&mut self, graph: &mut DepGraph, entry: BlockRef, transfer: &mut F)
    where
        F: FnMut(&mut DepGraph, BlockRef) -> bool,
    {
        let mut changed = false;

        // seeding pass: the DFS applies the transfer once per block and
        // collects the blocks in DFS order
        let blocks = dfs_blocks(graph, entry, self.flags, |g, b| {
            changed |= transfer(g, b);
        });

        self.stats.blocks = blocks.len() as u64;
        self.stats.iterations = 1;
        self.stats.processed_blocks = blocks.len() as u64;

        while changed {
            changed = false;
            for &block in blocks.iter().rev() {
                changed |= transfer(graph, block);
                self.stats.processed_blocks += 1;
            }
            self.stats.iterations += 1;
        }
    }

    /// Node-level variant: the block transfer walks the intra-block chain
    /// applying `run_on_node` to every node.
    pub fn run_on_nodes<F>(&mut self, graph: &mut DepGraph, entry: BlockRef, run_on_node: &mut F)
    where
        F: FnMut(&mut DepGraph, SubgraphId, NodeId) -> bool,
    {
        self.run(graph, entry, &mut |g, (sid, bid)| {
            let chain = g.subgraph(sid).block_nodes(bid);
            let mut changed = false;
            for n in chain {
                changed |= run_on_node(g, sid, n);
            }
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dep_graph::domain::{BBlock, BlockId, Subgraph};
    use crate::shared::models::ir::{CfgEdgeKind, ValueId};
    use rustc_hash::FxHashMap;

    fn looped_graph() -> (DepGraph, SubgraphId, Vec<BlockId>) {
        // bb0 -> bb1 -> bb2 -> bb3, bb2 -> bb1
        let mut sub = Subgraph::new(ValueId(0), "f");
        let ids: Vec<BlockId> = (0..4).map(|i| sub.add_block(BBlock::new(Some(i)))).collect();
        sub.add_block_successor(ids[0], ids[1], CfgEdgeKind::Sequential);
        sub.add_block_successor(ids[1], ids[2], CfgEdgeKind::Sequential);
        sub.add_block_successor(ids[2], ids[3], CfgEdgeKind::FalseBranch);
        sub.add_block_successor(ids[2], ids[1], CfgEdgeKind::TrueBranch);
        let mut graph = DepGraph::new();
        let sid = graph.add_subgraph(sub);
        (graph, sid, ids)
    }

    #[test]
    fn loop_requires_extra_iteration() {
        let (mut graph, sid, ids) = looped_graph();

        // reaching "facts": each block's state is the union of predecessor
        // states plus its own id; the back edge forces a second pass
        let mut state: FxHashMap<BlockId, Vec<usize>> = FxHashMap::default();
        let mut driver = BlockDataFlow::new(BlockWalkFlags::default());
        driver.run(&mut graph, (sid, ids[0]), &mut |g, (s, b)| {
            let mut incoming: Vec<usize> = g.subgraph(s).block(b).predecessors().to_vec()
                .into_iter()
                .flat_map(|p| state.get(&p).cloned().unwrap_or_default())
                .collect();
            incoming.push(g.subgraph(s).block(b).key.unwrap());
            incoming.sort_unstable();
            incoming.dedup();
            let old = state.entry(b).or_default();
            if *old != incoming {
                *old = incoming;
                true
            } else {
                false
            }
        });

        assert_eq!(driver.stats.blocks, 4);
        assert!(driver.stats.iterations >= 2);
        // the loop head sees the loop body through the back edge
        assert!(state[&ids[1]].contains(&2));
        // exit block sees everything
        assert_eq!(state[&ids[3]], vec![0, 1, 2, 3]);
    }

    #[test]
    fn quiescent_transfer_runs_exactly_once_per_block() {
        let (mut graph, sid, ids) = looped_graph();
        let mut driver = BlockDataFlow::new(BlockWalkFlags::default());
        let mut seen = 0;
        driver.run(&mut graph, (sid, ids[0]), &mut |_, _| {
            seen += 1;
            false
        });
        assert_eq!(seen, 4);
        assert_eq!(driver.stats.iterations, 1);
        assert_eq!(driver.stats.processed_blocks, 4);
    }
}
