//! Post-dominator integration and post-dominance frontiers
//!
//! Attaches immediate post-dominator back-pointers to blocks, computes
//! Cytron-style post-dominance frontiers bottom-up over the post-dominator
//! tree, and emits the control-dependence edges. A block's frontier holds
//! its controllers, so edges run controller → dependent.

use crate::features::dep_graph::domain::{BlockId, DepGraph, SubgraphId};
use crate::features::dep_graph::ports::PostDominatorProvider;
use crate::shared::models::ir::{Function, InstKind, Module};
use petgraph::algo::dominators::simple_fast;
use petgraph::graph::DiGraph;
use petgraph::visit::Reversed;
use rustc_hash::FxHashMap;
use tracing::warn;

/// Default provider: immediate post-dominators from the reversed CFG
///
/// All returning blocks feed a virtual exit; dominators of the reversed
/// graph rooted there are post-dominators of the original.
#[derive(Debug, Default)]
pub struct CfgPostDominators;

impl PostDominatorProvider for CfgPostDominators {
    fn immediate_post_dominators(
        &self,
        func: &Function,
    ) -> Option<FxHashMap<usize, Option<usize>>> {
        let mut cfg: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<_> = (0..func.blocks.len()).map(|i| cfg.add_node(i)).collect();
        let exit = cfg.add_node(usize::MAX);

        for (i, block) in func.blocks.iter().enumerate() {
            for edge in &block.successors {
                cfg.add_edge(nodes[i], nodes[edge.target], ());
            }
            if matches!(
                block.terminator().map(|t| &t.kind),
                Some(InstKind::Ret { .. })
            ) {
                cfg.add_edge(nodes[i], exit, ());
            }
        }

        let doms = simple_fast(Reversed(&cfg), exit);

        let mut out = FxHashMap::default();
        for (i, &n) in nodes.iter().enumerate() {
            match doms.immediate_dominator(n) {
                // the virtual exit: no immediate post-dominator block
                Some(d) if d == exit => {
                    out.insert(i, None);
                }
                Some(d) => {
                    out.insert(i, Some(cfg[d]));
                }
                // unreachable from any exit
                None => {}
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

/// Attach post-dominator data and control-dependence edges to every
/// constructed subgraph.
pub fn compute_post_dominators(
    graph: &mut DepGraph,
    module: &Module,
    provider: &dyn PostDominatorProvider,
    add_frontiers: bool,
) {
    for sid in graph.subgraph_ids().collect::<Vec<_>>() {
        let Some(func) = module.function_by_value(graph.subgraph(sid).func) else {
            continue;
        };
        compute_for_subgraph(graph, sid, func, provider, add_frontiers);
    }
}

fn sentinel_root(graph: &mut DepGraph, sid: SubgraphId) -> BlockId {
    if let Some(root) = graph.subgraph(sid).pd_root {
        return root;
    }
    let sub = graph.subgraph_mut(sid);
    let root = sub.add_block(crate::features::dep_graph::domain::BBlock::new(None));
    sub.pd_root = Some(root);
    root
}

fn compute_for_subgraph(
    graph: &mut DepGraph,
    sid: SubgraphId,
    func: &Function,
    provider: &dyn PostDominatorProvider,
    add_frontiers: bool,
) {
    // IR block index -> constructed block
    let mut by_key: FxHashMap<usize, BlockId> = FxHashMap::default();
    for bid in graph.subgraph(sid).block_ids() {
        if let Some(key) = graph.subgraph(sid).block(bid).key {
            by_key.insert(key, bid);
        }
    }

    let Some(ipdoms) = provider.immediate_post_dominators(func) else {
        // no post-dominator data at all: the function is one big infinite
        // loop. Fall back to sound but imprecise successor edges.
        warn!(function = %func.name, "no post-dominator data, using CFG successor fallback");
        graph.subgraph_mut(sid).degraded = true;

        if add_frontiers {
            let root = sentinel_root(graph, sid);
            let blocks: Vec<BlockId> = by_key.values().copied().collect();
            for &bid in &blocks {
                graph.subgraph_mut(sid).block_mut(bid).ipostdom = Some(root);
                let succs: Vec<BlockId> = graph
                    .subgraph(sid)
                    .block(bid)
                    .successors()
                    .iter()
                    .map(|e| e.target)
                    .collect();
                for succ in succs {
                    graph.subgraph_mut(sid).add_block_control_dependence(bid, succ);
                }
            }
        }
        return;
    };

    // immediate post-dominator back-pointers
    for (&key, &bid) in &by_key {
        match ipdoms.get(&key) {
            Some(Some(idom_key)) => {
                let idom = by_key[idom_key];
                graph.subgraph_mut(sid).block_mut(bid).ipostdom = Some(idom);
            }
            Some(None) => {
                let root = sentinel_root(graph, sid);
                graph.subgraph_mut(sid).block_mut(bid).ipostdom = Some(root);
            }
            // block has no post-dominator data (an inner infinite loop)
            None => {}
        }
    }

    if add_frontiers {
        add_frontier_edges(graph, sid);
    }
}

/// Cytron's bottom-up dominance-frontier computation on the reversed graph:
///
/// ```text
/// DF(X) = { P ∈ preds(X) | ipdom(P) ≠ X }
///       ∪ { Y ∈ DF(Z) | Z ∈ children(X), ipdom(Y) ≠ X }
/// ```
///
/// followed by control-dependence edges `Y → X` for every `Y ∈ DF(X)`.
fn add_frontier_edges(graph: &mut DepGraph, sid: SubgraphId) {
    let Some(root) = graph.subgraph(sid).pd_root else {
        return;
    };

    // post-dominator tree as children lists
    let mut children: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
    for bid in graph.subgraph(sid).block_ids() {
        if let Some(idom) = graph.subgraph(sid).block(bid).ipostdom {
            children.entry(idom).or_default().push(bid);
        }
    }
    for list in children.values_mut() {
        list.sort();
    }

    // children-first order
    let mut postorder = Vec::new();
    let mut stack = vec![(root, false)];
    while let Some((block, expanded)) = stack.pop() {
        if expanded {
            postorder.push(block);
            continue;
        }
        stack.push((block, true));
        if let Some(kids) = children.get(&block) {
            for &kid in kids {
                stack.push((kid, false));
            }
        }
    }

    let mut df: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
    for &x in &postorder {
        let mut frontier = Vec::new();

        let ipdom_is_x = |graph: &DepGraph, y: BlockId| {
            graph.subgraph(sid).block(y).ipostdom == Some(x)
        };

        for &p in graph.subgraph(sid).block(x).predecessors() {
            if !ipdom_is_x(graph, p) {
                frontier.push(p);
            }
        }
        if let Some(kids) = children.get(&x) {
            for &z in kids {
                for &y in df.get(&z).map(|v| v.as_slice()).unwrap_or(&[]) {
                    if !ipdom_is_x(graph, y) && !frontier.contains(&y) {
                        frontier.push(y);
                    }
                }
            }
        }

        for &y in &frontier {
            graph.subgraph_mut(sid).add_block_control_dependence(y, x);
            // node-level edges from the controlling terminator; intra-block
            // self dependence stays at block level only
            if y != x {
                let last = graph.subgraph(sid).block(y).last;
                if let Some(last) = last {
                    for n in graph.subgraph(sid).block_nodes(x) {
                        graph.subgraph_mut(sid).add_control_dependence(last, n);
                    }
                }
            }
        }

        df.insert(x, frontier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dep_graph::infrastructure::builder::build_module;
    use crate::shared::testing::{scenario_diamond, scenario_infinite_loop};

    #[test]
    fn diamond_branch_controls_both_arms() {
        let m = scenario_diamond();
        let mut graph = build_module(&m, None).unwrap();
        compute_post_dominators(&mut graph, &m, &CfgPostDominators, true);

        let sub = graph.subgraph(graph.entry.unwrap());
        let block_of = |key: usize| {
            sub.block_ids()
                .find(|&b| sub.block(b).key == Some(key))
                .unwrap()
        };
        let (b0, b1, b2, b3) = (block_of(0), block_of(1), block_of(2), block_of(3));

        // bb1 and bb2 post-dominate into bb3; bb0's decision controls them
        assert_eq!(sub.block(b1).ipostdom, Some(b3));
        assert_eq!(sub.block(b2).ipostdom, Some(b3));
        assert_eq!(sub.block(b0).ipostdom, Some(b3));
        assert!(sub.block(b0).has_control_dep(b1));
        assert!(sub.block(b0).has_control_dep(b2));
        assert!(!sub.block(b0).has_control_dep(b3));
        assert!(!sub.block(b1).has_control_dep(b3));

        // node-level mirror: the branch terminator controls both arms
        let branch = sub.block(b0).last.unwrap();
        for n in sub.block_nodes(b1) {
            assert!(sub.node(branch).has_control_dep(n));
        }
        for n in sub.block_nodes(b2) {
            assert!(sub.node(branch).has_control_dep(n));
        }
    }

    #[test]
    fn infinite_loop_falls_back_to_successor_edges() {
        let m = scenario_infinite_loop();
        let mut graph = build_module(&m, None).unwrap();
        compute_post_dominators(&mut graph, &m, &CfgPostDominators, true);

        let sub = graph.subgraph(graph.entry.unwrap());
        assert!(sub.pd_root.is_some(), "sentinel root block created");
        assert!(sub.degraded);

        let b0 = sub
            .block_ids()
            .find(|&b| sub.block(b).key == Some(0))
            .unwrap();
        // the self loop yields a successor-to-successor control edge
        assert!(sub.block(b0).has_control_dep(b0));
        assert_eq!(sub.block(b0).ipostdom, sub.pd_root);
    }

    #[test]
    fn provider_reports_no_data_for_infinite_loop() {
        let m = scenario_infinite_loop();
        assert!(CfgPostDominators
            .immediate_post_dominators(&m.functions[0])
            .is_none());
    }

    #[test]
    fn straight_line_has_no_frontier_edges() {
        let m = crate::shared::testing::scenario_store_load();
        let mut graph = build_module(&m, None).unwrap();
        compute_post_dominators(&mut graph, &m, &CfgPostDominators, true);

        let sub = graph.subgraph(graph.entry.unwrap());
        for bid in sub.block_ids() {
            assert_eq!(sub.block(bid).control_deps().count(), 0);
        }
    }
}
