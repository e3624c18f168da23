//! Value-flow pass: data-dependence edges
//!
//! Two sources of data dependence. Def-use edges run from every operand
//! node to its user. Memory dependence runs from stores to the loads they
//! may reach: per-block reaching-store sets are iterated to fixpoint on the
//! data-flow framework, and a load depends on every reaching store whose
//! pointer may alias the load's pointer. With solved points-to data the
//! alias test uses the points-to sets; without it only identical pointers
//! alias.

use crate::features::data_flow::infrastructure::framework::{BlockDataFlow, DataFlowStats};
use crate::features::dep_graph::domain::{BlockRef, DepGraph, NodeId};
use crate::features::points_to::domain::PointerSubgraph;
use crate::features::traversal::infrastructure::block_walk::BlockWalkFlags;
use crate::shared::models::ir::{InstKind, ValueId};
use rustc_hash::FxHashMap;

/// Add data-dependence edges to every subgraph of `graph`
pub fn add_data_dependencies(
    graph: &mut DepGraph,
    pss: Option<&PointerSubgraph>,
) -> DataFlowStats {
    add_def_use_edges(graph);

    let mut totals = DataFlowStats::default();
    for sid in graph.subgraph_ids().collect::<Vec<_>>() {
        let Some(entry_block) = graph.subgraph(sid).entry_block else {
            continue;
        };

        let mut reaching = ReachingStores {
            pss,
            out: FxHashMap::default(),
        };
        let mut driver = BlockDataFlow::new(BlockWalkFlags::default());
        driver.run(graph, (sid, entry_block), &mut |g, block| {
            reaching.transfer(g, block)
        });

        totals.blocks += driver.stats.blocks;
        totals.iterations += driver.stats.iterations;
        totals.processed_blocks += driver.stats.processed_blocks;
    }
    totals
}

/// Def-use: every operand feeds its user
fn add_def_use_edges(graph: &mut DepGraph) {
    for sid in graph.subgraph_ids().collect::<Vec<_>>() {
        let sub = graph.subgraph(sid);
        let mut edges: Vec<(NodeId, NodeId)> = Vec::new();
        for (id, node) in sub.nodes() {
            for op in node.operands.iter().flatten() {
                if *op != id {
                    edges.push((*op, id));
                }
            }
        }
        let sub = graph.subgraph_mut(sid);
        for (from, to) in edges {
            sub.add_data_dependence(from, to);
        }
    }
}

/// Reaching-store sets per block; a store is never killed, which is sound
/// for may-dependence.
struct ReachingStores<'p> {
    pss: Option<&'p PointerSubgraph>,
    out: FxHashMap<BlockRef, Vec<(NodeId, ValueId)>>,
}

impl ReachingStores<'_> {
    fn may_alias(&self, a: ValueId, b: ValueId) -> bool {
        match self.pss {
            Some(pss) => pss.may_alias(a, b),
            None => a == b,
        }
    }

    fn transfer(&mut self, graph: &mut DepGraph, block: BlockRef) -> bool {
        let (sid, bid) = block;

        let mut reaching: Vec<(NodeId, ValueId)> = Vec::new();
        for &pred in graph.subgraph(sid).block(bid).predecessors() {
            for entry in self.out.get(&(sid, pred)).into_iter().flatten() {
                if !reaching.contains(entry) {
                    reaching.push(*entry);
                }
            }
        }

        let chain = graph.subgraph(sid).block_nodes(bid);
        let mut edges: Vec<(NodeId, NodeId)> = Vec::new();
        for n in chain {
            match graph.subgraph(sid).node(n).kind {
                InstKind::Store { pointer, .. } => {
                    if !reaching.contains(&(n, pointer)) {
                        reaching.push((n, pointer));
                    }
                }
                InstKind::Load { pointer } => {
                    for &(store, store_ptr) in &reaching {
                        if self.may_alias(store_ptr, pointer) {
                            edges.push((store, n));
                        }
                    }
                }
                _ => {}
            }
        }

        for (from, to) in edges {
            graph.subgraph_mut(sid).add_data_dependence(from, to);
        }

        let slot = self.out.entry(block).or_default();
        if *slot != reaching {
            *slot = reaching;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dep_graph::infrastructure::builder::build_module;
    use crate::features::points_to::infrastructure::flow_insensitive::solve_flow_insensitive;
    use crate::features::points_to::infrastructure::pss_builder::build_pss;
    use crate::shared::models::ir::{Block, CfgEdge, CfgEdgeKind, Function, Instruction, Module};
    use crate::shared::testing::scenario_store_load;

    #[test]
    fn store_reaches_load_and_load_feeds_return() {
        let m = scenario_store_load();
        let mut graph = build_module(&m, None).unwrap();
        add_data_dependencies(&mut graph, None);

        let sub = graph.subgraph(graph.entry.unwrap());
        let store = sub.get(ValueId(3)).unwrap();
        let load = sub.get(ValueId(4)).unwrap();
        let ret = sub.get(ValueId(5)).unwrap();

        assert!(sub.node(store).has_data_dep(load));
        assert!(sub.node(load).has_data_dep(ret));
    }

    #[test]
    fn aliasing_store_reaches_load_through_points_to() {
        // store through a gep alias of the alloca, load through the alloca
        let m = Module::new(vec![Function {
            name: "main".into(),
            value: ValueId(1),
            params: vec![],
            blocks: vec![Block::new(vec![
                Instruction::new(
                    ValueId(2),
                    InstKind::Alloca {
                        size: 8,
                        zeroed: false,
                    },
                ),
                Instruction::new(
                    ValueId(3),
                    InstKind::Gep {
                        pointer: ValueId(2),
                        offset: Some(0),
                    },
                ),
                Instruction::new(
                    ValueId(4),
                    InstKind::Alloca {
                        size: 8,
                        zeroed: false,
                    },
                ),
                Instruction::new(
                    ValueId(5),
                    InstKind::Store {
                        pointer: ValueId(3),
                        value: Some(ValueId(4)),
                    },
                ),
                Instruction::new(ValueId(6), InstKind::Load { pointer: ValueId(2) }),
                Instruction::new(ValueId(7), InstKind::Ret { value: None }),
            ])],
        }]);

        let mut graph = build_module(&m, None).unwrap();
        let mut pss = build_pss(&m, None).unwrap();
        solve_flow_insensitive(&mut pss);

        // without alias information the dependence is missed
        add_data_dependencies(&mut graph, None);
        let sub = graph.subgraph(graph.entry.unwrap());
        let store = sub.get(ValueId(5)).unwrap();
        let load = sub.get(ValueId(6)).unwrap();
        assert!(!sub.node(store).has_data_dep(load));

        // with it the store reaches the load
        add_data_dependencies(&mut graph, Some(&pss));
        let sub = graph.subgraph(graph.entry.unwrap());
        assert!(sub.node(store).has_data_dep(load));
    }

    #[test]
    fn loop_carried_store_reaches_earlier_load() {
        // bb0: alloca p, alloca q, store q->p, br bb1
        // bb1: load p, store q->p, br bb1 | bb2
        // bb2: ret
        let m = Module::new(vec![Function {
            name: "main".into(),
            value: ValueId(1),
            params: vec![],
            blocks: vec![
                Block::new(vec![
                    Instruction::new(
                        ValueId(2),
                        InstKind::Alloca {
                            size: 8,
                            zeroed: false,
                        },
                    ),
                    Instruction::new(
                        ValueId(3),
                        InstKind::Alloca {
                            size: 8,
                            zeroed: false,
                        },
                    ),
                    Instruction::new(ValueId(4), InstKind::Branch),
                ])
                .with_successors(vec![CfgEdge::to(1)]),
                Block::new(vec![
                    Instruction::new(ValueId(5), InstKind::Load { pointer: ValueId(2) }),
                    Instruction::new(
                        ValueId(6),
                        InstKind::Store {
                            pointer: ValueId(2),
                            value: Some(ValueId(3)),
                        },
                    ),
                    Instruction::new(ValueId(7), InstKind::Branch),
                ])
                .with_successors(vec![
                    CfgEdge {
                        target: 1,
                        kind: CfgEdgeKind::TrueBranch,
                    },
                    CfgEdge {
                        target: 2,
                        kind: CfgEdgeKind::FalseBranch,
                    },
                ]),
                Block::new(vec![Instruction::new(ValueId(8), InstKind::Ret { value: None })]),
            ],
        }]);

        let mut graph = build_module(&m, None).unwrap();
        let stats = add_data_dependencies(&mut graph, None);

        // the back edge forces at least one extra iteration
        assert!(stats.iterations >= 2);

        let sub = graph.subgraph(graph.entry.unwrap());
        let load = sub.get(ValueId(5)).unwrap();
        let store = sub.get(ValueId(6)).unwrap();
        assert!(sub.node(store).has_data_dep(load));
    }
}
