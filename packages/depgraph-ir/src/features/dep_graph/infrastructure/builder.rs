//! Dependence-graph builder
//!
//! Builds one subgraph per function reachable from the entry function and
//! links call sites to callee subgraphs. Construction walks the function's
//! basic blocks breadth-first; already-processed successors only receive the
//! block-level CFG edge, which keeps loops finite.

use crate::errors::{DepGraphError, Result};
use crate::features::dep_graph::domain::{
    BBlock, BlockId, DepGraph, Node, NodeId, NodeRole, ParamPair, ParamPosition, Parameters,
    Subgraph, SubgraphId,
};
use crate::shared::models::ir::{Function, InstKind, Instruction, Module, ValueId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Build the dependence graph of `module` starting from `entry`
/// (default: `main`).
pub fn build_module(module: &Module, entry: Option<&str>) -> Result<DepGraph> {
    DepGraphBuilder::new(module).build(entry)
}

pub struct DepGraphBuilder<'m> {
    module: &'m Module,
    graph: DepGraph,
    /// Functions whose build failed; calls to them are treated as undefined
    failed: FxHashSet<ValueId>,
    /// Source of value handles for phony nodes
    next_synthetic: u32,
}

impl<'m> DepGraphBuilder<'m> {
    pub fn new(module: &'m Module) -> Self {
        DepGraphBuilder {
            module,
            graph: DepGraph::new(),
            failed: FxHashSet::default(),
            next_synthetic: module.max_value_id() + 1,
        }
    }

    pub fn build(mut self, entry: Option<&str>) -> Result<DepGraph> {
        let name = entry.unwrap_or("main");
        let func = self
            .module
            .function_by_name(name)
            .filter(|f| f.is_defined())
            .ok_or_else(|| DepGraphError::MissingEntry(name.to_string()))?;

        let entry_id = self.build_function(func)?;
        self.graph.entry = Some(entry_id);
        Ok(self.graph)
    }

    fn mint_value(&mut self) -> ValueId {
        let v = ValueId(self.next_synthetic);
        self.next_synthetic += 1;
        v
    }

    /// Build (or look up) the subgraph of `func`
    ///
    /// The subgraph is registered before its blocks are processed, so
    /// recursive calls reuse the in-progress subgraph.
    fn build_function(&mut self, func: &Function) -> Result<SubgraphId> {
        if let Some(id) = self.graph.subgraph_for(func.value) {
            return Ok(id);
        }

        // structural pre-check, so a malformed function leaves no partial
        // subgraph behind
        for (i, block) in func.blocks.iter().enumerate() {
            if block.instructions.is_empty() {
                return Err(DepGraphError::MalformedBlock {
                    function: func.name.clone(),
                    reason: format!("block {} is empty", i),
                });
            }
            if block.terminator().is_none() {
                return Err(DepGraphError::MalformedBlock {
                    function: func.name.clone(),
                    reason: format!("block {} has no terminator", i),
                });
            }
        }

        debug!(function = %func.name, "building dependence subgraph");

        let sid = self.graph.add_subgraph(Subgraph::new(func.value, func.name.clone()));

        // entry node, keyed by the function value itself
        let entry = self
            .graph
            .subgraph_mut(sid)
            .add_node(Node::new(func.value, InstKind::Other).with_role(NodeRole::Entry));
        self.graph.subgraph_mut(sid).entry = Some(entry);

        // BFS over the IR blocks; a successor seen before only gets the
        // CFG edge (added below), never a second visit
        let mut processed: FxHashSet<usize> = FxHashSet::default();
        let mut queue: VecDeque<usize> = VecDeque::new();
        let mut block_map: FxHashMap<usize, BlockId> = FxHashMap::default();

        processed.insert(0);
        queue.push_back(0);

        while let Some(ir_idx) = queue.pop_front() {
            let bid = self.build_block(sid, func, ir_idx)?;
            block_map.insert(ir_idx, bid);

            for edge in &func.blocks[ir_idx].successors {
                if processed.insert(edge.target) {
                    queue.push_back(edge.target);
                }
            }
        }

        self.graph.subgraph_mut(sid).entry_block = block_map.get(&0).copied();

        // block-level CFG edges among the built blocks
        for (&ir_idx, &bid) in &block_map {
            for edge in &func.blocks[ir_idx].successors {
                let target = block_map[&edge.target];
                self.graph
                    .subgraph_mut(sid)
                    .add_block_successor(bid, target, edge.kind);
            }
        }

        // the unified exit exists even when no return is reachable
        self.ensure_exit(sid);

        let sub = self.graph.subgraph(sid);
        debug_assert!(sub.entry.is_some(), "missing entry node");
        debug_assert!(sub.exit.is_some(), "missing exit node");
        debug_assert!(sub.entry_block.is_some(), "missing entry block");
        debug_assert!(sub.exit_block.is_some(), "missing exit block");

        // control dependence from the entry node to the first instruction
        let entry_block = sub.entry_block.expect("entry block");
        if let Some(first) = self.graph.subgraph(sid).block(entry_block).first {
            self.graph.subgraph_mut(sid).add_control_dependence(entry, first);
        }

        self.add_formal_parameters(sid, func);
        self.wire_operands(sid);

        Ok(sid)
    }

    /// Build one basic block: one node per instruction, chained in order
    fn build_block(&mut self, sid: SubgraphId, func: &Function, ir_idx: usize) -> Result<BlockId> {
        let instructions = &func.blocks[ir_idx].instructions;
        let bid = self.graph.subgraph_mut(sid).add_block(BBlock::new(Some(ir_idx)));

        let mut prev: Option<NodeId> = None;
        for inst in instructions {
            let sub = self.graph.subgraph_mut(sid);
            let nid = sub.add_node(Node::new(inst.value, inst.kind.clone()));
            sub.node_mut(nid).block = Some(bid);

            match prev {
                Some(p) => {
                    sub.node_mut(p).succ = Some(nid);
                    sub.node_mut(nid).pred = Some(p);
                }
                None => sub.block_mut(bid).first = Some(nid),
            }
            prev = Some(nid);

            if let InstKind::Call { callee, ref args } = inst.kind {
                let args = args.clone();
                self.link_callsite(sid, bid, nid, callee, &args);
            }
        }
        self.graph.subgraph_mut(sid).block_mut(bid).last = prev;

        // every return control-depends on the unified exit node
        if matches!(
            instructions.last(),
            Some(Instruction {
                kind: InstKind::Ret { .. },
                ..
            })
        ) {
            let (exit_node, exit_block) = self.ensure_exit(sid);
            let sub = self.graph.subgraph_mut(sid);
            let ret_node = sub.block(bid).last.expect("block has nodes");
            sub.add_control_dependence(ret_node, exit_node);
            sub.add_block_successor(bid, exit_block, Default::default());
        }

        Ok(bid)
    }

    /// Lazily create the phony unified return node and the exit block
    fn ensure_exit(&mut self, sid: SubgraphId) -> (NodeId, BlockId) {
        let sub = self.graph.subgraph(sid);
        if let (Some(node), Some(block)) = (sub.exit, sub.exit_block) {
            return (node, block);
        }

        // a fresh value handle, so the phony return collides with nothing
        let key = self.mint_value();
        let sub = self.graph.subgraph_mut(sid);
        let exit = sub.add_node(
            Node::new(key, InstKind::Ret { value: None }).with_role(NodeRole::Exit),
        );
        let mut block = BBlock::new(None);
        block.first = Some(exit);
        block.last = Some(exit);
        let exit_block = sub.add_block(block);
        sub.node_mut(exit).block = Some(exit_block);
        sub.exit = Some(exit);
        sub.exit_block = Some(exit_block);
        (exit, exit_block)
    }

    /// Link a call node to its callee subgraph and create the actual
    /// parameter record
    fn link_callsite(
        &mut self,
        caller: SubgraphId,
        block: BlockId,
        call_node: NodeId,
        callee_val: ValueId,
        args: &[ValueId],
    ) {
        let Some(callee_fn) = self.module.function_by_value(callee_val) else {
            debug!(callee = %callee_val, "call target is not a module function, skipping");
            return;
        };
        if !callee_fn.is_defined() || self.failed.contains(&callee_val) {
            debug!(callee = %callee_fn.name, "skipping undefined function");
            return;
        }

        let callee_id = match self.build_function(callee_fn) {
            Ok(id) => id,
            Err(e) => {
                warn!(callee = %callee_fn.name, error = %e, "building callee subgraph failed");
                self.failed.insert(callee_val);
                self.graph.subgraph_mut(caller).degraded = true;
                return;
            }
        };

        let sub = self.graph.subgraph_mut(caller);
        sub.block_mut(block).add_callsite(call_node);
        sub.node_mut(call_node).callee = Some(callee_id);
        self.graph
            .subgraph_mut(callee_id)
            .add_link((caller, call_node));

        self.add_actual_parameters(caller, call_node, args);
    }

    /// Actual parameters mirror the callee's formals at the call site
    fn add_actual_parameters(&mut self, sid: SubgraphId, call_node: NodeId, args: &[ValueId]) {
        if args.is_empty() {
            return;
        }

        let mut params = Parameters::new(ParamPosition::Actual);
        let sub = self.graph.subgraph_mut(sid);
        let block = sub.node(call_node).block;
        for &arg in args {
            let input = sub.add_node(Node::new(arg, InstKind::Other).with_role(NodeRole::ParamIn));
            let output =
                sub.add_node(Node::new(arg, InstKind::Other).with_role(NodeRole::ParamOut));
            sub.node_mut(input).block = block;
            sub.node_mut(output).block = block;
            params.add(arg, ParamPair { input, output });
            sub.add_control_dependence(call_node, input);
            sub.add_control_dependence(call_node, output);
        }
        sub.node_mut(call_node).parameters = Some(params);
    }

    /// Formal parameters hang off the entry node; present iff the function
    /// has arguments
    fn add_formal_parameters(&mut self, sid: SubgraphId, func: &Function) {
        if func.params.is_empty() {
            return;
        }

        let sub = self.graph.subgraph_mut(sid);
        let entry = sub.entry.expect("entry node");
        let block = sub.entry_block;
        let mut params = Parameters::new(ParamPosition::Formal);
        for &val in &func.params {
            let input = sub.add_node(Node::new(val, InstKind::Other).with_role(NodeRole::ParamIn));
            let output =
                sub.add_node(Node::new(val, InstKind::Other).with_role(NodeRole::ParamOut));
            sub.node_mut(input).block = block;
            sub.node_mut(output).block = block;
            params.add(val, ParamPair { input, output });
            sub.add_control_dependence(entry, input);
            sub.add_control_dependence(entry, output);
        }
        sub.parameters = Some(params);
    }

    /// Populate operand arrays from the instruction kinds
    ///
    /// Runs after the whole function is built, so forward references
    /// resolve. A missing operand node degrades the graph but never fails
    /// the build.
    fn wire_operands(&mut self, sid: SubgraphId) {
        let ids: Vec<NodeId> = self.graph.subgraph(sid).node_ids().collect();
        for nid in ids {
            let kind = self.graph.subgraph(sid).node(nid).kind.clone();
            let operands = match kind {
                InstKind::Alloca { .. } | InstKind::DynAlloc { .. } => vec![Some(nid)],
                InstKind::Store { pointer, value } => {
                    let ptr = self.resolve_operand(sid, nid, pointer, "store pointer");
                    let val = match value {
                        Some(v) => self.resolve_operand(sid, nid, v, "store value"),
                        None => {
                            warn!(node = %nid, "store value operand is a constant without a node");
                            None
                        }
                    };
                    vec![ptr, val]
                }
                InstKind::Load { pointer } => {
                    vec![self.resolve_operand(sid, nid, pointer, "load pointer")]
                }
                InstKind::Gep { pointer, .. } => {
                    vec![self.resolve_operand(sid, nid, pointer, "gep pointer")]
                }
                InstKind::Cast { source } => {
                    let src = self.graph.subgraph(sid).get(source);
                    if src.is_none() {
                        warn!(node = %nid, "cast with unstrippable pointer source");
                        self.graph.subgraph_mut(sid).degraded = true;
                    }
                    vec![src]
                }
                InstKind::Call { callee, args } => {
                    // the called value rarely has a node in the caller
                    let mut ops = vec![self.graph.subgraph(sid).get(callee)];
                    for arg in args {
                        ops.push(self.graph.subgraph(sid).get(arg));
                    }
                    ops
                }
                InstKind::Ret { value } => match value {
                    Some(v) => vec![self.resolve_operand(sid, nid, v, "return value")],
                    None => Vec::new(),
                },
                InstKind::Memcpy { dst, src, .. } => {
                    vec![
                        self.resolve_operand(sid, nid, dst, "memcpy dst"),
                        self.resolve_operand(sid, nid, src, "memcpy src"),
                    ]
                }
                _ => Vec::new(),
            };
            self.graph.subgraph_mut(sid).node_mut(nid).operands = operands;
        }
    }

    fn resolve_operand(
        &mut self,
        sid: SubgraphId,
        nid: NodeId,
        value: ValueId,
        what: &str,
    ) -> Option<NodeId> {
        let found = self.graph.subgraph(sid).get(value);
        if found.is_none() {
            warn!(node = %nid, operand = %value, "{} operand without node", what);
            self.graph.subgraph_mut(sid).degraded = true;
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testing::{
        scenario_call_pair, scenario_self_recursion, scenario_store_load,
    };
    use crate::shared::models::ir::{Block, CfgEdge};

    #[test]
    fn store_load_function_shape() {
        // int x; int *p = &x; int y = *p; return y;
        let m = scenario_store_load();
        let graph = build_module(&m, None).unwrap();
        let sub = graph.subgraph(graph.entry.unwrap());

        // 4 instruction nodes plus entry and unified exit
        assert_eq!(sub.node_count(), 6);
        assert!(sub.entry.is_some() && sub.exit.is_some());
        assert_ne!(sub.entry, sub.exit);
        assert_ne!(sub.entry_block, sub.exit_block);
        assert!(sub.verify().is_empty());

        // entry controls the first instruction
        let first = sub.block(sub.entry_block.unwrap()).first.unwrap();
        assert!(sub.node(sub.entry.unwrap()).has_control_dep(first));

        // the return controls the unified exit
        let ret = sub.block(sub.entry_block.unwrap()).last.unwrap();
        assert!(sub.node(ret).has_control_dep(sub.exit.unwrap()));

        // operand wiring: alloca points at itself, store at [ptr, value]
        let alloca = sub.get(ValueId(2)).unwrap();
        assert_eq!(sub.node(alloca).operands, vec![Some(alloca)]);
        let store = sub.get(ValueId(3)).unwrap();
        assert_eq!(sub.node(store).operands[0], Some(alloca));
    }

    #[test]
    fn call_links_callee_subgraph() {
        let m = scenario_call_pair();
        let graph = build_module(&m, Some("f")).unwrap();
        let f = graph.subgraph(graph.entry.unwrap());

        let call = f.get(ValueId(12)).unwrap();
        let callee = f.node(call).callee.expect("call links callee subgraph");
        let g = graph.subgraph(callee);
        assert_eq!(g.name, "g");
        assert_eq!(g.link_count(), 1);
        assert_eq!(g.callers(), &[(graph.entry.unwrap(), call)]);
        assert!(f.block(f.node(call).block.unwrap()).is_callsite(call));

        // actual parameters controlled by the call node
        let actuals = f.node(call).parameters.as_ref().unwrap();
        assert_eq!(actuals.position(), ParamPosition::Actual);
        for (_, pair) in actuals.iter() {
            assert!(f.node(call).has_control_dep(pair.input));
            assert!(f.node(call).has_control_dep(pair.output));
        }

        // formal parameters controlled by the callee entry
        let formals = g.parameters.as_ref().unwrap();
        assert_eq!(formals.position(), ParamPosition::Formal);
        assert_eq!(formals.len(), 1);
        for (_, pair) in formals.iter() {
            assert!(g.node(g.entry.unwrap()).has_control_dep(pair.input));
            assert!(g.node(g.entry.unwrap()).has_control_dep(pair.output));
        }
    }

    #[test]
    fn self_recursion_reuses_subgraph() {
        let m = scenario_self_recursion();
        let graph = build_module(&m, Some("f")).unwrap();
        assert_eq!(graph.subgraph_count(), 1);

        let f = graph.subgraph(graph.entry.unwrap());
        let call = f.get(ValueId(10)).unwrap();
        assert_eq!(f.node(call).callee, Some(graph.entry.unwrap()));
        assert_eq!(f.link_count(), 1);
    }

    #[test]
    fn missing_entry_fails_softly() {
        let m = Module::default();
        let err = build_module(&m, None).unwrap_err();
        assert!(matches!(err, DepGraphError::MissingEntry(_)));
    }

    #[test]
    fn block_without_terminator_is_fatal() {
        let m = Module::new(vec![Function {
            name: "main".into(),
            value: ValueId(1),
            params: vec![],
            blocks: vec![Block::new(vec![Instruction::new(
                ValueId(2),
                InstKind::Alloca {
                    size: 4,
                    zeroed: false,
                },
            )])],
        }]);
        let err = build_module(&m, None).unwrap_err();
        assert!(matches!(err, DepGraphError::MalformedBlock { .. }));
    }

    #[test]
    fn undefined_callee_is_skipped() {
        let m = Module::new(vec![
            Function {
                name: "main".into(),
                value: ValueId(1),
                params: vec![],
                blocks: vec![Block::new(vec![
                    Instruction::new(
                        ValueId(2),
                        InstKind::Call {
                            callee: ValueId(9),
                            args: vec![],
                        },
                    ),
                    Instruction::new(ValueId(3), InstKind::Ret { value: None }),
                ])],
            },
            Function {
                name: "extern_fn".into(),
                value: ValueId(9),
                params: vec![],
                blocks: vec![],
            },
        ]);
        let graph = build_module(&m, None).unwrap();
        assert_eq!(graph.subgraph_count(), 1);
        let sub = graph.subgraph(graph.entry.unwrap());
        let call = sub.get(ValueId(2)).unwrap();
        assert!(sub.node(call).callee.is_none());
    }

    #[test]
    fn loop_blocks_processed_once() {
        // bb0 -> bb1, bb1 -> bb1 (self loop), bb1 -> bb2 (ret)
        let m = Module::new(vec![Function {
            name: "main".into(),
            value: ValueId(1),
            params: vec![],
            blocks: vec![
                Block::new(vec![Instruction::new(ValueId(2), InstKind::Branch)])
                    .with_successors(vec![CfgEdge::to(1)]),
                Block::new(vec![
                    Instruction::new(
                        ValueId(3),
                        InstKind::Alloca {
                            size: 4,
                            zeroed: false,
                        },
                    ),
                    Instruction::new(ValueId(4), InstKind::Branch),
                ])
                .with_successors(vec![
                    CfgEdge {
                        target: 1,
                        kind: crate::shared::models::ir::CfgEdgeKind::TrueBranch,
                    },
                    CfgEdge {
                        target: 2,
                        kind: crate::shared::models::ir::CfgEdgeKind::FalseBranch,
                    },
                ]),
                Block::new(vec![Instruction::new(ValueId(5), InstKind::Ret { value: None })]),
            ],
        }]);
        let graph = build_module(&m, None).unwrap();
        let sub = graph.subgraph(graph.entry.unwrap());
        // 3 IR blocks + phony exit block, despite the cycle
        assert_eq!(sub.block_count(), 4);
        // the self loop produced exactly one successor edge back to bb1
        let b1 = sub
            .block_ids()
            .find(|&b| sub.block(b).key == Some(1))
            .unwrap();
        assert_eq!(
            sub.block(b1)
                .successors()
                .iter()
                .filter(|e| e.target == b1)
                .count(),
            1
        );
        assert!(sub.verify().is_empty());
    }
}
