//! Pointer-subgraph construction
//!
//! Reduces an IR module to its pointer-relevant operations. Every block
//! gets a noop anchor so successor chains stay uniform; calls to defined
//! functions bind actual arguments into the callee's formal phi nodes and
//! the callee's returns back into the call node.

use crate::errors::{DepGraphError, Result};
use crate::features::points_to::domain::{
    Offset, Pointer, PointerSubgraph, PssNode, PssNodeId, PssNodeKind,
};
use crate::shared::models::ir::{Function, InstKind, Module, ValueId};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Build the pointer subgraph of `module` starting from `entry`
/// (default: `main`).
pub fn build_pss(module: &Module, entry: Option<&str>) -> Result<PointerSubgraph> {
    PssBuilder::new(module).build(entry)
}

/// Per-function handles needed to wire calls
#[derive(Debug, Clone)]
struct FunctionPss {
    entry: PssNodeId,
    formals: Vec<PssNodeId>,
    returns: Vec<PssNodeId>,
}

pub struct PssBuilder<'m> {
    module: &'m Module,
    pss: PointerSubgraph,
    built: FxHashMap<ValueId, FunctionPss>,
    /// Call nodes waiting for their callee's return nodes
    pending_returns: Vec<(PssNodeId, ValueId)>,
}

impl<'m> PssBuilder<'m> {
    pub fn new(module: &'m Module) -> Self {
        PssBuilder {
            module,
            pss: PointerSubgraph::new(),
            built: FxHashMap::default(),
            pending_returns: Vec::new(),
        }
    }

    pub fn build(mut self, entry: Option<&str>) -> Result<PointerSubgraph> {
        let name = entry.unwrap_or("main");
        let func = self
            .module
            .function_by_name(name)
            .filter(|f| f.is_defined())
            .ok_or_else(|| DepGraphError::MissingEntry(name.to_string()))?;

        let fpss = self.build_function(func);
        self.pss.entry = Some(fpss.entry);

        // returns resolve late so recursion works
        for (call, callee) in std::mem::take(&mut self.pending_returns) {
            let returns = self.built[&callee].returns.clone();
            for ret in returns {
                self.pss.node_mut(call).operands.push(ret);
                self.pss.add_successor(ret, call);
            }
        }

        self.pss.seed_initial_points_to();
        Ok(self.pss)
    }

    fn resolve(&self, value: ValueId) -> Option<PssNodeId> {
        self.pss.get(value)
    }

    /// Operand lookup with the unknown-memory sentinel as fallback
    fn resolve_or_unknown(&self, value: ValueId) -> PssNodeId {
        match self.resolve(value) {
            Some(id) => id,
            None => {
                debug!(value = %value, "pointer operand of unknown provenance");
                self.pss.unknown_node
            }
        }
    }

    fn build_function(&mut self, func: &Function) -> FunctionPss {
        if let Some(fpss) = self.built.get(&func.value) {
            return fpss.clone();
        }

        debug!(function = %func.name, "building pointer subgraph");

        let entry = self.pss.add_node(
            PssNode::new(PssNodeKind::Function)
                .with_value(func.value),
        );
        self.pss.map_value(func.value, entry);

        // one phi per formal parameter; actuals feed them at call sites
        let mut formals = Vec::new();
        let mut prev = entry;
        for &param in &func.params {
            let phi = self
                .pss
                .add_node(PssNode::new(PssNodeKind::Phi).with_value(param));
            self.pss.map_value(param, phi);
            self.pss.add_successor(prev, phi);
            formals.push(phi);
            prev = phi;
        }

        // registered before the body so self-recursion reuses it
        self.built.insert(
            func.value,
            FunctionPss {
                entry,
                formals: formals.clone(),
                returns: Vec::new(),
            },
        );

        // block anchors keep successor chains uniform
        let anchors: Vec<PssNodeId> = (0..func.blocks.len())
            .map(|_| self.pss.add_node(PssNode::new(PssNodeKind::Noop)))
            .collect();
        if let Some(&first) = anchors.first() {
            self.pss.add_successor(prev, first);
        }

        let mut returns = Vec::new();
        for (idx, block) in func.blocks.iter().enumerate() {
            let mut tail = anchors[idx];
            for inst in &block.instructions {
                if let Some(node) = self.build_instruction(inst.value, &inst.kind, &mut returns) {
                    self.pss.add_successor(tail, node);
                    tail = node;
                }
            }
            for edge in &block.successors {
                self.pss.add_successor(tail, anchors[edge.target]);
            }
        }

        self.built.get_mut(&func.value).expect("registered").returns = returns.clone();

        FunctionPss {
            entry,
            formals,
            returns,
        }
    }

    /// One node per pointer-relevant instruction; anything else returns
    /// `None` and the chain continues through it.
    fn build_instruction(
        &mut self,
        value: ValueId,
        kind: &InstKind,
        returns: &mut Vec<PssNodeId>,
    ) -> Option<PssNodeId> {
        let node = match *kind {
            InstKind::Alloca { size, zeroed } => {
                let mut n = PssNode::new(PssNodeKind::Alloc)
                    .with_size(size)
                    .with_value(value);
                if zeroed {
                    n = n.zeroed();
                }
                let id = self.pss.add_node(n);
                self.pss.map_value(value, id);
                id
            }
            InstKind::DynAlloc { size } => {
                let id = self.pss.add_node(
                    PssNode::new(PssNodeKind::DynAlloc)
                        .with_size(size)
                        .with_value(value)
                        .heap(),
                );
                self.pss.map_value(value, id);
                id
            }
            InstKind::NullPtr => {
                let null = self.pss.null_node;
                let id = self.pss.add_node(
                    PssNode::new(PssNodeKind::Constant)
                        .with_operands(vec![null])
                        .with_value(value),
                );
                self.pss.map_value(value, id);
                id
            }
            InstKind::Load { pointer } => {
                let ptr = self.resolve_or_unknown(pointer);
                let id = self.pss.add_node(
                    PssNode::new(PssNodeKind::Load)
                        .with_operands(vec![ptr])
                        .with_value(value),
                );
                self.pss.map_value(value, id);
                id
            }
            InstKind::Store {
                pointer,
                value: stored,
            } => {
                // a stored non-pointer constant has no pointer-state node;
                // such a store writes no pointers
                let stored = stored.and_then(|v| self.resolve(v))?;
                let ptr = self.resolve_or_unknown(pointer);
                self.pss.add_node(
                    PssNode::new(PssNodeKind::Store)
                        .with_operands(vec![stored, ptr])
                        .with_value(value),
                )
            }
            InstKind::Gep { pointer, offset } => {
                let ptr = self.resolve_or_unknown(pointer);
                let id = self.pss.add_node(
                    PssNode::new(PssNodeKind::Gep)
                        .with_operands(vec![ptr])
                        .with_offset(Offset::from(offset))
                        .with_value(value),
                );
                self.pss.map_value(value, id);
                id
            }
            InstKind::Cast { source } => {
                let src = self.resolve_or_unknown(source);
                let id = self.pss.add_node(
                    PssNode::new(PssNodeKind::Cast)
                        .with_operands(vec![src])
                        .with_value(value),
                );
                self.pss.map_value(value, id);
                id
            }
            InstKind::Phi { ref incoming } => {
                let ops: Vec<PssNodeId> =
                    incoming.iter().filter_map(|&v| self.resolve(v)).collect();
                let id = self.pss.add_node(
                    PssNode::new(PssNodeKind::Phi)
                        .with_operands(ops)
                        .with_value(value),
                );
                self.pss.map_value(value, id);
                id
            }
            InstKind::Call { callee, ref args } => {
                let id = self
                    .pss
                    .add_node(PssNode::new(PssNodeKind::Call).with_value(value));
                self.pss.map_value(value, id);

                match self.module.function_by_value(callee).filter(|f| f.is_defined()) {
                    Some(callee_fn) => {
                        let fpss = self.build_function(callee_fn);
                        // actual arguments feed the formal phis
                        for (i, &formal) in fpss.formals.iter().enumerate() {
                            if let Some(arg) = args.get(i).and_then(|&a| self.resolve(a)) {
                                self.pss.node_mut(formal).operands.push(arg);
                            }
                        }
                        self.pss.add_successor(id, fpss.entry);
                        self.pending_returns.push((id, callee));
                    }
                    None => {
                        // unknown provenance: over-approximate the result
                        let unknown = self.pss.unknown_node;
                        self.pss
                            .node_mut(id)
                            .points_to
                            .insert(Pointer::new(unknown, Offset::Unknown));
                    }
                }
                id
            }
            InstKind::Ret { value: returned } => {
                let ops: Vec<PssNodeId> = returned
                    .and_then(|v| self.resolve(v))
                    .into_iter()
                    .collect();
                let id = self.pss.add_node(
                    PssNode::new(PssNodeKind::Return)
                        .with_operands(ops)
                        .with_value(value),
                );
                returns.push(id);
                id
            }
            InstKind::Memcpy { dst, src, len } => {
                let dst = self.resolve_or_unknown(dst);
                let src = self.resolve_or_unknown(src);
                let mut n = PssNode::new(PssNodeKind::Memcpy)
                    .with_operands(vec![dst, src])
                    .with_value(value);
                n.length = len;
                self.pss.add_node(n)
            }
            InstKind::Branch | InstKind::Other => return None,
        };
        Some(node)
    }
}
