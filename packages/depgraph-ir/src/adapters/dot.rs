//! DOT renderers
//!
//! The dependence graph renders one cluster per subgraph: solid edges for
//! intra-block successors, dashed for control dependence, dotted for data
//! dependence, and call edges for subgraph linkage. Output is deterministic:
//! arenas are walked in index order and edge sets are sorted.

use super::{crop_label, PointsToData};
use crate::features::dep_graph::domain::{DepGraph, Node, NodeId, NodeRole, SubgraphId};
use crate::features::points_to::domain::{PointerSubgraph, PssNodeId, PssNodeKind};
use crate::shared::models::ir::Instruction;
use std::fmt::Write;

/// Which edge families the dependence-graph dump includes
#[derive(Debug, Clone, Copy)]
pub struct PrintOptions {
    pub control: bool,
    pub data: bool,
    pub cfg: bool,
    pub rev_cfg: bool,
    pub call: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions {
            control: true,
            data: true,
            cfg: true,
            rev_cfg: false,
            call: false,
        }
    }
}

fn node_label(sub_name: &str, node: &Node) -> String {
    let text = match node.role {
        NodeRole::Entry => format!("ENTRY {}", sub_name),
        NodeRole::Exit => "EXIT (unified return)".to_string(),
        NodeRole::ParamIn => format!("PARAM IN {}", node.key),
        NodeRole::ParamOut => format!("PARAM OUT {}", node.key),
        NodeRole::Instruction => Instruction::new(node.key, node.kind.clone()).label(),
    };
    crop_label(&text)
}

fn dot_id(sid: SubgraphId, nid: NodeId) -> String {
    format!("NODE_s{}_{}", sid.0, nid.0)
}

/// Render the whole dependence graph as DOT
pub fn dg_to_dot(graph: &DepGraph, options: PrintOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"DependenceGraph\" {{");
    let _ = writeln!(out, "\tcompound=true");

    for (sid, sub) in graph.subgraphs() {
        let _ = writeln!(out, "\tsubgraph cluster_{} {{", sid);
        let _ = writeln!(out, "\t\tlabel=\"{}\"", crop_label(&sub.name));
        for (nid, node) in sub.nodes() {
            let _ = writeln!(
                out,
                "\t\t{} [label=\"{}\"]",
                dot_id(sid, nid),
                node_label(&sub.name, node)
            );
        }
        let _ = writeln!(out, "\t}}");
    }

    for (sid, sub) in graph.subgraphs() {
        for (nid, node) in sub.nodes() {
            // intra-block successor chain
            if let Some(succ) = node.succ {
                let _ = writeln!(out, "\t{} -> {}", dot_id(sid, nid), dot_id(sid, succ));
            }

            if options.control {
                let mut targets: Vec<NodeId> = node.control_deps().collect();
                targets.sort();
                for t in targets {
                    let _ = writeln!(
                        out,
                        "\t{} -> {} [style=dashed]",
                        dot_id(sid, nid),
                        dot_id(sid, t)
                    );
                }
            }

            if options.data {
                let mut targets: Vec<NodeId> = node.data_deps().collect();
                targets.sort();
                for t in targets {
                    let _ = writeln!(
                        out,
                        "\t{} -> {} [style=dotted]",
                        dot_id(sid, nid),
                        dot_id(sid, t)
                    );
                }
            }

            if options.call {
                if let Some(callee) = node.callee {
                    if let Some(centry) = graph.subgraph(callee).entry {
                        let _ = writeln!(
                            out,
                            "\t{} -> {} [label=\"call\" penwidth=2]",
                            dot_id(sid, nid),
                            dot_id(callee, centry)
                        );
                    }
                }
            }
        }

        if options.cfg || options.rev_cfg {
            for bid in sub.block_ids() {
                let block = sub.block(bid);
                let (Some(last), edges) = (block.last, block.successors()) else {
                    continue;
                };
                for edge in edges {
                    let Some(first) = sub.block(edge.target).first else {
                        continue;
                    };
                    if options.cfg {
                        let _ = writeln!(
                            out,
                            "\t{} -> {} [color=gray]",
                            dot_id(sid, last),
                            dot_id(sid, first)
                        );
                    }
                    if options.rev_cfg {
                        let _ = writeln!(
                            out,
                            "\t{} -> {} [color=gray style=dashed]",
                            dot_id(sid, first),
                            dot_id(sid, last)
                        );
                    }
                }
            }
        }
    }

    let _ = writeln!(out, "}}");
    out
}

pub(crate) fn pss_node_name(pss: &PointerSubgraph, id: PssNodeId) -> String {
    let node = pss.node(id);
    if let Some(ref name) = node.name {
        return crop_label(name);
    }
    match node.value {
        Some(v) => crop_label(&format!("{} {}", node.kind, v)),
        None => crop_label(&format!("{} #{}", node.kind, id.0)),
    }
}

/// Render the pointer subgraph as DOT, points-to sets inlined in labels
pub fn pss_to_dot(pss: &PointerSubgraph, data: &PointsToData, verbose: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"Pointer State Subgraph\" {{");

    for (id, node) in pss.nodes() {
        let mut label = pss_node_name(pss, id);
        if node.size > 0 || node.is_heap || node.zero_initialized {
            label.push_str(&format!(
                "\\n[size: {}, heap: {}, zeroed: {}]",
                node.size, node.is_heap as u8, node.zero_initialized as u8
            ));
        }
        for ptr in node.points_to.sorted() {
            label.push_str(&format!(
                "\\n    -> {} + {}",
                pss_node_name(pss, ptr.target),
                offset_label(ptr.offset)
            ));
        }
        if verbose {
            label.push_str(&memory_label(pss, id, data));
        }

        let _ = write!(out, "\tNODE{} [label=\"{}\"", id.0, label);
        if node.kind != PssNodeKind::Store {
            let _ = write!(out, " shape=box");
            if node.points_to.is_empty() {
                let _ = write!(out, " fillcolor=red");
            }
        } else {
            let _ = write!(out, " shape=cds");
        }
        let _ = writeln!(out, "]");
    }

    for (id, node) in pss.nodes() {
        for succ in node.successors() {
            let _ = writeln!(out, "\tNODE{} -> NODE{} [penwidth=2]", id.0, succ.0);
        }
    }

    let _ = writeln!(out, "}}");
    out
}

fn offset_label(offset: crate::features::points_to::domain::Offset) -> String {
    if offset.is_unknown() {
        "UNKNOWN_OFFSET".to_string()
    } else {
        offset.to_string()
    }
}

/// Memory contents of one node, formatted for a DOT label
fn memory_label(pss: &PointerSubgraph, id: PssNodeId, data: &PointsToData) -> String {
    let mut out = String::new();
    match data {
        PointsToData::FlowInsensitive(result) => {
            if let Some(mo) = result.memory_of(id) {
                out.push_str("\\n    Memory: ---");
                for (offset, ptrs) in mo.sorted_cells() {
                    for ptr in ptrs {
                        out.push_str(&format!(
                            "\\n      [{}] -> {} + {}",
                            offset,
                            pss_node_name(pss, ptr.target),
                            offset_label(ptr.offset)
                        ));
                    }
                }
            }
        }
        PointsToData::FlowSensitive(result) => {
            if let Some(map) = result.map_of(id) {
                out.push_str("\\n    Memory map: ---");
                for (key, mo) in map.sorted_entries() {
                    out.push_str(&format!(
                        "\\n      [{} + {}]:",
                        pss_node_name(pss, key.target),
                        offset_label(key.offset)
                    ));
                    for (offset, ptrs) in mo.sorted_cells() {
                        for ptr in ptrs {
                            out.push_str(&format!(
                                "\\n        [{}] -> {} + {}",
                                offset,
                                pss_node_name(pss, ptr.target),
                                offset_label(ptr.offset)
                            ));
                        }
                    }
                }
            }
        }
        PointsToData::None => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dep_graph::infrastructure::builder::build_module;
    use crate::features::dep_graph::infrastructure::value_flow::add_data_dependencies;
    use crate::features::points_to::infrastructure::pss_builder::build_pss;
    use crate::shared::testing::{scenario_call_pair, scenario_store_load};

    #[test]
    fn dg_dump_is_deterministic() {
        let m = scenario_store_load();
        let mut graph = build_module(&m, None).unwrap();
        add_data_dependencies(&mut graph, None);

        let first = dg_to_dot(&graph, PrintOptions::default());
        let second = dg_to_dot(&graph, PrintOptions::default());
        assert_eq!(first, second);
        assert!(first.contains("digraph \"DependenceGraph\""));
        assert!(first.contains("style=dashed"));
        assert!(first.contains("style=dotted"));
    }

    #[test]
    fn edge_families_toggle() {
        let m = scenario_store_load();
        let mut graph = build_module(&m, None).unwrap();
        add_data_dependencies(&mut graph, None);

        let no_control = dg_to_dot(
            &graph,
            PrintOptions {
                control: false,
                data: false,
                ..Default::default()
            },
        );
        assert!(!no_control.contains("style=dashed"));
        assert!(!no_control.contains("style=dotted"));
    }

    #[test]
    fn call_edges_cross_clusters() {
        let m = scenario_call_pair();
        let graph = build_module(&m, Some("f")).unwrap();
        let dot = dg_to_dot(
            &graph,
            PrintOptions {
                call: true,
                ..Default::default()
            },
        );
        assert!(dot.contains("label=\"call\""));
        assert!(dot.contains("cluster_sub0"));
        assert!(dot.contains("cluster_sub1"));
    }

    #[test]
    fn pss_dump_marks_stores_and_empty_sets() {
        let m = crate::shared::testing::scenario_strong_update();
        let mut pss = build_pss(&m, None).unwrap();
        crate::features::points_to::infrastructure::flow_insensitive::solve_flow_insensitive(
            &mut pss,
        );
        let dot = pss_to_dot(&pss, &PointsToData::None, false);
        assert!(dot.contains("shape=cds"));
        assert!(dot.contains("shape=box"));
    }
}
