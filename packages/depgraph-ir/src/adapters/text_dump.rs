//! Plain-text pointer-subgraph dump
//!
//! One `NODE:` line per node followed by its points-to entries; verbose
//! mode appends the memory object (flow-insensitive) or memory map
//! (flow-sensitive) contents.

use super::dot::pss_node_name;
use super::PointsToData;
use crate::features::points_to::domain::{Offset, PointerSubgraph, PssNodeId};
use std::fmt::Write;

fn pointer_offset(offset: Offset) -> String {
    if offset.is_unknown() {
        "UNKNOWN_OFFSET".to_string()
    } else {
        offset.to_string()
    }
}

/// Render the pointer subgraph as plain text
pub fn dump_pss_text(pss: &PointerSubgraph, data: &PointsToData, verbose: bool) -> String {
    let mut out = String::new();
    for (id, _) in pss.nodes() {
        dump_node(&mut out, pss, id, data, verbose);
    }
    out
}

fn dump_node(
    out: &mut String,
    pss: &PointerSubgraph,
    id: PssNodeId,
    data: &PointsToData,
    verbose: bool,
) {
    let node = pss.node(id);
    let _ = write!(out, "NODE: {}", pss_node_name(pss, id));

    if node.size > 0 || node.is_heap || node.zero_initialized {
        let _ = write!(
            out,
            " [size: {}, heap: {}, zeroed: {}]",
            node.size, node.is_heap as u8, node.zero_initialized as u8
        );
    }

    if node.points_to.is_empty() {
        let _ = writeln!(out, " -- no points-to");
        return;
    }
    let _ = writeln!(out);

    for ptr in node.points_to.sorted() {
        let _ = writeln!(
            out,
            "    -> {} + {}",
            pss_node_name(pss, ptr.target),
            pointer_offset(ptr.offset)
        );
    }

    if verbose {
        dump_memory(out, pss, id, data);
    }
}

fn dump_memory(out: &mut String, pss: &PointerSubgraph, id: PssNodeId, data: &PointsToData) {
    match data {
        PointsToData::FlowInsensitive(result) => {
            let Some(mo) = result.memory_of(id) else {
                return;
            };
            let _ = writeln!(out, "    Memory: ---");
            for (offset, ptrs) in mo.sorted_cells() {
                for ptr in ptrs {
                    let _ = writeln!(
                        out,
                        "      [{}] -> {} + {}",
                        offset,
                        pss_node_name(pss, ptr.target),
                        pointer_offset(ptr.offset)
                    );
                }
            }
            let _ = writeln!(out, "    -----------");
        }
        PointsToData::FlowSensitive(result) => {
            let Some(map) = result.map_of(id) else {
                return;
            };
            let _ = writeln!(out, "    Memory map: ---");
            for (key, mo) in map.sorted_entries() {
                let _ = writeln!(
                    out,
                    "      [{} + {}]:",
                    pss_node_name(pss, key.target),
                    pointer_offset(key.offset)
                );
                for (offset, ptrs) in mo.sorted_cells() {
                    for ptr in ptrs {
                        let _ = writeln!(
                            out,
                            "          [{}] -> {} + {}",
                            offset,
                            pss_node_name(pss, ptr.target),
                            pointer_offset(ptr.offset)
                        );
                    }
                }
            }
            let _ = writeln!(out, "    ----------------");
        }
        PointsToData::None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::points_to::infrastructure::flow_insensitive::solve_flow_insensitive;
    use crate::features::points_to::infrastructure::flow_sensitive::solve_flow_sensitive;
    use crate::features::points_to::infrastructure::pss_builder::build_pss;
    use crate::shared::testing::scenario_strong_update;

    #[test]
    fn text_dump_is_stable_across_invocations() {
        let m = scenario_strong_update();
        let mut pss = build_pss(&m, None).unwrap();
        let result = solve_flow_insensitive(&mut pss);

        let data = PointsToData::FlowInsensitive(&result);
        let first = dump_pss_text(&pss, &data, true);
        let second = dump_pss_text(&pss, &data, true);
        assert_eq!(first, second);
        assert!(first.contains("NODE: ALLOC %2"));
        assert!(first.contains("Memory: ---"));
    }

    #[test]
    fn empty_sets_say_so() {
        let m = crate::shared::testing::scenario_store_load();
        let mut pss = build_pss(&m, None).unwrap();
        solve_flow_insensitive(&mut pss);
        let text = dump_pss_text(&pss, &PointsToData::None, false);
        assert!(text.contains("-- no points-to"));
    }

    #[test]
    fn flow_sensitive_dump_prints_memory_maps() {
        let m = scenario_strong_update();
        let mut pss = build_pss(&m, None).unwrap();
        let result = solve_flow_sensitive(&mut pss);
        let text = dump_pss_text(&pss, &PointsToData::FlowSensitive(&result), true);
        assert!(text.contains("Memory map: ---"));
    }
}
