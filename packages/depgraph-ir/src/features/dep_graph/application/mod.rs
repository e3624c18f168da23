//! One-call analysis pipeline
//!
//! Build the dependence graph, attach control dependence from the
//! post-dominance frontiers, solve points-to, then add alias-aware data
//! dependence. The dumper binaries and library consumers both drive this.

use crate::errors::Result;
use crate::features::dep_graph::domain::DepGraph;
use crate::features::dep_graph::infrastructure::builder::build_module;
use crate::features::dep_graph::infrastructure::post_dominance::{
    compute_post_dominators, CfgPostDominators,
};
use crate::features::dep_graph::infrastructure::value_flow::add_data_dependencies;
use crate::features::points_to::domain::PointerSubgraph;
use crate::features::points_to::infrastructure::flow_insensitive::{
    solve_flow_insensitive, FlowInsensitiveResult,
};
use crate::features::points_to::infrastructure::pss_builder::build_pss;
use crate::shared::models::ir::Module;
use tracing::info;

/// Everything the analysis produced for one module
pub struct ModuleAnalysis {
    pub graph: DepGraph,
    pub pss: PointerSubgraph,
    pub points_to: FlowInsensitiveResult,
}

/// Run the full pipeline on `module`, starting from `entry`
/// (default: `main`).
pub fn analyze_module(module: &Module, entry: Option<&str>) -> Result<ModuleAnalysis> {
    let mut graph = build_module(module, entry)?;
    compute_post_dominators(&mut graph, module, &CfgPostDominators, true);

    let mut pss = build_pss(module, entry)?;
    let points_to = solve_flow_insensitive(&mut pss);
    info!(
        processed = points_to.stats.processed,
        iterations = points_to.stats.iterations,
        duration_ms = points_to.stats.duration_ms,
        "points-to analysis finished"
    );

    add_data_dependencies(&mut graph, Some(&pss));

    Ok(ModuleAnalysis {
        graph,
        pss,
        points_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testing::scenario_store_load;

    #[test]
    fn pipeline_produces_a_queryable_graph() {
        let m = scenario_store_load();
        let analysis = analyze_module(&m, None).unwrap();

        let sub = analysis.graph.subgraph(analysis.graph.entry.unwrap());
        assert!(sub.verify().is_empty());
        assert!(!analysis.pss.points_to(crate::shared::models::ir::ValueId(2)).unwrap().is_empty());
    }
}
