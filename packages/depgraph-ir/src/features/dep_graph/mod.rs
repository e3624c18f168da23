//! Dependence-graph feature: graph primitives, the per-function builder,
//! post-dominance control dependence and the value-flow pass

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::{analyze_module, ModuleAnalysis};
pub use domain::{BBlock, DepGraph, Node, NodeId, Parameters, Subgraph, SubgraphId};
pub use infrastructure::builder::build_module;
pub use infrastructure::post_dominance::{compute_post_dominators, CfgPostDominators};
pub use infrastructure::value_flow::add_data_dependencies;
pub use ports::PostDominatorProvider;
